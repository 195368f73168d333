//! Artifact paths inside a strain's working directory.

use std::path::{Path, PathBuf};

/// Where each artifact of a run lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// The working directory.
    pub working_dir: PathBuf,
    /// Bowtie2 index directory.
    pub index_dir: PathBuf,
    /// Bowtie2 index basename (`indexes/<strain>`).
    pub index_prefix: PathBuf,
    /// Trimmed or compiled forward reads.
    pub processed_reads_1: PathBuf,
    /// Trimmed mate reads.
    pub processed_reads_2: PathBuf,
    /// Alignment output.
    pub alignment: PathBuf,
    /// Barcode-augmented alignment written by the parser.
    pub barcoded_alignment: PathBuf,
    /// Aligner stderr.
    pub align_log: PathBuf,
    /// Insertion-site table.
    pub insertion_table: PathBuf,
    /// Plot output directory.
    pub plots_dir: PathBuf,
    /// Essentiality output directory.
    pub essentiality_dir: PathBuf,
    /// Resolved configuration snapshot.
    pub config_snapshot: PathBuf,
    /// Stage completion manifest.
    pub manifest: PathBuf,
    /// Per-run report.
    pub report: PathBuf,
    /// Lock held for the duration of a run.
    pub lock: PathBuf,
}

impl ArtifactLayout {
    /// Lays out a working directory for `strain`.
    #[must_use]
    pub fn new(working_dir: &Path, strain: &str) -> Self {
        let wd = working_dir.to_path_buf();
        let index_dir = wd.join("indexes");
        Self {
            index_prefix: index_dir.join(strain),
            index_dir,
            processed_reads_1: wd.join("processed_reads_1.fastq"),
            processed_reads_2: wd.join("processed_reads_2.fastq"),
            alignment: wd.join("alignment.sam"),
            barcoded_alignment: wd.join("barcoded_align.sam"),
            align_log: wd.join("bowtie_align_log.log"),
            insertion_table: wd.join(format!("all_insertions_{strain}.csv")),
            plots_dir: wd.join("plots"),
            essentiality_dir: wd.join("essentiality"),
            config_snapshot: wd.join("cmd_input.txt"),
            manifest: wd.join(".tnflow_manifest.json"),
            report: wd.join("run_report.json"),
            lock: wd.join(".tnflow.lock"),
            working_dir: wd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names() {
        let layout = ArtifactLayout::new(Path::new("/runs/PA14"), "PA14");

        assert_eq!(layout.index_prefix, PathBuf::from("/runs/PA14/indexes/PA14"));
        assert_eq!(
            layout.insertion_table,
            PathBuf::from("/runs/PA14/all_insertions_PA14.csv")
        );
        assert_eq!(layout.alignment, PathBuf::from("/runs/PA14/alignment.sam"));
        assert_eq!(layout.config_snapshot, PathBuf::from("/runs/PA14/cmd_input.txt"));
        assert!(layout.lock.starts_with(&layout.working_dir));
    }
}
