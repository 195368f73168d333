//! The resolved, immutable run configuration.

use super::{ArtifactLayout, Toolchain};
use crate::errors::ConfigurationError;
use crate::memo::MemoStrategy;
use crate::pipeline::FailureMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Annotation file family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    /// GenBank flat file (`.gb`, `.gbk`).
    Genbank,
    /// GFF with a separate FASTA.
    Gff,
}

impl AnnotationType {
    /// Value passed to collaborators.
    #[must_use]
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Genbank => "gb",
            Self::Gff => "gff",
        }
    }

    /// Extensions searched for, in order of preference.
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Genbank => &[".gb", ".gbk"],
            Self::Gff => &[".gff", ".gff3"],
        }
    }
}

impl FromStr for AnnotationType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gb" | "gbk" | "genbank" => Ok(Self::Genbank),
            "gff" | "gff3" => Ok(Self::Gff),
            other => Err(ConfigurationError::new(
                "CONFIG-BAD-ANNOTATION-TYPE",
                format!("Unknown annotation type '{other}'"),
            )
            .with_field("annotation_type")
            .with_fix_hint("Use 'gb' for GenBank or 'gff' for GFF annotations")),
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Single- or paired-end sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequencingMode {
    /// One read file set.
    SingleEnd,
    /// Forward and reverse mate sets.
    PairedEnd,
}

impl SequencingMode {
    /// Value passed to collaborators.
    #[must_use]
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::SingleEnd => "SE",
            Self::PairedEnd => "PE",
        }
    }
}

impl FromStr for SequencingMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SE" => Ok(Self::SingleEnd),
            "PE" => Ok(Self::PairedEnd),
            other => Err(ConfigurationError::new(
                "CONFIG-BAD-SEQUENCING-TYPE",
                format!("Unknown sequencing type '{other}'"),
            )
            .with_field("sequencing_type")
            .with_fix_hint("Use 'SE' for single-ended or 'PE' for paired-ended reads")),
        }
    }
}

impl fmt::Display for SequencingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Full pipeline, or re-entry at essentiality inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Index, trim/compile, align, parse, plot.
    #[default]
    Full,
    /// Only essentiality inference, against a prior insertion table.
    EssentialsOnly,
}

/// Where the reads come from. Paired mode always carries both mate sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ReadSource {
    /// Single-end reads.
    Single {
        /// Sequencing directory.
        dir: PathBuf,
        /// Discovered read files.
        files: Vec<PathBuf>,
    },
    /// Paired-end reads.
    Paired {
        /// Forward read directory.
        forward_dir: PathBuf,
        /// Forward read files.
        forward: Vec<PathBuf>,
        /// Mate read directory.
        reverse_dir: PathBuf,
        /// Mate read files, same count as `forward`.
        reverse: Vec<PathBuf>,
    },
}

impl ReadSource {
    /// The sequencing mode this source implies.
    #[must_use]
    pub fn mode(&self) -> SequencingMode {
        match self {
            Self::Single { .. } => SequencingMode::SingleEnd,
            Self::Paired { .. } => SequencingMode::PairedEnd,
        }
    }

    /// The primary sequencing directory.
    #[must_use]
    pub fn primary_dir(&self) -> &Path {
        match self {
            Self::Single { dir, .. } => dir,
            Self::Paired { forward_dir, .. } => forward_dir,
        }
    }

    /// Every discovered read file.
    #[must_use]
    pub fn all_files(&self) -> Vec<&Path> {
        match self {
            Self::Single { files, .. } => files.iter().map(PathBuf::as_path).collect(),
            Self::Paired { forward, reverse, .. } => forward
                .iter()
                .chain(reverse.iter())
                .map(PathBuf::as_path)
                .collect(),
        }
    }
}

/// Transposon trimming settings; present iff trimming is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimSettings {
    /// Transposon border sequence.
    pub transposon: String,
    /// Mismatches allowed in the border.
    pub mismatches: u32,
    /// Read length kept after the border; `None` keeps the whole read.
    pub trim_after: Option<u32>,
}

/// Barcode extraction settings; present iff barcoding is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeSettings {
    /// Upstream flank sequence.
    pub up: Option<String>,
    /// Downstream flank sequence.
    pub down: Option<String>,
    /// Upstream flank mismatches.
    pub up_mismatches: u32,
    /// Downstream flank mismatches.
    pub down_mismatches: u32,
    /// Upstream flank phred filter, at least 1.
    pub up_phred: u32,
    /// Downstream flank phred filter, at least 1.
    pub down_phred: u32,
}

impl Default for BarcodeSettings {
    fn default() -> Self {
        Self {
            up: None,
            down: None,
            up_mismatches: 0,
            down_mismatches: 0,
            up_phred: 1,
            down_phred: 1,
        }
    }
}

/// Essentiality inference parameters; present iff inference is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssentialityParams {
    /// P-value threshold, in `[0, 1]`.
    pub pvalue: f64,
    /// 5' gene trimming fraction, in `[0, 1]`.
    pub subdomain_up: f64,
    /// 3' gene trimming fraction, in `[0, 1]` and above `subdomain_up`.
    pub subdomain_down: f64,
    /// Domain uncertainty fraction, in `[0, 1]`.
    pub domain_uncertain_threshold: f64,
}

/// Everything a run needs, resolved once before any stage executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Strain identifier.
    pub strain: String,
    /// Per-strain working directory; root of every produced artifact.
    pub working_dir: PathBuf,
    /// Directory holding reference and annotation.
    pub annotation_dir: PathBuf,
    /// Reference FASTA.
    pub reference: PathBuf,
    /// Annotation file.
    pub annotation_file: PathBuf,
    /// Genome sequence file handed to the plotter.
    pub genome_file: PathBuf,
    /// Annotation family.
    pub annotation_type: AnnotationType,
    /// Read files.
    pub reads: ReadSource,
    /// Trimming, when enabled.
    pub trimming: Option<TrimSettings>,
    /// Barcoding, when enabled.
    pub barcode: Option<BarcodeSettings>,
    /// Read phred threshold, at least 1.
    pub phred: u32,
    /// MAPQ threshold.
    pub mapq: u32,
    /// Intergenic region size cutoff.
    pub intergenic_size_cutoff: u32,
    /// Read-count threshold, when enabled.
    pub read_threshold: Option<u32>,
    /// Inference parameters, when inference is enabled.
    pub essentiality: Option<EssentialityParams>,
    /// Thread count handed to tools.
    pub cpus: usize,
    /// Full or essentials-only.
    pub mode: RunMode,
    /// Keep intermediate artifacts.
    pub keep_intermediates: bool,
    /// Memoization strategy.
    pub memo: MemoStrategy,
    /// Tool failure handling.
    pub failure_mode: FailureMode,
    /// Programs to call.
    pub toolchain: Toolchain,
}

impl RunConfiguration {
    /// Paths of every artifact this run may produce.
    #[must_use]
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.working_dir, &self.strain)
    }

    /// Sequencing mode implied by the read source.
    #[must_use]
    pub fn sequencing_mode(&self) -> SequencingMode {
        self.reads.mode()
    }

    /// Returns true if reads are trimmed for the transposon border.
    #[must_use]
    pub fn trims_reads(&self) -> bool {
        self.trimming.is_some()
    }

    /// Returns true if essentiality inference runs after the main sequence.
    #[must_use]
    pub fn infers_essentiality(&self) -> bool {
        self.essentiality.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_type_parse() {
        assert_eq!("GB".parse::<AnnotationType>().unwrap(), AnnotationType::Genbank);
        assert_eq!("gbk".parse::<AnnotationType>().unwrap(), AnnotationType::Genbank);
        assert_eq!("gff".parse::<AnnotationType>().unwrap(), AnnotationType::Gff);

        let err = "embl".parse::<AnnotationType>().unwrap_err();
        assert_eq!(err.code, "CONFIG-BAD-ANNOTATION-TYPE");
    }

    #[test]
    fn test_sequencing_mode_parse() {
        assert_eq!("se".parse::<SequencingMode>().unwrap(), SequencingMode::SingleEnd);
        assert_eq!("PE".parse::<SequencingMode>().unwrap(), SequencingMode::PairedEnd);
        assert!("MP".parse::<SequencingMode>().is_err());
        assert_eq!(SequencingMode::PairedEnd.to_string(), "PE");
    }

    #[test]
    fn test_read_source_files() {
        let paired = ReadSource::Paired {
            forward_dir: PathBuf::from("/r1"),
            forward: vec![PathBuf::from("/r1/a_1.fastq")],
            reverse_dir: PathBuf::from("/r2"),
            reverse: vec![PathBuf::from("/r2/a_2.fastq")],
        };

        assert_eq!(paired.mode(), SequencingMode::PairedEnd);
        assert_eq!(paired.primary_dir(), Path::new("/r1"));
        assert_eq!(paired.all_files().len(), 2);
    }

    #[test]
    fn test_barcode_defaults() {
        let barcode = BarcodeSettings::default();
        assert_eq!(barcode.up_phred, 1);
        assert_eq!(barcode.down_phred, 1);
        assert!(barcode.up.is_none());
    }
}
