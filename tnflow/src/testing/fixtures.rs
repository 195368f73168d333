//! On-disk strain fixtures.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::RunParameters;

const FASTA: &str = ">chr1\nATGAAACGCATTAGCACCACCATTACCACCACCATCACCATTACCACAGGTAACGGTGCGGGCTGA\n";
const GENBANK: &str = "LOCUS       chr1          66 bp    DNA     linear   BCT\n\
FEATURES             Location/Qualifiers\n\
     gene            1..66\n\
                     /locus_tag=\"G0001\"\n\
ORIGIN\n\
        1 atgaaacgca ttagcaccac cattaccacc accatcacca ttaccacagg taacggtgcg\n\
       61 ggctga\n\
//\n";
const GFF: &str = "##gff-version 3\nchr1\tfixture\tgene\t1\t66\t.\t+\t.\tID=G0001\n";
const READ: &str = "@read1\nAGATGTGTATAAGAGACAGATGAAACGCATTAGC\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n";

/// Builds a [`StrainFixture`].
#[derive(Debug, Clone)]
pub struct StrainFixtureBuilder {
    strain: String,
    paired: bool,
    mates: usize,
    gff: bool,
    reads: bool,
}

impl StrainFixtureBuilder {
    /// Lays out paired-end reads.
    #[must_use]
    pub fn paired(mut self) -> Self {
        self.paired = true;
        self
    }

    /// Number of read files per direction.
    #[must_use]
    pub fn mates(mut self, count: usize) -> Self {
        self.mates = count;
        self
    }

    /// Writes a GFF annotation instead of GenBank.
    #[must_use]
    pub fn gff(mut self) -> Self {
        self.gff = true;
        self
    }

    /// Leaves the read directories empty.
    #[must_use]
    pub fn without_reads(mut self) -> Self {
        self.reads = false;
        self
    }

    /// Writes the fixture to a fresh temporary directory.
    pub fn build(self) -> io::Result<StrainFixture> {
        let root = tempfile::tempdir()?;
        let annotation_dir = root.path().join("annotation");
        let reads_dir = root.path().join("reads");
        let mate_dir = root.path().join("reads_2");
        let output_root = root.path().join("out");

        for dir in [&annotation_dir, &reads_dir, &output_root] {
            std::fs::create_dir_all(dir)?;
        }
        if self.paired {
            std::fs::create_dir_all(&mate_dir)?;
        }

        let strain = &self.strain;
        std::fs::write(annotation_dir.join(format!("{strain}.fasta")), FASTA)?;
        if self.gff {
            std::fs::write(annotation_dir.join(format!("{strain}.gff")), GFF)?;
        } else {
            std::fs::write(annotation_dir.join(format!("{strain}.gb")), GENBANK)?;
        }

        if self.reads {
            for i in 1..=self.mates {
                if self.paired {
                    std::fs::write(reads_dir.join(format!("sample{i}_R1.fastq")), READ)?;
                    std::fs::write(mate_dir.join(format!("sample{i}_R2.fastq")), READ)?;
                } else {
                    std::fs::write(reads_dir.join(format!("sample{i}.fastq")), READ)?;
                }
            }
        }

        Ok(StrainFixture {
            strain: self.strain,
            paired: self.paired,
            gff: self.gff,
            annotation_dir,
            reads_dir,
            mate_dir,
            output_root,
            _root: root,
        })
    }
}

/// A strain's reference, annotation and reads in a temporary directory.
///
/// The directory is removed when the fixture is dropped.
#[derive(Debug)]
pub struct StrainFixture {
    strain: String,
    paired: bool,
    gff: bool,
    annotation_dir: PathBuf,
    reads_dir: PathBuf,
    mate_dir: PathBuf,
    output_root: PathBuf,
    _root: TempDir,
}

impl StrainFixture {
    /// Starts a fixture for `strain`: single-end, GenBank, one read file.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new(strain: impl Into<String>) -> StrainFixtureBuilder {
        StrainFixtureBuilder {
            strain: strain.into(),
            paired: false,
            mates: 1,
            gff: false,
            reads: true,
        }
    }

    /// Strain identifier.
    #[must_use]
    pub fn strain(&self) -> &str {
        &self.strain
    }

    /// Reference and annotation directory.
    #[must_use]
    pub fn annotation_dir(&self) -> &Path {
        &self.annotation_dir
    }

    /// Forward (or only) read directory.
    #[must_use]
    pub fn reads_dir(&self) -> &Path {
        &self.reads_dir
    }

    /// Mate read directory; only populated for paired fixtures.
    #[must_use]
    pub fn mate_dir(&self) -> &Path {
        &self.mate_dir
    }

    /// Parent of the working directory.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Parameters that resolve against this fixture.
    #[must_use]
    pub fn parameters(&self) -> RunParameters {
        let mut params = RunParameters::new(
            &self.strain,
            &self.reads_dir,
            &self.annotation_dir,
            if self.gff { "gff" } else { "gb" },
            if self.paired { "PE" } else { "SE" },
        );
        if self.paired {
            params.sequencing_dir_2 = Some(self.mate_dir.clone());
        }
        params.output_root = Some(self.output_root.clone());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_fixture_layout() {
        let fx = StrainFixture::new("PA14").paired().mates(2).build().unwrap();

        assert!(fx.annotation_dir().join("PA14.fasta").is_file());
        assert!(fx.annotation_dir().join("PA14.gb").is_file());
        assert_eq!(std::fs::read_dir(fx.mate_dir()).unwrap().count(), 2);

        let params = fx.parameters();
        assert_eq!(params.sequencing_type.as_deref(), Some("PE"));
        assert_eq!(params.sequencing_dir_2.as_deref(), Some(fx.mate_dir()));
    }
}
