//! Raw user parameters, before validation.

use super::Toolchain;
use crate::memo::MemoStrategy;
use crate::pipeline::FailureMode;
use std::path::PathBuf;

/// Default essentiality p-value threshold.
pub const DEFAULT_PVALUE: f64 = 0.1;
/// Default domain-uncertainty fraction.
pub const DEFAULT_DOMAIN_UNCERTAIN_THRESHOLD: f64 = 0.75;
/// Default 5' gene trimming fraction.
pub const DEFAULT_SUBDOMAIN_UP: f64 = 0.0;
/// Default 3' gene trimming fraction.
pub const DEFAULT_SUBDOMAIN_DOWN: f64 = 1.0;

/// Everything the user can supply, as given.
///
/// Numbers are kept signed and unchecked here; the resolver owns all domain
/// validation so that every entry point (CLI, tests, self-test) gets the
/// same diagnostics.
#[derive(Debug, Clone, Default)]
pub struct RunParameters {
    /// Strain identifier; must appear in the reference and annotation file names.
    pub strain: Option<String>,
    /// Directory with the sequencing reads.
    pub sequencing_dir: Option<PathBuf>,
    /// Directory with the mate reads (paired-end only).
    pub sequencing_dir_2: Option<PathBuf>,
    /// Directory with the reference FASTA and annotation.
    pub annotation_dir: Option<PathBuf>,
    /// `gb`, `gbk`, `genbank` or `gff`.
    pub annotation_type: Option<String>,
    /// `SE` or `PE`.
    pub sequencing_type: Option<String>,
    /// Transposon border sequence; enables trimming when set.
    pub transposon: Option<String>,
    /// Mismatches allowed in the transposon border.
    pub tn_mismatches: Option<i64>,
    /// Read length kept after the transposon border.
    pub trim_after_tn: Option<i64>,
    /// Enables barcode extraction.
    pub barcode: bool,
    /// Upstream barcode flank.
    pub barcode_up: Option<String>,
    /// Downstream barcode flank.
    pub barcode_down: Option<String>,
    /// Upstream flank mismatches.
    pub barcode_up_mismatches: Option<i64>,
    /// Downstream flank mismatches.
    pub barcode_down_mismatches: Option<i64>,
    /// Upstream flank phred filter.
    pub barcode_up_phred: Option<i64>,
    /// Downstream flank phred filter.
    pub barcode_down_phred: Option<i64>,
    /// Minimum reads per insertion; enables read filtering when set.
    pub read_threshold: Option<i64>,
    /// Essentiality p-value threshold.
    pub pvalue: Option<f64>,
    /// 5' gene trimming fraction.
    pub subdomain_up: Option<f64>,
    /// 3' gene trimming fraction.
    pub subdomain_down: Option<f64>,
    /// Domain uncertainty fraction.
    pub domain_uncertain_threshold: Option<f64>,
    /// Intergenic region size cutoff in bp.
    pub intergenic_size_cutoff: Option<i64>,
    /// Bowtie2 MAPQ threshold.
    pub mapq: Option<i64>,
    /// Read phred threshold.
    pub phred: Option<i64>,
    /// Keep intermediate artifacts.
    pub keep_intermediates: bool,
    /// Run only essentiality inference against an existing insertion table.
    pub essentials_only: bool,
    /// Do not run essentiality inference.
    pub skip_essentials: bool,
    /// Thread count handed to tools.
    pub cpus: Option<i64>,
    /// Parent of the per-strain working directory. Defaults to the current directory.
    pub output_root: Option<PathBuf>,
    /// How completed stages are recognised.
    pub memo: MemoStrategy,
    /// What a failing tool does to the rest of the run.
    pub failure_mode: FailureMode,
    /// Programs to call.
    pub toolchain: Toolchain,
}

impl RunParameters {
    /// Creates parameters for the five required inputs.
    #[must_use]
    pub fn new(
        strain: impl Into<String>,
        sequencing_dir: impl Into<PathBuf>,
        annotation_dir: impl Into<PathBuf>,
        annotation_type: impl Into<String>,
        sequencing_type: impl Into<String>,
    ) -> Self {
        Self {
            strain: Some(strain.into()),
            sequencing_dir: Some(sequencing_dir.into()),
            annotation_dir: Some(annotation_dir.into()),
            annotation_type: Some(annotation_type.into()),
            sequencing_type: Some(sequencing_type.into()),
            ..Self::default()
        }
    }

    /// Returns true if any of the five required inputs is absent.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.strain.is_none()
            || self.sequencing_dir.is_none()
            || self.annotation_dir.is_none()
            || self.annotation_type.is_none()
            || self.sequencing_type.is_none()
    }
}
