//! Stage definitions for a resolved run.
//!
//! Collaborator argument vectors are positional. Booleans are rendered as
//! `True`/`False`, absent values as `None` and whole floats with a trailing
//! `.0`, which is what the collaborator programs parse. Collaborators that
//! fill an output directory receive that directory as their last argument.

use super::{BuiltinTask, Stage, StageDelegate, StageId};
use crate::config::{
    ArtifactLayout, BarcodeSettings, EssentialityParams, ReadSource, RunConfiguration, TrimSettings,
};
use crate::core::StageArtifact;
use crate::errors::{ConfigurationError, TnflowError};
use std::path::Path;

fn py_bool(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

fn py_opt(value: Option<&str>) -> String {
    value.unwrap_or("None").to_string()
}

fn py_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn join_paths(paths: &[std::path::PathBuf]) -> String {
    paths.iter().map(|p| path_arg(p)).collect::<Vec<_>>().join(",")
}

fn not_configured(stage: StageId, field: &str, hint: &str) -> ConfigurationError {
    ConfigurationError::new(
        "CONFIG-STAGE-UNAVAILABLE",
        format!("Stage '{stage}' is not enabled by this configuration"),
    )
    .with_field(field)
    .with_fix_hint(hint)
}

/// Builds every [`Stage`] of a run from its configuration.
#[derive(Debug)]
pub struct StageCatalog<'a> {
    config: &'a RunConfiguration,
    layout: ArtifactLayout,
}

impl<'a> StageCatalog<'a> {
    /// Creates a catalog for `config`.
    #[must_use]
    pub fn new(config: &'a RunConfiguration) -> Self {
        Self {
            layout: config.layout(),
            config,
        }
    }

    /// The artifact layout stages are built against.
    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Builds the stage `id`.
    ///
    /// Fails when the configuration lacks the settings the stage needs:
    /// trimming without a transposon, or inference with inference disabled.
    pub fn stage(&self, id: StageId) -> Result<Stage, TnflowError> {
        Ok(match id {
            StageId::BuildIndex => self.build_index(),
            StageId::TrimReads => self.trim_reads()?,
            StageId::CompileRawReads => self.compile_raw_reads(),
            StageId::Align => self.align(),
            StageId::ParseInsertions => self.parse_insertions(),
            StageId::Plot => self.plot(),
            StageId::InferEssentiality => self.infer_essentiality()?,
        })
    }

    fn wd(&self) -> String {
        path_arg(&self.layout.working_dir)
    }

    fn cpus(&self) -> String {
        self.config.cpus.to_string()
    }

    fn barcode_enabled(&self) -> String {
        py_bool(self.config.barcode.is_some())
    }

    fn processed_reads(&self) -> Vec<StageArtifact> {
        let mut reads = vec![StageArtifact::file(&self.layout.processed_reads_1).intermediate()];
        if matches!(self.config.reads, ReadSource::Paired { .. }) {
            reads.push(StageArtifact::file(&self.layout.processed_reads_2).intermediate());
        }
        reads
    }

    fn build_index(&self) -> Stage {
        let inv = self
            .config
            .toolchain
            .bowtie2_build
            .invocation(StageId::BuildIndex.as_str())
            .arg(path_arg(&self.config.reference))
            .arg(path_arg(&self.layout.index_prefix));

        Stage::new(StageId::BuildIndex, StageDelegate::External(inv))
            .input(StageArtifact::file(&self.config.reference))
            .output(StageArtifact::directory(&self.layout.index_dir))
            .prepare_dir(&self.layout.index_dir)
    }

    fn trim_reads(&self) -> Result<Stage, ConfigurationError> {
        let trim: &TrimSettings = self.config.trimming.as_ref().ok_or_else(|| {
            not_configured(StageId::TrimReads, "transposon", "Pass --tn to trim reads")
        })?;
        // Barcoding off still fills the barcode positions.
        let disabled = BarcodeSettings::default();
        let barcode = self.config.barcode.as_ref().unwrap_or(&disabled);

        let mut inv = self
            .config
            .toolchain
            .trimmer
            .invocation(StageId::TrimReads.as_str())
            .arg(path_arg(self.config.reads.primary_dir()))
            .arg(self.wd())
            .arg(trim.transposon.clone())
            .arg(self.config.sequencing_mode().as_arg())
            .arg(self.barcode_enabled())
            .arg(self.config.phred.to_string());
        if let ReadSource::Paired { reverse_dir, .. } = &self.config.reads {
            inv = inv.arg(path_arg(reverse_dir));
        }
        let inv = inv.args([
            py_opt(barcode.up.as_deref()),
            py_opt(barcode.down.as_deref()),
            barcode.up_mismatches.to_string(),
            barcode.down_mismatches.to_string(),
            barcode.up_phred.to_string(),
            barcode.down_phred.to_string(),
            trim.mismatches.to_string(),
            trim.trim_after.map_or_else(|| "-1".to_string(), |t| t.to_string()),
            self.cpus(),
        ]);

        let mut stage = Stage::new(StageId::TrimReads, StageDelegate::Collaborator(inv));
        for file in self.config.reads.all_files() {
            stage = stage.input(StageArtifact::file(file));
        }
        for artifact in self.processed_reads() {
            stage = stage.output(artifact);
        }
        Ok(stage)
    }

    fn compile_raw_reads(&self) -> Stage {
        let sources: Vec<_> = self
            .config
            .reads
            .all_files()
            .into_iter()
            .map(Path::to_path_buf)
            .collect();
        let task = BuiltinTask::CompileReads {
            sources: sources.clone(),
            destination: self.layout.processed_reads_1.clone(),
        };

        let mut stage = Stage::new(StageId::CompileRawReads, StageDelegate::Builtin(task));
        for file in sources {
            stage = stage.input(StageArtifact::file(file));
        }
        stage.output(StageArtifact::file(&self.layout.processed_reads_1).intermediate())
    }

    fn align(&self) -> Stage {
        let mut inv = self
            .config
            .toolchain
            .bowtie2
            .invocation(StageId::Align.as_str())
            .args(["--end-to-end", "-x"])
            .arg(path_arg(&self.layout.index_prefix));

        let trimmed = self.config.trims_reads();
        let mut stage_inputs = Vec::new();
        let mut upstream = None;

        match &self.config.reads {
            ReadSource::Single { .. } => {
                inv = inv.arg("-U").arg(path_arg(&self.layout.processed_reads_1));
                stage_inputs = self.processed_reads();
                upstream = Some(if trimmed {
                    StageId::TrimReads
                } else {
                    StageId::CompileRawReads
                });
            }
            ReadSource::Paired { forward, reverse, .. } if !trimmed => {
                inv = inv
                    .arg("-1")
                    .arg(join_paths(forward))
                    .arg("-2")
                    .arg(join_paths(reverse));
            }
            ReadSource::Paired { .. } => {
                inv = inv
                    .arg("-1")
                    .arg(path_arg(&self.layout.processed_reads_1))
                    .arg("-2")
                    .arg(path_arg(&self.layout.processed_reads_2));
                stage_inputs = self.processed_reads();
                upstream = Some(StageId::TrimReads);
            }
        }

        let inv = inv
            .arg("-S")
            .arg(path_arg(&self.layout.alignment))
            .args(["--no-unal", "--threads"])
            .arg(self.cpus())
            .with_stderr_log(&self.layout.align_log);

        let mut stage = Stage::new(StageId::Align, StageDelegate::External(inv))
            .depends_on(StageId::BuildIndex)
            .input(StageArtifact::directory(&self.layout.index_dir))
            .output(StageArtifact::file(&self.layout.alignment).intermediate());
        if let Some(id) = upstream {
            stage = stage.depends_on(id);
        }
        if stage_inputs.is_empty() {
            for file in self.config.reads.all_files() {
                stage = stage.input(StageArtifact::file(file));
            }
        }
        for artifact in stage_inputs {
            stage = stage.input(artifact.clone()).retires(artifact);
        }
        stage
    }

    fn parse_insertions(&self) -> Stage {
        let inv = self
            .config
            .toolchain
            .parser
            .invocation(StageId::ParseInsertions.as_str())
            .arg(self.wd())
            .arg(self.config.strain.clone())
            .arg(self.config.sequencing_mode().as_arg())
            .arg(py_bool(self.config.read_threshold.is_some()))
            .arg(self.config.read_threshold.unwrap_or(0).to_string())
            .arg(self.barcode_enabled())
            .arg(self.config.mapq.to_string())
            .arg(path_arg(&self.config.annotation_file))
            .arg(self.config.intergenic_size_cutoff.to_string())
            .arg(self.cpus());

        let alignment = StageArtifact::file(&self.layout.alignment).intermediate();
        let mut stage = Stage::new(StageId::ParseInsertions, StageDelegate::Collaborator(inv))
            .depends_on(StageId::Align)
            .input(alignment.clone())
            .output(StageArtifact::file(&self.layout.insertion_table))
            .retires(alignment);
        if self.config.barcode.is_some() {
            stage = stage.retires(StageArtifact::file(&self.layout.barcoded_alignment).intermediate());
        }
        stage
    }

    fn plot(&self) -> Stage {
        let inv = self
            .config
            .toolchain
            .plotter
            .invocation(StageId::Plot.as_str())
            .arg(self.wd())
            .arg(path_arg(&self.config.genome_file))
            .arg(path_arg(&self.config.annotation_file))
            .arg(self.config.annotation_type.as_arg())
            .arg(self.barcode_enabled())
            .arg(self.config.strain.clone())
            .arg(path_arg(&self.layout.plots_dir));

        Stage::new(StageId::Plot, StageDelegate::Collaborator(inv))
            .depends_on(StageId::ParseInsertions)
            .input(StageArtifact::file(&self.layout.insertion_table))
            .output(StageArtifact::directory(&self.layout.plots_dir))
            .prepare_dir(&self.layout.plots_dir)
    }

    fn infer_essentiality(&self) -> Result<Stage, ConfigurationError> {
        let params: &EssentialityParams = self.config.essentiality.as_ref().ok_or_else(|| {
            not_configured(
                StageId::InferEssentiality,
                "skip_essentials",
                "Drop --ne to infer essential genes",
            )
        })?;

        let inv = self
            .config
            .toolchain
            .essentials
            .invocation(StageId::InferEssentiality.as_str())
            .arg(self.wd())
            .arg(self.config.strain.clone())
            .arg(self.config.annotation_type.as_arg())
            .arg(path_arg(&self.config.annotation_dir))
            .arg(py_float(params.subdomain_up))
            .arg(py_float(params.subdomain_down))
            .arg(py_float(params.pvalue))
            .arg(self.config.intergenic_size_cutoff.to_string())
            .arg(py_float(params.domain_uncertain_threshold))
            .arg(self.cpus())
            .arg(path_arg(&self.layout.essentiality_dir));

        Ok(Stage::new(StageId::InferEssentiality, StageDelegate::Collaborator(inv))
            .depends_on(StageId::ParseInsertions)
            .input(StageArtifact::file(&self.layout.insertion_table))
            .output(StageArtifact::directory(&self.layout.essentiality_dir))
            .prepare_dir(&self.layout.essentiality_dir))
    }
}
