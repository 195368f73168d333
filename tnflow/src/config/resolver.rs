//! Builds a [`RunConfiguration`] from raw parameters and the filesystem.

use super::discovery::{find_read_files, find_strain_file, FASTA_EXTENSIONS};
use super::params::{
    RunParameters, DEFAULT_DOMAIN_UNCERTAIN_THRESHOLD, DEFAULT_PVALUE, DEFAULT_SUBDOMAIN_DOWN,
    DEFAULT_SUBDOMAIN_UP,
};
use super::run_config::{
    AnnotationType, BarcodeSettings, EssentialityParams, ReadSource, RunConfiguration, RunMode,
    SequencingMode, TrimSettings,
};
use crate::errors::{ConfigurationError, MalformedInputError, TnflowError};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Host parallelism minus one, never below one.
#[must_use]
pub fn default_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn required<T: Clone>(value: Option<&T>, field: &str) -> Result<T, ConfigurationError> {
    value
        .cloned()
        .ok_or_else(|| ConfigurationError::missing_parameter(field))
}

fn fraction(value: f64, field: &str) -> Result<f64, ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigurationError::out_of_domain(field, value, "[0, 1]"))
    }
}

fn count(value: Option<i64>, field: &str) -> Result<Option<u32>, ConfigurationError> {
    value
        .map(|v| {
            u32::try_from(v).map_err(|_| ConfigurationError::out_of_domain(field, v, "[0, u32::MAX]"))
        })
        .transpose()
}

/// Phred thresholds below one are raised to one.
fn phred(value: Option<i64>) -> u32 {
    value
        .map_or(1, |v| u32::try_from(v.clamp(1, i64::from(u32::MAX))).unwrap_or(u32::MAX))
}

fn discovery_error(err: io::Error, what: &str, dir: &Path) -> ConfigurationError {
    if err.kind() == io::ErrorKind::NotFound {
        ConfigurationError::missing_file(what, dir)
            .with_fix_hint(format!("Check that {} exists", dir.display()))
    } else {
        ConfigurationError::new(
            "CONFIG-UNREADABLE-DIR",
            format!("Could not read {}: {err}", dir.display()),
        )
    }
}

/// Resolves and validates run parameters.
///
/// Resolution touches the filesystem in two ways only: directory listings
/// for discovery, and creation of the working directory once every check
/// passed. The `cmd_input.txt` snapshot is left to the driver, which writes
/// it under the run lock.
#[derive(Debug, Default)]
pub struct ConfigurationResolver;

impl ConfigurationResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolves `params` into an immutable configuration.
    pub fn resolve(&self, params: RunParameters) -> Result<RunConfiguration, TnflowError> {
        let strain = required(params.strain.as_ref(), "strain")?;
        if strain.trim().is_empty() {
            return Err(ConfigurationError::missing_parameter("strain").into());
        }
        let sequencing_dir = required(params.sequencing_dir.as_ref(), "sequencing_dir")?;
        let annotation_dir = required(params.annotation_dir.as_ref(), "annotation_dir")?;
        let annotation_type: AnnotationType =
            required(params.annotation_type.as_ref(), "annotation_type")?.parse()?;
        let sequencing_mode: SequencingMode =
            required(params.sequencing_type.as_ref(), "sequencing_type")?.parse()?;

        let mode = if params.essentials_only {
            RunMode::EssentialsOnly
        } else {
            RunMode::Full
        };

        let trimming = match params.transposon.as_deref().map(str::trim) {
            Some(tn) if !tn.is_empty() => Some(TrimSettings {
                transposon: tn.to_string(),
                mismatches: count(params.tn_mismatches, "tn_mismatches")?.unwrap_or(0),
                trim_after: count(params.trim_after_tn, "trim_after_tn")?,
            }),
            _ => None,
        };

        let barcode = if params.barcode {
            Some(BarcodeSettings {
                up: params.barcode_up.clone(),
                down: params.barcode_down.clone(),
                up_mismatches: count(params.barcode_up_mismatches, "barcode_up_mismatches")?
                    .unwrap_or(0),
                down_mismatches: count(params.barcode_down_mismatches, "barcode_down_mismatches")?
                    .unwrap_or(0),
                up_phred: phred(params.barcode_up_phred),
                down_phred: phred(params.barcode_down_phred),
            })
        } else {
            None
        };

        let essentiality = if params.skip_essentials {
            None
        } else {
            Some(Self::essentiality(&params)?)
        };

        let cpus = match params.cpus {
            Some(n) if n >= 1 => usize::try_from(n)
                .map_err(|_| ConfigurationError::out_of_domain("cpus", n, "[1, usize::MAX]"))?,
            Some(n) => return Err(ConfigurationError::out_of_domain("cpus", n, "[1, ∞)").into()),
            None => default_cpus(),
        };

        let mapq = count(params.mapq, "mapq")?.unwrap_or(0);
        let intergenic_size_cutoff =
            count(params.intergenic_size_cutoff, "intergenic_size_cutoff")?.unwrap_or(0);
        let read_threshold = count(params.read_threshold, "read_threshold")?;

        let reference = find_strain_file(&annotation_dir, &strain, FASTA_EXTENSIONS)
            .map_err(|e| discovery_error(e, "reference FASTA", &annotation_dir))?
            .ok_or_else(|| {
                ConfigurationError::missing_file("reference FASTA", &annotation_dir)
                    .with_field("annotation_dir")
                    .with_fix_hint(format!(
                        "Add a .fasta/.fa/.fna file whose name contains '{strain}'"
                    ))
            })?;

        let annotation_file =
            find_strain_file(&annotation_dir, &strain, annotation_type.extensions())
                .map_err(|e| discovery_error(e, "annotation file", &annotation_dir))?
                .ok_or_else(|| {
                    ConfigurationError::missing_file("annotation file", &annotation_dir)
                        .with_field("annotation_dir")
                        .with_fix_hint(format!(
                            "Add a {} file whose name contains '{strain}'",
                            annotation_type.extensions().join("/")
                        ))
                })?;

        let genome_file = match annotation_type {
            AnnotationType::Genbank => annotation_file.clone(),
            AnnotationType::Gff => reference.clone(),
        };

        let reads = Self::read_source(
            sequencing_mode,
            &sequencing_dir,
            params.sequencing_dir_2.as_deref(),
            mode,
        )?;

        let working_dir = params
            .output_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(&strain);

        let config = RunConfiguration {
            strain,
            working_dir,
            annotation_dir,
            reference,
            annotation_file,
            genome_file,
            annotation_type,
            reads,
            trimming,
            barcode,
            phred: phred(params.phred),
            mapq,
            intergenic_size_cutoff,
            read_threshold,
            essentiality,
            cpus,
            mode,
            keep_intermediates: params.keep_intermediates,
            memo: params.memo,
            failure_mode: params.failure_mode,
            toolchain: params.toolchain,
        };

        std::fs::create_dir_all(&config.working_dir)?;

        info!(
            strain = %config.strain,
            working_dir = %config.working_dir.display(),
            sequencing = %config.sequencing_mode(),
            trimming = config.trims_reads(),
            essentiality = config.infers_essentiality(),
            "Run configuration resolved"
        );
        Ok(config)
    }

    fn essentiality(params: &RunParameters) -> Result<EssentialityParams, ConfigurationError> {
        let pvalue = fraction(params.pvalue.unwrap_or(DEFAULT_PVALUE), "pvalue")?;
        let subdomain_up = fraction(params.subdomain_up.unwrap_or(DEFAULT_SUBDOMAIN_UP), "subdomain_up")?;
        let subdomain_down = fraction(
            params.subdomain_down.unwrap_or(DEFAULT_SUBDOMAIN_DOWN),
            "subdomain_down",
        )?;
        let domain_uncertain_threshold = fraction(
            params
                .domain_uncertain_threshold
                .unwrap_or(DEFAULT_DOMAIN_UNCERTAIN_THRESHOLD),
            "domain_uncertain_threshold",
        )?;

        if subdomain_up >= subdomain_down {
            return Err(ConfigurationError::new(
                "CONFIG-OUT-OF-DOMAIN",
                format!(
                    "5' trim fraction {subdomain_up} must be smaller than 3' trim fraction {subdomain_down}"
                ),
            )
            .with_field("subdomain_up")
            .with_fix_hint("Lower --sl5 or raise --sl3"));
        }

        Ok(EssentialityParams {
            pvalue,
            subdomain_up,
            subdomain_down,
            domain_uncertain_threshold,
        })
    }

    fn read_source(
        sequencing_mode: SequencingMode,
        sequencing_dir: &Path,
        mate_dir: Option<&Path>,
        mode: RunMode,
    ) -> Result<ReadSource, TnflowError> {
        // Essentials-only re-entry never reads the sequencing data.
        if mode == RunMode::EssentialsOnly {
            return Ok(Self::unread_source(sequencing_mode, sequencing_dir, mate_dir));
        }
        let list = |dir: &Path| -> Result<Vec<PathBuf>, ConfigurationError> {
            let files = find_read_files(dir).map_err(|e| discovery_error(e, "read files", dir))?;
            if files.is_empty() {
                return Err(ConfigurationError::missing_file("read files", dir)
                    .with_field("sequencing_dir")
                    .with_fix_hint("Reads must end in .fastq, .fq, .fastq.gz or .fq.gz"));
            }
            Ok(files)
        };

        match sequencing_mode {
            SequencingMode::SingleEnd => Ok(ReadSource::Single {
                dir: sequencing_dir.to_path_buf(),
                files: list(sequencing_dir)?,
            }),
            SequencingMode::PairedEnd => {
                let reverse_dir = mate_dir.ok_or_else(|| {
                    ConfigurationError::missing_parameter("sequencing_dir_2")
                        .with_fix_hint("Paired-end runs need --sd2 pointing at the mate reads")
                })?;
                if reverse_dir == sequencing_dir {
                    return Err(ConfigurationError::new(
                        "CONFIG-SAME-MATE-DIR",
                        "The mate read directory must differ from the sequencing directory",
                    )
                    .with_field("sequencing_dir_2")
                    .into());
                }

                let forward = list(sequencing_dir)?;
                let reverse = list(reverse_dir)?;
                if forward.len() != reverse.len() {
                    let mut paths = forward.clone();
                    paths.extend(reverse.iter().cloned());
                    return Err(MalformedInputError::new(format!(
                        "{} forward read files but {} mate read files; mates cannot be paired",
                        forward.len(),
                        reverse.len()
                    ))
                    .with_paths(paths)
                    .into());
                }

                Ok(ReadSource::Paired {
                    forward_dir: sequencing_dir.to_path_buf(),
                    forward,
                    reverse_dir: reverse_dir.to_path_buf(),
                    reverse,
                })
            }
        }
    }

    /// Read directories recorded as given, with no files listed.
    fn unread_source(
        sequencing_mode: SequencingMode,
        sequencing_dir: &Path,
        mate_dir: Option<&Path>,
    ) -> ReadSource {
        match sequencing_mode {
            SequencingMode::SingleEnd => ReadSource::Single {
                dir: sequencing_dir.to_path_buf(),
                files: Vec::new(),
            },
            SequencingMode::PairedEnd => ReadSource::Paired {
                forward_dir: sequencing_dir.to_path_buf(),
                forward: Vec::new(),
                reverse_dir: mate_dir.unwrap_or(sequencing_dir).to_path_buf(),
                reverse: Vec::new(),
            },
        }
    }
}

/// Flattens a JSON value into `key : value` lines. Nested keys are joined with `.`.
fn flatten(prefix: &str, value: &serde_json::Value, lines: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, inner, lines);
            }
        }
        serde_json::Value::String(s) => lines.push(format!("{prefix} : {s}")),
        serde_json::Value::Null => lines.push(format!("{prefix} : None")),
        other => lines.push(format!("{prefix} : {other}")),
    }
}

/// Writes `cmd_input.txt`, one `key : value` line per resolved field.
pub fn write_snapshot(config: &RunConfiguration) -> Result<PathBuf, TnflowError> {
    let value = serde_json::to_value(config)?;
    let mut lines = Vec::new();
    flatten("", &value, &mut lines);

    let path = config.layout().config_snapshot;
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(&path, body)?;
    debug!(path = %path.display(), fields = lines.len(), "Wrote configuration snapshot");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StrainFixture;
    use pretty_assertions::assert_eq;

    fn params_for(fx: &StrainFixture) -> RunParameters {
        let mut params = fx.parameters();
        params.transposon = Some("AGATGTGTATAAGAGACAG".into());
        params
    }

    #[test]
    fn test_resolve_single_end() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let config = ConfigurationResolver::new().resolve(params_for(&fx)).unwrap();

        assert_eq!(config.strain, "PA14");
        assert_eq!(config.working_dir, fx.output_root().join("PA14"));
        assert_eq!(config.reference, fx.annotation_dir().join("PA14.fasta"));
        assert_eq!(config.annotation_file, fx.annotation_dir().join("PA14.gb"));
        assert_eq!(config.genome_file, config.annotation_file);
        assert_eq!(config.reads.all_files().len(), 1);
        assert!(config.trims_reads());
        assert!(config.infers_essentiality());
        assert!(config.cpus >= 1);
        assert!(config.working_dir.is_dir());
        assert!(!config.layout().config_snapshot.exists());
    }

    #[test]
    fn test_snapshot_lines() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let config = ConfigurationResolver::new().resolve(params_for(&fx)).unwrap();
        write_snapshot(&config).unwrap();

        let snapshot = std::fs::read_to_string(config.layout().config_snapshot).unwrap();
        assert!(snapshot.lines().any(|l| l == "strain : PA14"));
        assert!(snapshot.lines().any(|l| l == "read_threshold : None"));
        assert!(snapshot.lines().any(|l| l == "trimming.transposon : AGATGTGTATAAGAGACAG"));
    }

    #[test]
    fn test_gff_uses_fasta_as_genome() {
        let fx = StrainFixture::new("K12").gff().build().unwrap();
        let mut params = fx.parameters();
        params.annotation_type = Some("gff".into());
        let config = ConfigurationResolver::new().resolve(params).unwrap();

        assert_eq!(config.annotation_file, fx.annotation_dir().join("K12.gff"));
        assert_eq!(config.genome_file, config.reference);
    }

    #[test]
    fn test_missing_required_parameter() {
        let mut params = RunParameters::default();
        params.strain = Some("X".into());
        let err = ConfigurationResolver::new().resolve(params).unwrap_err();

        match err {
            TnflowError::Configuration(e) => {
                assert_eq!(e.code, "CONFIG-MISSING-PARAM");
                assert_eq!(e.field.as_deref(), Some("sequencing_dir"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fraction_out_of_domain() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let mut params = fx.parameters();
        params.pvalue = Some(1.5);
        let err = ConfigurationResolver::new().resolve(params).unwrap_err();
        assert!(err.is_configuration());
        assert!(!fx.output_root().join("PA14").exists());
    }

    #[test]
    fn test_sl5_must_be_below_sl3() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let mut params = fx.parameters();
        params.subdomain_up = Some(0.9);
        params.subdomain_down = Some(0.9);
        assert!(ConfigurationResolver::new().resolve(params).is_err());
    }

    #[test]
    fn test_skip_essentials_ignores_fraction_checks() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let mut params = fx.parameters();
        params.subdomain_up = Some(0.9);
        params.subdomain_down = Some(0.1);
        params.skip_essentials = true;
        let config = ConfigurationResolver::new().resolve(params).unwrap();
        assert!(!config.infers_essentiality());
    }

    #[test]
    fn test_negative_counts_rejected() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let mut params = fx.parameters();
        params.mapq = Some(-1);
        assert!(ConfigurationResolver::new().resolve(params).is_err());

        let mut params = fx.parameters();
        params.cpus = Some(0);
        assert!(ConfigurationResolver::new().resolve(params).is_err());
    }

    #[test]
    fn test_phred_clamped_to_one() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        let mut params = fx.parameters();
        params.phred = Some(0);
        params.barcode = true;
        params.barcode_up_phred = Some(-4);
        let config = ConfigurationResolver::new().resolve(params).unwrap();

        assert_eq!(config.phred, 1);
        assert_eq!(config.barcode.unwrap().up_phred, 1);
    }

    #[test]
    fn test_missing_reference() {
        let fx = StrainFixture::new("PA14").build().unwrap();
        std::fs::remove_file(fx.annotation_dir().join("PA14.fasta")).unwrap();
        let err = ConfigurationResolver::new().resolve(fx.parameters()).unwrap_err();
        match err {
            TnflowError::Configuration(e) => assert_eq!(e.code, "CONFIG-MISSING-FILE"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_reads_only_fatal_in_full_mode() {
        let fx = StrainFixture::new("PA14").without_reads().build().unwrap();
        assert!(ConfigurationResolver::new().resolve(fx.parameters()).is_err());

        let mut params = fx.parameters();
        params.essentials_only = true;
        let config = ConfigurationResolver::new().resolve(params).unwrap();
        assert_eq!(config.mode, RunMode::EssentialsOnly);
    }

    #[test]
    fn test_paired_requires_distinct_mate_dir() {
        let fx = StrainFixture::new("PA14").paired().build().unwrap();
        let mut params = fx.parameters();
        params.sequencing_dir_2 = None;
        assert!(ConfigurationResolver::new().resolve(params).is_err());

        let mut params = fx.parameters();
        params.sequencing_dir_2 = params.sequencing_dir.clone();
        let err = ConfigurationResolver::new().resolve(params).unwrap_err();
        match err {
            TnflowError::Configuration(e) => assert_eq!(e.code, "CONFIG-SAME-MATE-DIR"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_essentials_only_paired_ignores_mate_dir() {
        let fx = StrainFixture::new("PA14").paired().build().unwrap();
        let mut params = fx.parameters();
        params.essentials_only = true;
        params.sequencing_dir_2 = None;
        let config = ConfigurationResolver::new().resolve(params).unwrap();

        assert_eq!(config.mode, RunMode::EssentialsOnly);
        assert_eq!(config.sequencing_mode(), SequencingMode::PairedEnd);
        assert!(config.reads.all_files().is_empty());

        let mut params = fx.parameters();
        params.essentials_only = true;
        params.sequencing_dir_2 = params.sequencing_dir.clone();
        assert!(ConfigurationResolver::new().resolve(params).is_ok());
    }

    #[test]
    fn test_paired_count_mismatch_is_malformed() {
        let fx = StrainFixture::new("PA14").paired().build().unwrap();
        std::fs::write(fx.mate_dir().join("extra_2.fastq"), "@r\nA\n+\nI\n").unwrap();
        let err = ConfigurationResolver::new().resolve(fx.parameters()).unwrap_err();
        assert!(matches!(err, TnflowError::MalformedInput(_)));
    }

    #[test]
    fn test_paired_resolves_both_sets() {
        let fx = StrainFixture::new("PA14").paired().build().unwrap();
        let config = ConfigurationResolver::new().resolve(fx.parameters()).unwrap();
        assert_eq!(config.sequencing_mode(), SequencingMode::PairedEnd);
        match &config.reads {
            ReadSource::Paired { forward, reverse, .. } => {
                assert_eq!(forward.len(), reverse.len());
            }
            ReadSource::Single { .. } => panic!("expected paired reads"),
        }
    }

    #[test]
    fn test_default_cpus_at_least_one() {
        assert!(default_cpus() >= 1);
    }
}
