//! Command-line interface.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tnflow::config::{ConfigurationResolver, RunParameters, Toolchain};
use tnflow::errors::TnflowError;
use tnflow::memo::MemoStrategy;
use tnflow::pipeline::{FailureMode, PipelineDriver};
use tnflow::process::SystemInvoker;
use tnflow::selftest::{default_fixture_dir, SelfTestHarness};
use tracing::{error, info, warn};

/// Exit status for a run stopped by Ctrl-C.
const INTERRUPTED: u8 = 130;

/// Exit status for a run rejected before any stage started.
const CONFIGURATION_FAILED: u8 = 2;

/// Tn-Seq pipeline: index, trim, align, call insertions, plot and infer
/// essential genes for one strain.
#[derive(Debug, Parser)]
#[command(name = "tnflow", version, about, allow_negative_numbers = true)]
pub struct Cli {
    /// Strain name; reference and annotation files must contain it.
    #[arg(short = 's', long = "strain", value_name = "STRAIN")]
    pub strain: Option<String>,

    /// Directory with the sequencing reads.
    #[arg(long = "sd", value_name = "DIR")]
    pub sequencing_dir: Option<PathBuf>,

    /// Directory with the reverse mates for paired-end runs.
    #[arg(long = "sd2", value_name = "DIR")]
    pub sequencing_dir_2: Option<PathBuf>,

    /// Directory with the reference FASTA and the annotation.
    #[arg(long = "ad", value_name = "DIR")]
    pub annotation_dir: Option<PathBuf>,

    /// Annotation type: gb or gff.
    #[arg(long = "at", value_name = "TYPE")]
    pub annotation_type: Option<String>,

    /// Sequencing type: SE or PE.
    #[arg(long = "st", value_name = "TYPE")]
    pub sequencing_type: Option<String>,

    /// Transposon border sequence; enables read trimming.
    #[arg(long = "tn", value_name = "SEQ")]
    pub transposon: Option<String>,

    /// Mismatches allowed in the transposon border.
    #[arg(long = "m", value_name = "N")]
    pub tn_mismatches: Option<i64>,

    /// Bases kept after the transposon border.
    #[arg(long = "t", value_name = "N")]
    pub trim_after_tn: Option<i64>,

    /// Extract barcodes.
    #[arg(long = "b")]
    pub barcode: bool,

    /// Upstream barcode flanking sequence.
    #[arg(long = "b1", value_name = "SEQ")]
    pub barcode_up: Option<String>,

    /// Downstream barcode flanking sequence.
    #[arg(long = "b2", value_name = "SEQ")]
    pub barcode_down: Option<String>,

    /// Mismatches allowed in the upstream barcode flank.
    #[arg(long = "b1m", value_name = "N")]
    pub barcode_up_mismatches: Option<i64>,

    /// Mismatches allowed in the downstream barcode flank.
    #[arg(long = "b2m", value_name = "N")]
    pub barcode_down_mismatches: Option<i64>,

    /// Phred threshold for the upstream barcode flank.
    #[arg(long = "b1p", value_name = "N")]
    pub barcode_up_phred: Option<i64>,

    /// Phred threshold for the downstream barcode flank.
    #[arg(long = "b2p", value_name = "N")]
    pub barcode_down_phred: Option<i64>,

    /// Minimum reads per insertion site.
    #[arg(long = "rt", value_name = "N")]
    pub read_threshold: Option<i64>,

    /// P-value threshold for essentiality calls.
    #[arg(long = "pv", value_name = "P")]
    pub pvalue: Option<f64>,

    /// Fraction of each gene ignored at the 5' end.
    #[arg(long = "sl5", value_name = "FRACTION")]
    pub subdomain_up: Option<f64>,

    /// Fraction of each gene where the 3' trim starts.
    #[arg(long = "sl3", value_name = "FRACTION")]
    pub subdomain_down: Option<f64>,

    /// Domain uncertainty threshold.
    #[arg(long = "dut", value_name = "FRACTION")]
    pub domain_uncertain_threshold: Option<f64>,

    /// Intergenic region size cutoff.
    #[arg(long = "ig", value_name = "N")]
    pub intergenic_size_cutoff: Option<i64>,

    /// Minimum mapping quality.
    #[arg(long = "mq", value_name = "N")]
    pub mapq: Option<i64>,

    /// Minimum read base quality.
    #[arg(long = "ph", value_name = "N")]
    pub phred: Option<i64>,

    /// Keep intermediate files.
    #[arg(long = "k")]
    pub keep_intermediates: bool,

    /// Only run essentiality inference on an existing insertion table.
    #[arg(long = "e")]
    pub essentials_only: bool,

    /// Skip essentiality inference.
    #[arg(long = "ne")]
    pub skip_essentials: bool,

    /// Threads handed to each tool.
    #[arg(long = "cpu", value_name = "N")]
    pub cpus: Option<i64>,

    /// Run the deployment self-test and exit.
    #[arg(long = "tst")]
    pub self_test: bool,

    /// Parent of the per-strain working directory.
    #[arg(long = "output-root", value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// How completed stages are recognised: existence or manifest.
    #[arg(long = "memo", value_name = "STRATEGY", default_value = "manifest")]
    pub memo: MemoStrategy,

    /// What a failing tool does to the run: best-effort, skip-dependents or fail-fast.
    #[arg(long = "on-tool-failure", value_name = "MODE", default_value = "best-effort")]
    pub failure_mode: FailureMode,

    /// Fixture data for the self-test.
    #[arg(long = "fixture-dir", value_name = "DIR")]
    pub fixture_dir: Option<PathBuf>,
}

impl Cli {
    /// Raw run parameters from the parsed flags.
    pub fn parameters(&self, toolchain: Toolchain) -> RunParameters {
        RunParameters {
            strain: self.strain.clone(),
            sequencing_dir: self.sequencing_dir.clone(),
            sequencing_dir_2: self.sequencing_dir_2.clone(),
            annotation_dir: self.annotation_dir.clone(),
            annotation_type: self.annotation_type.clone(),
            sequencing_type: self.sequencing_type.clone(),
            transposon: self.transposon.clone(),
            tn_mismatches: self.tn_mismatches,
            trim_after_tn: self.trim_after_tn,
            barcode: self.barcode,
            barcode_up: self.barcode_up.clone(),
            barcode_down: self.barcode_down.clone(),
            barcode_up_mismatches: self.barcode_up_mismatches,
            barcode_down_mismatches: self.barcode_down_mismatches,
            barcode_up_phred: self.barcode_up_phred,
            barcode_down_phred: self.barcode_down_phred,
            read_threshold: self.read_threshold,
            pvalue: self.pvalue,
            subdomain_up: self.subdomain_up,
            subdomain_down: self.subdomain_down,
            domain_uncertain_threshold: self.domain_uncertain_threshold,
            intergenic_size_cutoff: self.intergenic_size_cutoff,
            mapq: self.mapq,
            phred: self.phred,
            keep_intermediates: self.keep_intermediates,
            essentials_only: self.essentials_only,
            skip_essentials: self.skip_essentials,
            cpus: self.cpus,
            output_root: self.output_root.clone(),
            memo: self.memo,
            failure_mode: self.failure_mode,
            toolchain,
        }
    }
}

/// Runs whatever the flags ask for.
pub async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let toolchain = Toolchain::from_env();
    if cli.self_test {
        return self_test(&cli, toolchain).await;
    }

    let config = match ConfigurationResolver::new().resolve(cli.parameters(toolchain)) {
        Ok(config) => config,
        Err(TnflowError::Configuration(err)) => {
            error!(code = err.code, field = ?err.field, "{err}");
            if let Some(hint) = &err.fix_hint {
                eprintln!("hint: {hint}");
            }
            return Ok(ExitCode::from(CONFIGURATION_FAILED));
        }
        Err(err) if err.is_configuration() => {
            error!("{err}");
            return Ok(ExitCode::from(CONFIGURATION_FAILED));
        }
        Err(err) => return Err(err).context("Could not resolve the run configuration"),
    };

    let driver = PipelineDriver::new(&config, Arc::new(SystemInvoker::new()));
    let outcome = tokio::select! {
        outcome = driver.run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!(strain = %config.strain, "Interrupted; the running stage was not committed");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };

    match outcome {
        Ok(report) => {
            if report.has_failures() {
                let failed = report.stages_with(tnflow::core::StageStatus::Fail);
                warn!(strain = %config.strain, ?failed, "Run finished with failed stages");
            } else {
                info!(strain = %config.strain, "Run complete");
            }
            println!("{}", config.layout().report.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ (TnflowError::StageAborted { .. }
        | TnflowError::MissingPrerequisite { .. }
        | TnflowError::RunInProgress { .. })) => {
            error!("{err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).context("Pipeline run failed"),
    }
}

async fn self_test(cli: &Cli, toolchain: Toolchain) -> anyhow::Result<ExitCode> {
    let executable = std::env::current_exe().context("Could not locate the tnflow executable")?;
    let mut harness = SelfTestHarness::new(Arc::new(SystemInvoker::new()), toolchain, executable)
        .with_fixture_dir(cli.fixture_dir.clone().unwrap_or_else(default_fixture_dir));
    if let Some(root) = &cli.output_root {
        harness = harness.with_output_root(root);
    }

    let report = harness.run().await.context("Self-test could not start")?;
    for check in &report.preflight {
        if check.passed {
            println!("ok     {}", check.tool);
        } else {
            println!("FATAL  {}: {}", check.tool, check.detail.as_deref().unwrap_or(""));
        }
    }
    match &report.pipeline {
        Some(run) if run.success() => println!("ok     fixture pipeline"),
        Some(run) => {
            println!("FAILED fixture pipeline: {}", run.failure_summary());
            eprintln!("{}", run.output);
        }
        None => println!("SKIPPED fixture pipeline"),
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tnflow").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_map_to_parameters() {
        let cli = parse(&[
            "-s", "PA14", "--sd", "reads", "--ad", "ref", "--at", "gb", "--st", "SE", "--tn",
            "ACGT", "--m", "1", "--sl5", "0.1", "--sl3", "0.9", "--k", "--memo", "existence",
            "--on-tool-failure", "skip-dependents",
        ]);
        let params = cli.parameters(Toolchain::default());

        assert_eq!(params.strain.as_deref(), Some("PA14"));
        assert_eq!(params.transposon.as_deref(), Some("ACGT"));
        assert_eq!(params.tn_mismatches, Some(1));
        assert_eq!(params.subdomain_up, Some(0.1));
        assert!(params.keep_intermediates);
        assert_eq!(params.memo, MemoStrategy::ExistenceOnly);
        assert_eq!(params.failure_mode, FailureMode::SkipDependents);
        assert!(!params.is_incomplete());
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--tst"]);
        assert!(cli.self_test);
        assert_eq!(cli.memo, MemoStrategy::Manifest);
        assert_eq!(cli.failure_mode, FailureMode::BestEffort);
        assert!(cli.parameters(Toolchain::default()).is_incomplete());
    }

    #[test]
    fn test_negative_values_reach_the_resolver() {
        let cli = parse(&["--mq", "-1"]);
        assert_eq!(cli.mapq, Some(-1));
    }
}
