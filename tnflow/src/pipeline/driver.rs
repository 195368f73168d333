//! The sequential stage driver.

use super::{
    Branch, FailureCollector, FailureRecord, IntermediateCleaner, RunLock, RunReport, StageReport,
};
use crate::config::{write_snapshot, RunConfiguration};
use crate::core::{StageArtifact, StageOutput, StageStatus};
use crate::errors::TnflowError;
use crate::memo::{ArtifactMemoizer, MemoDecision, MemoStrategy};
use crate::observability::SpanTimer;
use crate::process::ProcessInvoker;
use crate::stages::{Stage, StageCatalog, StageDelegate, StageId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Walks a run's stage plan.
///
/// Each stage is awaited before the next starts. Before running, the
/// memoizer decides whether the stage is already complete; after running,
/// outputs are verified before the stage is committed and its consumed
/// intermediates are retired.
pub struct PipelineDriver<'a> {
    config: &'a RunConfiguration,
    invoker: Arc<dyn ProcessInvoker>,
}

impl std::fmt::Debug for PipelineDriver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDriver")
            .field("strain", &self.config.strain)
            .finish_non_exhaustive()
    }
}

impl<'a> PipelineDriver<'a> {
    /// Creates a driver for `config`.
    #[must_use]
    pub fn new(config: &'a RunConfiguration, invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self { config, invoker }
    }

    /// The branch this run walks.
    #[must_use]
    pub fn branch(&self) -> Branch {
        Branch::from_config(self.config)
    }

    /// The stages this run walks, in order.
    pub fn stages(&self) -> Result<Vec<Stage>, TnflowError> {
        let catalog = StageCatalog::new(self.config);
        self.branch()
            .stage_plan()
            .into_iter()
            .map(|id| catalog.stage(id))
            .collect()
    }

    /// Runs the pipeline to its terminal state.
    ///
    /// Tool failures are recorded in the report and only become an error
    /// when the failure mode says the run cannot continue.
    pub async fn run(&self) -> Result<RunReport, TnflowError> {
        let layout = self.config.layout();
        std::fs::create_dir_all(&layout.working_dir)?;

        let branch = self.branch();
        let mut report = RunReport::start(
            &self.config.strain,
            &layout.working_dir,
            branch,
            self.config.memo,
            self.config.failure_mode,
        );
        let run_id = report.run_id.to_string();
        let _lock = RunLock::acquire(&layout.lock, &run_id)?;
        write_snapshot(self.config)?;

        let stages = self.stages()?;
        if branch.is_reentry() {
            if stages.is_empty() {
                info!(strain = %self.config.strain, "Essentials-only run with inference disabled; nothing to do");
            } else if !layout.insertion_table.is_file() {
                return Err(TnflowError::MissingPrerequisite {
                    stage: StageId::InferEssentiality.to_string(),
                    path: layout.insertion_table,
                });
            }
        }

        info!(
            run_id = %run_id,
            strain = %self.config.strain,
            stages = stages.len(),
            memo = %self.config.memo,
            failure_mode = %self.config.failure_mode,
            "Starting pipeline"
        );

        let mut memo = ArtifactMemoizer::open(self.config.memo, &layout.manifest);
        let decisions = plan_decisions(&stages, &memo);
        let cleaner = IntermediateCleaner::new(&layout.working_dir, self.config.keep_intermediates);
        let mut failures = FailureCollector::new(self.config.failure_mode);

        for (stage, decision) in stages.iter().zip(decisions) {
            let name = stage.name();

            if let Some(dep) = failures.blocking_dependency(&stage.depends_on) {
                warn!(stage = name, upstream = %dep, "Skipping stage after upstream failure");
                failures.record_blocked(stage.id);
                report.record(self.stage_report(
                    stage,
                    StageOutput::skip(format!("upstream stage '{dep}' failed")),
                ));
                continue;
            }

            let output = match decision {
                MemoDecision::Complete => {
                    info!(stage = name, "Outputs already complete, skipping");
                    StageOutput::skip("already complete")
                }
                MemoDecision::Run { reason } => {
                    info!(stage = name, kind = %stage.kind(), %reason, "Running stage");
                    memo.invalidate(stage)?;
                    for dir in &stage.prepare_dirs {
                        std::fs::create_dir_all(dir)?;
                    }
                    verify(stage, self.execute(stage).await)
                }
            };

            if output.is_success() {
                if output.status == StageStatus::Ok {
                    memo.commit(stage, &run_id)?;
                    info!(stage = name, duration_ms = output.duration_ms, "Stage completed");
                }
                failures.record_completion(stage.id);
                for path in cleaner.retire(&stage.retires) {
                    memo.retire(&path)?;
                    report.retired.push(path);
                }
                report.record(self.stage_report(stage, output));
                continue;
            }

            let error_text = output.error.clone().unwrap_or_default();
            let record = failures.record_failure(
                FailureRecord::new(stage.id, &error_text).with_exit_code(output.exit_code),
            );
            if record.recoverable {
                warn!(stage = name, error = %error_text, "Stage failed; continuing");
            } else {
                error!(stage = name, error = %error_text, "Stage failed; aborting run");
            }
            report.record(self.stage_report(stage, output));

            if failures.should_stop() {
                report.aborted = Some(format!("stage '{name}' failed"));
                report.finish(failures.summary(stages.len()));
                report.save(&layout.report)?;
                return Err(TnflowError::StageAborted {
                    stage: name.to_string(),
                    reason: error_text,
                });
            }
        }

        report.finish(failures.summary(stages.len()));
        report.save(&layout.report)?;
        info!(
            run_id = %run_id,
            failed = report.stages_with(StageStatus::Fail).len(),
            retired = report.retired.len(),
            "Pipeline finished"
        );
        Ok(report)
    }

    async fn execute(&self, stage: &Stage) -> StageOutput {
        match &stage.delegate {
            StageDelegate::External(inv) | StageDelegate::Collaborator(inv) => {
                let result = self.invoker.run(inv).await;
                let output = if result.success() {
                    StageOutput::ok()
                } else {
                    StageOutput::fail(result.failure_summary())
                };
                output
                    .with_exit_code(result.exit_code)
                    .with_duration_ms(result.duration_ms)
            }
            StageDelegate::Builtin(task) => {
                let timer = SpanTimer::start(stage.name());
                match task.run().await {
                    Ok(bytes) => {
                        debug!(stage = stage.name(), bytes, "Builtin task finished");
                        StageOutput::ok().with_duration_ms(timer.finish())
                    }
                    Err(err) => StageOutput::fail(format!("{} failed: {err}", stage.name()))
                        .with_duration_ms(timer.finish()),
                }
            }
        }
    }

    fn stage_report(&self, stage: &Stage, output: StageOutput) -> StageReport {
        StageReport {
            stage: stage.id,
            kind: stage.kind(),
            output,
            command_line: stage.delegate.invocation().map(|inv| inv.command_line()),
        }
    }
}

/// A zero exit status is not enough: every declared output must exist.
fn verify(stage: &Stage, output: StageOutput) -> StageOutput {
    if !output.is_success() {
        return output;
    }
    let missing: Vec<String> = stage
        .missing_outputs()
        .iter()
        .map(|a| a.path.display().to_string())
        .collect();
    if missing.is_empty() {
        return output;
    }
    let duration = output.duration_ms;
    StageOutput::fail(format!(
        "{} exited successfully but did not produce {}",
        stage.name(),
        missing.join(", ")
    ))
    .with_exit_code(output.exit_code)
    .with_duration_ms(duration)
}

fn produces(stage: &Stage, artifact: &StageArtifact) -> bool {
    stage.outputs.iter().any(|o| o.path == artifact.path)
}

fn consumes(stage: &Stage, producer: &Stage) -> bool {
    stage.inputs.iter().any(|input| produces(producer, input))
}

fn force(decision: &mut MemoDecision, reason: String) -> bool {
    if decision.must_run() {
        return false;
    }
    *decision = MemoDecision::Run { reason };
    true
}

/// Memo decisions for every stage of a plan.
///
/// Per-stage checks are adjusted in three ways:
/// - under existence-only memoization, a stage whose intermediates were
///   retired counts as complete while every consumer is complete;
/// - a producer runs again when a consumer that must run needs a retired
///   intermediate back;
/// - under the manifest strategy, every dependent of a stage that runs is
///   run again, since its inputs are about to change.
fn plan_decisions(stages: &[Stage], memo: &ArtifactMemoizer) -> Vec<MemoDecision> {
    let mut decisions: Vec<MemoDecision> = stages.iter().map(|s| memo.check(s)).collect();

    if memo.strategy() == MemoStrategy::ExistenceOnly {
        keep_consumed_intermediates(stages, &mut decisions);
    }
    loop {
        let mut changed = regenerate_retired_inputs(stages, &mut decisions);
        if memo.strategy() == MemoStrategy::Manifest {
            changed |= propagate_reruns(stages, &mut decisions);
        }
        if !changed {
            return decisions;
        }
    }
}

fn keep_consumed_intermediates(stages: &[Stage], decisions: &mut [MemoDecision]) {
    for j in (0..stages.len()).rev() {
        let producer = &stages[j];
        let retired = !producer.outputs.is_empty()
            && producer
                .outputs
                .iter()
                .all(|o| o.is_intermediate() && !o.is_present());
        if !retired || !decisions[j].must_run() {
            continue;
        }
        let mut consumers = (j + 1..stages.len()).filter(|&i| consumes(&stages[i], producer));
        let mut any = false;
        let all_complete = consumers.all(|i| {
            any = true;
            !decisions[i].must_run()
        });
        if any && all_complete {
            debug!(stage = producer.name(), "Intermediates already consumed");
            decisions[j] = MemoDecision::Complete;
        }
    }
}

fn regenerate_retired_inputs(stages: &[Stage], decisions: &mut [MemoDecision]) -> bool {
    let mut changed = false;
    for i in (0..stages.len()).rev() {
        if !decisions[i].must_run() {
            continue;
        }
        for input in stages[i]
            .inputs
            .iter()
            .filter(|a| a.is_intermediate() && !a.is_present())
        {
            for j in (0..i).filter(|&j| produces(&stages[j], input)) {
                changed |= force(
                    &mut decisions[j],
                    format!(
                        "{} was retired and '{}' needs it again",
                        input.path.display(),
                        stages[i].name()
                    ),
                );
            }
        }
    }
    changed
}

fn propagate_reruns(stages: &[Stage], decisions: &mut [MemoDecision]) -> bool {
    let mut changed = false;
    for j in 0..stages.len() {
        if !decisions[j].must_run() {
            continue;
        }
        for i in j + 1..stages.len() {
            if stages[i].depends_on.contains(&stages[j].id) {
                changed |= force(
                    &mut decisions[i],
                    format!("upstream stage '{}' runs again", stages[j].name()),
                );
            }
        }
    }
    changed
}
