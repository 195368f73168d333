//! Which stages a run executes.

use crate::config::{RunConfiguration, RunMode, SequencingMode};
use crate::stages::StageId;
use serde::Serialize;

/// The run's branch, resolved once from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "branch", rename_all = "snake_case")]
pub enum Branch {
    /// Index, prepare reads, align, parse, plot.
    Full {
        /// Single- or paired-end.
        sequencing: SequencingMode,
        /// Transposon trimming enabled.
        trim: bool,
        /// Essentiality inference appended.
        infer: bool,
    },
    /// Re-entry at essentiality inference.
    EssentialsOnly {
        /// Essentiality inference enabled.
        infer: bool,
    },
}

impl Branch {
    /// Resolves the branch of `config`.
    #[must_use]
    pub fn from_config(config: &RunConfiguration) -> Self {
        let infer = config.infers_essentiality();
        match config.mode {
            RunMode::Full => Self::Full {
                sequencing: config.sequencing_mode(),
                trim: config.trims_reads(),
                infer,
            },
            RunMode::EssentialsOnly => Self::EssentialsOnly { infer },
        }
    }

    /// The stages to walk, in order.
    #[must_use]
    pub fn stage_plan(&self) -> Vec<StageId> {
        let (mut plan, infer) = match *self {
            Self::Full {
                sequencing,
                trim,
                infer,
            } => {
                let mut plan = vec![StageId::BuildIndex];
                match (sequencing, trim) {
                    (_, true) => plan.push(StageId::TrimReads),
                    (SequencingMode::SingleEnd, false) => plan.push(StageId::CompileRawReads),
                    (SequencingMode::PairedEnd, false) => {}
                }
                plan.extend([StageId::Align, StageId::ParseInsertions, StageId::Plot]);
                (plan, infer)
            }
            Self::EssentialsOnly { infer } => (Vec::new(), infer),
        };
        if infer {
            plan.push(StageId::InferEssentiality);
        }
        plan
    }

    /// Returns true for the essentials-only re-entry branch.
    #[must_use]
    pub fn is_reentry(&self) -> bool {
        matches!(self, Self::EssentialsOnly { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use StageId::*;

    fn full(sequencing: SequencingMode, trim: bool, infer: bool) -> Branch {
        Branch::Full {
            sequencing,
            trim,
            infer,
        }
    }

    #[test]
    fn test_single_trimmed() {
        assert_eq!(
            full(SequencingMode::SingleEnd, true, false).stage_plan(),
            vec![BuildIndex, TrimReads, Align, ParseInsertions, Plot]
        );
    }

    #[test]
    fn test_single_untrimmed_compiles() {
        assert_eq!(
            full(SequencingMode::SingleEnd, false, true).stage_plan(),
            vec![BuildIndex, CompileRawReads, Align, ParseInsertions, Plot, InferEssentiality]
        );
    }

    #[test]
    fn test_paired_trimmed() {
        assert_eq!(
            full(SequencingMode::PairedEnd, true, false).stage_plan(),
            vec![BuildIndex, TrimReads, Align, ParseInsertions, Plot]
        );
    }

    #[test]
    fn test_paired_untrimmed_aligns_raw() {
        assert_eq!(
            full(SequencingMode::PairedEnd, false, false).stage_plan(),
            vec![BuildIndex, Align, ParseInsertions, Plot]
        );
    }

    #[test]
    fn test_essentials_only() {
        assert_eq!(
            Branch::EssentialsOnly { infer: true }.stage_plan(),
            vec![InferEssentiality]
        );
        assert!(Branch::EssentialsOnly { infer: false }.stage_plan().is_empty());
        assert!(Branch::EssentialsOnly { infer: false }.is_reentry());
    }
}
