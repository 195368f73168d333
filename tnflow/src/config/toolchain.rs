//! External program commands.

use crate::process::ToolInvocation;
use serde::{Deserialize, Serialize};

/// A program plus any leading arguments, e.g. `python3 -m tnseeker.reads_trimer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the stage's own arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefix_args: Vec<String>,
}

impl ToolCommand {
    /// A bare program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Parses a whitespace-separated command prefix. Returns `None` for blank input.
    #[must_use]
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            prefix_args: parts.collect(),
        })
    }

    /// Starts an invocation of this command.
    #[must_use]
    pub fn invocation(&self, label: impl Into<String>) -> ToolInvocation {
        ToolInvocation::new(label, &self.program).args(self.prefix_args.iter().cloned())
    }
}

/// The programs a run may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Read aligner.
    pub bowtie2: ToolCommand,
    /// Index builder.
    pub bowtie2_build: ToolCommand,
    /// Only used by the self-test preflight.
    pub tblastn: ToolCommand,
    /// Transposon read trimmer.
    pub trimmer: ToolCommand,
    /// Alignment-to-insertion-table parser.
    pub parser: ToolCommand,
    /// Essential gene inference engine.
    pub essentials: ToolCommand,
    /// Insertion plot renderer.
    pub plotter: ToolCommand,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            bowtie2: ToolCommand::new("bowtie2"),
            bowtie2_build: ToolCommand::new("bowtie2-build"),
            tblastn: ToolCommand::new("tblastn"),
            trimmer: ToolCommand::new("tnseeker-reads-trimmer"),
            parser: ToolCommand::new("tnseeker-sam-to-insertions"),
            essentials: ToolCommand::new("tnseeker-essential-finder"),
            plotter: ToolCommand::new("tnseeker-insertions-plotter"),
        }
    }
}

impl Toolchain {
    /// Defaults overridden by `TNFLOW_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `TNFLOW_*` key.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut chain = Self::default();
        let slots: [(&str, &mut ToolCommand); 7] = [
            ("TNFLOW_BOWTIE2", &mut chain.bowtie2),
            ("TNFLOW_BOWTIE2_BUILD", &mut chain.bowtie2_build),
            ("TNFLOW_TBLASTN", &mut chain.tblastn),
            ("TNFLOW_TRIMMER", &mut chain.trimmer),
            ("TNFLOW_PARSER", &mut chain.parser),
            ("TNFLOW_ESSENTIALS", &mut chain.essentials),
            ("TNFLOW_PLOTTER", &mut chain.plotter),
        ];
        for (key, slot) in slots {
            if let Some(command) = lookup(key).as_deref().and_then(ToolCommand::parse) {
                *slot = command;
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_prefix() {
        let cmd = ToolCommand::parse("python3 -m tnseeker.reads_trimer").unwrap();
        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.prefix_args, vec!["-m", "tnseeker.reads_trimer"]);
        assert!(ToolCommand::parse("   ").is_none());
    }

    #[test]
    fn test_invocation_keeps_prefix_first() {
        let cmd = ToolCommand::parse("python3 -m plotter").unwrap();
        let inv = cmd.invocation("plot").arg("/work/X");
        assert_eq!(inv.command_line(), "python3 -m plotter /work/X");
        assert_eq!(inv.label, "plot");
    }

    #[test]
    fn test_env_overrides() {
        let chain = Toolchain::from_lookup(|key| match key {
            "TNFLOW_BOWTIE2" => Some("/opt/bt2/bowtie2".to_string()),
            "TNFLOW_PARSER" => Some("python3 -m tnseeker.sam_to_insertions".to_string()),
            "TNFLOW_PLOTTER" => Some(String::new()),
            _ => None,
        });

        assert_eq!(chain.bowtie2.program, "/opt/bt2/bowtie2");
        assert_eq!(chain.parser.prefix_args, vec!["-m", "tnseeker.sam_to_insertions"]);
        assert_eq!(chain.plotter, Toolchain::default().plotter);
        assert_eq!(chain.bowtie2_build.program, "bowtie2-build");
    }
}
