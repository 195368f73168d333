//! Run configuration: raw parameters, discovery and the resolved configuration.

pub mod discovery;
mod layout;
mod params;
mod resolver;
mod run_config;
mod toolchain;

pub use layout::ArtifactLayout;
pub use params::{
    RunParameters, DEFAULT_DOMAIN_UNCERTAIN_THRESHOLD, DEFAULT_PVALUE, DEFAULT_SUBDOMAIN_DOWN,
    DEFAULT_SUBDOMAIN_UP,
};
pub use resolver::{default_cpus, write_snapshot, ConfigurationResolver};
pub use run_config::{
    AnnotationType, BarcodeSettings, EssentialityParams, ReadSource, RunConfiguration, RunMode,
    SequencingMode, TrimSettings,
};
pub use toolchain::{ToolCommand, Toolchain};
