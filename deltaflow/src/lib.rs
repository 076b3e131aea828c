//! # Deltaflow
//!
//! Incremental build orchestration for hot-swapping code into a running
//! Android application.
//!
//! A run finds the modules of a project, asks version control which sources
//! changed, compiles only the owning modules and pushes the result to the
//! device:
//!
//! - **Topology**: module discovery from `.iml` descriptors, with a cache
//! - **Change detection**: modified and untracked sources grouped by module
//! - **Stage pipelines**: typed, sequential stages with tri-state results
//! - **Scheduling**: per-module compile pipelines on a bounded worker pool
//! - **Process gateway**: every external tool behind one trait
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deltaflow::prelude::*;
//!
//! init_tracing(tracing::Level::INFO);
//! let config = DeltaflowConfig::new("/work/app")
//!     .with_android_sdk("/opt/android-sdk")
//!     .with_application("com.example", ".MainActivity");
//!
//! let report = RunReport::new();
//! let outcome = IncrementalRun::new(config)?.execute(&report).await;
//! report.flush(&TracingReportSink);
//! std::process::exit(outcome.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod changes;
pub mod config;
pub mod core;
pub mod deploy;
pub mod errors;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod run;
pub mod scheduler;
pub mod stages;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod topology;
pub mod vcs;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::changes::{ChangeSetDetector, Detection, DetectChangesStage};
    pub use crate::config::{DeltaflowConfig, ToolCommand, ToolchainConfig};
    pub use crate::core::{
        BuildLayout, BuildReport, ChangeSet, ExecutionStatus, Module, ModuleBuildOutcome,
        ModuleState, SourceKind, StageMessage,
    };
    pub use crate::errors::{DeltaflowError, ErrorCategory};
    pub use crate::pipeline::{Pipeline, PipelineResult};
    pub use crate::process::{Invocation, ProcessGateway, ProcessOutput, SystemProcessGateway};
    pub use crate::report::{init_tracing, CollectingReportSink, ReportSink, RunReport, TracingReportSink};
    pub use crate::run::{IncrementalRun, RunOutcome};
    pub use crate::scheduler::{BuildScheduler, CompileModulesStage};
    pub use crate::stages::{FnStage, Stage, StagePurpose};
    pub use crate::topology::{ModuleCache, ResolveModulesStage, TopologyResolver};
    pub use crate::vcs::{GitCli, VersionControl};
}
