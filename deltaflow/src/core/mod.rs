//! Core domain model types for deltaflow.
//!
//! This module contains the data shared by every component:
//! - Execution status and module build state enums
//! - The typed stage message
//! - Modules, change sets and the build artifact layout
//! - Per-module build outcomes

mod change_set;
mod layout;
mod message;
mod module;
mod outcome;
mod status;

pub use change_set::{ChangeSet, ChangeSetBuilder, SourceKind};
pub use layout::BuildLayout;
pub use message::StageMessage;
pub use module::Module;
pub use outcome::{BuildReport, ModuleBuildOutcome};
pub use status::{ExecutionStatus, ModuleState};
