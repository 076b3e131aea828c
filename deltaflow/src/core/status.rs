//! Execution status and per-module build state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The tri-state status carried by every stage message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The stage completed and produced its payload.
    Success,
    /// Benign early exit, e.g. nothing changed since the last build.
    Terminated,
    /// Hard, fatal failure.
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Terminated => write!(f, "TERMINATED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl ExecutionStatus {
    /// Returns true if the pipeline must stop after this status.
    #[must_use]
    pub fn halts(&self) -> bool {
        matches!(self, Self::Terminated | Self::Error)
    }

    /// Returns true if the status is a failure. Termination is not.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Lifecycle of one module inside the build scheduler.
///
/// `Pending -> Compiling -> {Compiled, Failed}`. There are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Dispatched, waiting for a worker.
    #[default]
    Pending,
    /// A worker is running the module's compile pipeline.
    Compiling,
    /// Every compiler invocation succeeded.
    Compiled,
    /// The compile pipeline stopped with an error.
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Compiling => write!(f, "compiling"),
            Self::Compiled => write!(f, "compiled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl ModuleState {
    /// Returns true if the state is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Compiled | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_display() {
        assert_eq!(ExecutionStatus::Success.to_string(), "SUCCESS");
        assert_eq!(ExecutionStatus::Terminated.to_string(), "TERMINATED");
        assert_eq!(ExecutionStatus::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_execution_status_halts() {
        assert!(!ExecutionStatus::Success.halts());
        assert!(ExecutionStatus::Terminated.halts());
        assert!(ExecutionStatus::Error.halts());
        assert!(!ExecutionStatus::Terminated.is_failure());
    }

    #[test]
    fn test_module_state_is_terminal() {
        assert!(!ModuleState::Pending.is_terminal());
        assert!(!ModuleState::Compiling.is_terminal());
        assert!(ModuleState::Compiled.is_terminal());
        assert!(ModuleState::Failed.is_terminal());
    }

    #[test]
    fn test_execution_status_serialize() {
        let json = serde_json::to_string(&ExecutionStatus::Terminated).unwrap();
        assert_eq!(json, r#""TERMINATED""#);

        let status: ExecutionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, ExecutionStatus::Terminated);
    }
}
