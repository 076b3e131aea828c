//! Error types for deltaflow.
//!
//! Every failure the orchestration core can report belongs to one
//! [`ErrorCategory`]. Stages turn these errors into `ERROR` stage messages;
//! the pipeline engine is the only place that also converts unexpected
//! faults (a stage returning `Err` or panicking) into the same shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Broad class of a failure, used to decide how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A required tool is missing or the project root is unusable.
    Environment,
    /// Malformed descriptor, malformed cache record, or an unowned file.
    InputParse,
    /// One or more modules failed to compile.
    Compilation,
    /// Packaging, pushing or restarting failed.
    Deployment,
    /// A stage misbehaved or the configuration is unusable.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::InputParse => write!(f, "input"),
            Self::Compilation => write!(f, "compilation"),
            Self::Deployment => write!(f, "deployment"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// The main error type for deltaflow operations.
#[derive(Debug, Error)]
pub enum DeltaflowError {
    /// A required external tool could not be found or started.
    #[error("Required tool is not available: {tool}")]
    ToolMissing {
        /// Program name or path.
        tool: String,
    },

    /// The project root is not a version-controlled working tree.
    #[error("Not a git repository: {}", path.display())]
    NotARepository {
        /// The project root that was probed.
        path: PathBuf,
    },

    /// The project root does not exist or is not a directory.
    #[error("Project base directory doesn't exist: {}", path.display())]
    InvalidProjectRoot {
        /// The offending path.
        path: PathBuf,
    },

    /// A module descriptor could not be parsed.
    #[error("{0}")]
    DescriptorParse(#[from] DescriptorParseError),

    /// The module cache contains a malformed record.
    #[error("{0}")]
    CacheParse(#[from] CacheParseError),

    /// A supported changed file lies outside every module's source root.
    #[error("Can't find module for source file: {}", path.display())]
    UnownedFile {
        /// The changed file.
        path: PathBuf,
    },

    /// One or more modules failed to compile.
    #[error("Compilation failed for {} module(s): {}", failures.len(), failures.join("; "))]
    Compilation {
        /// One description per failed module.
        failures: Vec<String>,
    },

    /// The artifact cleanup pass could not account for every entry.
    #[error("Artifact cleanup failed: {}", problems.join("; "))]
    Cleanup {
        /// One entry per unaccounted artifact.
        problems: Vec<String>,
    },

    /// Packaging, push or restart failed.
    #[error("Deployment failed: {0}")]
    Deployment(String),

    /// A stage returned an error or panicked.
    #[error("Stage '{stage}' faulted: {message}")]
    StageFault {
        /// The stage label.
        stage: String,
        /// What went wrong.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeltaflowError {
    /// Creates a tool missing error.
    #[must_use]
    pub fn tool_missing(tool: impl Into<String>) -> Self {
        Self::ToolMissing { tool: tool.into() }
    }

    /// Creates a deployment error.
    #[must_use]
    pub fn deployment(message: impl Into<String>) -> Self {
        Self::Deployment(message.into())
    }

    /// Creates a stage fault error.
    #[must_use]
    pub fn stage_fault(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFault {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns the category this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ToolMissing { .. } | Self::NotARepository { .. } | Self::InvalidProjectRoot { .. } => {
                ErrorCategory::Environment
            }
            Self::DescriptorParse(_) | Self::CacheParse(_) | Self::UnownedFile { .. } => {
                ErrorCategory::InputParse
            }
            Self::Compilation { .. } | Self::Cleanup { .. } => ErrorCategory::Compilation,
            Self::Deployment(_) => ErrorCategory::Deployment,
            Self::StageFault { .. } | Self::Config(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }
}

/// Error raised when a module descriptor cannot be parsed.
#[derive(Debug, Clone, Error)]
#[error("Failed to parse module descriptor {}: {message}", path.display())]
pub struct DescriptorParseError {
    /// The descriptor file.
    pub path: PathBuf,
    /// What was wrong with it.
    pub message: String,
}

impl DescriptorParseError {
    /// Creates a new descriptor parse error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a module cache record is malformed.
#[derive(Debug, Clone, Error)]
#[error("Malformed module cache record at {}:{line}: '{record}'", path.display())]
pub struct CacheParseError {
    /// The cache file.
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// The offending record.
    pub record: String,
}

impl CacheParseError {
    /// Creates a new cache parse error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, line: usize, record: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            record: record.into(),
        }
    }
}
