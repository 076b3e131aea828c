//! Typed stage message.

use super::ExecutionStatus;
use crate::errors::DeltaflowError;

/// The result of running one stage.
///
/// Only a successful message carries a payload, so a stage cannot claim
/// success without handing the next stage its input. The payload type is
/// the next stage's input type; the pipeline builder enforces that at
/// compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageMessage<T> {
    /// The stage completed.
    Success {
        /// Input for the next stage.
        payload: T,
        /// Optional human-readable note.
        description: Option<String>,
    },
    /// Benign early exit.
    Terminated {
        /// Why the run stopped.
        description: Option<String>,
    },
    /// Hard failure.
    Error {
        /// What failed.
        description: Option<String>,
    },
}

impl<T> StageMessage<T> {
    /// Creates a successful message.
    #[must_use]
    pub fn success(payload: T) -> Self {
        Self::Success {
            payload,
            description: None,
        }
    }

    /// Creates a successful message with a description.
    #[must_use]
    pub fn success_with(payload: T, description: impl Into<String>) -> Self {
        Self::Success {
            payload,
            description: Some(description.into()),
        }
    }

    /// Creates a terminated message.
    #[must_use]
    pub fn terminated(description: impl Into<String>) -> Self {
        Self::Terminated {
            description: Some(description.into()),
        }
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(description: impl Into<String>) -> Self {
        Self::Error {
            description: Some(description.into()),
        }
    }

    /// Returns the status of the message.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Success { .. } => ExecutionStatus::Success,
            Self::Terminated { .. } => ExecutionStatus::Terminated,
            Self::Error { .. } => ExecutionStatus::Error,
        }
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Success { description, .. }
            | Self::Terminated { description }
            | Self::Error { description } => description.as_deref(),
        }
    }

    /// Returns the payload of a successful message.
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Consumes the message and returns its payload.
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Transforms the payload, keeping status and description.
    pub fn map<U, F>(self, f: F) -> StageMessage<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success {
                payload,
                description,
            } => StageMessage::Success {
                payload: f(payload),
                description,
            },
            Self::Terminated { description } => StageMessage::Terminated { description },
            Self::Error { description } => StageMessage::Error { description },
        }
    }

    /// Returns true if the message is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl<T> From<DeltaflowError> for StageMessage<T> {
    fn from(err: DeltaflowError) -> Self {
        Self::error(err.to_string())
    }
}
