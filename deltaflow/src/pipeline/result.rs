use crate::core::{ExecutionStatus, StageMessage};
use crate::stages::StagePurpose;
use std::time::Duration;

/// The stage a pipeline stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedStage {
    /// Zero-based position in the pipeline.
    pub index: usize,
    /// What the stage does.
    pub purpose: StagePurpose,
}

/// Wall time of one executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    /// What the stage does.
    pub purpose: StagePurpose,
    /// How long it ran.
    pub elapsed: Duration,
}

/// Final result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult<O> {
    /// Final status.
    pub status: ExecutionStatus,
    /// Description carried by the last message.
    pub description: Option<String>,
    /// Output of the last stage, present only on success.
    pub output: Option<O>,
    /// The stage that returned ERROR or TERMINATED.
    pub failed_stage: Option<FailedStage>,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Per-stage timings, in execution order.
    pub stage_timings: Vec<StageTiming>,
}

impl<O> PipelineResult<O> {
    pub(crate) fn completed(
        output: O,
        description: Option<String>,
        elapsed: Duration,
        stage_timings: Vec<StageTiming>,
    ) -> Self {
        Self {
            status: ExecutionStatus::Success,
            description,
            output: Some(output),
            failed_stage: None,
            elapsed,
            stage_timings,
        }
    }

    pub(crate) fn halted(
        status: ExecutionStatus,
        description: Option<String>,
        failed_stage: FailedStage,
        elapsed: Duration,
        stage_timings: Vec<StageTiming>,
    ) -> Self {
        Self {
            status,
            description,
            output: None,
            failed_stage: Some(failed_stage),
            elapsed,
            stage_timings,
        }
    }

    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Returns true if a stage ended the run benignly.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.status == ExecutionStatus::Terminated
    }

    /// Returns true if a stage failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ExecutionStatus::Error
    }

    /// Label of the stage the run stopped at, if any.
    #[must_use]
    pub fn failed_label(&self) -> Option<&'static str> {
        self.failed_stage.map(|f| f.purpose.label())
    }

    /// Rebuilds the last stage message.
    #[must_use]
    pub fn into_message(self) -> StageMessage<O> {
        match (self.status, self.output) {
            (ExecutionStatus::Success, Some(payload)) => StageMessage::Success {
                payload,
                description: self.description,
            },
            (ExecutionStatus::Terminated, _) => StageMessage::Terminated {
                description: self.description,
            },
            _ => StageMessage::Error {
                description: self.description,
            },
        }
    }
}
