//! Sequential, short-circuiting stage executor.

use super::{FailedStage, PipelineResult, StageTiming};
use crate::core::{ExecutionStatus, StageMessage};
use crate::errors::DeltaflowError;
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::{type_name, Any};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

type Payload = Box<dyn Any + Send>;

/// A stage with its payload types erased so stages of different types can
/// share one list.
#[async_trait]
trait ErasedStage: Send + Sync + Debug {
    fn purpose(&self) -> StagePurpose;

    async fn run_erased(
        &self,
        report: &RunReport,
        input: Payload,
    ) -> Result<StageMessage<Payload>, String>;
}

#[derive(Debug)]
struct Erased<S>(S);

#[async_trait]
impl<S: Stage> ErasedStage for Erased<S> {
    fn purpose(&self) -> StagePurpose {
        self.0.purpose()
    }

    async fn run_erased(
        &self,
        report: &RunReport,
        input: Payload,
    ) -> Result<StageMessage<Payload>, String> {
        let input = input
            .downcast::<S::Input>()
            .map_err(|_| format!("task message types mismatch: expected {}", type_name::<S::Input>()))?;

        let message = self.0.run(report, *input).await.map_err(|e| format!("{e:#}"))?;
        Ok(message.map(|payload| Box::new(payload) as Payload))
    }
}

/// An ordered list of stages from input `I` to output `O`.
///
/// Built with [`Pipeline::new`] and [`Pipeline::then`]; each added stage
/// must accept the previous stage's output type.
///
/// ```rust,ignore
/// let pipeline = Pipeline::new("resolve")
///     .then(SetupProjectStage)
///     .then(ResolveModulesStage::new(resolver))
///     .then(DetectChangesStage::new(detector));
/// let result = pipeline.run(&report, layout).await;
/// ```
pub struct Pipeline<I, O> {
    name: String,
    steps: Vec<Box<dyn ErasedStage>>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish()
    }
}

impl<I: Send + 'static> Pipeline<I, I> {
    /// Creates an empty pipeline. Running it returns the input unchanged.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            _types: PhantomData,
        }
    }
}

impl<I: Send + 'static, O: Send + 'static> Pipeline<I, O> {
    /// Appends a stage consuming this pipeline's current output.
    #[must_use]
    pub fn then<S>(mut self, stage: S) -> Pipeline<I, S::Output>
    where
        S: Stage<Input = O> + 'static,
    {
        self.steps.push(Box::new(Erased(stage)));
        Pipeline {
            name: self.name,
            steps: self.steps,
            _types: PhantomData,
        }
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stages in execution order.
    #[must_use]
    pub fn purposes(&self) -> Vec<StagePurpose> {
        self.steps.iter().map(|s| s.purpose()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every stage in order, stopping at the first ERROR or TERMINATED.
    ///
    /// Never returns early with a fault: a stage returning `Err`, panicking,
    /// or receiving a payload of the wrong type produces an ERROR result
    /// naming that stage.
    pub async fn run(&self, report: &RunReport, input: I) -> PipelineResult<O> {
        let started = Instant::now();
        let total = self.steps.len();
        let mut timings = Vec::with_capacity(total);
        let mut payload: Payload = Box::new(input);
        let mut description = None;

        info!(pipeline = %self.name, stages = total, "Pipeline started");

        for (index, step) in self.steps.iter().enumerate() {
            let purpose = step.purpose();
            report.info(format!("[STEP {}/{}] {}: {}", index + 1, total, purpose.code(), purpose.label()));

            let stage_started = Instant::now();
            let outcome = AssertUnwindSafe(step.run_erased(report, payload))
                .catch_unwind()
                .await;
            let elapsed = stage_started.elapsed();
            timings.push(StageTiming { purpose, elapsed });
            report.info(format!("TOOK {}", format_elapsed(elapsed)));
            debug!(
                pipeline = %self.name,
                stage = purpose.code(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Stage finished"
            );

            let message = match outcome {
                Ok(Ok(message)) => message,
                Ok(Err(fault)) => StageMessage::from(DeltaflowError::stage_fault(purpose.label(), fault)),
                Err(panic) => StageMessage::from(DeltaflowError::stage_fault(
                    purpose.label(),
                    panic_message(panic.as_ref()),
                )),
            };

            match message {
                StageMessage::Success {
                    payload: next,
                    description: note,
                } => {
                    payload = next;
                    description = note;
                }
                StageMessage::Terminated { description } => {
                    report.info(format!(
                        "TASK EXECUTION TERMINATED: {}",
                        description.as_deref().unwrap_or("no details")
                    ));
                    info!(pipeline = %self.name, stage = purpose.code(), "Pipeline terminated");
                    return PipelineResult::halted(
                        ExecutionStatus::Terminated,
                        description,
                        FailedStage { index, purpose },
                        started.elapsed(),
                        timings,
                    );
                }
                StageMessage::Error { description } => {
                    report.error(format!(
                        "TASK EXECUTION FAILED: {}",
                        description.as_deref().unwrap_or("no details")
                    ));
                    error!(
                        pipeline = %self.name,
                        stage = purpose.code(),
                        error = description.as_deref().unwrap_or_default(),
                        "Pipeline failed"
                    );
                    return PipelineResult::halted(
                        ExecutionStatus::Error,
                        description,
                        FailedStage { index, purpose },
                        started.elapsed(),
                        timings,
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        match payload.downcast::<O>() {
            Ok(output) => {
                info!(
                    pipeline = %self.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline completed"
                );
                PipelineResult::completed(*output, description, elapsed, timings)
            }
            Err(_) => {
                let index = total.saturating_sub(1);
                let purpose = self
                    .steps
                    .last()
                    .map_or(StagePurpose::Custom("pipeline"), |s| s.purpose());
                let fault = DeltaflowError::stage_fault(
                    purpose.label(),
                    format!("task message types mismatch: expected {}", type_name::<O>()),
                );
                report.error(format!("TASK EXECUTION FAILED: {fault}"));
                PipelineResult::halted(
                    ExecutionStatus::Error,
                    Some(fault.to_string()),
                    FailedStage { index, purpose },
                    elapsed,
                    timings,
                )
            }
        }
    }

    #[cfg(test)]
    fn push_unchecked<S: Stage + 'static>(&mut self, stage: S) {
        self.steps.push(Box::new(Erased(stage)));
    }
}

/// Renders a duration as `n ms` below one second, `n s` above.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis} ms")
    } else {
        format!("{} s", elapsed.as_secs())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".to_string()
    }
}
