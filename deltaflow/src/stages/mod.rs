//! Stage trait and implementations.
//!
//! Stages are the units of work in a deltaflow pipeline. Each stage declares
//! its input and output types; the pipeline builder only accepts a stage whose
//! input is the previous stage's output, so a mismatched chain does not
//! compile.

mod purpose;
mod setup;

pub use purpose::StagePurpose;
pub use setup::SetupProjectStage;

use crate::core::StageMessage;
use crate::report::RunReport;
use async_trait::async_trait;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Trait for pipeline stages.
///
/// A stage reports its outcome through the returned [`StageMessage`]. An
/// `Err` is reserved for faults the stage did not anticipate; the engine
/// turns it into an `ERROR` result naming the stage.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// The payload this stage consumes.
    type Input: Send + 'static;
    /// The payload this stage hands to the next one on success.
    type Output: Send + 'static;

    /// Returns what the stage does.
    fn purpose(&self) -> StagePurpose;

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `report` - The run report to append progress and warnings to
    /// * `input` - The previous stage's payload
    async fn run(
        &self,
        report: &RunReport,
        input: Self::Input,
    ) -> anyhow::Result<StageMessage<Self::Output>>;
}

/// A simple function-based stage.
pub struct FnStage<I, O, F>
where
    F: Fn(&RunReport, I) -> StageMessage<O> + Send + Sync,
{
    name: &'static str,
    func: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnStage<I, O, F>
where
    F: Fn(&RunReport, I) -> StageMessage<O> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: &'static str, func: F) -> Self {
        Self {
            name,
            func,
            _types: PhantomData,
        }
    }
}

impl<I, O, F> Debug for FnStage<I, O, F>
where
    F: Fn(&RunReport, I) -> StageMessage<O> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<I, O, F> Stage for FnStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&RunReport, I) -> StageMessage<O> + Send + Sync,
{
    type Input = I;
    type Output = O;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::Custom(self.name)
    }

    async fn run(&self, report: &RunReport, input: I) -> anyhow::Result<StageMessage<O>> {
        Ok((self.func)(report, input))
    }
}
