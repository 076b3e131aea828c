//! Stage pipeline engine.
//!
//! One engine type drives both the whole-run pipeline and each module's
//! compile sub-pipeline. Stages run strictly in order; the first ERROR or
//! TERMINATED stops the run.

mod engine;
mod result;

pub use engine::{format_elapsed, Pipeline};
pub use result::{FailedStage, PipelineResult, StageTiming};
