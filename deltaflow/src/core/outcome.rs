//! Per-module build outcomes and their aggregate.

use super::{ExecutionStatus, Module, ModuleState};
use std::path::PathBuf;
use std::time::Duration;

/// The result of compiling one module.
#[derive(Debug, Clone)]
pub struct ModuleBuildOutcome {
    /// The module that was compiled.
    pub module: Module,
    /// Final lifecycle state.
    pub state: ModuleState,
    /// Status of the module's compile pipeline.
    pub status: ExecutionStatus,
    /// Failure description, or a note on success.
    pub description: Option<String>,
    /// The module's private compiled-output directory.
    pub output_dir: PathBuf,
    /// Wall time of the module's compile pipeline.
    pub elapsed: Duration,
}

impl ModuleBuildOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn compiled(module: Module, output_dir: PathBuf, elapsed: Duration) -> Self {
        Self {
            module,
            state: ModuleState::Compiled,
            status: ExecutionStatus::Success,
            description: None,
            output_dir,
            elapsed,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(
        module: Module,
        output_dir: PathBuf,
        description: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            module,
            state: ModuleState::Failed,
            status: ExecutionStatus::Error,
            description: Some(description.into()),
            output_dir,
            elapsed,
        }
    }

    /// Returns true if the module compiled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Aggregate of every dispatched module's outcome.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    outcomes: Vec<ModuleBuildOutcome>,
}

impl BuildReport {
    /// Creates a report from outcomes, sorted by module name.
    #[must_use]
    pub fn new(mut outcomes: Vec<ModuleBuildOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.module.cmp(&b.module));
        Self { outcomes }
    }

    /// All outcomes.
    #[must_use]
    pub fn outcomes(&self) -> &[ModuleBuildOutcome] {
        &self.outcomes
    }

    /// Returns the outcome of one module.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&ModuleBuildOutcome> {
        self.outcomes.iter().find(|o| o.module.name == name)
    }

    /// SUCCESS iff every module compiled. An empty report is a success.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        if self.outcomes.iter().all(ModuleBuildOutcome::is_success) {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Error
        }
    }

    /// Returns true if every module compiled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status() == ExecutionStatus::Success
    }

    /// One `[module] description` entry per failed module.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| {
                format!(
                    "[{}] {}",
                    o.module.name,
                    o.description.as_deref().unwrap_or("Compilation failed")
                )
            })
            .collect()
    }

    /// Outcomes of the modules that compiled.
    pub fn compiled(&self) -> impl Iterator<Item = &ModuleBuildOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }
}
