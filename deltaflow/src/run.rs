//! Whole-run orchestration.

use crate::changes::{ChangeSetDetector, DetectChangesStage};
use crate::config::DeltaflowConfig;
use crate::core::BuildLayout;
use crate::deploy::{DesugarStage, PackageStage, PackagedArtifact, PushStage, RestartStage};
use crate::errors::DeltaflowError;
use crate::pipeline::{format_elapsed, Pipeline};
use crate::process::{ProcessGateway, SystemProcessGateway};
use crate::report::RunReport;
use crate::scheduler::{BuildScheduler, CompileModulesStage};
use crate::stages::SetupProjectStage;
use crate::topology::{absolute_path, ModuleCache, ResolveModulesStage, TopologyResolver};
use crate::vcs::{GitCli, VersionControl};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The delta was packaged, pushed and the application restarted.
    Deployed {
        /// The pushed artifact.
        artifact: PathBuf,
        /// Total wall time.
        elapsed: Duration,
    },
    /// Nothing changed; no stage after detection ran.
    NothingToDo {
        /// Total wall time.
        elapsed: Duration,
    },
    /// A stage failed.
    Failed {
        /// Label of the failing stage.
        stage: String,
        /// What went wrong.
        description: String,
        /// Total wall time.
        elapsed: Duration,
    },
}

impl RunOutcome {
    /// Returns true if the caller should exit with a failure status.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Process exit code for the outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.is_failure())
    }

    /// Total wall time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Deployed { elapsed, .. }
            | Self::NothingToDo { elapsed }
            | Self::Failed { elapsed, .. } => *elapsed,
        }
    }
}

/// One incremental build-and-deploy run.
///
/// ```rust,ignore
/// let run = IncrementalRun::new(DeltaflowConfig::new("/work/app"))?;
/// let report = RunReport::new();
/// let outcome = run.execute(&report).await;
/// report.flush(&TracingReportSink);
/// std::process::exit(outcome.exit_code());
/// ```
#[derive(Debug, Clone)]
pub struct IncrementalRun {
    config: DeltaflowConfig,
    gateway: Arc<dyn ProcessGateway>,
    vcs: Option<Arc<dyn VersionControl>>,
}

impl IncrementalRun {
    /// Validates the configuration and creates a run using the system's
    /// tools. A relative project root is made absolute against the current
    /// directory.
    pub fn new(mut config: DeltaflowConfig) -> Result<Self, DeltaflowError> {
        config.validate()?;
        config.project_root = absolute_path(&config.project_root);
        Ok(Self {
            config,
            gateway: Arc::new(SystemProcessGateway::new()),
            vcs: None,
        })
    }

    /// Replaces the process gateway.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn ProcessGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    /// Replaces version control. Defaults to git through the gateway.
    #[must_use]
    pub fn with_vcs(mut self, vcs: Arc<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &DeltaflowConfig {
        &self.config
    }

    /// Builds the whole-run pipeline: setup, resolve, detect, compile,
    /// desugar, package, push, restart.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline<BuildLayout, PackagedArtifact> {
        let config = &self.config;
        let gateway = &self.gateway;

        let mut resolver = TopologyResolver::new(&config.project_root);
        if let Some(cache) = config.module_cache_path() {
            resolver = resolver.with_cache(ModuleCache::new(cache));
        }
        let vcs = self
            .vcs
            .clone()
            .unwrap_or_else(|| Arc::new(GitCli::new(Arc::clone(gateway))));
        let detector = ChangeSetDetector::new(vcs).with_supported_kinds(config.supported_kinds.iter().copied());
        let compile = CompileModulesStage::new(
            BuildScheduler::from_config(config, Arc::clone(gateway)),
            config.layout(),
        )
        .with_block_deploy_on_failure(config.block_deploy_on_failure);

        Pipeline::new("incremental-run")
            .then(SetupProjectStage)
            .then(ResolveModulesStage::new(resolver))
            .then(DetectChangesStage::new(detector))
            .then(compile)
            .then(DesugarStage::from_config(config, Arc::clone(gateway)))
            .then(PackageStage::from_config(config, Arc::clone(gateway)))
            .then(PushStage::from_config(config, Arc::clone(gateway)))
            .then(RestartStage::from_config(config, Arc::clone(gateway)))
    }

    /// Runs every stage, appending progress to `report`.
    pub async fn execute(&self, report: &RunReport) -> RunOutcome {
        info!(root = %self.config.project_root.display(), workers = self.config.workers, "Incremental run started");
        let result = self.pipeline().run(report, self.config.layout()).await;

        for timing in &result.stage_timings {
            report.info(format!("{:<32} {}", timing.purpose.label(), format_elapsed(timing.elapsed)));
        }
        report.info(format!("Total time: {}", format_elapsed(result.elapsed)));

        let elapsed = result.elapsed;
        if result.is_terminated() {
            report.info("Nothing to do");
            return RunOutcome::NothingToDo { elapsed };
        }
        let stage = result.failed_label().map(str::to_string);
        match result.output {
            Some(packaged) if stage.is_none() => {
                report.info("Done");
                RunOutcome::Deployed {
                    artifact: packaged.artifact,
                    elapsed,
                }
            }
            _ => RunOutcome::Failed {
                stage: stage.unwrap_or_else(|| "unknown".to_string()),
                description: result.description.unwrap_or_else(|| "no details".to_string()),
                elapsed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StagePurpose;
    use crate::testing::{emit_classes, FakeVcs, ProjectFixture, ScriptedGateway};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_stage_order() {
        let run = IncrementalRun::new(DeltaflowConfig::new("/p")).unwrap();

        assert_eq!(
            run.pipeline().purposes(),
            vec![
                StagePurpose::SetupProject,
                StagePurpose::ResolveModules,
                StagePurpose::DetectChanges,
                StagePurpose::CompileModules,
                StagePurpose::Desugar,
                StagePurpose::Package,
                StagePurpose::Push,
                StagePurpose::Restart,
            ]
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = IncrementalRun::new(DeltaflowConfig::new("/p").with_workers(0)).unwrap_err();
        assert!(matches!(err, DeltaflowError::Config(_)));
    }

    #[test]
    fn test_exit_codes() {
        let nothing = RunOutcome::NothingToDo { elapsed: Duration::ZERO };
        let failed = RunOutcome::Failed {
            stage: "Dexing".into(),
            description: "d8 reported 1 error(s)".into(),
            elapsed: Duration::ZERO,
        };

        assert_eq!(nothing.exit_code(), 0);
        assert_eq!(failed.exit_code(), 1);
        assert!(failed.is_failure());
    }

    #[test]
    fn test_project_root_is_made_absolute() {
        let run = IncrementalRun::new(DeltaflowConfig::new(".")).unwrap();

        assert_eq!(run.config().project_root, std::env::current_dir().unwrap());
        assert!(run.config().layout().build_root().is_absolute());
    }

    #[tokio::test]
    async fn test_relative_root_compiles_changes() {
        let dir = TempDir::new().unwrap();
        let fixture = ProjectFixture::new(dir.path());
        fixture.module("app").with_classes().create();
        fixture.write("app/src/Main.java", "class Main {}");
        let gateway = ScriptedGateway::new().respond("javac", emit_classes).into_arc();
        let run = IncrementalRun::new(DeltaflowConfig::new(fixture.relative_root()))
            .unwrap()
            .with_gateway(gateway.clone())
            .with_vcs(Arc::new(FakeVcs::with_status(["\tmodified:   app/src/Main.java"])));
        let report = RunReport::new();

        let outcome = run.execute(&report).await;

        // No Android SDK is configured, so the run stops at packaging.
        match outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, StagePurpose::Package.label()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(report.contains("* app/src/Main.java [app]"));
        assert_eq!(gateway.calls_to("javac").len(), 1);
        assert!(BuildLayout::new(dir.path()).merged_dir().join("Main.class").is_file());
    }

    #[tokio::test]
    async fn test_missing_root_fails_at_setup() {
        let dir = TempDir::new().unwrap();
        let run = IncrementalRun::new(DeltaflowConfig::new(dir.path().join("missing")))
            .unwrap()
            .with_gateway(ScriptedGateway::new().into_arc())
            .with_vcs(Arc::new(FakeVcs::clean()));

        let outcome = run.execute(&RunReport::new()).await;

        match outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, "Setting up build paths"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clean_tree_is_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        ProjectFixture::new(dir.path()).module("app").with_classes().create();
        let gateway = ScriptedGateway::new().into_arc();
        let run = IncrementalRun::new(DeltaflowConfig::new(dir.path()))
            .unwrap()
            .with_gateway(gateway.clone())
            .with_vcs(Arc::new(FakeVcs::clean()));
        let report = RunReport::new();

        let outcome = run.execute(&report).await;

        assert!(matches!(outcome, RunOutcome::NothingToDo { .. }));
        assert!(!outcome.is_failure());
        assert!(gateway.calls().is_empty());
        assert!(report.contains("Total time"));
    }
}
