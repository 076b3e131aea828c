//! Per-module build scheduler.
//!
//! Each changed module is compiled by its own [`Pipeline`] on a bounded
//! worker pool. Modules fail independently: a failed sibling never cancels a
//! module already compiling. Once every task has finished, the shared compile
//! area is cleaned of artifacts that do not belong to a changed source.

mod cleanup;
mod job;

pub use cleanup::{cleanup_artifacts, is_retained, CleanupSummary};
pub use job::{generated_resources_dir, CompileSourcesStage, ModuleJob, PrepareOutputStage};

use crate::config::{DeltaflowConfig, ToolchainConfig};
use crate::core::{
    BuildLayout, BuildReport, ChangeSet, Module, ModuleBuildOutcome, ModuleState, SourceKind,
    StageMessage,
};
use crate::errors::DeltaflowError;
use crate::pipeline::{format_elapsed, Pipeline};
use crate::process::ProcessGateway;
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Fans module compilation out over a bounded worker pool.
#[derive(Debug, Clone)]
pub struct BuildScheduler {
    workers: usize,
    gateway: Arc<dyn ProcessGateway>,
    toolchain: ToolchainConfig,
    classpath: Arc<[String]>,
}

impl BuildScheduler {
    /// Creates a scheduler with `workers` slots (at least one) and the
    /// default toolchain.
    #[must_use]
    pub fn new(workers: usize, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self {
            workers: workers.max(1),
            gateway,
            toolchain: ToolchainConfig::default(),
            classpath: Arc::from(Vec::new()),
        }
    }

    /// Creates a scheduler from a run configuration.
    #[must_use]
    pub fn from_config(config: &DeltaflowConfig, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self::new(config.workers, gateway)
            .with_toolchain(config.toolchain.clone())
            .with_classpath(config.external_classpath())
    }

    /// Replaces the compilers.
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: ToolchainConfig) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Sets the external classpath.
    #[must_use]
    pub fn with_classpath(mut self, classpath: Vec<String>) -> Self {
        self.classpath = Arc::from(classpath);
        self
    }

    /// Worker pool size.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The compile pipeline run for each module.
    #[must_use]
    pub fn module_pipeline(&self, module: &Module) -> Pipeline<ModuleJob, ModuleJob> {
        Pipeline::new(format!("compile:{}", module.name))
            .then(PrepareOutputStage::new(Arc::clone(&self.classpath)))
            .then(CompileSourcesStage::new(
                SourceKind::Kotlin,
                self.toolchain.kotlinc.clone(),
                Arc::clone(&self.gateway),
            ))
            .then(CompileSourcesStage::new(
                SourceKind::Java,
                self.toolchain.javac.clone(),
                Arc::clone(&self.gateway),
            ))
    }

    /// Compiles every module of the change set and waits for all of them.
    ///
    /// The returned report has one outcome per module.
    pub async fn build(
        &self,
        report: &RunReport,
        layout: &BuildLayout,
        change_set: &ChangeSet,
    ) -> BuildReport {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(change_set.module_count());

        for (module, files) in change_set.iter() {
            let output_dir = layout.compile_dir(&module.name);
            let job = ModuleJob::new(module.clone(), files.iter().cloned().collect(), output_dir.clone());
            let pipeline = self.module_pipeline(module);
            let scoped = report.scoped(&module.name);
            let semaphore = Arc::clone(&semaphore);

            debug!(module = %module, state = ?ModuleState::Pending, "Module queued");
            let handle = tokio::spawn(async move {
                let module = job.module.clone();
                let output_dir = job.output_dir.clone();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ModuleBuildOutcome::failed(module, output_dir, "Worker pool closed", Duration::ZERO);
                };

                debug!(module = %module, state = ?ModuleState::Compiling, "Module started");
                let started = Instant::now();
                let result = pipeline.run(&scoped, job).await;
                let elapsed = started.elapsed();

                if result.is_success() {
                    ModuleBuildOutcome::compiled(module, output_dir, elapsed)
                } else {
                    let description = result
                        .description
                        .clone()
                        .or_else(|| result.failed_label().map(|l| format!("{l} failed")))
                        .unwrap_or_else(|| "Compilation failed".to_string());
                    ModuleBuildOutcome::failed(module, output_dir, description, elapsed)
                }
            });
            handles.push((module.clone(), output_dir, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (module, output_dir, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => ModuleBuildOutcome::failed(
                    module,
                    output_dir,
                    format!("Compile task aborted: {e}"),
                    Duration::ZERO,
                ),
            };
            debug!(module = %outcome.module, state = ?outcome.state, "Module finished");
            outcomes.push(outcome);
        }

        let build = BuildReport::new(outcomes);
        for outcome in build.outcomes() {
            if outcome.is_success() {
                report.info(format!(
                    "[{}] COMPILED in {}",
                    outcome.module.name,
                    format_elapsed(outcome.elapsed)
                ));
            } else {
                report.error(format!(
                    "[{}] FAILED: {}",
                    outcome.module.name,
                    outcome.description.as_deref().unwrap_or("Compilation failed")
                ));
            }
        }
        info!(
            modules = build.outcomes().len(),
            failed = build.failures().len(),
            "Module compilation finished"
        );
        build
    }
}

/// Classes compiled for a run, ready to merge and package.
#[derive(Debug, Clone)]
pub struct CompiledClasses {
    /// The project's artifact layout.
    pub layout: BuildLayout,
    /// Per-module outcomes.
    pub build: BuildReport,
    /// Output directories of the modules that compiled.
    pub class_dirs: Vec<PathBuf>,
}

/// Stage wrapping [`BuildScheduler::build`] and [`cleanup_artifacts`].
///
/// With `block_deploy_on_failure` a single failed module ends the run with
/// ERROR. Without it the run goes on with the modules that compiled, and
/// fails only when none did.
#[derive(Debug, Clone)]
pub struct CompileModulesStage {
    scheduler: BuildScheduler,
    layout: BuildLayout,
    block_deploy_on_failure: bool,
}

impl CompileModulesStage {
    /// Creates the stage; failures block deployment.
    #[must_use]
    pub fn new(scheduler: BuildScheduler, layout: BuildLayout) -> Self {
        Self {
            scheduler,
            layout,
            block_deploy_on_failure: true,
        }
    }

    /// Sets whether a failed module stops the run.
    #[must_use]
    pub fn with_block_deploy_on_failure(mut self, block: bool) -> Self {
        self.block_deploy_on_failure = block;
        self
    }
}

#[async_trait]
impl Stage for CompileModulesStage {
    type Input = ChangeSet;
    type Output = CompiledClasses;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::CompileModules
    }

    async fn run(
        &self,
        report: &RunReport,
        change_set: ChangeSet,
    ) -> anyhow::Result<StageMessage<CompiledClasses>> {
        report.info(format!(
            "Compiling {} module(s) with {} worker(s)",
            change_set.module_count(),
            self.scheduler.workers().min(change_set.module_count().max(1))
        ));
        let build = self.scheduler.build(report, &self.layout, &change_set).await;

        let compile_root = self.layout.compile_root();
        let cleaned = tokio::task::spawn_blocking(move || cleanup_artifacts(&compile_root, &change_set)).await?;
        match cleaned {
            Ok(summary) => report.info(format!(
                "{}: kept {} class file(s), removed {}",
                StagePurpose::CleanupArtifacts.label(),
                summary.retained,
                summary.removed
            )),
            Err(e) => {
                report.error(e.to_string());
                return Ok(e.into());
            }
        }

        if !build.is_success() {
            let err = DeltaflowError::Compilation {
                failures: build.failures(),
            };
            if self.block_deploy_on_failure || build.compiled().next().is_none() {
                report.error(err.to_string());
                return Ok(err.into());
            }
            report.warn(format!("{err}; continuing with the modules that compiled"));
        }

        let class_dirs: Vec<PathBuf> = build.compiled().map(|o| o.output_dir.clone()).collect();
        let description = format!("{} module(s) compiled", class_dirs.len());
        Ok(StageMessage::success_with(
            CompiledClasses {
                layout: self.layout.clone(),
                build,
                class_dirs,
            },
            description,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionStatus;
    use crate::process::{Invocation, ProcessOutput};
    use crate::testing::{emit_classes, source_args, ProjectFixture, ScriptedGateway};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn failing_in(module: &'static str) -> impl Fn(&Invocation) -> ProcessOutput + Send + Sync {
        move |inv| {
            let broken = source_args(inv)
                .iter()
                .any(|p| p.components().any(|c| c.as_os_str() == module));
            if broken {
                ProcessOutput::failed([format!("/p/{module}/src/Broken.java:1: error: cannot find symbol")])
            } else {
                emit_classes(inv)
            }
        }
    }

    fn three_modules(dir: &TempDir) -> ChangeSet {
        let fixture = ProjectFixture::new(dir.path());
        let mut builder = ChangeSet::builder();
        for name in ["a", "b", "c"] {
            let module = fixture.module(name).with_classes().create();
            let file = fixture.write(&format!("{name}/src/{}.java", name.to_uppercase()), "class X {}");
            builder.insert(&module, file);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_failed_module_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        let change_set = three_modules(&dir);
        let layout = BuildLayout::new(dir.path());
        let gateway = ScriptedGateway::new().respond("javac", failing_in("b")).into_arc();
        let scheduler = BuildScheduler::new(2, gateway);
        let report = RunReport::new();

        let build = scheduler.build(&report, &layout, &change_set).await;

        assert_eq!(build.status(), ExecutionStatus::Error);
        assert_eq!(build.failures(), vec!["[b] javac reported 1 error(s)".to_string()]);
        assert_eq!(build.outcome("a").map(|o| o.state), Some(ModuleState::Compiled));
        assert_eq!(build.outcome("c").map(|o| o.state), Some(ModuleState::Compiled));
        assert!(layout.compile_dir("a").join("A.class").is_file());
        assert!(layout.compile_dir("c").join("C.class").is_file());
        assert!(report.contains("[b] FAILED"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_is_bounded() {
        let dir = TempDir::new().unwrap();
        let fixture = ProjectFixture::new(dir.path());
        let mut builder = ChangeSet::builder();
        for i in 0..6 {
            let module = fixture.module(&format!("m{i}")).create();
            let file = fixture.write(&format!("m{i}/src/C{i}.java"), "class C {}");
            builder.insert(&module, file);
        }
        let change_set = builder.build();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let gateway = ScriptedGateway::new()
            .respond("javac", move |inv| {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                current.fetch_sub(1, Ordering::SeqCst);
                emit_classes(inv)
            })
            .into_arc();
        let scheduler = BuildScheduler::new(2, gateway);

        let build = scheduler
            .build(&RunReport::new(), &BuildLayout::new(dir.path()), &change_set)
            .await;

        assert!(build.is_success());
        assert_eq!(build.outcomes().len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_stage_blocks_on_failure_by_default() {
        let dir = TempDir::new().unwrap();
        let change_set = three_modules(&dir);
        let gateway = ScriptedGateway::new().respond("javac", failing_in("b")).into_arc();
        let stage = CompileModulesStage::new(BuildScheduler::new(4, gateway), BuildLayout::new(dir.path()));
        let report = RunReport::new();

        let message = stage.run(&report, change_set).await.unwrap();

        assert_eq!(message.status(), ExecutionStatus::Error);
        assert!(message.description().unwrap().contains("[b]"));
    }

    #[tokio::test]
    async fn test_stage_can_continue_with_compiled_modules() {
        let dir = TempDir::new().unwrap();
        let change_set = three_modules(&dir);
        let gateway = ScriptedGateway::new().respond("javac", failing_in("b")).into_arc();
        let layout = BuildLayout::new(dir.path());
        let stage = CompileModulesStage::new(BuildScheduler::new(4, gateway), layout.clone())
            .with_block_deploy_on_failure(false);
        let report = RunReport::new();

        let compiled = stage.run(&report, change_set).await.unwrap().into_payload().unwrap();

        assert_eq!(compiled.class_dirs, vec![layout.compile_dir("a"), layout.compile_dir("c")]);
        assert!(report.contains("continuing with the modules that compiled"));
    }

    #[tokio::test]
    async fn test_stage_removes_stale_artifacts() {
        let dir = TempDir::new().unwrap();
        let fixture = ProjectFixture::new(dir.path());
        let app = fixture.module("app").create();
        let main = fixture.write("app/src/Main.java", "class Main {}");
        let layout = BuildLayout::new(dir.path());
        std::fs::create_dir_all(layout.compile_dir("app")).unwrap();
        std::fs::write(layout.compile_dir("app").join("Old.class"), b"").unwrap();
        let gateway = ScriptedGateway::new().respond("javac", emit_classes).into_arc();
        let stage = CompileModulesStage::new(BuildScheduler::new(1, gateway), layout.clone());

        let message = stage
            .run(&RunReport::new(), ChangeSet::builder().with_file(&app, main).build())
            .await
            .unwrap();

        assert!(message.is_success());
        assert!(layout.compile_dir("app").join("Main.class").is_file());
        assert!(!layout.compile_dir("app").join("Old.class").exists());
    }
}
