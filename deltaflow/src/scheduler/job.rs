//! Stages of the per-module compile pipeline.

use crate::config::{ToolCommand, CLASSPATH_SEPARATOR};
use crate::core::{Module, SourceKind, StageMessage};
use crate::errors::DeltaflowError;
use crate::process::signals::{javac_failures, kotlinc_failures};
use crate::process::{Invocation, ProcessGateway, TemplateVars};
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Payload threaded through one module's compile pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleJob {
    /// The module being compiled.
    pub module: Module,
    /// The module's changed files.
    pub files: Vec<PathBuf>,
    /// Private compiled-output directory.
    pub output_dir: PathBuf,
    /// Classpath entries, filled in by [`PrepareOutputStage`].
    pub classpath: Vec<String>,
}

impl ModuleJob {
    /// Creates a job with an empty classpath.
    #[must_use]
    pub fn new(module: Module, files: Vec<PathBuf>, output_dir: PathBuf) -> Self {
        Self {
            module,
            files,
            output_dir,
            classpath: Vec::new(),
        }
    }

    /// Changed files of one kind.
    #[must_use]
    pub fn sources(&self, kind: SourceKind) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|f| SourceKind::from_path(f) == Some(kind))
            .map(PathBuf::as_path)
            .collect()
    }
}

/// The generated resource directory of a module variant.
#[must_use]
pub fn generated_resources_dir(module: &Module) -> PathBuf {
    module
        .source_root
        .join("build/generated/source/r")
        .join(&module.variant)
}

/// Creates the module's output directory and assembles its classpath.
///
/// Classpath order: the output directory (so Java sees Kotlin output), the
/// module's previously compiled classes, its generated resources, then the
/// external entries.
#[derive(Debug, Clone)]
pub struct PrepareOutputStage {
    external: Arc<[String]>,
}

impl PrepareOutputStage {
    /// Creates the stage with the external classpath.
    #[must_use]
    pub fn new(external: Arc<[String]>) -> Self {
        Self { external }
    }
}

#[async_trait]
impl Stage for PrepareOutputStage {
    type Input = ModuleJob;
    type Output = ModuleJob;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::PrepareOutput
    }

    async fn run(&self, report: &RunReport, mut job: ModuleJob) -> anyhow::Result<StageMessage<ModuleJob>> {
        if let Err(e) = tokio::fs::create_dir_all(&job.output_dir).await {
            let description = format!("Failed to create output directory {}: {e}", job.output_dir.display());
            report.error(&description);
            return Ok(StageMessage::error(description));
        }

        let mut classpath = vec![job.output_dir.to_string_lossy().into_owned()];
        if let Some(build) = &job.module.build_path {
            classpath.push(build.to_string_lossy().into_owned());
        }
        let resources = generated_resources_dir(&job.module);
        if tokio::fs::metadata(&resources).await.is_ok_and(|m| m.is_dir()) {
            classpath.push(resources.to_string_lossy().into_owned());
        }
        classpath.extend(self.external.iter().cloned());
        job.classpath = classpath;

        report.info(format!("Output directory: {}", job.output_dir.display()));
        Ok(StageMessage::success(job))
    }
}

/// Compiles the job's files of one [`SourceKind`]; passes through when the
/// module has none.
#[derive(Debug, Clone)]
pub struct CompileSourcesStage {
    kind: SourceKind,
    tool: ToolCommand,
    gateway: Arc<dyn ProcessGateway>,
}

impl CompileSourcesStage {
    /// Creates a compile stage for `kind` using `tool`.
    #[must_use]
    pub fn new(kind: SourceKind, tool: ToolCommand, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self { kind, tool, gateway }
    }

    fn failures(&self, output: &crate::process::ProcessOutput) -> Vec<String> {
        match self.kind {
            SourceKind::Java => javac_failures(output),
            SourceKind::Kotlin => kotlinc_failures(output),
        }
    }
}

#[async_trait]
impl Stage for CompileSourcesStage {
    type Input = ModuleJob;
    type Output = ModuleJob;

    fn purpose(&self) -> StagePurpose {
        match self.kind {
            SourceKind::Java => StagePurpose::CompileJava,
            SourceKind::Kotlin => StagePurpose::CompileKotlin,
        }
    }

    async fn run(&self, report: &RunReport, job: ModuleJob) -> anyhow::Result<StageMessage<ModuleJob>> {
        let sources = job.sources(self.kind);
        if sources.is_empty() {
            report.info(format!("No {} sources changed", self.kind));
            return Ok(StageMessage::success(job));
        }

        if !self.gateway.probe(&self.tool.program).await {
            let err = DeltaflowError::tool_missing(&self.tool.program);
            report.error(err.to_string());
            return Ok(err.into());
        }

        let vars = TemplateVars::new()
            .set_path("output", &job.output_dir)
            .set("classpath", job.classpath.join(CLASSPATH_SEPARATOR))
            .files(&sources);
        let invocation = Invocation::new(&self.tool.program)
            .args(self.tool.args.render(&vars))
            .current_dir(&job.output_dir);
        debug!(module = %job.module, invocation = %invocation, "Running compiler");

        let output = match self.gateway.execute(&invocation).await {
            Ok(output) => output,
            Err(e) => {
                report.error(e.to_string());
                return Ok(e.into());
            }
        };

        let failures = self.failures(&output);
        if !failures.is_empty() {
            for line in &failures {
                report.error(line);
            }
            return Ok(StageMessage::error(format!(
                "{} reported {} error(s)",
                self.tool.program,
                failures.len()
            )));
        }

        report.info(format!("Compiled {} {} file(s)", sources.len(), self.kind));
        Ok(StageMessage::success(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionStatus;
    use crate::process::ProcessOutput;
    use crate::testing::{emit_classes, ProjectFixture, ScriptedGateway};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn javac() -> ToolCommand {
        crate::config::ToolchainConfig::default().javac
    }

    #[tokio::test]
    async fn test_prepare_builds_classpath_in_order() {
        let dir = TempDir::new().unwrap();
        let fixture = ProjectFixture::new(dir.path());
        let module = fixture.module("app").with_classes().with_generated_resources().create();
        let output = dir.path().join("build/deltaflow/compile/app");
        let job = ModuleJob::new(module.clone(), vec![], output.clone());
        let stage = PrepareOutputStage::new(vec!["/sdk/android.jar".to_string()].into());
        let report = RunReport::new();

        let job = stage.run(&report, job).await.unwrap().into_payload().unwrap();

        assert!(output.is_dir());
        assert_eq!(
            job.classpath,
            vec![
                output.to_string_lossy().into_owned(),
                module.build_path.as_ref().unwrap().to_string_lossy().into_owned(),
                generated_resources_dir(&module).to_string_lossy().into_owned(),
                "/sdk/android.jar".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_compile_passes_through_without_sources() {
        let gateway = ScriptedGateway::new().into_arc();
        let stage = CompileSourcesStage::new(SourceKind::Kotlin, javac(), gateway.clone());
        let job = ModuleJob::new(
            Module::new("app", "/p/app", None, "debug"),
            vec![PathBuf::from("/p/app/src/Main.java")],
            PathBuf::from("/out"),
        );
        let report = RunReport::new();

        let message = stage.run(&report, job).await.unwrap();

        assert!(message.is_success());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_compile_renders_only_matching_sources() {
        let dir = TempDir::new().unwrap();
        let gateway = ScriptedGateway::new().respond("javac", emit_classes).into_arc();
        let stage = CompileSourcesStage::new(SourceKind::Java, javac(), gateway.clone());
        let mut job = ModuleJob::new(
            Module::new("app", "/p/app", None, "debug"),
            vec![PathBuf::from("/p/app/src/Main.java"), PathBuf::from("/p/app/src/Util.kt")],
            dir.path().to_path_buf(),
        );
        job.classpath = vec!["/a".into(), "/b".into()];
        let report = RunReport::new();

        let message = stage.run(&report, job).await.unwrap();

        assert!(message.is_success());
        let call = &gateway.calls()[0];
        assert_eq!(call.args.last().map(String::as_str), Some("/p/app/src/Main.java"));
        assert!(call.args.contains(&"/a:/b".to_string()));
        assert!(!call.args.iter().any(|a| a.ends_with(".kt")));
        assert!(dir.path().join("Main.class").is_file());
    }

    #[tokio::test]
    async fn test_compiler_error_lines_fail_the_module() {
        let gateway = ScriptedGateway::new()
            .respond("javac", |_| {
                ProcessOutput::failed(["/p/app/src/Main.java:3: error: ';' expected", "1 error"])
            })
            .into_arc();
        let stage = CompileSourcesStage::new(SourceKind::Java, javac(), gateway);
        let job = ModuleJob::new(
            Module::new("app", "/p/app", None, "debug"),
            vec![PathBuf::from("/p/app/src/Main.java")],
            PathBuf::from("/out"),
        );
        let report = RunReport::new();

        let message = stage.run(&report, job).await.unwrap();

        assert_eq!(message.status(), ExecutionStatus::Error);
        assert_eq!(message.description(), Some("javac reported 1 error(s)"));
        assert!(report.contains("';' expected"));
    }

    #[tokio::test]
    async fn test_missing_compiler_is_error() {
        let stage = CompileSourcesStage::new(SourceKind::Java, javac(), ScriptedGateway::new().into_arc());
        let job = ModuleJob::new(
            Module::new("app", "/p/app", None, "debug"),
            vec![PathBuf::from("/p/app/src/Main.java")],
            PathBuf::from("/out"),
        );
        let report = RunReport::new();

        let message = stage.run(&report, job).await.unwrap();

        assert_eq!(message.status(), ExecutionStatus::Error);
        assert!(message.description().unwrap().contains("javac"));
    }
}
