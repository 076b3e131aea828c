use super::{list_class_files, ClassTree, CLASS_EXTENSION};
use crate::config::{DeltaflowConfig, ToolCommand, CLASSPATH_SEPARATOR};
use crate::core::StageMessage;
use crate::errors::DeltaflowError;
use crate::process::signals::desugar_failures;
use crate::process::{Invocation, ProcessGateway, TemplateVars};
use crate::report::RunReport;
use crate::scheduler::CompiledClasses;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Copies the class files of every directory into `dest`, keeping their
/// package-relative paths. Returns the copied files, sorted. A class present
/// in several directories keeps the last copy.
pub fn merge_class_dirs(dirs: &[PathBuf], dest: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest)?;
    let mut copied = Vec::new();
    for dir in dirs {
        for result in WalkBuilder::new(dir).standard_filters(false).build() {
            let entry = result.map_err(std::io::Error::other)?;
            let is_class = entry.file_type().is_some_and(|t| t.is_file())
                && entry.path().extension().is_some_and(|e| e == CLASS_EXTENSION);
            if !is_class {
                continue;
            }
            let relative = entry.path().strip_prefix(dir).map_err(std::io::Error::other)?;
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied.push(target);
        }
    }
    copied.sort();
    copied.dedup();
    Ok(copied)
}

/// Merges compiled classes into one tree and runs the optional desugaring
/// tool over it.
#[derive(Debug, Clone)]
pub struct DesugarStage {
    gateway: Arc<dyn ProcessGateway>,
    tool: Option<ToolCommand>,
    classpath: Vec<String>,
}

impl DesugarStage {
    /// Creates a stage that only merges.
    #[must_use]
    pub fn new(gateway: Arc<dyn ProcessGateway>) -> Self {
        Self {
            gateway,
            tool: None,
            classpath: Vec::new(),
        }
    }

    /// Creates the stage from a run configuration.
    #[must_use]
    pub fn from_config(config: &DeltaflowConfig, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self {
            gateway,
            tool: config.toolchain.desugar.clone(),
            classpath: config.external_classpath(),
        }
    }

    /// Sets the desugaring tool.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolCommand) -> Self {
        self.tool = Some(tool);
        self
    }

    async fn desugar(
        &self,
        report: &RunReport,
        tool: &ToolCommand,
        merged: &ClassTree,
    ) -> Result<ClassTree, DeltaflowError> {
        if !self.gateway.probe(&tool.program).await {
            return Err(DeltaflowError::tool_missing(&tool.program));
        }

        let output_dir = merged.layout.desugar_dir();
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut classpath = vec![merged.root.to_string_lossy().into_owned()];
        classpath.extend(self.classpath.iter().cloned());
        let vars = TemplateVars::new()
            .set_path("input", &merged.root)
            .set_path("output", &output_dir)
            .set("classpath", classpath.join(CLASSPATH_SEPARATOR))
            .files(&merged.class_files);
        let invocation = Invocation::new(&tool.program).args(tool.args.render(&vars));
        let output = self.gateway.execute(&invocation).await?;

        let failures = desugar_failures(&output);
        if !failures.is_empty() {
            for line in &failures {
                report.error(line);
            }
            return Err(DeltaflowError::deployment(format!(
                "{} reported {} error(s)",
                tool.program,
                failures.len()
            )));
        }

        let scan_dir = output_dir.clone();
        let class_files = tokio::task::spawn_blocking(move || list_class_files(&scan_dir))
            .await
            .map_err(|e| DeltaflowError::deployment(e.to_string()))??;
        if class_files.is_empty() {
            return Err(DeltaflowError::deployment(format!(
                "{} produced no classes in {}",
                tool.program,
                output_dir.display()
            )));
        }
        report.info(format!("Desugared {} class file(s)", class_files.len()));

        Ok(ClassTree {
            layout: merged.layout.clone(),
            root: output_dir,
            class_files,
        })
    }
}

#[async_trait]
impl Stage for DesugarStage {
    type Input = CompiledClasses;
    type Output = ClassTree;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::Desugar
    }

    async fn run(
        &self,
        report: &RunReport,
        compiled: CompiledClasses,
    ) -> anyhow::Result<StageMessage<ClassTree>> {
        let layout = compiled.layout;
        let merged_dir = layout.merged_dir();
        let dest = merged_dir.clone();
        let dirs = compiled.class_dirs;
        let merged = tokio::task::spawn_blocking(move || merge_class_dirs(&dirs, &dest)).await?;

        let class_files = match merged {
            Ok(files) => files,
            Err(e) => {
                let description = format!("Failed to merge compiled classes: {e}");
                report.error(&description);
                return Ok(StageMessage::error(description));
            }
        };
        if class_files.is_empty() {
            report.error("No compiled classes to package");
            return Ok(StageMessage::error("No compiled classes to package"));
        }
        report.info(format!(
            "Merged {} class file(s) into {}",
            class_files.len(),
            merged_dir.display()
        ));

        let tree = ClassTree {
            layout,
            root: merged_dir,
            class_files,
        };
        let Some(tool) = &self.tool else {
            report.info("No desugaring tool configured");
            return Ok(StageMessage::success(tree));
        };

        match self.desugar(report, tool, &tree).await {
            Ok(desugared) => Ok(StageMessage::success(desugared)),
            Err(e) => {
                report.error(e.to_string());
                Ok(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildLayout, BuildReport, ExecutionStatus};
    use crate::process::ProcessOutput;
    use crate::testing::{flag_value, ScriptedGateway};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn compiled(layout: &BuildLayout, modules: &[&str]) -> CompiledClasses {
        let class_dirs: Vec<PathBuf> = modules
            .iter()
            .map(|name| {
                let dir = layout.compile_dir(name);
                std::fs::create_dir_all(dir.join("com/example")).unwrap();
                std::fs::write(dir.join(format!("com/example/{}.class", name.to_uppercase())), b"").unwrap();
                dir
            })
            .collect();
        CompiledClasses {
            layout: layout.clone(),
            build: BuildReport::default(),
            class_dirs,
        }
    }

    #[tokio::test]
    async fn test_merges_module_outputs() {
        let dir = TempDir::new().unwrap();
        let layout = BuildLayout::new(dir.path());
        let stage = DesugarStage::new(ScriptedGateway::new().into_arc());
        let report = RunReport::new();

        let tree = stage
            .run(&report, compiled(&layout, &["app", "core"]))
            .await
            .unwrap()
            .into_payload()
            .unwrap();

        assert_eq!(tree.root, layout.merged_dir());
        assert_eq!(
            tree.class_files,
            vec![
                layout.merged_dir().join("com/example/APP.class"),
                layout.merged_dir().join("com/example/CORE.class"),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_compiled_is_error() {
        let dir = TempDir::new().unwrap();
        let stage = DesugarStage::new(ScriptedGateway::new().into_arc());

        let message = stage
            .run(&RunReport::new(), compiled(&BuildLayout::new(dir.path()), &[]))
            .await
            .unwrap();

        assert_eq!(message.status(), ExecutionStatus::Error);
    }

    #[tokio::test]
    async fn test_runs_configured_tool() {
        let dir = TempDir::new().unwrap();
        let layout = BuildLayout::new(dir.path());
        let gateway = ScriptedGateway::new()
            .respond("desugar", |inv| {
                let output = PathBuf::from(flag_value(inv, "--output").unwrap());
                std::fs::write(output.join("APP.class"), b"").unwrap();
                ProcessOutput::ok(["Saving APP.class"])
            })
            .into_arc();
        let tool = ToolCommand::new("desugar", &["--input", "{input}", "--output", "{output}"]);
        let stage = DesugarStage::new(gateway).with_tool(tool);

        let tree = stage
            .run(&RunReport::new(), compiled(&layout, &["app"]))
            .await
            .unwrap()
            .into_payload()
            .unwrap();

        assert_eq!(tree.root, layout.desugar_dir());
        assert_eq!(tree.class_files, vec![layout.desugar_dir().join("APP.class")]);
    }

    #[tokio::test]
    async fn test_tool_error_line_fails_stage() {
        let dir = TempDir::new().unwrap();
        let gateway = ScriptedGateway::new()
            .respond("desugar", |_| ProcessOutput::ok(["Error! Failed to process APP.class"]))
            .into_arc();
        let stage = DesugarStage::new(gateway).with_tool(ToolCommand::new("desugar", &["{files}"]));
        let report = RunReport::new();

        let message = stage
            .run(&report, compiled(&BuildLayout::new(dir.path()), &["app"]))
            .await
            .unwrap();

        assert_eq!(message.status(), ExecutionStatus::Error);
        assert!(report.contains("Error! Failed to process"));
    }
}
