use super::{ClassTree, PackagedArtifact};
use crate::config::DeltaflowConfig;
use crate::core::StageMessage;
use crate::errors::DeltaflowError;
use crate::process::signals::d8_failures;
use crate::process::{ArgTemplate, Invocation, ProcessGateway, TemplateVars};
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BUILD_TOOLS_DIR: &str = "build-tools";
const DEXER: &str = "d8";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionPart<'a> {
    Number(u64),
    Text(&'a str),
}

fn version_parts(version: &str) -> Vec<VersionPart<'_>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = version.as_bytes();
    while start < bytes.len() {
        let numeric = bytes[start].is_ascii_digit();
        let end = bytes[start..]
            .iter()
            .position(|b| b.is_ascii_digit() != numeric)
            .map_or(bytes.len(), |offset| start + offset);
        let chunk = &version[start..end];
        parts.push(match chunk.parse() {
            Ok(n) if numeric => VersionPart::Number(n),
            _ => VersionPart::Text(chunk),
        });
        start = end;
    }
    parts
}

/// Orders version directory names naturally: `9.0.0 < 28.0.3 < 30.0.2`.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_parts(a).cmp(&version_parts(b))
}

/// The newest `build-tools/<version>` directory of an Android SDK.
pub fn newest_build_tools(sdk: &Path) -> Result<PathBuf, DeltaflowError> {
    let build_tools = sdk.join(BUILD_TOOLS_DIR);
    let entries = std::fs::read_dir(&build_tools)
        .map_err(|_| DeltaflowError::tool_missing(build_tools.display().to_string()))?;

    let mut versions: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            versions.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }

    versions
        .into_iter()
        .max_by(|(a, _), (b, _)| compare_versions(a, b))
        .map(|(_, path)| path)
        .ok_or_else(|| {
            DeltaflowError::tool_missing(format!("Android SDK build tools in {}", build_tools.display()))
        })
}

/// Converts the class tree into the device format with the SDK's `d8`.
#[derive(Debug, Clone)]
pub struct PackageStage {
    gateway: Arc<dyn ProcessGateway>,
    android_sdk: Option<PathBuf>,
    args: ArgTemplate,
}

impl PackageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(gateway: Arc<dyn ProcessGateway>, android_sdk: Option<PathBuf>, args: ArgTemplate) -> Self {
        Self {
            gateway,
            android_sdk,
            args,
        }
    }

    /// Creates the stage from a run configuration.
    #[must_use]
    pub fn from_config(config: &DeltaflowConfig, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self::new(gateway, config.android_sdk.clone(), config.toolchain.d8_args.clone())
    }

    async fn package(&self, report: &RunReport, tree: &ClassTree) -> Result<PathBuf, DeltaflowError> {
        let sdk = self
            .android_sdk
            .as_deref()
            .ok_or_else(|| DeltaflowError::tool_missing("Android SDK (android_sdk is not set)"))?;
        report.info(format!("Android SDK: {}", sdk.display()));

        let build_tools = newest_build_tools(sdk)?;
        report.info(format!("Using build tools {}", build_tools.display()));
        let dexer = build_tools.join(DEXER);

        let package_dir = tree.layout.package_dir();
        tokio::fs::create_dir_all(&package_dir).await?;

        let vars = TemplateVars::new()
            .set_path("output", &package_dir)
            .files(&tree.class_files);
        let invocation = Invocation::new(dexer.to_string_lossy())
            .args(self.args.render(&vars))
            .current_dir(&tree.root);
        let output = self.gateway.execute(&invocation).await?;

        let failures = d8_failures(&output);
        if !failures.is_empty() {
            for line in &failures {
                report.error(line);
            }
            return Err(DeltaflowError::deployment(format!("{DEXER} reported {} error(s)", failures.len())));
        }

        let artifact = tree.layout.packaged_artifact();
        if !tokio::fs::try_exists(&artifact).await? {
            return Err(DeltaflowError::deployment(format!(
                "{DEXER} produced no artifact at {}",
                artifact.display()
            )));
        }
        Ok(artifact)
    }
}

#[async_trait]
impl Stage for PackageStage {
    type Input = ClassTree;
    type Output = PackagedArtifact;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::Package
    }

    async fn run(&self, report: &RunReport, tree: ClassTree) -> anyhow::Result<StageMessage<PackagedArtifact>> {
        match self.package(report, &tree).await {
            Ok(artifact) => {
                report.info(format!("Packaged {}", artifact.display()));
                Ok(StageMessage::success(PackagedArtifact {
                    layout: tree.layout,
                    artifact,
                }))
            }
            Err(e) => {
                report.error(e.to_string());
                Ok(e.into())
            }
        }
    }
}
