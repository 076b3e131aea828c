use super::{Stage, StagePurpose};
use crate::core::{BuildLayout, StageMessage};
use crate::errors::DeltaflowError;
use crate::report::RunReport;
use async_trait::async_trait;

/// First stage of every run: checks the project root and wipes the build
/// root so the run starts from a clean output area.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupProjectStage;

#[async_trait]
impl Stage for SetupProjectStage {
    type Input = BuildLayout;
    type Output = BuildLayout;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::SetupProject
    }

    async fn run(
        &self,
        report: &RunReport,
        layout: BuildLayout,
    ) -> anyhow::Result<StageMessage<BuildLayout>> {
        let root = layout.project_root();
        if !tokio::fs::metadata(root).await.map(|m| m.is_dir()).unwrap_or(false) {
            let err = DeltaflowError::InvalidProjectRoot {
                path: root.to_path_buf(),
            };
            report.error(err.to_string());
            return Ok(err.into());
        }
        report.info(format!("Project base directory: {}", root.display()));

        let build_root = layout.build_root();
        if tokio::fs::try_exists(&build_root).await? {
            report.info(format!("Cleaning up build directory: {}", build_root.display()));
            if let Err(e) = tokio::fs::remove_dir_all(&build_root).await {
                let description = format!("Failed to remove build directory: {e}");
                report.error(&description);
                return Ok(StageMessage::error(description));
            }
        } else {
            report.info(format!("No build directory found: {}", build_root.display()));
        }

        Ok(StageMessage::success(layout))
    }
}
