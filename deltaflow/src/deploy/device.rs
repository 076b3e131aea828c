use super::PackagedArtifact;
use crate::config::DeltaflowConfig;
use crate::core::StageMessage;
use crate::errors::DeltaflowError;
use crate::process::signals::{adb_push_succeeded, am_failures};
use crate::process::{ArgTemplate, Invocation, ProcessGateway, ProcessOutput, TemplateVars};
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use std::sync::Arc;

/// The application restarted after a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationTarget {
    /// Application package, e.g. `com.example`.
    pub package: String,
    /// Launcher activity, e.g. `.MainActivity`.
    pub activity: String,
}

impl ApplicationTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(package: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            activity: activity.into(),
        }
    }

    fn from_config(config: &DeltaflowConfig) -> Option<Self> {
        match (&config.application_id, &config.launcher_activity) {
            (Some(package), Some(activity)) => Some(Self::new(package, activity)),
            _ => None,
        }
    }
}

/// Pushes the packaged artifact to the device.
#[derive(Debug, Clone)]
pub struct PushStage {
    gateway: Arc<dyn ProcessGateway>,
    adb: String,
    args: ArgTemplate,
    device_path: String,
}

impl PushStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ProcessGateway>,
        adb: impl Into<String>,
        args: ArgTemplate,
        device_path: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            adb: adb.into(),
            args,
            device_path: device_path.into(),
        }
    }

    /// Creates the stage from a run configuration.
    #[must_use]
    pub fn from_config(config: &DeltaflowConfig, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self::new(
            gateway,
            config.adb_program(),
            config.toolchain.push_args.clone(),
            config.device_path.clone(),
        )
    }
}

#[async_trait]
impl Stage for PushStage {
    type Input = PackagedArtifact;
    type Output = PackagedArtifact;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::Push
    }

    async fn run(
        &self,
        report: &RunReport,
        packaged: PackagedArtifact,
    ) -> anyhow::Result<StageMessage<PackagedArtifact>> {
        let vars = TemplateVars::new()
            .set_path("artifact", &packaged.artifact)
            .set("device_path", self.device_path.as_str());
        let invocation = Invocation::new(&self.adb).args(self.args.render(&vars));
        report.info(format!("Pushing {} to {}", packaged.artifact.display(), self.device_path));

        let output = match self.gateway.execute(&invocation).await {
            Ok(output) => output,
            Err(e) => {
                report.error(e.to_string());
                return Ok(e.into());
            }
        };

        if !adb_push_succeeded(&output) {
            for line in output.lines() {
                report.error(line);
            }
            let err = DeltaflowError::deployment("push did not report any transferred file");
            report.error(err.to_string());
            return Ok(err.into());
        }
        report.info("Changes pushed to the device");
        Ok(StageMessage::success(packaged))
    }
}

/// Stops and relaunches the application so it loads the pushed classes.
///
/// Without a configured application the stage only warns.
#[derive(Debug, Clone)]
pub struct RestartStage {
    gateway: Arc<dyn ProcessGateway>,
    adb: String,
    application: Option<ApplicationTarget>,
    force_stop_args: ArgTemplate,
    start_args: ArgTemplate,
}

impl RestartStage {
    /// Creates the stage with the given command templates.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ProcessGateway>,
        adb: impl Into<String>,
        application: Option<ApplicationTarget>,
        force_stop_args: ArgTemplate,
        start_args: ArgTemplate,
    ) -> Self {
        Self {
            gateway,
            adb: adb.into(),
            application,
            force_stop_args,
            start_args,
        }
    }

    /// Creates the stage from a run configuration.
    #[must_use]
    pub fn from_config(config: &DeltaflowConfig, gateway: Arc<dyn ProcessGateway>) -> Self {
        Self::new(
            gateway,
            config.adb_program(),
            ApplicationTarget::from_config(config),
            config.toolchain.force_stop_args.clone(),
            config.toolchain.start_args.clone(),
        )
    }

    async fn am(&self, template: &ArgTemplate, vars: &TemplateVars) -> Result<ProcessOutput, DeltaflowError> {
        let invocation = Invocation::new(&self.adb).args(template.render(vars));
        let output = self.gateway.execute(&invocation).await?;
        let failures = am_failures(&output);
        if failures.is_empty() {
            Ok(output)
        } else {
            Err(DeltaflowError::deployment(failures.join("; ")))
        }
    }
}

#[async_trait]
impl Stage for RestartStage {
    type Input = PackagedArtifact;
    type Output = PackagedArtifact;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::Restart
    }

    async fn run(
        &self,
        report: &RunReport,
        packaged: PackagedArtifact,
    ) -> anyhow::Result<StageMessage<PackagedArtifact>> {
        let Some(app) = &self.application else {
            report.warn("No application configured, skipping restart");
            return Ok(StageMessage::success(packaged));
        };

        let vars = TemplateVars::new()
            .set("package", app.package.as_str())
            .set("activity", app.activity.as_str());

        report.info(format!("Stopping {}", app.package));
        if let Err(e) = self.am(&self.force_stop_args, &vars).await {
            report.error(e.to_string());
            return Ok(e.into());
        }

        report.info(format!("Launching {}/{}", app.package, app.activity));
        if let Err(e) = self.am(&self.start_args, &vars).await {
            report.error(e.to_string());
            return Ok(e.into());
        }

        Ok(StageMessage::success(packaged))
    }
}
