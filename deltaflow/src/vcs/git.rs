use super::VersionControl;
use crate::errors::DeltaflowError;
use crate::process::{Invocation, ProcessGateway};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// [`VersionControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    gateway: Arc<dyn ProcessGateway>,
    program: String,
}

impl GitCli {
    /// Creates a git client running `git` through the gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn ProcessGateway>) -> Self {
        Self {
            gateway,
            program: "git".to_string(),
        }
    }

    /// Overrides the git binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Invocation {
        Invocation::new(&self.program).env("LC_ALL", "C")
    }

    fn in_tree(&self, root: &Path) -> Invocation {
        self.command().arg("-C").arg(root.to_string_lossy())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    fn name(&self) -> &str {
        &self.program
    }

    async fn probe_binary(&self) -> bool {
        match self.gateway.execute(&self.command().arg("version")).await {
            Ok(output) => output
                .stdout
                .first()
                .is_some_and(|line| line.trim().starts_with("git version")),
            Err(e) => {
                debug!(error = %e, "git probe failed");
                false
            }
        }
    }

    async fn probe_repository(&self, root: &Path) -> bool {
        let invocation = self.in_tree(root).args(["rev-parse", "--is-inside-work-tree"]);
        match self.gateway.execute(&invocation).await {
            Ok(output) => output.stdout.first().is_some_and(|line| line.trim() == "true"),
            Err(e) => {
                debug!(error = %e, "repository probe failed");
                false
            }
        }
    }

    async fn status(&self, root: &Path) -> Result<Vec<String>, DeltaflowError> {
        let invocation = self
            .in_tree(root)
            .args(["-c", "core.quotePath=false", "status", "--untracked-files=all"]);
        let output = self.gateway.execute(&invocation).await?;
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::ScriptedGateway;

    #[tokio::test]
    async fn test_probes() {
        let gateway = ScriptedGateway::new()
            .respond("git", |inv| {
                if inv.args.first().map(String::as_str) == Some("version") {
                    ProcessOutput::ok(["git version 2.43.0"])
                } else {
                    ProcessOutput::ok(["true"])
                }
            })
            .into_arc();
        let git = GitCli::new(gateway.clone());

        assert!(git.probe_binary().await);
        assert!(git.probe_repository(Path::new("/p")).await);
        assert_eq!(gateway.calls()[1].args, vec!["-C", "/p", "rev-parse", "--is-inside-work-tree"]);
    }

    #[tokio::test]
    async fn test_status_is_unlocalized_and_unquoted() {
        let gateway = ScriptedGateway::new()
            .respond("git", |_| ProcessOutput::ok(["\tmodified:   app/src/Main.java"]))
            .into_arc();
        let git = GitCli::new(gateway.clone());

        let lines = git.status(Path::new("/p")).await.unwrap();

        assert_eq!(lines, vec!["\tmodified:   app/src/Main.java".to_string()]);
        let call = &gateway.calls()[0];
        assert_eq!(
            call.args,
            vec!["-C", "/p", "-c", "core.quotePath=false", "status", "--untracked-files=all"]
        );
        assert_eq!(call.env, vec![("LC_ALL".to_string(), "C".to_string())]);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let git = GitCli::new(ScriptedGateway::new().into_arc());

        assert!(!git.probe_binary().await);
        assert!(!git.probe_repository(Path::new("/p")).await);
        assert!(git.status(Path::new("/p")).await.is_err());
    }

    #[tokio::test]
    async fn test_not_a_repository() {
        let gateway = ScriptedGateway::new()
            .respond("git", |_| {
                ProcessOutput::failed(["fatal: not a git repository (or any of the parent directories): .git"])
            })
            .into_arc();
        let git = GitCli::new(gateway);

        assert!(!git.probe_repository(Path::new("/p")).await);
    }
}
