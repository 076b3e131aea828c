use super::{Invocation, ProcessGateway, ProcessOutput};
use crate::errors::DeltaflowError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs invocations as real child processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessGateway;

impl SystemProcessGateway {
    /// Creates a new gateway.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ProcessGateway for SystemProcessGateway {
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput, DeltaflowError> {
        debug!(command = %invocation, "Executing");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                DeltaflowError::tool_missing(&invocation.program)
            }
            _ => DeltaflowError::Io(e),
        })?;

        Ok(ProcessOutput {
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
            exit_code: output.status.code(),
        })
    }

    async fn probe(&self, program: &str) -> bool {
        Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_tool_missing() {
        let gateway = SystemProcessGateway::new();
        let err = gateway
            .execute(&Invocation::new("deltaflow-no-such-tool"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeltaflowError::ToolMissing { .. }));
        assert!(!gateway.probe("deltaflow-no-such-tool").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_both_channels() {
        let gateway = SystemProcessGateway::new();
        let output = gateway
            .execute(&Invocation::new("sh").args(["-c", "echo out; echo err 1>&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.stdout, vec!["out".to_string()]);
        assert_eq!(output.stderr, vec!["err".to_string()]);
        assert_eq!(output.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sets_environment() {
        let gateway = SystemProcessGateway::new();
        let output = gateway
            .execute(
                &Invocation::new("sh")
                    .args(["-c", "echo $DELTAFLOW_TEST_VAR"])
                    .env("DELTAFLOW_TEST_VAR", "set"),
            )
            .await
            .unwrap();

        assert_eq!(output.stdout, vec!["set".to_string()]);
    }
}
