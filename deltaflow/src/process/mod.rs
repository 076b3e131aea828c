//! External process gateway.
//!
//! Every external tool (git, compilers, dexer, adb) is reached through the
//! [`ProcessGateway`] trait. The core only sees captured output lines; the
//! per-tool heuristics that read those lines live in [`signals`].

pub mod signals;
mod system;
mod template;

pub use system::SystemProcessGateway;
pub use template::{ArgTemplate, TemplateVars};

use crate::errors::DeltaflowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::path::PathBuf;

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory, if not inherited.
    pub working_dir: Option<PathBuf>,
    /// Environment variables set on top of the inherited environment.
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Creates an invocation without arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Standard output, split into lines.
    pub stdout: Vec<String>,
    /// Standard error, split into lines.
    pub stderr: Vec<String>,
    /// Exit code, absent if the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// A successful process that printed `stdout`.
    #[must_use]
    pub fn ok<I, S>(stdout: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stdout: stdout.into_iter().map(Into::into).collect(),
            stderr: Vec::new(),
            exit_code: Some(0),
        }
    }

    /// A failed process that printed `stderr`.
    #[must_use]
    pub fn failed<I, S>(stderr: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into_iter().map(Into::into).collect(),
            exit_code: Some(1),
        }
    }

    /// Both channels, stderr first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stderr.iter().chain(self.stdout.iter()).map(String::as_str)
    }

    /// Returns true if the process exited with code 0.
    #[must_use]
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external tools.
///
/// Implementations must not impose a timeout: a hung tool blocks its caller.
#[async_trait]
pub trait ProcessGateway: Send + Sync + Debug {
    /// Runs an invocation to completion and captures its output.
    ///
    /// Fails with [`DeltaflowError::ToolMissing`] when the program cannot be
    /// started. A non-zero exit code is not an error here; callers read the
    /// output through the matching [`signals`] function.
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput, DeltaflowError>;

    /// Returns true if the program can be started.
    async fn probe(&self, program: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation::new("git").args(["-C", "/p", "status"]);
        assert_eq!(invocation.to_string(), "git -C /p status");
    }

    #[test]
    fn test_lines_lists_stderr_first() {
        let output = ProcessOutput {
            stdout: vec!["out".into()],
            stderr: vec!["err".into()],
            exit_code: Some(0),
        };

        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["err", "out"]);
        assert!(output.exited_cleanly());
        assert!(!ProcessOutput::failed(["x"]).exited_cleanly());
    }
}
