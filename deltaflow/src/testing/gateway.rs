//! Scripted [`ProcessGateway`] for tests.

use crate::errors::DeltaflowError;
use crate::process::{Invocation, ProcessGateway, ProcessOutput};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Handler = Arc<dyn Fn(&Invocation) -> ProcessOutput + Send + Sync>;

/// A gateway answering each program with a scripted handler and recording
/// every invocation.
///
/// Handlers are looked up by the exact program first, then by its file name,
/// so `"d8"` also answers `/sdk/build-tools/34.0.0/d8`. A program without a
/// handler behaves as if it were not installed.
#[derive(Default)]
pub struct ScriptedGateway {
    handlers: BTreeMap<String, Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedGateway {
    /// Creates a gateway with no programs installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `program`, answering every invocation with `handler`.
    #[must_use]
    pub fn respond<F>(mut self, program: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation) -> ProcessOutput + Send + Sync + 'static,
    {
        self.handlers.insert(program.into(), Arc::new(handler));
        self
    }

    /// Wraps the gateway for sharing.
    #[must_use]
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every invocation so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    /// Invocations of one program, matched like handlers are.
    #[must_use]
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .lock()
            .iter()
            .filter(|inv| inv.program == program || file_name(&inv.program) == program)
            .cloned()
            .collect()
    }

    fn handler(&self, program: &str) -> Option<&Handler> {
        self.handlers
            .get(program)
            .or_else(|| self.handlers.get(file_name(program)))
    }
}

impl fmt::Debug for ScriptedGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedGateway")
            .field("programs", &self.handlers.keys().collect::<Vec<_>>())
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

fn file_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program)
}

#[async_trait]
impl ProcessGateway for ScriptedGateway {
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput, DeltaflowError> {
        self.calls.lock().push(invocation.clone());
        let handler = self
            .handler(&invocation.program)
            .ok_or_else(|| DeltaflowError::tool_missing(&invocation.program))?;
        Ok(handler(invocation))
    }

    async fn probe(&self, program: &str) -> bool {
        self.handler(program).is_some()
    }
}

/// The value following `flag` in an invocation's arguments.
#[must_use]
pub fn flag_value<'a>(invocation: &'a Invocation, flag: &str) -> Option<&'a str> {
    invocation
        .args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| invocation.args.get(i + 1))
        .map(String::as_str)
}

/// Source files among an invocation's arguments.
#[must_use]
pub fn source_args(invocation: &Invocation) -> Vec<PathBuf> {
    invocation
        .args
        .iter()
        .filter(|a| a.ends_with(".java") || a.ends_with(".kt"))
        .map(PathBuf::from)
        .collect()
}

/// A compiler handler writing one `<Stem>.class` per source into the `-d`
/// directory, as a real compiler would.
#[must_use]
pub fn emit_classes(invocation: &Invocation) -> ProcessOutput {
    let Some(output) = flag_value(invocation, "-d") else {
        return ProcessOutput::failed(["error: no output directory"]);
    };
    let output = PathBuf::from(output);
    if let Err(e) = std::fs::create_dir_all(&output) {
        return ProcessOutput::failed([format!("error: {e}")]);
    }
    for source in source_args(invocation) {
        let Some(stem) = source.file_stem() else {
            continue;
        };
        let class = output.join(format!("{}.class", stem.to_string_lossy()));
        if let Err(e) = std::fs::write(&class, b"\xca\xfe\xba\xbe") {
            return ProcessOutput::failed([format!("error: {e}")]);
        }
    }
    ProcessOutput::ok(Vec::<String>::new())
}

/// A d8 handler writing `classes.dex` into the `--output` directory.
#[must_use]
pub fn emit_dex(invocation: &Invocation) -> ProcessOutput {
    let Some(output) = flag_value(invocation, "--output") else {
        return ProcessOutput::failed(["Error: no output directory"]);
    };
    let output = PathBuf::from(output);
    match std::fs::create_dir_all(&output).and_then(|()| std::fs::write(output.join("classes.dex"), b"dex\n035\0")) {
        Ok(()) => ProcessOutput::ok(Vec::<String>::new()),
        Err(e) => ProcessOutput::failed([format!("Error: {e}")]),
    }
}

/// An adb handler accepting pushes and activity manager commands.
#[must_use]
pub fn adb_device(invocation: &Invocation) -> ProcessOutput {
    match invocation.args.first().map(String::as_str) {
        Some("push") => ProcessOutput::ok(["/tmp/classes.dex: 1 file pushed, 0 skipped. 1.2 MB/s (2048 bytes in 0.002s)"]),
        Some("shell") if invocation.args.iter().any(|a| a == "start") => {
            ProcessOutput::ok(["Starting: Intent { cmp=com.example/.MainActivity }"])
        }
        _ => ProcessOutput::ok(Vec::<String>::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_program_is_missing() {
        let gateway = ScriptedGateway::new();

        assert!(!gateway.probe("javac").await);
        let err = gateway.execute(&Invocation::new("javac")).await.unwrap_err();
        assert!(matches!(err, DeltaflowError::ToolMissing { .. }));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_handler_matches_file_name() {
        let gateway = ScriptedGateway::new().respond("d8", |_| ProcessOutput::ok(["done"]));

        let output = gateway
            .execute(&Invocation::new("/sdk/build-tools/34.0.0/d8"))
            .await
            .unwrap();

        assert_eq!(output.stdout, vec!["done"]);
        assert_eq!(gateway.calls_to("d8").len(), 1);
    }

    #[test]
    fn test_emit_classes_writes_one_class_per_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        let out_arg = out.to_string_lossy().into_owned();
        let invocation = Invocation::new("javac")
            .args(["-d", out_arg.as_str(), "/p/app/src/Main.java", "/p/app/src/Util.kt"]);

        assert!(emit_classes(&invocation).exited_cleanly());
        assert!(out.join("Main.class").is_file());
        assert!(out.join("Util.class").is_file());
    }
}
