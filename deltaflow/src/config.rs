//! Configuration for an incremental run.
//!
//! Loading from property files or the command line belongs to the caller;
//! this module only defines the shape, defaults and validation. JSON is
//! accepted for convenience.

use crate::core::{BuildLayout, SourceKind};
use crate::errors::DeltaflowError;
use crate::process::ArgTemplate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on the compile worker pool.
pub const MAX_WORKERS: usize = 64;

/// Java classpath separator.
pub const CLASSPATH_SEPARATOR: &str = ":";

/// An external program and its argument template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Program name or path.
    pub program: String,
    /// Argument template.
    pub args: ArgTemplate,
}

impl ToolCommand {
    /// Creates a tool command.
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: ArgTemplate::from_args(args),
        }
    }
}

fn default_javac() -> ToolCommand {
    ToolCommand::new(
        "javac",
        &[
            "-d", "{output}", "-source", "1.8", "-target", "1.8", "-encoding", "UTF-8", "-g",
            "-cp", "{classpath}", "{files}",
        ],
    )
}

fn default_kotlinc() -> ToolCommand {
    ToolCommand::new(
        "kotlinc",
        &[
            "-d",
            "{output}",
            "-Xallow-no-source-files",
            "-jvm-target",
            "11",
            "-no-reflect",
            "-no-stdlib",
            "-classpath",
            "{classpath}",
            "{files}",
        ],
    )
}

fn default_d8_args() -> ArgTemplate {
    ArgTemplate::from_args(&["--output", "{output}", "{files}"])
}

fn default_push_args() -> ArgTemplate {
    ArgTemplate::from_args(&["push", "{artifact}", "{device_path}/delta.dex"])
}

fn default_force_stop_args() -> ArgTemplate {
    ArgTemplate::from_args(&["shell", "am", "force-stop", "{package}"])
}

fn default_start_args() -> ArgTemplate {
    ArgTemplate::from_args(&[
        "shell",
        "am",
        "start",
        "-n",
        "{package}/{activity}",
        "-a",
        "android.intent.action.MAIN",
        "-c",
        "android.intent.category.LAUNCHER",
    ])
}

/// Per-tool programs and argument templates.
///
/// Templates understand `{output}`, `{classpath}`, `{files}`, `{artifact}`,
/// `{device_path}`, `{package}` and `{activity}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Java compiler.
    #[serde(default = "default_javac")]
    pub javac: ToolCommand,
    /// Kotlin compiler.
    #[serde(default = "default_kotlinc")]
    pub kotlinc: ToolCommand,
    /// Optional desugaring tool run over the merged classes.
    #[serde(default)]
    pub desugar: Option<ToolCommand>,
    /// Arguments for `d8`, which is located in the SDK build tools.
    #[serde(default = "default_d8_args")]
    pub d8_args: ArgTemplate,
    /// adb override. Defaults to the SDK's `platform-tools/adb`.
    #[serde(default)]
    pub adb: Option<String>,
    /// Arguments pushing the packaged artifact.
    #[serde(default = "default_push_args")]
    pub push_args: ArgTemplate,
    /// Arguments stopping the application.
    #[serde(default = "default_force_stop_args")]
    pub force_stop_args: ArgTemplate,
    /// Arguments launching the application.
    #[serde(default = "default_start_args")]
    pub start_args: ArgTemplate,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            javac: default_javac(),
            kotlinc: default_kotlinc(),
            desugar: None,
            d8_args: default_d8_args(),
            adb: None,
            push_args: default_push_args(),
            force_stop_args: default_force_stop_args(),
            start_args: default_start_args(),
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(8)
}

fn default_true() -> bool {
    true
}

fn default_supported_kinds() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}

fn default_device_path() -> String {
    "/sdcard/deltaflow".to_string()
}

/// Configuration for an [`IncrementalRun`](crate::run::IncrementalRun).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaflowConfig {
    /// Root of the project being built.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// External classpath entries (platform jar, libraries).
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
    /// Size of the compile worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Module cache file. Defaults to `<root>/.deltaflow/modules`.
    #[serde(default)]
    pub module_cache: Option<PathBuf>,
    /// Whether the module cache is read and written.
    #[serde(default = "default_true")]
    pub use_module_cache: bool,
    /// Source kinds compiled incrementally.
    #[serde(default = "default_supported_kinds")]
    pub supported_kinds: Vec<SourceKind>,
    /// Android SDK location.
    #[serde(default)]
    pub android_sdk: Option<PathBuf>,
    /// Application package to restart.
    #[serde(default)]
    pub application_id: Option<String>,
    /// Activity launched after the push.
    #[serde(default)]
    pub launcher_activity: Option<String>,
    /// Directory on the device receiving the packaged artifact.
    #[serde(default = "default_device_path")]
    pub device_path: String,
    /// Stop before packaging when any module fails to compile.
    #[serde(default = "default_true")]
    pub block_deploy_on_failure: bool,
    /// External tools.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

impl Default for DeltaflowConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            classpath: Vec::new(),
            workers: default_workers(),
            module_cache: None,
            use_module_cache: true,
            supported_kinds: default_supported_kinds(),
            android_sdk: None,
            application_id: None,
            launcher_activity: None,
            device_path: default_device_path(),
            block_deploy_on_failure: true,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl DeltaflowConfig {
    /// Creates a configuration for a project root with defaults.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Parses JSON and validates the result.
    pub fn from_json_str(json: &str) -> Result<Self, DeltaflowError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DeltaflowError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON file and validates the result.
    pub fn from_json_file(path: &Path) -> Result<Self, DeltaflowError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| DeltaflowError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Adds an external classpath entry.
    #[must_use]
    pub fn with_classpath_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.classpath.push(entry.into());
        self
    }

    /// Sets the module cache file.
    #[must_use]
    pub fn with_module_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_cache = Some(path.into());
        self
    }

    /// Enables or disables the module cache.
    #[must_use]
    pub fn with_use_module_cache(mut self, enabled: bool) -> Self {
        self.use_module_cache = enabled;
        self
    }

    /// Sets the supported source kinds.
    #[must_use]
    pub fn with_supported_kinds(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.supported_kinds = kinds.into_iter().collect();
        self
    }

    /// Sets the Android SDK location.
    #[must_use]
    pub fn with_android_sdk(mut self, sdk: impl Into<PathBuf>) -> Self {
        self.android_sdk = Some(sdk.into());
        self
    }

    /// Sets the application package and launcher activity.
    #[must_use]
    pub fn with_application(mut self, package: impl Into<String>, activity: impl Into<String>) -> Self {
        self.application_id = Some(package.into());
        self.launcher_activity = Some(activity.into());
        self
    }

    /// Sets the device directory receiving the artifact.
    #[must_use]
    pub fn with_device_path(mut self, path: impl Into<String>) -> Self {
        self.device_path = path.into();
        self
    }

    /// Sets whether a failed module stops the run before packaging.
    #[must_use]
    pub fn with_block_deploy_on_failure(mut self, block: bool) -> Self {
        self.block_deploy_on_failure = block;
        self
    }

    /// Replaces the toolchain.
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: ToolchainConfig) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// The build artifact layout of the project.
    #[must_use]
    pub fn layout(&self) -> BuildLayout {
        BuildLayout::new(&self.project_root)
    }

    /// The module cache file in effect, if caching is enabled.
    #[must_use]
    pub fn module_cache_path(&self) -> Option<PathBuf> {
        self.use_module_cache.then(|| {
            self.module_cache
                .clone()
                .unwrap_or_else(|| self.layout().default_module_cache())
        })
    }

    /// The external classpath as one separator-joined string.
    #[must_use]
    pub fn external_classpath(&self) -> Vec<String> {
        self.classpath
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    /// The adb program: the override, the SDK's copy, or `adb` on the path.
    #[must_use]
    pub fn adb_program(&self) -> String {
        if let Some(adb) = &self.toolchain.adb {
            return adb.clone();
        }
        self.android_sdk.as_ref().map_or_else(
            || "adb".to_string(),
            |sdk| sdk.join("platform-tools/adb").to_string_lossy().into_owned(),
        )
    }

    /// Checks the configuration for values no run could use.
    pub fn validate(&self) -> Result<(), DeltaflowError> {
        if self.project_root.as_os_str().is_empty() {
            return Err(DeltaflowError::Config("project_root must not be empty".into()));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(DeltaflowError::Config(format!(
                "workers must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.supported_kinds.is_empty() {
            return Err(DeltaflowError::Config("supported_kinds must not be empty".into()));
        }
        if self.device_path.trim().is_empty() {
            return Err(DeltaflowError::Config("device_path must not be empty".into()));
        }
        for (name, tool) in [("javac", &self.toolchain.javac), ("kotlinc", &self.toolchain.kotlinc)] {
            if tool.program.trim().is_empty() {
                return Err(DeltaflowError::Config(format!("{name} program must not be empty")));
            }
            if !tool.args.0.iter().any(|a| a == "{files}") {
                return Err(DeltaflowError::Config(format!(
                    "{name} arguments must contain a {{files}} entry"
                )));
            }
        }
        if self.application_id.is_some() != self.launcher_activity.is_some() {
            return Err(DeltaflowError::Config(
                "application_id and launcher_activity must be set together".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DeltaflowConfig::new("/p");

        assert!(config.validate().is_ok());
        assert!((1..=8).contains(&config.workers));
        assert!(config.block_deploy_on_failure);
        assert_eq!(config.device_path, "/sdcard/deltaflow");
        assert_eq!(config.module_cache_path(), Some(PathBuf::from("/p/.deltaflow/modules")));
        assert_eq!(config.adb_program(), "adb");
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = DeltaflowConfig::from_json_str(
            r#"{
                "project_root": "/work/app",
                "workers": 3,
                "android_sdk": "/opt/sdk",
                "supported_kinds": ["java"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.supported_kinds, vec![SourceKind::Java]);
        assert_eq!(config.toolchain, ToolchainConfig::default());
        assert_eq!(config.adb_program(), "/opt/sdk/platform-tools/adb");
    }

    #[test]
    fn test_worker_bounds() {
        assert!(DeltaflowConfig::new("/p").with_workers(0).validate().is_err());
        assert!(DeltaflowConfig::new("/p").with_workers(MAX_WORKERS + 1).validate().is_err());
        assert!(DeltaflowConfig::new("/p").with_workers(MAX_WORKERS).validate().is_ok());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = DeltaflowConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, DeltaflowError::Config(_)));

        let err = DeltaflowConfig::from_json_str(r#"{"workers": 0}"#).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_compiler_template_needs_files() {
        let mut toolchain = ToolchainConfig::default();
        toolchain.javac = ToolCommand::new("javac", &["-d", "{output}"]);

        let err = DeltaflowConfig::new("/p").with_toolchain(toolchain).validate().unwrap_err();
        assert!(err.to_string().contains("{files}"));
    }

    #[test]
    fn test_application_fields_go_together() {
        let mut config = DeltaflowConfig::new("/p");
        config.application_id = Some("com.example".into());

        assert!(config.validate().is_err());
        assert!(config.with_application("com.example", ".Main").validate().is_ok());
    }

    #[test]
    fn test_cache_can_be_disabled() {
        let config = DeltaflowConfig::new("/p").with_use_module_cache(false);
        assert_eq!(config.module_cache_path(), None);
    }
}
