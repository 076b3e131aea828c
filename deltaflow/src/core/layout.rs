//! Deterministic build artifact layout.

use std::path::{Path, PathBuf};

const BUILD_DIR: &str = "build/deltaflow";
const COMPILE_DIR: &str = "compile";
const MERGED_DIR: &str = "merged";
const DESUGAR_DIR: &str = "desugar";
const PACKAGE_DIR: &str = "dex";
const PACKAGED_ARTIFACT: &str = "classes.dex";
const CACHE_DIR: &str = ".deltaflow";
const MODULE_CACHE_FILE: &str = "modules";

/// Every path the run writes, derived from the project root and module
/// names only, so re-running the pipeline lands in the same places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    project_root: PathBuf,
}

impl BuildLayout {
    /// Creates a layout rooted at the project root.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// The project root.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// `<root>/build/deltaflow`, wiped at the start of every run.
    #[must_use]
    pub fn build_root(&self) -> PathBuf {
        self.project_root.join(BUILD_DIR)
    }

    /// The shared hot-swap output area holding every module's classes.
    #[must_use]
    pub fn compile_root(&self) -> PathBuf {
        self.build_root().join(COMPILE_DIR)
    }

    /// A module's private compiled-output directory.
    #[must_use]
    pub fn compile_dir(&self, module_name: &str) -> PathBuf {
        self.compile_root().join(module_name)
    }

    /// Every compiled module's classes merged into one tree.
    #[must_use]
    pub fn merged_dir(&self) -> PathBuf {
        self.build_root().join(MERGED_DIR)
    }

    /// Output of the desugaring tool.
    #[must_use]
    pub fn desugar_dir(&self) -> PathBuf {
        self.build_root().join(DESUGAR_DIR)
    }

    /// Output directory of the packager.
    #[must_use]
    pub fn package_dir(&self) -> PathBuf {
        self.build_root().join(PACKAGE_DIR)
    }

    /// The packaged artifact pushed to the device.
    #[must_use]
    pub fn packaged_artifact(&self) -> PathBuf {
        self.package_dir().join(PACKAGED_ARTIFACT)
    }

    /// Default module cache location. Lives outside the build root so the
    /// per-run wipe keeps it.
    #[must_use]
    pub fn default_module_cache(&self) -> PathBuf {
        self.project_root.join(CACHE_DIR).join(MODULE_CACHE_FILE)
    }
}
