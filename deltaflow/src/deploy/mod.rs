//! Whole-run stages after compilation: merge and desugar the compiled
//! classes, package them, push the artifact and restart the application.

mod desugar;
mod device;
mod package;

pub use desugar::{merge_class_dirs, DesugarStage};
pub use device::{ApplicationTarget, PushStage, RestartStage};
pub use package::{compare_versions, newest_build_tools, PackageStage};

use crate::core::BuildLayout;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

const CLASS_EXTENSION: &str = "class";

/// A directory of class files ready for packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTree {
    /// The project's artifact layout.
    pub layout: BuildLayout,
    /// Root of the class tree.
    pub root: PathBuf,
    /// Every class file under `root`, sorted.
    pub class_files: Vec<PathBuf>,
}

/// The packaged artifact and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// The project's artifact layout.
    pub layout: BuildLayout,
    /// The artifact file.
    pub artifact: PathBuf,
}

/// Lists every class file under `dir`, sorted. A missing directory has none.
pub fn list_class_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for result in WalkBuilder::new(dir).standard_filters(false).build() {
        let entry = result.map_err(std::io::Error::other)?;
        if entry.file_type().is_some_and(|t| t.is_file())
            && entry.path().extension().is_some_and(|e| e == CLASS_EXTENSION)
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
