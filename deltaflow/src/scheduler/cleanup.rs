//! Stale artifact removal over the shared compile output area.

use crate::core::ChangeSet;
use crate::errors::DeltaflowError;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

const CLASS_EXTENSION: &str = "class";

/// What the cleanup pass kept and removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Class files kept.
    pub retained: usize,
    /// Entries deleted.
    pub removed: usize,
}

/// Returns true if a class file stem belongs to a changed source.
///
/// `Main` covers `Main`, nested classes such as `Main$Inner`, and the Kotlin
/// file facade `MainKt`.
#[must_use]
pub fn is_retained(stem: &str, base_names: &BTreeSet<String>) -> bool {
    let outer = stem.split('$').next().unwrap_or(stem);
    base_names.contains(outer)
        || outer
            .strip_suffix("Kt")
            .is_some_and(|base| base_names.contains(base))
}

/// Deletes every file under `compile_root` that is not a class file of a
/// changed source.
///
/// The pass is planned before anything is deleted: an entry that cannot be
/// read or is neither a file nor a directory aborts it untouched. Deletion
/// failures are collected and reported together.
pub fn cleanup_artifacts(
    compile_root: &Path,
    change_set: &ChangeSet,
) -> Result<CleanupSummary, DeltaflowError> {
    if !compile_root.is_dir() {
        return Ok(CleanupSummary::default());
    }

    let base_names = change_set.base_names();
    let mut problems = Vec::new();
    let mut doomed: Vec<PathBuf> = Vec::new();
    let mut retained = 0;

    for result in WalkBuilder::new(compile_root).standard_filters(false).build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                problems.push(e.to_string());
                continue;
            }
        };
        let Some(file_type) = entry.file_type() else {
            problems.push(format!("{}: unknown entry type", entry.path().display()));
            continue;
        };
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            problems.push(format!("{}: not a regular file", entry.path().display()));
            continue;
        }

        let path = entry.into_path();
        let keep = path.extension().is_some_and(|e| e == CLASS_EXTENSION)
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| is_retained(stem, &base_names));
        if keep {
            retained += 1;
        } else {
            doomed.push(path);
        }
    }

    if !problems.is_empty() {
        return Err(DeltaflowError::Cleanup { problems });
    }

    let removed = doomed.len();
    for path in doomed {
        debug!(path = %path.display(), "Removing stale artifact");
        if let Err(e) = std::fs::remove_file(&path) {
            problems.push(format!("{}: {e}", path.display()));
        }
    }
    if !problems.is_empty() {
        return Err(DeltaflowError::Cleanup { problems });
    }

    Ok(CleanupSummary { retained, removed })
}
