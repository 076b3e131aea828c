//! Per-module change sets and supported source kinds.

use super::Module;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// A source-file kind the incremental build knows how to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `.java` sources, compiled with javac.
    Java,
    /// `.kt` sources, compiled with kotlinc.
    Kotlin,
}

impl SourceKind {
    /// All kinds, in compile order.
    pub const ALL: [Self; 2] = [Self::Kotlin, Self::Java];

    /// Returns the file extension without the dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Kotlin => "kt",
        }
    }

    /// Classifies a path by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "java" => Some(Self::Java),
            "kt" => Some(Self::Kotlin),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Java => write!(f, "java"),
            Self::Kotlin => write!(f, "kotlin"),
        }
    }
}

/// Immutable mapping from module to the changed files it owns.
///
/// Built once per run and consumed immediately; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: BTreeMap<Module, BTreeSet<PathBuf>>,
}

impl ChangeSet {
    /// Starts building a change set.
    #[must_use]
    pub fn builder() -> ChangeSetBuilder {
        ChangeSetBuilder::default()
    }

    /// Returns true if no module has changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of affected modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of changed files across all modules.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    /// Returns the affected modules.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.entries.keys()
    }

    /// Returns the files owned by a module.
    #[must_use]
    pub fn files(&self, module: &Module) -> Option<&BTreeSet<PathBuf>> {
        self.entries.get(module)
    }

    /// Iterates over `(module, files)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Module, &BTreeSet<PathBuf>)> {
        self.entries.iter()
    }

    /// Returns every changed file.
    pub fn all_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.values().flatten()
    }

    /// Returns the file stems of every changed file, e.g. `Main` for
    /// `app/src/Main.java`.
    #[must_use]
    pub fn base_names(&self) -> BTreeSet<String> {
        self.all_files()
            .filter_map(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect()
    }
}

/// Accumulates a [`ChangeSet`].
#[derive(Debug, Default)]
pub struct ChangeSetBuilder {
    entries: BTreeMap<Module, BTreeSet<PathBuf>>,
}

impl ChangeSetBuilder {
    /// Adds a file to a module. Returns false if it was already present.
    pub fn insert(&mut self, module: &Module, file: impl Into<PathBuf>) -> bool {
        self.entries
            .entry(module.clone())
            .or_default()
            .insert(file.into())
    }

    /// Adds a file, builder style.
    #[must_use]
    pub fn with_file(mut self, module: &Module, file: impl Into<PathBuf>) -> Self {
        self.insert(module, file);
        self
    }

    /// Finishes the change set.
    #[must_use]
    pub fn build(self) -> ChangeSet {
        ChangeSet {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> Module {
        Module::new(name, format!("/p/{name}"), None, "debug")
    }

    #[test]
    fn test_source_kind_from_path() {
        assert_eq!(SourceKind::from_path(Path::new("a/B.java")), Some(SourceKind::Java));
        assert_eq!(SourceKind::from_path(Path::new("a/B.kt")), Some(SourceKind::Kotlin));
        assert_eq!(SourceKind::from_path(Path::new("a/layout.xml")), None);
        assert_eq!(SourceKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_builder_deduplicates_files() {
        let app = module("app");
        let mut builder = ChangeSet::builder();

        assert!(builder.insert(&app, "/p/app/Main.java"));
        assert!(!builder.insert(&app, "/p/app/Main.java"));

        let changes = builder.build();
        assert_eq!(changes.module_count(), 1);
        assert_eq!(changes.file_count(), 1);
    }

    #[test]
    fn test_base_names() {
        let changes = ChangeSet::builder()
            .with_file(&module("app"), "/p/app/src/Main.java")
            .with_file(&module("core"), "/p/core/src/Util.kt")
            .build();

        let names: Vec<_> = changes.base_names().into_iter().collect();
        assert_eq!(names, vec!["Main".to_string(), "Util".to_string()]);
    }

    #[test]
    fn test_empty_change_set() {
        let changes = ChangeSet::default();

        assert!(changes.is_empty());
        assert_eq!(changes.file_count(), 0);
        assert!(changes.files(&module("app")).is_none());
    }
}
