//! On-disk module cache: one `name:sourceRoot:outputPath:variant` record
//! per line.
//!
//! Paths containing `:` cannot be represented; such modules are never
//! written, so a cache that exists always reads back.

use crate::core::Module;
use crate::errors::{CacheParseError, DeltaflowError};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes the module cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCache {
    path: PathBuf,
}

impl ModuleCache {
    /// Creates a cache backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached modules.
    ///
    /// Returns `Ok(None)` if the file does not exist. Any malformed line
    /// fails the whole read; blank lines are skipped.
    pub fn read(&self) -> Result<Option<Vec<Module>>, DeltaflowError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let modules = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                Module::decode(line.trim())
                    .ok_or_else(|| CacheParseError::new(&self.path, index + 1, line).into())
            })
            .collect::<Result<Vec<_>, DeltaflowError>>()?;

        debug!(path = %self.path.display(), modules = modules.len(), "Module cache read");
        Ok(Some(modules))
    }

    /// Writes the modules, replacing any previous cache.
    ///
    /// Fails without touching the file if any module cannot be encoded.
    pub fn write(&self, modules: &[Module]) -> Result<(), DeltaflowError> {
        let mut content = String::new();
        for module in modules {
            let record = module.encode().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("module '{}' has a path containing ':'", module.name),
                )
            })?;
            content.push_str(&record);
            content.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = ModuleCache::new(dir.path().join("modules"));

        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let cache = ModuleCache::new(dir.path().join(".deltaflow/modules"));
        let modules = vec![
            Module::new("app", "/p/app", Some("/p/app/build/intermediates/javac/debug/classes".into()), "debug"),
            Module::new("feed", "/p/feed", None, "debug"),
        ];

        cache.write(&modules).unwrap();
        let read = cache.read().unwrap().unwrap();

        assert_eq!(read.len(), 2);
        assert_eq!(read[0].build_path, modules[0].build_path);
        assert_eq!(read[1].build_path, None);
    }

    #[test]
    fn test_unencodable_module_is_not_written() {
        let dir = TempDir::new().unwrap();
        let cache = ModuleCache::new(dir.path().join(".deltaflow/modules"));
        let modules = vec![
            Module::new("app", "/p/app", None, "debug"),
            Module::new("feed", "/work/my:proj/feed", None, "debug"),
        ];

        let err = cache.write(&modules).unwrap_err();

        assert!(matches!(err, DeltaflowError::Io(_)));
        assert!(err.to_string().contains("feed"));
        assert!(!cache.path().exists());
        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_fails_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modules");
        std::fs::write(&path, "app:/p/app::debug\n\nbroken-record\n").unwrap();

        let err = ModuleCache::new(&path).read().unwrap_err();

        match err {
            DeltaflowError::CacheParse(e) => {
                assert_eq!(e.line, 3);
                assert_eq!(e.record, "broken-record");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
