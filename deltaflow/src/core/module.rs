//! Build modules and their cache record format.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

const RECORD_SEPARATOR: char = ':';

/// A unit of the target project with its own source root and compiled output.
///
/// Identity is the module name alone: two values with the same name compare
/// equal, hash equal and sort together even when their paths differ. Every
/// map keyed by `Module` therefore unifies same-named modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Unique module name (descriptor file stem).
    pub name: String,
    /// Directory that owns the module's sources.
    pub source_root: PathBuf,
    /// Previously compiled classes, absent if the module was never built.
    pub build_path: Option<PathBuf>,
    /// Build variant tag, e.g. `debug`.
    pub variant: String,
}

impl Module {
    /// Creates a new module.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source_root: impl Into<PathBuf>,
        build_path: Option<PathBuf>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
            build_path,
            variant: variant.into(),
        }
    }

    /// Encodes the module as a `name:sourceRoot:outputPath:variant` record.
    ///
    /// An absent build path is written as an empty field. Returns `None` if
    /// any field contains `:` or a line break, since such a record could not
    /// be decoded again.
    #[must_use]
    pub fn encode(&self) -> Option<String> {
        let build_path = self
            .build_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fields = [
            self.name.clone(),
            self.source_root.to_string_lossy().into_owned(),
            build_path,
            self.variant.clone(),
        ];

        if fields.iter().any(|f| f.contains([RECORD_SEPARATOR, '\n', '\r'])) {
            return None;
        }
        Some(fields.join(":"))
    }

    /// Decodes a record written by [`Module::encode`].
    ///
    /// Returns `None` unless the record has exactly four fields with a
    /// non-empty name, source root and variant.
    #[must_use]
    pub fn decode(record: &str) -> Option<Self> {
        let parts: Vec<&str> = record.split(RECORD_SEPARATOR).collect();
        let [name, source_root, build_path, variant] = parts.as_slice() else {
            return None;
        };

        if name.is_empty() || source_root.is_empty() || variant.is_empty() {
            return None;
        }
        let build_path = (!build_path.is_empty()).then(|| PathBuf::from(*build_path));

        Some(Self::new(*name, *source_root, build_path, *variant))
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Module {}

impl Hash for Module {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Module {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Module {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_is_name_only() {
        let a = Module::new("app", "/p/app", None, "debug");
        let b = Module::new("app", "/elsewhere/app", Some("/x".into()), "release");

        assert_eq!(a, b);

        let set: HashSet<Module> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_encode_decode() {
        let module = Module::new(
            "core",
            "/p/core",
            Some("/p/core/build/intermediates/classes/debug".into()),
            "debug",
        );
        let record = module.encode().unwrap();

        assert_eq!(record, "core:/p/core:/p/core/build/intermediates/classes/debug:debug");

        let decoded = Module::decode(&record).unwrap();
        assert_eq!(decoded.source_root, module.source_root);
        assert_eq!(decoded.build_path, module.build_path);
        assert_eq!(decoded.variant, "debug");
    }

    #[test]
    fn test_absent_build_path_is_empty_field() {
        let module = Module::new("feed", "/p/feed", None, "debug");

        assert_eq!(module.encode().as_deref(), Some("feed:/p/feed::debug"));
        assert_eq!(Module::decode("feed:/p/feed::debug").unwrap().build_path, None);
    }

    #[test]
    fn test_separator_in_path_is_not_encoded() {
        let in_root = Module::new("app", "/work/my:proj/app", None, "debug");
        let in_build = Module::new("app", "/p/app", Some("/p/app/build:x".into()), "debug");

        assert_eq!(in_root.encode(), None);
        assert_eq!(in_build.encode(), None);
    }

    #[test]
    fn test_decode_rejects_malformed_records() {
        assert!(Module::decode("app:/p/app:debug").is_none());
        assert!(Module::decode("app:/p/app:/b:debug:extra").is_none());
        assert!(Module::decode(":/p/app:/b:debug").is_none());
        assert!(Module::decode("app:/p/app:/b:").is_none());
    }
}
