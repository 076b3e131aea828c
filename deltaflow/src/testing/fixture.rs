//! On-disk project layouts for tests.

use crate::core::Module;
use std::path::{Component, Path, PathBuf};

const CLASSES_DIR: &str = "build/intermediates/javac/debug/classes";

/// Lays out modules, descriptors and sources under a root directory.
///
/// Helpers panic on IO failure; they are meant for test setup only.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    root: PathBuf,
}

impl ProjectFixture {
    /// Creates a fixture rooted at `root`, which must already exist.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The project root spelled relative to the current directory, e.g.
    /// `../../tmp/.tmpX1y2`.
    #[must_use]
    pub fn relative_root(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|e| panic!("no current directory: {e}"));
        let normal = |path: &Path| -> Vec<PathBuf> {
            path.components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(PathBuf::from(part)),
                    _ => None,
                })
                .collect()
        };
        let from = normal(&cwd);
        let to = normal(&self.root);
        let shared = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

        let mut relative = PathBuf::new();
        for _ in shared..from.len() {
            relative.push("..");
        }
        for part in &to[shared..] {
            relative.push(part);
        }
        if relative.as_os_str().is_empty() {
            relative.push(".");
        }
        relative
    }

    /// Starts describing a module rooted at `<root>/<name>`.
    #[must_use]
    pub fn module(&self, name: &str) -> ModuleFixture<'_> {
        ModuleFixture {
            project: self,
            name: name.to_string(),
            with_classes: false,
            generated_resources: false,
        }
    }

    /// Writes `content` to a project-relative path, creating parents.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("cannot create {}: {e}", parent.display()));
        }
        std::fs::write(&path, content).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
        path
    }
}

/// Builder for one fixture module.
#[derive(Debug)]
pub struct ModuleFixture<'a> {
    project: &'a ProjectFixture,
    name: String,
    with_classes: bool,
    generated_resources: bool,
}

impl ModuleFixture<'_> {
    /// Creates the module's previously compiled classes directory.
    #[must_use]
    pub fn with_classes(mut self) -> Self {
        self.with_classes = true;
        self
    }

    /// Creates the module's generated resource directory.
    #[must_use]
    pub fn with_generated_resources(mut self) -> Self {
        self.generated_resources = true;
        self
    }

    /// Writes the descriptor and directories, returning the module the
    /// resolver is expected to produce.
    pub fn create(self) -> Module {
        let relative = format!("{}/{}.iml", self.name, self.name);
        self.project.write(
            &relative,
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<module type="JAVA_MODULE" version="4">
  <component name="NewModuleRootManager" inherit-compiler-output="false">
    <output url="file://$MODULE_DIR$/{CLASSES_DIR}" />
  </component>
</module>
"#
            ),
        );

        let source_root = self.project.root.join(&self.name);
        let classes = source_root.join(CLASSES_DIR);
        let mut dirs = Vec::new();
        if self.with_classes {
            dirs.push(classes.clone());
        }
        if self.generated_resources {
            dirs.push(source_root.join("build/generated/source/r/debug"));
        }
        for dir in &dirs {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| panic!("cannot create {}: {e}", dir.display()));
        }

        Module::new(
            self.name,
            source_root,
            self.with_classes.then_some(classes),
            "debug",
        )
    }
}
