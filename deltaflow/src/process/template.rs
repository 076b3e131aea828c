use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const FILES_TOKEN: &str = "{files}";

/// Values substituted into an [`ArgTemplate`].
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: BTreeMap<&'static str, String>,
    files: Vec<String>,
}

impl TemplateVars {
    /// Creates an empty set of values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `{key}`.
    #[must_use]
    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Sets `{key}` to a path.
    #[must_use]
    pub fn set_path(self, key: &'static str, path: &Path) -> Self {
        self.set(key, path.to_string_lossy())
    }

    /// Sets the file list a bare `{files}` argument expands to.
    #[must_use]
    pub fn files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.files = files
            .into_iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned())
            .collect();
        self
    }
}

/// A per-tool argument list with `{placeholder}` tokens.
///
/// An argument that is exactly `{files}` expands to one argument per file;
/// any other placeholder is replaced in place. Unknown placeholders are left
/// as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgTemplate(pub Vec<String>);

impl ArgTemplate {
    /// Creates a template from string slices.
    #[must_use]
    pub fn from_args(args: &[&str]) -> Self {
        Self(args.iter().map(|a| (*a).to_string()).collect())
    }

    /// Renders the template.
    #[must_use]
    pub fn render(&self, vars: &TemplateVars) -> Vec<String> {
        let mut rendered = Vec::with_capacity(self.0.len() + vars.files.len());
        for arg in &self.0 {
            if arg == FILES_TOKEN {
                rendered.extend(vars.files.iter().cloned());
                continue;
            }
            let mut value = arg.clone();
            for (key, replacement) in &vars.values {
                value = value.replace(&format!("{{{key}}}"), replacement);
            }
            rendered.push(value);
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_expands_files() {
        let template = ArgTemplate::from_args(&["-d", "{output}", "-cp", "{classpath}", "{files}"]);
        let vars = TemplateVars::new()
            .set("output", "/out")
            .set("classpath", "/a:/b")
            .files(["/src/A.java", "/src/B.java"]);

        assert_eq!(
            template.render(&vars),
            vec!["-d", "/out", "-cp", "/a:/b", "/src/A.java", "/src/B.java"]
        );
    }

    #[test]
    fn test_render_inline_placeholders() {
        let template = ArgTemplate::from_args(&["shell", "am", "start", "-n", "{package}/{activity}", "{unknown}"]);
        let vars = TemplateVars::new()
            .set("package", "com.example")
            .set("activity", ".Main");

        assert_eq!(
            template.render(&vars),
            vec!["shell", "am", "start", "-n", "com.example/.Main", "{unknown}"]
        );
    }

    #[test]
    fn test_empty_file_list_expands_to_nothing() {
        let template = ArgTemplate::from_args(&["--output", "{output}", "{files}"]);
        let vars = TemplateVars::new().set("output", "/dex");

        assert_eq!(template.render(&vars), vec!["--output", "/dex"]);
    }
}
