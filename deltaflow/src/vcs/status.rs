use serde::{Deserialize, Serialize};

const MODIFIED_PREFIX: &str = "modified:";
const UNTRACKED_HEADER: &str = "Untracked files:";
const OTHER_HEADERS: [&str; 4] = [
    "Changes to be committed:",
    "Changes not staged for commit:",
    "Unmerged paths:",
    "Ignored files:",
];

/// Relative paths reported by a status query, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    /// Paths from `modified:` lines.
    pub modified: Vec<String>,
    /// Paths listed in the untracked section.
    pub untracked: Vec<String>,
}

impl WorkingTreeStatus {
    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.untracked.is_empty()
    }
}

/// Decodes a path that git wrapped in double quotes with C-style escapes,
/// e.g. `"My File.java"` or `"\303\251t\303\251.kt"`. Other input is returned
/// unchanged.
#[must_use]
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let input = inner.as_bytes();
    let mut bytes = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let byte = input[i];
        i += 1;
        if byte != b'\\' || i == input.len() {
            bytes.push(byte);
            continue;
        }

        let escaped = input[i];
        i += 1;
        match escaped {
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                for _ in 0..2 {
                    match input.get(i).copied() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(digit - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push(u8::try_from(value).unwrap_or(b'?'));
            }
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'v' => bytes.push(0x0b),
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Default,
    Untracked,
}

/// Parses line-oriented status text.
///
/// Outside the untracked section only `modified: <path>` lines count. The
/// `Untracked files:` header switches to the untracked section, where every
/// non-blank line that is not a `(...)` hint is a path candidate until the
/// next section header. Quoted paths are decoded with [`unquote_path`];
/// candidates are not otherwise validated here.
#[must_use]
pub fn parse_status<S: AsRef<str>>(lines: &[S]) -> WorkingTreeStatus {
    let mut status = WorkingTreeStatus::default();
    let mut section = Section::Default;

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(UNTRACKED_HEADER) {
            section = Section::Untracked;
            continue;
        }
        if OTHER_HEADERS.iter().any(|h| line.starts_with(h)) {
            section = Section::Default;
            continue;
        }

        match section {
            Section::Default => {
                if let Some(path) = line.strip_prefix(MODIFIED_PREFIX) {
                    let path = path.trim();
                    if !path.is_empty() {
                        status.modified.push(unquote_path(path));
                    }
                }
            }
            Section::Untracked => {
                if !line.starts_with('(') {
                    status.untracked.push(unquote_path(line));
                }
            }
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_modified_then_untracked() {
        let lines = [
            "On branch main",
            "Changes not staged for commit:",
            "  (use \"git add <file>...\" to update what will be committed)",
            "\tmodified:   app/src/Main.java",
            "\tdeleted:    app/src/Old.java",
            "",
            "Untracked files:",
            "  (use \"git add <file>...\" to include in what will be committed)",
            "\tapp/src/Helper.java",
            "",
        ];

        let status = parse_status(&lines);

        assert_eq!(status.modified, vec!["app/src/Main.java".to_string()]);
        assert_eq!(status.untracked, vec!["app/src/Helper.java".to_string()]);
    }

    #[test]
    fn test_header_leaves_untracked_section() {
        let lines = [
            "Untracked files:",
            "\tnotes.txt",
            "Changes to be committed:",
            "\tnew file:   core/src/Util.kt",
            "\tmodified:   core/src/Api.kt",
        ];

        let status = parse_status(&lines);

        assert_eq!(status.untracked, vec!["notes.txt".to_string()]);
        assert_eq!(status.modified, vec!["core/src/Api.kt".to_string()]);
    }

    #[test]
    fn test_quoted_paths_are_decoded() {
        let lines = [
            "\tmodified:   \"app/src/My File.java\"",
            r#"modified:   "app/src/Say \"hi\".java""#,
            "Untracked files:",
            r#""app/src/\303\251t\303\251.kt""#,
        ];

        let status = parse_status(&lines);

        assert_eq!(
            status.modified,
            vec!["app/src/My File.java".to_string(), "app/src/Say \"hi\".java".to_string()]
        );
        assert_eq!(status.untracked, vec!["app/src/\u{e9}t\u{e9}.kt".to_string()]);
    }

    #[test]
    fn test_unquote_path() {
        assert_eq!(unquote_path("app/src/Main.java"), "app/src/Main.java");
        assert_eq!(unquote_path(r#""a\\b\tc""#), "a\\b\tc");
        assert_eq!(unquote_path(r#""\344\275\240.kt""#), "\u{4f60}.kt");
        assert_eq!(unquote_path("\""), "\"");
    }

    #[test]
    fn test_other_text_is_inert() {
        let lines = [
            "On branch main",
            "Your branch is up to date with 'origin/main'.",
            "nothing to commit, working tree clean",
        ];

        assert!(parse_status(&lines).is_empty());
    }

    #[test]
    fn test_modified_outside_untracked_only() {
        let lines = ["Untracked files:", "modified:   weird/name.java"];

        let status = parse_status(&lines);

        assert!(status.modified.is_empty());
        assert_eq!(status.untracked, vec!["modified:   weird/name.java".to_string()]);
    }
}
