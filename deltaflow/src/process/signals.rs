//! Per-tool readers of textual tool output.
//!
//! The external tools report success and failure only as text. Each tool
//! gets one translation function here so a tool that gains structured output
//! only needs its function replaced.

use super::ProcessOutput;
use regex::Regex;
use std::sync::LazyLock;

// Constant patterns, exercised by the tests below.
#[allow(clippy::expect_used)]
static PROGRESS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[?\s*\d{1,3}(\.\d+)?\s*%").expect("valid regex"));

#[allow(clippy::expect_used)]
static FILES_PUSHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+ files? pushed").expect("valid regex"));

/// Returns true for percentage-complete progress lines such as `[ 42%]`.
#[must_use]
pub fn is_progress_marker(line: &str) -> bool {
    PROGRESS_MARKER.is_match(line)
}

fn compiler_failures(output: &ProcessOutput, usage_banner: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !is_progress_marker(line))
        .filter(|line| {
            line.contains("error: ") || line.contains("invalid flag:") || line.contains(usage_banner)
        })
        .map(|line| line.trim().to_string())
        .collect()
}

/// Error lines in javac output. Empty means the compile succeeded.
#[must_use]
pub fn javac_failures(output: &ProcessOutput) -> Vec<String> {
    compiler_failures(output, "Usage: javac")
}

/// Error lines in kotlinc output. Empty means the compile succeeded.
#[must_use]
pub fn kotlinc_failures(output: &ProcessOutput) -> Vec<String> {
    compiler_failures(output, "Usage: kotlinc")
}

/// Error lines in desugar tool output.
#[must_use]
pub fn desugar_failures(output: &ProcessOutput) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("Error!") || line.contains("Exception in thread"))
        .map(|line| line.trim().to_string())
        .collect()
}

/// Error lines in d8 output.
#[must_use]
pub fn d8_failures(output: &ProcessOutput) -> Vec<String> {
    output
        .lines()
        .filter(|line| !is_progress_marker(line))
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with("Error") || trimmed.contains("Compilation failed")
        })
        .map(|line| line.trim().to_string())
        .collect()
}

/// Returns true if adb reported the push as completed.
#[must_use]
pub fn adb_push_succeeded(output: &ProcessOutput) -> bool {
    output.lines().any(|line| FILES_PUSHED.is_match(line))
}

/// Error lines in `am` output.
#[must_use]
pub fn am_failures(output: &ProcessOutput) -> Vec<String> {
    output
        .lines()
        .filter(|line| {
            line.contains("Error:") || line.contains("Exception") || line.contains("does not exist")
        })
        .map(|line| line.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_markers() {
        assert!(is_progress_marker("[ 42%] Building"));
        assert!(is_progress_marker("100% done"));
        assert!(is_progress_marker("  7.5% error: not really"));
        assert!(!is_progress_marker("Main.java:3: error: ';' expected"));
    }

    #[test]
    fn test_javac_failures() {
        let output = ProcessOutput::failed([
            "/p/app/src/Main.java:3: error: ';' expected",
            "1 error",
        ]);

        assert_eq!(
            javac_failures(&output),
            vec!["/p/app/src/Main.java:3: error: ';' expected".to_string()]
        );
    }

    #[test]
    fn test_progress_line_is_not_a_failure() {
        let output = ProcessOutput::ok(["[ 50%] error: recovered from cache", "done"]);
        assert!(javac_failures(&output).is_empty());
    }

    #[test]
    fn test_usage_banner_and_invalid_flag() {
        assert_eq!(javac_failures(&ProcessOutput::failed(["Usage: javac <options>"])).len(), 1);
        assert_eq!(javac_failures(&ProcessOutput::failed(["javac: invalid flag: -bogus"])).len(), 1);
        assert_eq!(kotlinc_failures(&ProcessOutput::failed(["Usage: kotlinc <options>"])).len(), 1);
    }

    #[test]
    fn test_warnings_pass() {
        let output = ProcessOutput::ok(["warning: [options] bootstrap class path not set"]);
        assert!(javac_failures(&output).is_empty());
    }

    #[test]
    fn test_adb_push() {
        assert!(adb_push_succeeded(&ProcessOutput::ok([
            "build/deltaflow/dex/classes.dex: 1 file pushed, 0 skipped. 12.3 MB/s"
        ])));
        assert!(adb_push_succeeded(&ProcessOutput::ok(["2 files pushed"])));
        assert!(!adb_push_succeeded(&ProcessOutput::failed(["adb: error: no devices/emulators found"])));
    }

    #[test]
    fn test_am_failures() {
        let output = ProcessOutput::ok(["Error: Activity class {com.example/.Main} does not exist."]);
        assert_eq!(am_failures(&output).len(), 1);
        assert!(am_failures(&ProcessOutput::ok(["Starting: Intent { cmp=com.example/.Main }"])).is_empty());
    }

    #[test]
    fn test_d8_and_desugar_failures() {
        assert_eq!(d8_failures(&ProcessOutput::failed(["Error in A.class: bad"])).len(), 1);
        assert!(d8_failures(&ProcessOutput::ok(["Warning: ignoring"])).is_empty());
        assert_eq!(desugar_failures(&ProcessOutput::failed(["Error! missing class"])).len(), 1);
    }
}
