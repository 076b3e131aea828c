//! In-memory [`VersionControl`] for tests.

use crate::errors::DeltaflowError;
use crate::vcs::VersionControl;
use async_trait::async_trait;
use std::path::Path;

/// A version control fake with canned probe results and status text.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    binary: bool,
    repository: bool,
    status: Vec<String>,
}

impl FakeVcs {
    /// A working repository whose status prints `lines`.
    #[must_use]
    pub fn with_status<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binary: true,
            repository: true,
            status: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// A clean working tree.
    #[must_use]
    pub fn clean() -> Self {
        Self::with_status(["On branch main", "nothing to commit, working tree clean"])
    }

    /// The binary is not installed.
    #[must_use]
    pub fn missing_binary() -> Self {
        Self {
            binary: false,
            repository: false,
            status: Vec::new(),
        }
    }

    /// The binary works but the root is not a working tree.
    #[must_use]
    pub fn not_a_repository() -> Self {
        Self {
            binary: true,
            repository: false,
            status: Vec::new(),
        }
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    fn name(&self) -> &str {
        "git"
    }

    async fn probe_binary(&self) -> bool {
        self.binary
    }

    async fn probe_repository(&self, _root: &Path) -> bool {
        self.repository
    }

    async fn status(&self, root: &Path) -> Result<Vec<String>, DeltaflowError> {
        if !self.repository {
            return Err(DeltaflowError::NotARepository {
                path: root.to_path_buf(),
            });
        }
        Ok(self.status.clone())
    }
}
