//! Version-control query contract and its git implementation.

mod git;
mod status;

pub use git::GitCli;
pub use status::{parse_status, unquote_path, WorkingTreeStatus};

use crate::errors::DeltaflowError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// The queries the change detector needs from version control.
#[async_trait]
pub trait VersionControl: Send + Sync + Debug {
    /// Name of the tool, used in error messages.
    fn name(&self) -> &str;

    /// Returns true if the version-control binary is installed.
    async fn probe_binary(&self) -> bool;

    /// Returns true if `root` is inside a working tree.
    async fn probe_repository(&self, root: &Path) -> bool;

    /// Returns the human-readable status of the working tree, one line per
    /// entry, in the order the tool printed them.
    async fn status(&self, root: &Path) -> Result<Vec<String>, DeltaflowError>;
}
