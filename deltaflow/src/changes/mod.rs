//! Change set detection: which supported source files changed, and which
//! module owns each of them.

use crate::core::{ChangeSet, Module, SourceKind, StageMessage};
use crate::errors::DeltaflowError;
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use crate::topology::{absolute_path, ProjectModules};
use crate::vcs::{parse_status, VersionControl};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which status section first reported a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Modified,
    Untracked,
}

impl Origin {
    fn marker(self) -> char {
        match self {
            Self::Modified => '*',
            Self::Untracked => '+',
        }
    }
}

/// Result of a detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// At least one supported file changed.
    Changes {
        /// Changed files grouped by owning module.
        change_set: ChangeSet,
        /// Changed files of unsupported kinds, reported but not built.
        unsupported: Vec<PathBuf>,
    },
    /// No supported file changed.
    NothingToBuild {
        /// Changed files of unsupported kinds.
        unsupported: Vec<PathBuf>,
    },
}

impl Detection {
    /// The change set, if there is anything to build.
    #[must_use]
    pub fn change_set(&self) -> Option<&ChangeSet> {
        match self {
            Self::Changes { change_set, .. } => Some(change_set),
            Self::NothingToBuild { .. } => None,
        }
    }

    /// Changed files that will not be built.
    #[must_use]
    pub fn unsupported(&self) -> &[PathBuf] {
        match self {
            Self::Changes { unsupported, .. } | Self::NothingToBuild { unsupported } => unsupported,
        }
    }
}

/// Finds the first module whose source root contains `file`.
///
/// Both sides are made absolute and normalized first, so `./app/A.java`
/// matches a module rooted at `<cwd>/app`.
#[must_use]
pub fn owning_module<'a>(modules: &'a [Module], file: &Path) -> Option<&'a Module> {
    let file = absolute_path(file);
    modules.iter().find(|m| {
        let root = absolute_path(&m.source_root);
        file != root && file.starts_with(&root)
    })
}

/// Builds change sets from version-control status.
#[derive(Debug, Clone)]
pub struct ChangeSetDetector {
    vcs: Arc<dyn VersionControl>,
    supported: BTreeSet<SourceKind>,
}

impl ChangeSetDetector {
    /// Creates a detector accepting every [`SourceKind`].
    #[must_use]
    pub fn new(vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            vcs,
            supported: SourceKind::ALL.into_iter().collect(),
        }
    }

    /// Restricts the accepted source kinds.
    #[must_use]
    pub fn with_supported_kinds(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.supported = kinds.into_iter().collect();
        self
    }

    fn is_supported(&self, path: &Path) -> bool {
        SourceKind::from_path(path).is_some_and(|kind| self.supported.contains(&kind))
    }

    /// Detects changed files under `root` and assigns each to its module.
    ///
    /// Fails if version control is unavailable, `root` is not a working
    /// tree, or a supported changed file has no owning module.
    pub async fn detect(
        &self,
        report: &RunReport,
        root: &Path,
        modules: &[Module],
    ) -> Result<Detection, DeltaflowError> {
        let root = absolute_path(root);
        let root = root.as_path();
        report.info(format!("Checking for {} binary", self.vcs.name()));
        if !self.vcs.probe_binary().await {
            return Err(DeltaflowError::tool_missing(self.vcs.name()));
        }
        report.info(format!("Checking for {} project", self.vcs.name()));
        if !self.vcs.probe_repository(root).await {
            return Err(DeltaflowError::NotARepository {
                path: root.to_path_buf(),
            });
        }

        report.info("Checking project changes for incremental build");
        let lines = self.vcs.status(root).await?;
        let status = parse_status(&lines);

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut missing = 0;
        let passes = [
            (Origin::Modified, &status.modified),
            (Origin::Untracked, &status.untracked),
        ];
        for (origin, paths) in passes {
            for relative in paths {
                let file = root.join(relative);
                if !seen.insert(file.clone()) {
                    continue;
                }
                if !tokio::fs::metadata(&file).await.is_ok_and(|m| m.is_file()) {
                    report.warn(format!("{} {relative} [?]", origin.marker()));
                    missing += 1;
                    continue;
                }
                candidates.push((origin, file));
            }
        }
        if missing > 0 {
            report.warn(format!(
                "Files marked with [?] were reported by {} but are not on disk",
                self.vcs.name()
            ));
        }

        let mut builder = ChangeSet::builder();
        let mut unsupported = Vec::new();
        for (origin, file) in candidates {
            let shown = file.strip_prefix(root).unwrap_or(&file).display().to_string();
            let marker = origin.marker();

            if !self.is_supported(&file) {
                report.warn(format!("{marker} {shown} [!]"));
                unsupported.push(file);
                continue;
            }

            let Some(module) = owning_module(modules, &file) else {
                report.error(format!("Can't find module for source file: {shown}"));
                return Err(DeltaflowError::UnownedFile { path: file });
            };
            report.info(format!("{marker} {shown} [{}]", module.name));
            builder.insert(module, file);
        }

        if !unsupported.is_empty() {
            report.warn("Files marked with [!] are not supported for incremental build");
        }

        let change_set = builder.build();
        if change_set.is_empty() {
            return Ok(Detection::NothingToBuild { unsupported });
        }
        Ok(Detection::Changes {
            change_set,
            unsupported,
        })
    }
}

/// Stage wrapping [`ChangeSetDetector::detect`]. Terminates the run when
/// nothing needs building.
#[derive(Debug, Clone)]
pub struct DetectChangesStage {
    detector: ChangeSetDetector,
}

impl DetectChangesStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(detector: ChangeSetDetector) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Stage for DetectChangesStage {
    type Input = ProjectModules;
    type Output = ChangeSet;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::DetectChanges
    }

    async fn run(
        &self,
        report: &RunReport,
        project: ProjectModules,
    ) -> anyhow::Result<StageMessage<ChangeSet>> {
        let root = project.layout.project_root();
        match self.detector.detect(report, root, &project.modules).await {
            Ok(Detection::Changes { change_set, .. }) => {
                let description = format!(
                    "{} file(s) changed in {} module(s)",
                    change_set.file_count(),
                    change_set.module_count()
                );
                Ok(StageMessage::success_with(change_set, description))
            }
            Ok(Detection::NothingToBuild { .. }) => {
                report.info("No source changes to compile");
                Ok(StageMessage::terminated("No source changes to compile"))
            }
            Err(e) => {
                report.error(e.to_string());
                Ok(e.into())
            }
        }
    }
}
