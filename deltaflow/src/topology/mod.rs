//! Project topology: which modules exist and where their sources and
//! compiled classes live.

mod cache;
mod descriptor;

pub use cache::ModuleCache;
pub use descriptor::{
    absolute_path, build_path_candidates, declared_output, module_root_of, normalize, read_descriptor,
    resolve_output_url, variant_of, DESCRIPTOR_EXTENSION,
};

use crate::core::{BuildLayout, Module, StageMessage};
use crate::errors::DeltaflowError;
use crate::report::RunReport;
use crate::stages::{Stage, StagePurpose};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SKIPPED_DIRS: [&str; 3] = ["build", ".git", ".gradle"];

/// Modules resolved for a project.
#[derive(Debug, Clone)]
pub struct ProjectModules {
    /// The project's artifact layout.
    pub layout: BuildLayout,
    /// Resolved modules, in descriptor order.
    pub modules: Vec<Module>,
}

/// Discovers the modules of a project, optionally through a cache.
#[derive(Debug, Clone)]
pub struct TopologyResolver {
    project_root: PathBuf,
    cache: Option<ModuleCache>,
}

impl TopologyResolver {
    /// Creates a resolver that always queries the filesystem.
    ///
    /// A relative `project_root` is made absolute against the current
    /// directory, so every resolved path is absolute.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: absolute_path(&project_root.into()),
            cache: None,
        }
    }

    /// Trusts and maintains the given cache.
    #[must_use]
    pub fn with_cache(mut self, cache: ModuleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The project root.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Finds every descriptor under the project root, sorted by path.
    ///
    /// Build output and tool metadata directories are not searched.
    #[must_use]
    pub fn discover_descriptors(&self) -> Vec<PathBuf> {
        let mut descriptors: Vec<PathBuf> = WalkBuilder::new(&self.project_root)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && entry.depth() > 0 && SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d))
            })
            .build()
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|path| path.extension().is_some_and(|e| e == DESCRIPTOR_EXTENSION))
            .collect();

        descriptors.sort();
        descriptors
    }

    /// Resolves modules from descriptors without consulting the cache.
    ///
    /// A descriptor declaring several output locations fails the whole
    /// resolution. Modules sharing a name collapse into the first one found.
    pub fn resolve_live(&self, report: &RunReport) -> Result<Vec<Module>, DeltaflowError> {
        let descriptors = self.discover_descriptors();
        debug!(count = descriptors.len(), "Module descriptors found");

        let mut seen = HashSet::new();
        let mut modules = Vec::new();
        for path in descriptors {
            let Some(module) = read_descriptor(&path)? else {
                continue;
            };
            if seen.contains(&module) {
                report.warn(format!(
                    "Duplicate module name '{}' in {}, keeping the first",
                    module.name,
                    path.display()
                ));
                continue;
            }
            seen.insert(module.clone());
            modules.push(module);
        }
        Ok(modules)
    }

    /// Resolves modules, trusting the cache when it exists and parses.
    ///
    /// A live resolution is written back to the cache; a failed write is
    /// only a warning.
    pub fn resolve(&self, report: &RunReport) -> Result<Vec<Module>, DeltaflowError> {
        if let Some(cache) = &self.cache {
            if let Some(modules) = cache.read()? {
                report.info(format!("Reading modules file: {}", cache.path().display()));
                return Ok(modules);
            }
        }

        let modules = self.resolve_live(report)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.write(&modules) {
                report.warn(format!("Failed to create modules file {}: {e}", cache.path().display()));
            }
        }
        Ok(modules)
    }

    fn list(&self, report: &RunReport, modules: &[Module]) {
        let count = modules.len();
        report.info(format!("Found {count} module{}", if count == 1 { "" } else { "s" }));

        for module in modules {
            let path = module
                .source_root
                .strip_prefix(&self.project_root)
                .unwrap_or(&module.source_root);
            match &module.build_path {
                Some(build) => report.info(format!(
                    "- [{} : {}] PATH: {}, OUTPUT: {}",
                    module.name,
                    module.variant,
                    path.display(),
                    build.display()
                )),
                None => report.warn(format!(
                    "- [{} : {}] PATH: {}, OUTPUT: *NO BUILD PATH*",
                    module.name,
                    module.variant,
                    path.display()
                )),
            }
        }
    }
}

/// Stage wrapping [`TopologyResolver::resolve`].
#[derive(Debug, Clone)]
pub struct ResolveModulesStage {
    resolver: TopologyResolver,
}

impl ResolveModulesStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(resolver: TopologyResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for ResolveModulesStage {
    type Input = BuildLayout;
    type Output = ProjectModules;

    fn purpose(&self) -> StagePurpose {
        StagePurpose::ResolveModules
    }

    async fn run(
        &self,
        report: &RunReport,
        layout: BuildLayout,
    ) -> anyhow::Result<StageMessage<ProjectModules>> {
        let resolver = self.resolver.clone();
        let scoped = report.clone();
        let resolved = tokio::task::spawn_blocking(move || {
            resolver.resolve(&scoped).map(|modules| {
                resolver.list(&scoped, &modules);
                modules
            })
        })
        .await?;

        match resolved {
            Ok(modules) => Ok(StageMessage::success(ProjectModules { layout, modules })),
            Err(e) => {
                report.error(e.to_string());
                Ok(e.into())
            }
        }
    }
}
