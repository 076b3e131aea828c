use std::fmt;

/// What a stage is for. Used in step logging and failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagePurpose {
    /// Verify the project root and reset the build root.
    SetupProject,
    /// Discover the project's modules.
    ResolveModules,
    /// Query version control for changed sources.
    DetectChanges,
    /// Create a module's private output directory.
    PrepareOutput,
    /// Compile a module's Kotlin sources.
    CompileKotlin,
    /// Compile a module's Java sources.
    CompileJava,
    /// Fan out compilation over every changed module.
    CompileModules,
    /// Drop stale compiled classes.
    CleanupArtifacts,
    /// Merge and desugar compiled classes.
    Desugar,
    /// Convert classes into the device format.
    Package,
    /// Push the packaged artifact to the device.
    Push,
    /// Restart the application.
    Restart,
    /// A caller-defined stage.
    Custom(&'static str),
}

impl StagePurpose {
    /// Short machine-friendly code, e.g. `RESOLVE_MODULES`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SetupProject => "SETUP_PROJECT",
            Self::ResolveModules => "RESOLVE_MODULES",
            Self::DetectChanges => "DETECT_CHANGES",
            Self::PrepareOutput => "PREPARE_OUTPUT",
            Self::CompileKotlin => "COMPILE_KOTLIN",
            Self::CompileJava => "COMPILE_JAVA",
            Self::CompileModules => "COMPILE_MODULES",
            Self::CleanupArtifacts => "CLEANUP_ARTIFACTS",
            Self::Desugar => "DESUGAR",
            Self::Package => "PACKAGE",
            Self::Push => "PUSH",
            Self::Restart => "RESTART",
            Self::Custom(name) => name,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetupProject => "Setting up build paths",
            Self::ResolveModules => "Resolving project modules",
            Self::DetectChanges => "Determining source changes",
            Self::PrepareOutput => "Preparing module output",
            Self::CompileKotlin => "Compiling with Kotlin",
            Self::CompileJava => "Compiling with javac",
            Self::CompileModules => "Compiling changed modules",
            Self::CleanupArtifacts => "Removing stale classes",
            Self::Desugar => "Processing with Desugar",
            Self::Package => "Dexing",
            Self::Push => "Deploying changes on Android device",
            Self::Restart => "Restarting application",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for StagePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StagePurpose::ResolveModules.to_string(),
            "RESOLVE_MODULES: Resolving project modules"
        );
        assert_eq!(StagePurpose::Custom("probe").to_string(), "probe: probe");
    }
}
