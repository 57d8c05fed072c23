use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the gantry CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Options controlling a bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Hoisting configuration: `None` disables hoisting entirely; an empty
    /// pattern list means every dependency is eligible.
    pub hoist: Option<Vec<String>>,

    /// Dependency names matching any of these globs are never hoisted.
    pub nohoist: Vec<String>,

    /// Package manager executable used for installs and lifecycle scripts.
    pub npm_client: String,

    /// Registry URL passed through to the installer.
    pub registry: Option<String>,

    /// Opaque installer coordination token (e.g. `network:42424`).
    pub mutex: Option<String>,

    /// Delegate all installation to a single root install.
    pub use_workspaces: bool,

    /// Maximum number of concurrently running installs and scripts.
    pub concurrency: usize,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            hoist: None,
            nohoist: Vec::new(),
            npm_client: "npm".to_string(),
            registry: None,
            mutex: None,
            use_workspaces: false,
            concurrency: default_concurrency(),
        }
    }
}

impl BootstrapOptions {
    /// Enable hoisting for every dependency name.
    #[must_use]
    pub fn with_hoist_all(mut self) -> Self {
        self.hoist = Some(Vec::new());
        self
    }

    /// Enable hoisting for names matching the given patterns.
    #[must_use]
    pub fn with_hoist(mut self, patterns: Vec<String>) -> Self {
        self.hoist = Some(patterns);
        self
    }

    /// Exclude names matching the given patterns from hoisting.
    #[must_use]
    pub fn with_nohoist(mut self, patterns: Vec<String>) -> Self {
        self.nohoist = patterns;
        self
    }

    /// Set the package manager executable.
    #[must_use]
    pub fn with_npm_client(mut self, client: impl Into<String>) -> Self {
        self.npm_client = client.into();
        self
    }

    /// Set the concurrency cap (clamped to at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Delegate installation to the root package manager.
    #[must_use]
    pub fn with_use_workspaces(mut self, use_workspaces: bool) -> Self {
        self.use_workspaces = use_workspaces;
        self
    }
}

/// Default parallelism (available cores, clamped to 1..=64).
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .clamp(1, 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = BootstrapOptions::default();
        assert!(opts.hoist.is_none());
        assert_eq!(opts.npm_client, "npm");
        assert!(!opts.use_workspaces);
        assert!(opts.concurrency >= 1);
    }

    #[test]
    fn test_concurrency_clamped() {
        let opts = BootstrapOptions::default().with_concurrency(0);
        assert_eq!(opts.concurrency, 1);
    }

    #[test]
    fn test_hoist_all() {
        let opts = BootstrapOptions::default().with_hoist_all();
        assert_eq!(opts.hoist, Some(Vec::new()));
    }
}
