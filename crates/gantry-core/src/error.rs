use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for gantry operations.
///
/// Every variant is fatal to the current bootstrap run; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("dependency cycle among packages: {}", .names.join(", "))]
    DependencyCycle { names: Vec<String> },

    #[error("invalid version spec '{spec}': {reason}")]
    BadVersionSpec { spec: String, reason: String },

    #[error("invalid glob pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },

    #[error("package not found: {name}")]
    PackageNotFound { name: String },

    #[error("installer failed in {dir}: {detail}")]
    InstallerFailed {
        dir: PathBuf,
        specs: Vec<String>,
        detail: String,
    },

    #[error("script '{script}' failed in package '{package}': {detail}")]
    LifecycleScriptFailed {
        package: String,
        script: String,
        detail: String,
    },

    #[error("{op} failed at {path}: {source}")]
    FilesystemFailed {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no free port available for the installer mutex")]
    PortAllocationFailed,

    #[error("failed to read manifest at {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[must_use]
    pub fn bad_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadVersionSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn bad_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FilesystemFailed {
            op,
            path: path.into(),
            source,
        }
    }
}
