//! Hoist pattern matching.
//!
//! Decides which dependency names are eligible for installation at the
//! repository root. Patterns are conventional globs applied to the bare
//! dependency name (no path component).

use crate::config::BootstrapOptions;
use crate::error::Error;
use glob::Pattern;

/// Compiled include/exclude patterns for hoisting decisions.
#[derive(Debug, Clone, Default)]
pub struct HoistConfig {
    enabled: bool,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl HoistConfig {
    /// Hoisting turned off: nothing is hoistable.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Hoisting turned on with the given include/exclude patterns. An
    /// empty include list means every name matches.
    pub fn enabled(include: &[String], exclude: &[String]) -> Result<Self, Error> {
        Ok(Self {
            enabled: true,
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Build from bootstrap options (`hoist: None` disables hoisting).
    pub fn from_options(options: &BootstrapOptions) -> Result<Self, Error> {
        match &options.hoist {
            None => Ok(Self::disabled()),
            Some(include) => Self::enabled(include, &options.nohoist),
        }
    }

    /// Whether hoisting is enabled at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the named dependency may be hoisted.
    #[must_use]
    pub fn is_hoistable(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.matches(name));

        included && !self.exclude.iter().any(|p| p.matches(name))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, Error> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| Error::bad_pattern(p, e.to_string())))
        .collect()
}
