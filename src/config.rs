//! Analysis configuration.
//!
//! Configuration is consumed by the core as plain values: a hop depth and
//! a set of callee names that must always be treated as external. It can
//! be built in code or decoded from JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Callee names that are usually libc noise in an impact report.
///
/// Not applied unless requested via [`AnalysisConfig::with_stdlib_filter`].
pub const DEFAULT_STDLIB_FILTER: &[&str] = &["printf", "scanf", "malloc", "free", "fprintf", "perror"];

/// File extensions analyzed by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["c", "h"];

/// Validated, non-negative hop bound for impact propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Depth(usize);

impl Depth {
    /// Report only the directly changed functions.
    pub const ZERO: Depth = Depth(0);

    /// Validate a raw depth value.
    ///
    /// # Errors
    /// [`Error::InvalidDepth`] when `value` is negative.
    pub fn new(value: i64) -> Result<Self> {
        usize::try_from(value)
            .map(Depth)
            .map_err(|_| Error::InvalidDepth(value))
    }

    /// Hop count as an unsigned integer.
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Depth {
    fn default() -> Self {
        Depth(1)
    }
}

impl From<usize> for Depth {
    fn from(value: usize) -> Self {
        Depth(value)
    }
}

/// Options for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Maximum number of call-graph hops in each direction
    pub depth: i64,
    /// Callee names that never resolve to a graph edge
    pub external_names: BTreeSet<String>,
    /// Treat trees containing syntax-error nodes as unparsable
    pub strict_parse: bool,
    /// File extensions (without the dot) considered analyzable
    pub extensions: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depth: 1,
            external_names: BTreeSet::new(),
            strict_parse: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl AnalysisConfig {
    /// Default configuration with the given depth.
    pub fn with_depth(depth: i64) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    /// Add [`DEFAULT_STDLIB_FILTER`] to the always-external set.
    pub fn with_stdlib_filter(mut self) -> Self {
        self.external_names
            .extend(DEFAULT_STDLIB_FILTER.iter().map(|name| name.to_string()));
        self
    }

    /// Add callee names to the always-external set.
    pub fn with_external_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Validate the configuration and return the depth bound.
    ///
    /// Called before any analysis work starts.
    ///
    /// # Errors
    /// [`Error::InvalidDepth`] for a negative depth.
    pub fn validate(&self) -> Result<Depth> {
        Depth::new(self.depth)
    }

    /// Whether `path` has one of the configured extensions.
    pub fn is_analyzable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }

    /// Decode a configuration from a JSON document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and decode a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;
        let config: AnalysisConfig = serde_json::from_str(&json).map_err(|e| Error::Config {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_is_one() {
        let config = AnalysisConfig::default();
        assert_eq!(config.validate().unwrap().get(), 1);
        assert_eq!(Depth::default().get(), 1);
    }

    #[test]
    fn test_negative_depth_rejected() {
        let config = AnalysisConfig::with_depth(-1);
        assert!(matches!(config.validate(), Err(Error::InvalidDepth(-1))));
    }

    #[test]
    fn test_zero_depth_allowed() {
        assert_eq!(Depth::new(0).unwrap(), Depth::ZERO);
    }

    #[test]
    fn test_stdlib_filter_extends_external_names() {
        let config = AnalysisConfig::default()
            .with_external_names(["log_debug"])
            .with_stdlib_filter();
        assert!(config.external_names.contains("printf"));
        assert!(config.external_names.contains("log_debug"));
        assert_eq!(config.external_names.len(), DEFAULT_STDLIB_FILTER.len() + 1);
    }

    #[test]
    fn test_from_json_partial_document() {
        let config = AnalysisConfig::from_json_str(r#"{"depth": 3, "external_names": ["printf"]}"#)
            .unwrap();
        assert_eq!(config.depth, 3);
        assert!(config.external_names.contains("printf"));
        assert!(!config.strict_parse);
        assert_eq!(config.extensions, vec!["c".to_string(), "h".to_string()]);
    }

    #[test]
    fn test_from_json_negative_depth() {
        let result = AnalysisConfig::from_json_str(r#"{"depth": -4}"#);
        assert!(matches!(result, Err(Error::InvalidDepth(-4))));
    }

    #[test]
    fn test_from_json_unknown_field() {
        let result = AnalysisConfig::from_json_str(r#"{"dept": 2}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("impact.json");
        std::fs::write(&path, "{ not json").unwrap();

        match AnalysisConfig::load(&path) {
            Err(Error::Config { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_analyzable() {
        let config = AnalysisConfig::default();
        assert!(config.is_analyzable(Path::new("src/auth.c")));
        assert!(config.is_analyzable(Path::new("include/db.h")));
        assert!(!config.is_analyzable(Path::new("README.md")));
        assert!(!config.is_analyzable(Path::new("Makefile")));
    }
}
