//! Engine configuration, loadable from YAML.
//!
//! ```yaml
//! limits:
//!   max_depth: 128
//!   max_iterations: 100000
//! include_dir: /home/me/.mail/macros
//! profile: /home/me/.mail/profile.json
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Guards against runaway macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalLimits {
    /// Maximum nesting of function dispatches (user functions recurse through this).
    pub max_depth: usize,
    /// Maximum iterations of a single `@While`; `None` means unbounded.
    pub max_iterations: Option<u64>,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_iterations: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: EvalLimits,
    /// Base directory for relative `@Include`, `@Load` and `@Save` paths.
    pub include_dir: Option<PathBuf>,
    /// JSON file backing the profile store.
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Resolves a macro-supplied path against `include_dir`.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        match &self.include_dir {
            Some(base) if candidate.is_relative() => base.join(candidate),
            _ => candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_yaml_str("limits:\n  max_depth: 12\n").unwrap();
        assert_eq!(config.limits.max_depth, 12);
        assert_eq!(config.limits.max_iterations, None);
        assert_eq!(config.include_dir, None);
    }

    #[test]
    fn relative_paths_resolve_against_include_dir() {
        let config = EngineConfig {
            include_dir: Some(PathBuf::from("/macros")),
            ..EngineConfig::default()
        };
        assert_eq!(config.resolve_path("a.mcr"), PathBuf::from("/macros/a.mcr"));
        assert_eq!(config.resolve_path("/abs.mcr"), PathBuf::from("/abs.mcr"));
    }
}
