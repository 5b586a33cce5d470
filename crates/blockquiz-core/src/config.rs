//! Engine configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::GRADE_EPSILON;

/// Tunables shared by tree construction and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tolerance used when comparing grades with thresholds.
    #[serde(default = "default_epsilon")]
    pub grade_epsilon: f64,
    /// Deepest block nesting accepted; the main block is depth 0.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_epsilon() -> f64 {
    GRADE_EPSILON
}

fn default_max_depth() -> usize {
    32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grade_epsilon: default_epsilon(),
            max_depth: default_max_depth(),
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `blockquiz.toml` in the current directory
/// 2. `~/.config/blockquiz/config.toml`
///
/// Environment variable overrides: `BLOCKQUIZ_GRADE_EPSILON`, `BLOCKQUIZ_MAX_DEPTH`.
pub fn load_config() -> Result<EngineConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<EngineConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("blockquiz.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Ok(value) = std::env::var("BLOCKQUIZ_GRADE_EPSILON") {
        config.grade_epsilon = value
            .parse()
            .with_context(|| format!("invalid BLOCKQUIZ_GRADE_EPSILON: {value}"))?;
    }
    if let Ok(value) = std::env::var("BLOCKQUIZ_MAX_DEPTH") {
        config.max_depth = value
            .parse()
            .with_context(|| format!("invalid BLOCKQUIZ_MAX_DEPTH: {value}"))?;
    }

    validate_config(&config)?;
    tracing::debug!(?config, "loaded engine config");
    Ok(config)
}

/// Parse a TOML config string.
pub fn parse_config_str(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &EngineConfig) -> Result<()> {
    anyhow::ensure!(
        config.grade_epsilon.is_finite() && config.grade_epsilon >= 0.0,
        "grade_epsilon must be a non-negative number"
    );
    anyhow::ensure!(config.max_depth >= 1, "max_depth must be at least 1");
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("blockquiz"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.grade_epsilon, GRADE_EPSILON);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config_str("max_depth = 4\n").unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.grade_epsilon, GRADE_EPSILON);
    }

    #[test]
    fn reject_invalid_values() {
        assert!(parse_config_str("max_depth = 0\n").is_err());
        assert!(parse_config_str("grade_epsilon = -1.0\n").is_err());
        assert!(parse_config_str("this is not toml").is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config_from(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockquiz.toml");
        std::fs::write(&path, "grade_epsilon = 0.01\nmax_depth = 8\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.grade_epsilon, 0.01);
    }
}
