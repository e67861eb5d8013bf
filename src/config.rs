use crate::error::{RadialError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "reporadial.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub collapse: CollapseConfig,
    pub animation: AnimationConfig,
    pub github: GithubConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

/// How node depth maps to distance from the centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadiusMode {
    /// `depth * level_spacing`, independent of the surface size.
    Fixed,
    /// `depth / max_depth * canvas_radius`.
    Normalized,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Angular separation between nodes sharing a parent.
    pub sibling_separation: f32,
    /// Angular separation between adjacent nodes with different parents.
    pub cousin_separation: f32,
    pub radius: RadiusMode,
    pub level_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            sibling_separation: 1.5,
            cousin_separation: 10.0,
            radius: RadiusMode::Fixed,
            level_spacing: 90.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    /// Branches with more active children than this get every child shelved
    /// on the first layout of a freshly built tree.
    pub auto_collapse_threshold: usize,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            auto_collapse_threshold: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Transition length for updates after a click; 0 disables animation.
    pub duration_ms: u64,
    /// Diagrams with more nodes than this snap instead of animating.
    pub skip_above: usize,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 450,
            skip_above: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    /// Environment variable holding an access token, if any.
    pub token_env: String,
    pub per_page: u32,
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            per_page: 100,
            user_agent: concat!("reporadial/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path, else `reporadial.toml` in the working
    /// directory, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| RadialError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| RadialError::ConfigParse { path, source })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.layout.sibling_separation, 1.5);
        assert_eq!(config.layout.cousin_separation, 10.0);
        assert_eq!(config.layout.radius, RadiusMode::Fixed);
        assert_eq!(config.collapse.auto_collapse_threshold, 20);
        assert_eq!(config.animation.duration_ms, 450);
        assert_eq!(config.github.per_page, 100);
        assert_eq!(config.log_level.0, "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            log_level = "debug"

            [layout]
            cousin_separation = 15.0
            radius = "normalized"

            [animation]
            duration_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.layout.cousin_separation, 15.0);
        assert_eq!(config.layout.sibling_separation, 1.5);
        assert_eq!(config.layout.radius, RadiusMode::Normalized);
        assert_eq!(config.animation.duration_ms, 0);
        assert_eq!(config.animation.skip_above, 1000);
        assert_eq!(config.log_level.0, "debug");
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[collapse]\nauto_collapse_threshold = 5").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.collapse.auto_collapse_threshold, 5);
    }

    #[test]
    fn test_load_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[layout]\nradius = \"spiral\"").unwrap();

        match Config::load(Some(file.path())) {
            Err(RadialError::ConfigParse { .. }) => {}
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/nonexistent/reporadial.toml")));
        assert!(matches!(result, Err(RadialError::ConfigRead { .. })));
    }
}
