//! Compiler configuration
//!
//! The only knob today is the pair of tag delimiters. Configuration can be
//! built in code or loaded from a TOML file:
//!
//! ```toml
//! [delimiters]
//! left = "{{"
//! right = "}}"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when building or loading a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("{side} delimiter must not be empty")]
    EmptyDelimiter { side: &'static str },
}

/// Left/right markers bounding every tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TomlDelimiters")]
pub struct Delimiters {
    left: String,
    right: String,
}

#[derive(Deserialize)]
struct TomlDelimiters {
    left: Option<String>,
    right: Option<String>,
}

impl TryFrom<TomlDelimiters> for Delimiters {
    type Error = ConfigError;

    fn try_from(raw: TomlDelimiters) -> Result<Self, Self::Error> {
        let defaults = Delimiters::default();
        Delimiters::new(
            raw.left.unwrap_or(defaults.left),
            raw.right.unwrap_or(defaults.right),
        )
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: "{".to_string(),
            right: "}".to_string(),
        }
    }
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Result<Self, ConfigError> {
        let left = left.into();
        let right = right.into();
        if left.is_empty() {
            return Err(ConfigError::EmptyDelimiter { side: "left" });
        }
        if right.is_empty() {
            return Err(ConfigError::EmptyDelimiter { side: "right" });
        }
        Ok(Self { left, right })
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }
}

/// Configuration for a compile run
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub delimiters: Delimiters,
}

impl CompilerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tag delimiters
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.delimiters.left(), "{");
        assert_eq!(config.delimiters.right(), "}");
    }

    #[test]
    fn test_builder_pattern() {
        let config =
            CompilerConfig::new().with_delimiters(Delimiters::new("<%", "%>").unwrap());
        assert_eq!(config.delimiters.left(), "<%");
        assert_eq!(config.delimiters.right(), "%>");
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        assert!(matches!(
            Delimiters::new("", "}"),
            Err(ConfigError::EmptyDelimiter { side: "left" })
        ));
        assert!(matches!(
            Delimiters::new("{", ""),
            Err(ConfigError::EmptyDelimiter { side: "right" })
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_str(
            r#"
            [delimiters]
            left = "{{"
            right = "}}"
            "#,
        )
        .unwrap();
        assert_eq!(config.delimiters, Delimiters::new("{{", "}}").unwrap());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = CompilerConfig::from_str("[delimiters]\nright = \"]]\"").unwrap();
        assert_eq!(config.delimiters.left(), "{");
        assert_eq!(config.delimiters.right(), "]]");

        let config = CompilerConfig::from_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_from_toml_empty_delimiter() {
        let result = CompilerConfig::from_str("[delimiters]\nleft = \"\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
