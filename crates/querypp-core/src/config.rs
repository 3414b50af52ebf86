//! Configuration schema (querypp.toml)

use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directive syntax used to recognize blocks and query names
///
/// A directive is `<marker><whitespace>:<keyword>`, e.g. `-- :block users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Syntax {
    /// Comment marker that introduces a directive
    pub marker: String,

    /// Keyword opening a block
    pub block: String,

    /// Keyword closing a block
    pub end_block: String,

    /// Keyword introducing a named query in a multi-query file
    pub name: String,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            marker: "--".to_string(),
            block: "block".to_string(),
            end_block: "endblock".to_string(),
            name: "name".to_string(),
        }
    }
}

impl Syntax {
    /// Render the canonical end directive, e.g. `-- :endblock`
    pub fn end_directive(&self) -> String {
        format!("{} :{}", self.marker, self.end_block)
    }

    /// Check that the syntax can be tokenized unambiguously
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marker.is_empty()
            || self.marker.contains(':')
            || self.marker.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::InvalidSyntax(format!(
                "marker '{}' must be non-empty and contain no whitespace or ':'",
                self.marker
            )));
        }

        let keyword = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| ConfigError::InvalidSyntax(e.to_string()))?;
        for (field, value) in [
            ("block", &self.block),
            ("end_block", &self.end_block),
            ("name", &self.name),
        ] {
            if !keyword.is_match(value) {
                return Err(ConfigError::InvalidSyntax(format!(
                    "{} keyword '{}' is not an identifier",
                    field, value
                )));
            }
        }

        if self.block == self.end_block || self.block == self.name || self.end_block == self.name {
            return Err(ConfigError::InvalidSyntax(
                "block, end_block and name keywords must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directive syntax
    #[serde(default)]
    pub syntax: Syntax,

    /// Directory the config was loaded from
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.syntax.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid syntax configuration: {0}")]
    InvalidSyntax(String),
}

impl ConfigError {
    /// Convert to a querypp diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self {
            Self::IoError(_) => DiagnosticCode::LoadIoError,
            _ => DiagnosticCode::ConfigInvalid,
        };
        Diagnostic::new(code, Severity::Error, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.syntax.marker, "--");
        assert_eq!(config.syntax.end_directive(), "-- :endblock");
        assert!(config.syntax.validate().is_ok());
    }

    #[test]
    fn partial_syntax_section() {
        let config = Config::from_toml("[syntax]\nblock = \"param\"\nend_block = \"endparam\"\n").unwrap();
        assert_eq!(config.syntax.block, "param");
        assert_eq!(config.syntax.end_block, "endparam");
        assert_eq!(config.syntax.name, "name");
    }

    #[test]
    fn empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.syntax, Syntax::default());
    }

    #[test]
    fn rejects_bad_keywords() {
        assert!(matches!(
            Config::from_toml("[syntax]\nblock = \"my block\"\n"),
            Err(ConfigError::InvalidSyntax(_))
        ));
        assert!(matches!(
            Config::from_toml("[syntax]\nend_block = \"block\"\n"),
            Err(ConfigError::InvalidSyntax(_))
        ));
        assert!(matches!(
            Config::from_toml("[syntax]\nmarker = \"\"\n"),
            Err(ConfigError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn invalid_config_diagnostic() {
        let err = Config::from_toml("[syntax]\nname = \"block\"\n").unwrap_err();
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, DiagnosticCode::ConfigInvalid);
        assert!(diag.message.contains("must be distinct"));

        let err = Config::from_toml("[syntax\n").unwrap_err();
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::ConfigInvalid);

        let err = Config::from_file(Path::new("/nonexistent/querypp.toml")).unwrap_err();
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::LoadIoError);
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.syntax, parsed.syntax);
    }
}
