//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Template syntax
    /// An end directive was found while no block was open
    TemplateEndOutsideBlock,

    /// An end directive carries a block name
    TemplateEndWithName,

    /// Input ended while one or more blocks were still open
    TemplateUnclosedBlock,

    // Template usage
    /// A requested block name is not defined by the template
    TemplateUnknownBlock,

    /// A requested query name is not present in the loaded file
    QueryNotFound,

    // Loading and configuration
    /// The template source could not be read
    LoadIoError,

    /// The configuration file is invalid
    ConfigInvalid,

    // General
    /// General informational message
    Info,

    /// General warning message
    Warning,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateEndOutsideBlock => "TEMPLATE_END_OUTSIDE_BLOCK",
            Self::TemplateEndWithName => "TEMPLATE_END_WITH_NAME",
            Self::TemplateUnclosedBlock => "TEMPLATE_UNCLOSED_BLOCK",
            Self::TemplateUnknownBlock => "TEMPLATE_UNKNOWN_BLOCK",
            Self::QueryNotFound => "QUERY_NOT_FOUND",
            Self::LoadIoError => "LOAD_IO_ERROR",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path, or `<input>` for in-memory text
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{}:{}", self.file, line, column),
            (Some(line), None) => write!(f, "{}:{}", self.file, line),
            _ => write!(f, "{}", self.file),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Query the diagnostic belongs to, for multi-query files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Offending source line, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            query: None,
            snippet: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach the name of the query this diagnostic refers to
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Attach the offending source line
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Fill in the file of the location, keeping any line already set
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        let file = file.into();
        self.location = Some(match self.location.take() {
            Some(location) => Location { file, ..location },
            None => Location::new(file),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        // Ensure codes are stable strings
        assert_eq!(DiagnosticCode::TemplateEndOutsideBlock.as_str(), "TEMPLATE_END_OUTSIDE_BLOCK");
        assert_eq!(DiagnosticCode::TemplateUnclosedBlock.as_str(), "TEMPLATE_UNCLOSED_BLOCK");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::TemplateUnclosedBlock,
            Severity::Error,
            "EOF seen but there were blocks open",
        )
        .with_location(Location::with_line("queries/users.sql", 42))
        .with_query("get_user");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("TEMPLATE_UNCLOSED_BLOCK"));
        assert!(json.contains("error"));
        assert!(json.contains("get_user"));
        assert!(!json.contains("snippet"));
    }

    #[test]
    fn in_file_keeps_line() {
        let diag = Diagnostic::new(DiagnosticCode::TemplateEndWithName, Severity::Error, "bad")
            .with_location(Location::with_line("<input>", 3))
            .in_file("a.sql");

        let location = diag.location.unwrap();
        assert_eq!(location.file, "a.sql");
        assert_eq!(location.line, Some(3));
        assert_eq!(location.to_string(), "a.sql:3");
    }
}
