//! Template and loader errors

use querypp_core::{Diagnostic, DiagnosticCode, Location, Severity};

/// Label used for locations when the template did not come from a file
pub const INPUT_LABEL: &str = "<input>";

/// What is wrong with a malformed template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("endblock found but not in a block")]
    EndOutsideBlock,

    #[error("endblock found with a name ('{name}')")]
    EndWithName { name: String },

    #[error("EOF seen but there were blocks open (unbalanced blocks: {})", .open.join(", "))]
    UnclosedAtEof {
        /// Blocks still open, outermost first
        open: Vec<String>,
    },
}

impl SyntaxErrorKind {
    /// Stable diagnostic code for this kind
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::EndOutsideBlock => DiagnosticCode::TemplateEndOutsideBlock,
            Self::EndWithName { .. } => DiagnosticCode::TemplateEndWithName,
            Self::UnclosedAtEof { .. } => DiagnosticCode::TemplateUnclosedBlock,
        }
    }
}

/// A malformed block structure
///
/// For unclosed blocks the reported line is the start directive of the
/// innermost block that was never closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}: {content:?}", .source_line + 1)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,

    /// 0-based line in the normalized text
    pub line: usize,

    /// 0-based line in the text the template was built from
    pub source_line: usize,

    /// The offending line, verbatim
    pub content: String,
}

impl SyntaxError {
    /// Convert to a querypp diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.kind.code(), Severity::Error, self.kind.to_string())
            .with_location(Location::with_line(INPUT_LABEL, self.source_line + 1))
            .with_snippet(self.content.clone())
    }
}

/// Error building or rendering a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("unknown block '{block}' (available: {})", .available.join(", "))]
    UnknownBlock {
        block: String,
        template: Option<String>,
        available: Vec<String>,
    },

    #[error("{0}")]
    InvalidSyntax(String),
}

impl TemplateError {
    /// Convert to a querypp diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Syntax(e) => e.to_diagnostic(),
            Self::UnknownBlock { template, .. } => {
                let diag = Diagnostic::new(
                    DiagnosticCode::TemplateUnknownBlock,
                    Severity::Error,
                    self.to_string(),
                );
                match template {
                    Some(name) => diag.with_query(name.clone()),
                    None => diag,
                }
            }
            Self::InvalidSyntax(message) => {
                Diagnostic::new(DiagnosticCode::ConfigInvalid, Severity::Error, message.clone())
            }
        }
    }

    /// Whether this is a syntax error in the template source
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }
}

/// Error loading a multi-query stream
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("query '{query}' is malformed: {source}")]
    Template {
        query: String,

        /// 0-based line of the stream where the error was found
        stream_line: usize,

        #[source]
        source: TemplateError,
    },

    #[error("query '{query}' not found (available: {})", .available.join(", "))]
    QueryNotFound {
        query: String,
        available: Vec<String>,
    },
}

impl LoadError {
    /// Convert to a querypp diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Io(e) => Diagnostic::new(
                DiagnosticCode::LoadIoError,
                Severity::Error,
                format!("IO error: {}", e),
            ),
            Self::Template { query, stream_line, source } => {
                let mut diag = source.to_diagnostic().with_query(query.clone());
                diag.location = Some(Location::with_line(INPUT_LABEL, stream_line + 1));
                diag
            }
            Self::QueryNotFound { query, .. } => Diagnostic::new(
                DiagnosticCode::QueryNotFound,
                Severity::Error,
                self.to_string(),
            )
            .with_query(query.clone()),
        }
    }
}
