//! querypp core
//!
//! Shared, versioned types: diagnostics, reports and configuration.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, Syntax};
