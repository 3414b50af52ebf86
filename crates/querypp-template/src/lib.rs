//! Query template preprocessing
//!
//! This crate handles:
//! - Recognizing `-- :block` / `-- :endblock` directives in query text
//! - Expanding the inline `<sql> -- :block name <sql>` shorthand
//! - Indexing which lines each (possibly nested) block owns
//! - Rendering a template with only the requested blocks kept
//! - Splitting multi-query files on `-- :name` markers

pub mod directive;
pub mod normalize;
pub mod template;
pub mod loader;
pub mod error;

pub use directive::{query_name, Directive};
pub use normalize::{normalize, InlineBlock, Normalized};
pub use template::{BlockIndex, Template};
pub use loader::{QueryLoader, QuerySet};
pub use error::{LoadError, SyntaxError, SyntaxErrorKind, TemplateError};
