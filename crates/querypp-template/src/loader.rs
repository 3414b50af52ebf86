//! Multi-query files
//!
//! A query file holds several templates, each introduced by a name marker:
//!
//! ```text
//! -- :name get_user
//! SELECT * FROM users WHERE id = $1
//!
//! -- :name list_users
//! SELECT * FROM users
//! -- :block active
//! WHERE active
//! -- :endblock
//! ```
//!
//! Each segment, marker line included, becomes one [`Template`]. Text before
//! the first marker is ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use querypp_core::{ConfigError, Syntax};
use tracing::{debug, trace};

use crate::directive::query_name;
use crate::error::{LoadError, TemplateError};
use crate::template::Template;

/// Templates loaded from one query file, in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    queries: Vec<Template>,
    index: HashMap<String, usize>,
}

impl QuerySet {
    /// Look up a query by name
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.index.get(name).map(|&i| &self.queries[i])
    }

    /// Look up a query by name, failing with the names that do exist
    pub fn require(&self, name: &str) -> Result<&Template, LoadError> {
        self.get(name).ok_or_else(|| LoadError::QueryNotFound {
            query: name.to_string(),
            available: self.names().map(str::to_string).collect(),
        })
    }

    /// Whether a query with this name was loaded
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Query names in order of first appearance
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().filter_map(Template::name)
    }

    /// Name/template pairs in order of first appearance
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.queries
            .iter()
            .filter_map(|template| template.name().map(|name| (name, template)))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    fn insert(&mut self, template: Template) {
        if let Some(name) = template.name() {
            self.index.insert(name.to_string(), self.queries.len());
        }
        self.queries.push(template);
    }
}

impl IntoIterator for QuerySet {
    type Item = Template;
    type IntoIter = std::vec::IntoIter<Template>;

    fn into_iter(self) -> Self::IntoIter {
        self.queries.into_iter()
    }
}

impl FromStr for QuerySet {
    type Err = LoadError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        QueryLoader::with_defaults().load_str(text)
    }
}

/// Raw lines collected for one query name
struct Segment {
    name: String,
    text: String,
    /// Stream line number of every collected line
    stream_lines: Vec<usize>,
}

/// Splits query files into named templates
#[derive(Debug, Clone, Default)]
pub struct QueryLoader {
    syntax: Syntax,
}

impl QueryLoader {
    /// Create a loader for the given directive syntax
    ///
    /// Fails if the syntax cannot be tokenized unambiguously.
    pub fn new(syntax: Syntax) -> Result<Self, ConfigError> {
        syntax.validate()?;
        Ok(Self { syntax })
    }

    /// Create a loader with the default `-- :name` / `-- :block` syntax
    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    /// Load queries from a file
    pub fn load_file(&self, path: &Path) -> Result<QuerySet, LoadError> {
        debug!(path = %path.display(), "loading query file");
        let file = File::open(path)?;
        self.load_reader(BufReader::new(file))
    }

    /// Load queries from a reader; the whole stream is read up front
    pub fn load_reader<R: BufRead>(&self, mut reader: R) -> Result<QuerySet, LoadError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.load_str(&text)
    }

    /// Load queries from text
    ///
    /// A name used by several markers collects all of its segments, in
    /// stream order, into a single template.
    pub fn load_str(&self, text: &str) -> Result<QuerySet, LoadError> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut current = None;

        for (number, raw) in text.split_inclusive('\n').enumerate() {
            let line = raw.trim_end_matches(['\n', '\r']);
            if let Some(name) = query_name(line, &self.syntax) {
                let position = *positions.entry(name.to_string()).or_insert_with(|| {
                    segments.push(Segment {
                        name: name.to_string(),
                        text: String::new(),
                        stream_lines: Vec::new(),
                    });
                    segments.len() - 1
                });
                debug!(query = name, line = number + 1, "found query marker");
                current = Some(position);
            }

            if let Some(position) = current {
                let segment = &mut segments[position];
                segment.text.push_str(raw);
                segment.stream_lines.push(number);
            }
        }

        let mut queries = QuerySet::default();
        for segment in segments {
            let template = Template::parse(Some(segment.name.clone()), &segment.text, &self.syntax)
                .map_err(|source| {
                    let stream_line = stream_line_of(&source, &segment.stream_lines);
                    LoadError::Template {
                        query: segment.name.clone(),
                        stream_line,
                        source,
                    }
                })?;
            trace!(
                query = %segment.name,
                lines = template.line_count(),
                blocks = template.blocks().len(),
                "parsed query"
            );
            queries.insert(template);
        }

        debug!(count = queries.len(), "loaded queries");
        Ok(queries)
    }
}

/// Map an error back to the stream line it came from
fn stream_line_of(error: &TemplateError, stream_lines: &[usize]) -> usize {
    let segment_line = match error {
        TemplateError::Syntax(e) => e.source_line,
        TemplateError::UnknownBlock { .. } | TemplateError::InvalidSyntax(_) => 0,
    };
    stream_lines
        .get(segment_line)
        .or_else(|| stream_lines.first())
        .copied()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_by_name() {
        let queries: QuerySet = "-- :name a\nfoo\nbar\n-- :name b\nbaz\n".parse().unwrap();
        assert_eq!(queries.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(queries.get("a").unwrap().text(), "-- :name a\nfoo\nbar\n");
        assert_eq!(queries.get("b").unwrap().text(), "-- :name b\nbaz\n");
        assert_eq!(queries.get("a").unwrap().name(), Some("a"));
    }

    #[test]
    fn text_before_first_marker_is_dropped() {
        let queries: QuerySet = "preamble\n\n-- :name only\nSELECT 1".parse().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries.get("only").unwrap().text(), "-- :name only\nSELECT 1");
    }

    #[test]
    fn no_markers_is_empty() {
        let queries: QuerySet = "SELECT 1\n-- :block a\n".parse().unwrap();
        assert!(queries.is_empty());
        assert!(!queries.contains("a"));
    }

    #[test]
    fn repeated_name_accumulates() {
        let queries: QuerySet = "-- :name a\n1\n-- :name b\n2\n-- :name a\n3\n".parse().unwrap();
        assert_eq!(queries.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(queries.get("a").unwrap().text(), "-- :name a\n1\n-- :name a\n3\n");
    }

    #[test]
    fn indented_marker() {
        let queries: QuerySet = "  -- :name a\nx\n".parse().unwrap();
        assert!(queries.contains("a"));
    }

    #[test]
    fn malformed_query_reports_stream_line() {
        let err = "-- :name ok\nSELECT 1\n-- :name bad\nSELECT 2\n-- :endblock\n"
            .parse::<QuerySet>()
            .unwrap_err();
        match err {
            LoadError::Template { query, stream_line, .. } => {
                assert_eq!(query, "bad");
                assert_eq!(stream_line, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_reader() {
        let input = std::io::Cursor::new("-- :name a\n-- :block x y\n");
        let queries = QueryLoader::with_defaults().load_reader(input).unwrap();
        let template = queries.get("a").unwrap();
        assert_eq!(template.block_names().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(template.render(Vec::<&str>::new()).unwrap(), "-- :name a\n\n");
    }

    #[test]
    fn require_reports_available_names() {
        let queries: QuerySet = "-- :name a\n1\n-- :name b\n2\n".parse().unwrap();
        assert_eq!(queries.require("b").unwrap().name(), Some("b"));
        match queries.require("c").unwrap_err() {
            LoadError::QueryNotFound { query, available } => {
                assert_eq!(query, "c");
                assert_eq!(available, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn new_rejects_invalid_syntax() {
        let syntax = Syntax {
            block: "endblock".to_string(),
            ..Syntax::default()
        };
        assert!(matches!(QueryLoader::new(syntax), Err(ConfigError::InvalidSyntax(_))));
        assert!(QueryLoader::new(Syntax::default()).is_ok());
    }
}
