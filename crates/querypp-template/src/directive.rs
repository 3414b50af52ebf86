//! Directive tokenizer
//!
//! Recognizes `<marker> :<keyword> <name>` directives embedded in a line,
//! e.g. `-- :block user_filter`, `-- :endblock` and `-- :name get_user`.
//! Whitespace between the marker and the colon, and between the keyword
//! and the name, is optional.

use querypp_core::Syntax;

/// A block directive found on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `-- :block <name>`
    Start { name: &'a str },

    /// `-- :endblock`
    End,

    /// `-- :endblock <name>`, which is malformed
    EndWithName { name: &'a str },
}

/// A single directive match, before deciding whether it is meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub end: bool,
    pub name: Option<&'a str>,
    /// Byte offset just past the name (or keyword when there is no name)
    pub stop: usize,
}

impl<'a> Directive<'a> {
    /// Classify a line by its leftmost directive
    ///
    /// A block keyword without a name is not a directive: the line is plain
    /// content. Only the leftmost `<marker> :<keyword>` on the line counts.
    pub fn classify(line: &'a str, syntax: &Syntax) -> Option<Self> {
        let token = marker_positions(line, &syntax.marker)
            .find_map(|start| block_token_at(line, start, syntax))?;

        match (token.end, token.name) {
            (true, None) => Some(Self::End),
            (true, Some(name)) => Some(Self::EndWithName { name }),
            (false, Some(name)) => Some(Self::Start { name }),
            (false, None) => None,
        }
    }

    /// Name carried by the directive, if any
    pub fn name(&self) -> Option<&'a str> {
        match self {
            Self::Start { name } | Self::EndWithName { name } => Some(name),
            Self::End => None,
        }
    }
}

/// Every byte offset where `marker` begins, overlapping occurrences included
pub(crate) fn marker_positions<'a>(line: &'a str, marker: &'a str) -> impl DoubleEndedIterator<Item = usize> + 'a {
    line.char_indices()
        .map(|(i, _)| i)
        .filter(move |&i| line[i..].starts_with(marker))
}

/// Match a block or end-block directive starting exactly at `start`
pub(crate) fn block_token_at<'a>(line: &'a str, start: usize, syntax: &Syntax) -> Option<Token<'a>> {
    let rest = keyword_position(line, start, syntax)?;
    let tail = &line[rest..];

    // The end keyword is tried first so a block keyword that prefixes it
    // never swallows an end directive.
    let (end, keyword_len) = if tail.starts_with(syntax.end_block.as_str()) {
        (true, syntax.end_block.len())
    } else if tail.starts_with(syntax.block.as_str()) {
        (false, syntax.block.len())
    } else {
        return None;
    };

    let (name, stop) = name_after(line, rest + keyword_len);
    Some(Token { end, name, stop })
}

/// Extract the query name from a `-- :name <identifier>` marker line
///
/// The marker must start the line, after optional leading whitespace.
pub fn query_name<'a>(line: &'a str, syntax: &Syntax) -> Option<&'a str> {
    let start = line.len() - line.trim_start().len();
    if !line[start..].starts_with(syntax.marker.as_str()) {
        return None;
    }

    let rest = keyword_position(line, start, syntax)?;
    if !line[rest..].starts_with(syntax.name.as_str()) {
        return None;
    }

    name_after(line, rest + syntax.name.len()).0
}

/// Given a marker at `start`, return the offset of the keyword after `<ws>:`
fn keyword_position(line: &str, start: usize, syntax: &Syntax) -> Option<usize> {
    let after_marker = &line[start + syntax.marker.len()..];
    let trimmed = after_marker.trim_start();
    let colon = start + syntax.marker.len() + (after_marker.len() - trimmed.len());
    trimmed.starts_with(':').then_some(colon + 1)
}

/// Skip whitespace at `from` and take the following run of non-whitespace
fn name_after(line: &str, from: usize) -> (Option<&str>, usize) {
    let tail = &line[from..];
    let trimmed = tail.trim_start();
    let name_start = from + (tail.len() - trimmed.len());
    let name_len = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());

    if name_len == 0 {
        (None, from)
    } else {
        (Some(&line[name_start..name_start + name_len]), name_start + name_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str) -> Option<Directive<'_>> {
        Directive::classify(line, &Syntax::default())
    }

    #[test]
    fn start_directive() {
        assert_eq!(classify("-- :block user_id"), Some(Directive::Start { name: "user_id" }));
        assert_eq!(classify("  --   :block   user_id  "), Some(Directive::Start { name: "user_id" }));
        assert_eq!(classify("WHERE 1 = 1 -- :block a"), Some(Directive::Start { name: "a" }));
    }

    #[test]
    fn end_directive() {
        assert_eq!(classify("-- :endblock"), Some(Directive::End));
        assert_eq!(classify("\t--:endblock   "), Some(Directive::End));
    }

    #[test]
    fn end_with_name() {
        assert_eq!(classify("-- :endblock foo"), Some(Directive::EndWithName { name: "foo" }));
        assert_eq!(classify("-- :endblock foo").and_then(|d| d.name()), Some("foo"));
        assert_eq!(Directive::End.name(), None);
    }

    #[test]
    fn bare_block_keyword_is_plain() {
        assert_eq!(classify("-- :block"), None);
        assert_eq!(classify("-- :block    "), None);
    }

    #[test]
    fn non_directives() {
        assert_eq!(classify("SELECT * FROM users"), None);
        assert_eq!(classify("-- just a comment"), None);
        assert_eq!(classify("-- : block foo"), None);
        assert_eq!(classify("-- :name get_user"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn leftmost_directive_wins() {
        assert_eq!(classify("-- x -- :block a -- :endblock"), Some(Directive::Start { name: "a" }));
        assert_eq!(classify("-- : nope -- :block a"), Some(Directive::Start { name: "a" }));
        assert_eq!(classify("--- :block a"), Some(Directive::Start { name: "a" }));
    }

    #[test]
    fn custom_syntax() {
        let syntax = Syntax {
            marker: "#".to_string(),
            block: "param".to_string(),
            end_block: "endparam".to_string(),
            name: "query".to_string(),
        };
        assert_eq!(Directive::classify("# :param x", &syntax), Some(Directive::Start { name: "x" }));
        assert_eq!(Directive::classify("# :endparam", &syntax), Some(Directive::End));
        assert_eq!(Directive::classify("-- :block x", &syntax), None);
        assert_eq!(query_name("# :query q1", &syntax), Some("q1"));
    }

    #[test]
    fn query_name_marker() {
        let syntax = Syntax::default();
        assert_eq!(query_name("-- :name get_user", &syntax), Some("get_user"));
        assert_eq!(query_name("   -- :name get_user :one", &syntax), Some("get_user"));
        assert_eq!(query_name("-- :name", &syntax), None);
        assert_eq!(query_name("SELECT 1 -- :name x", &syntax), None);
        assert_eq!(query_name("-- :block x", &syntax), None);
    }

    #[test]
    fn token_stop_offset() {
        let line = "a -- :block foo rest";
        let token = block_token_at(line, 2, &Syntax::default()).unwrap();
        assert!(!token.end);
        assert_eq!(token.name, Some("foo"));
        assert_eq!(&line[token.stop..], " rest");
    }
}
