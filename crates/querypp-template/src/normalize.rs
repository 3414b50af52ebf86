//! Inline directive expansion
//!
//! Rewrites the single-line shorthand
//!
//! ```text
//! SELECT * FROM users -- :block active WHERE active
//! ```
//!
//! into the canonical multi-line form the block parser understands:
//!
//! ```text
//! SELECT * FROM users
//! -- :block active
//! WHERE active
//! -- :endblock
//! ```

use querypp_core::Syntax;
use crate::directive::{block_token_at, marker_positions};

/// An inline block directive split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineBlock<'a> {
    /// Text before the directive, kept unchanged
    pub leading: &'a str,

    /// The directive and its block name, verbatim
    pub directive: &'a str,

    /// Block content that followed the name on the same line
    pub content: &'a str,
}

impl<'a> InlineBlock<'a> {
    /// Detect the inline shorthand on a single line (without its terminator)
    ///
    /// When several start directives share a line, the rightmost one that is
    /// followed by content is expanded.
    pub fn parse(line: &'a str, syntax: &Syntax) -> Option<Self> {
        marker_positions(line, &syntax.marker).rev().find_map(|start| {
            let token = block_token_at(line, start, syntax)?;
            if token.end || token.name.is_none() {
                return None;
            }

            let after = &line[token.stop..];
            if !after.starts_with(char::is_whitespace) {
                return None;
            }

            let content = after.trim_start();
            if content.is_empty() {
                return None;
            }

            Some(Self {
                leading: &line[..start],
                directive: &line[start..token.stop],
                content,
            })
        })
    }
}

/// Normalized template text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Text with every inline directive expanded
    pub text: String,

    /// For each normalized line, the 0-based line of the input it came from
    pub origins: Vec<usize>,
}

/// Expand every inline directive in `text`
///
/// Lines are handled independently; lines without the shorthand are copied
/// verbatim, terminator included. Expanded lines always end in `\n`.
pub fn normalize(text: &str, syntax: &Syntax) -> Normalized {
    let end_directive = syntax.end_directive();
    let mut out = String::with_capacity(text.len());
    let mut origins = Vec::new();

    for (number, raw) in text.split_inclusive('\n').enumerate() {
        let line = raw
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(raw);

        match InlineBlock::parse(line, syntax) {
            Some(inline) => {
                for part in [inline.leading, inline.directive, inline.content, end_directive.as_str()] {
                    out.push_str(part);
                    out.push('\n');
                    origins.push(number);
                }
            }
            None => {
                out.push_str(raw);
                origins.push(number);
            }
        }
    }

    Normalized { text: out, origins }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(text: &str) -> String {
        normalize(text, &Syntax::default()).text
    }

    #[test]
    fn plain_text_unchanged() {
        let text = "SELECT *\nFROM users\nWHERE id = $1\n";
        assert_eq!(expand(text), text);
        assert_eq!(expand("no trailing newline"), "no trailing newline");
    }

    #[test]
    fn multiline_directive_unchanged() {
        let text = "SELECT *\n-- :block a\nWHERE a\n-- :endblock\n";
        assert_eq!(expand(text), text);
    }

    #[test]
    fn inline_with_leading_text() {
        assert_eq!(
            expand("SELECT * FROM users -- :block active WHERE active\n"),
            "SELECT * FROM users \n-- :block active\nWHERE active\n-- :endblock\n"
        );
    }

    #[test]
    fn inline_without_leading_text() {
        assert_eq!(
            expand("-- :block username WHERE username = $1"),
            "\n-- :block username\nWHERE username = $1\n-- :endblock\n"
        );
    }

    #[test]
    fn directive_kept_verbatim() {
        let inline = InlineBlock::parse("x --  :block   foo   bar baz", &Syntax::default()).unwrap();
        assert_eq!(inline.leading, "x ");
        assert_eq!(inline.directive, "--  :block   foo");
        assert_eq!(inline.content, "bar baz");
    }

    #[test]
    fn rightmost_directive_expanded() {
        let inline = InlineBlock::parse("a -- :block x b -- :block y c", &Syntax::default()).unwrap();
        assert_eq!(inline.leading, "a -- :block x b ");
        assert_eq!(inline.directive, "-- :block y");
        assert_eq!(inline.content, "c");
    }

    #[test]
    fn end_directive_never_inline() {
        assert_eq!(InlineBlock::parse("-- :endblock trailing", &Syntax::default()), None);
        assert_eq!(InlineBlock::parse("-- :block onlyname", &Syntax::default()), None);
        assert_eq!(InlineBlock::parse("-- :block onlyname   ", &Syntax::default()), None);
    }

    #[test]
    fn crlf_lines() {
        let normalized = normalize("a\r\nb -- :block x y\r\nc", &Syntax::default());
        assert_eq!(normalized.text, "a\r\nb \n-- :block x\ny\n-- :endblock\nc");
        assert_eq!(normalized.origins, vec![0, 1, 1, 1, 1, 2]);
    }

    #[test]
    fn origins_track_input_lines() {
        let normalized = normalize("a\n-- :block x y\nb\n", &Syntax::default());
        assert_eq!(normalized.origins, vec![0, 1, 1, 1, 1, 2]);
        assert_eq!(normalized.text.lines().count(), normalized.origins.len());
    }
}
