//! Block parsing and rendering
//!
//! A [`Template`] is query text annotated with named blocks:
//!
//! ```text
//! SELECT * FROM users
//! WHERE true
//! -- :block active
//! AND active
//! -- :endblock
//! ```
//!
//! Rendering with a set of block names keeps the lines of those blocks and
//! drops every other block's lines. Text outside any block is always kept.
//! Nested blocks are addressed independently: requesting an outer block does
//! not bring in the blocks nested inside it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use querypp_core::Syntax;

use crate::directive::Directive;
use crate::error::{SyntaxError, SyntaxErrorKind, TemplateError};
use crate::normalize::normalize;

/// Block name to the 0-based line numbers it owns, directive lines included
pub type BlockIndex = BTreeMap<String, BTreeSet<usize>>;

/// A parsed query template
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    name: Option<String>,
    text: String,
    blocks: BlockIndex,
}

impl Template {
    /// Parse an unnamed template with the default directive syntax
    pub fn new(text: &str) -> Result<Self, TemplateError> {
        Self::parse(None, text, &Syntax::default())
    }

    /// Parse a named template with the default directive syntax
    pub fn named(name: impl Into<String>, text: &str) -> Result<Self, TemplateError> {
        Self::parse(Some(name.into()), text, &Syntax::default())
    }

    /// Parse a template with an explicit directive syntax
    ///
    /// The syntax is validated first; one that cannot be tokenized
    /// unambiguously is rejected with [`TemplateError::InvalidSyntax`].
    pub fn with_syntax(name: Option<String>, text: &str, syntax: &Syntax) -> Result<Self, TemplateError> {
        syntax
            .validate()
            .map_err(|e| TemplateError::InvalidSyntax(e.to_string()))?;
        Self::parse(name, text, syntax)
    }

    /// Parse with a syntax the caller has already validated
    pub(crate) fn parse(name: Option<String>, text: &str, syntax: &Syntax) -> Result<Self, TemplateError> {
        let normalized = normalize(text, syntax);
        let blocks = index_blocks(&normalized.text, syntax).map_err(|mut e| {
            e.source_line = normalized.origins.get(e.line).copied().unwrap_or(e.line);
            e
        })?;

        Ok(Self {
            name,
            text: normalized.text,
            blocks,
        })
    }

    /// Template name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Normalized text, with inline directives expanded
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Block index: block name to owned line numbers
    pub fn blocks(&self) -> &BlockIndex {
        &self.blocks
    }

    /// Block names in sorted order
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Whether a block with this name exists at any nesting depth
    pub fn contains_block(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Lines owned by a block
    pub fn owned_lines(&self, name: &str) -> Option<&BTreeSet<usize>> {
        self.blocks.get(name)
    }

    /// Lines of the normalized text
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.text.lines()
    }

    /// Number of lines in the normalized text
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Render the template keeping only the requested blocks
    ///
    /// Every name must be a block of this template; an unknown name fails the
    /// whole render. Duplicates are ignored and order does not matter.
    pub fn render<I, S>(&self, blocks: I) -> Result<String, TemplateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut requested = BTreeSet::new();
        for block in blocks {
            let block = block.as_ref();
            let (key, _) = self.blocks.get_key_value(block).ok_or_else(|| TemplateError::UnknownBlock {
                block: block.to_string(),
                template: self.name.clone(),
                available: self.blocks.keys().cloned().collect(),
            })?;
            requested.insert(key.as_str());
        }

        let unwanted: BTreeSet<usize> = self
            .blocks
            .iter()
            .filter(|(name, _)| !requested.contains(name.as_str()))
            .flat_map(|(_, lines)| lines.iter().copied())
            .collect();

        Ok(self.join_lines(|number| !unwanted.contains(&number)))
    }

    /// Render with every block included, reproducing the normalized text
    pub fn render_all(&self) -> String {
        self.join_lines(|_| true)
    }

    /// Concatenate the kept lines, each with its own line terminator
    fn join_lines(&self, keep: impl Fn(usize) -> bool) -> String {
        let mut out = String::with_capacity(self.text.len());

        for (number, line) in self.text.split_inclusive('\n').enumerate() {
            if keep(number) {
                out.push_str(line);
            }
        }

        // Without a final terminator in the text, none follows the last kept line.
        if !self.text.ends_with('\n') && out.ends_with('\n') {
            out.pop();
            if out.ends_with('\r') {
                out.pop();
            }
        }

        out
    }

    /// Single-line preview of the text for debug output
    fn preview(&self, width: usize) -> String {
        let collapsed = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= width {
            return collapsed;
        }

        let mut shortened: String = collapsed.chars().take(width.saturating_sub(6)).collect();
        shortened.push_str(" [...]");
        shortened
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("text", &self.preview(50))
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Scan normalized text and record which lines each block owns
///
/// Lines accumulate in a pending buffer for the innermost open block. The
/// buffer is flushed into the parent before a nested block starts, and into
/// the block itself when it ends, so a line is owned by its innermost block
/// only.
fn index_blocks(text: &str, syntax: &Syntax) -> Result<BlockIndex, SyntaxError> {
    let mut blocks = BlockIndex::new();
    let mut open: Vec<(&str, usize, &str)> = Vec::new();
    let mut pending: Vec<usize> = Vec::new();

    let error = |kind, line: usize, content: &str| SyntaxError {
        kind,
        line,
        source_line: line,
        content: content.to_string(),
    };

    for (number, line) in text.lines().enumerate() {
        match Directive::classify(line, syntax) {
            Some(Directive::EndWithName { name }) => {
                return Err(error(
                    SyntaxErrorKind::EndWithName { name: name.to_string() },
                    number,
                    line,
                ));
            }
            Some(Directive::Start { name }) => {
                if let Some(&(parent, _, _)) = open.last() {
                    flush(&mut blocks, parent, &mut pending);
                }
                open.push((name, number, line));
                pending.push(number);
            }
            Some(Directive::End) => {
                let Some((name, _, _)) = open.pop() else {
                    return Err(error(SyntaxErrorKind::EndOutsideBlock, number, line));
                };
                pending.push(number);
                flush(&mut blocks, name, &mut pending);
            }
            None => {
                if !open.is_empty() {
                    pending.push(number);
                }
            }
        }
    }

    if let Some(&(_, number, line)) = open.last() {
        let names = open.iter().map(|(name, _, _)| name.to_string()).collect();
        return Err(error(SyntaxErrorKind::UnclosedAtEof { open: names }, number, line));
    }

    Ok(blocks)
}

fn flush(blocks: &mut BlockIndex, name: &str, pending: &mut Vec<usize>) {
    blocks
        .entry(name.to_string())
        .or_default()
        .extend(pending.drain(..));
}
