//! Rendering IR trees back to S-expression text
//!
//! Two modes share one atom syntax:
//!
//! - **Compact**: the whole tree on one line.
//! - **Formatted**: a list stays on one line while it is shallow and short;
//!   otherwise its head stays next to the `(` and every further element goes
//!   on its own line, indented one level. Comments from a [`CommentMap`] are
//!   written on their own lines above the element they were attached to.
//!
//! Either output parses back to an equal tree.

use super::node::{is_canonical_int, Atom, AtomHint, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Leading comment lines keyed by list-index path from the root
///
/// `[]` is the root expression, `[2]` the third element of the root list,
/// `[2, 0]` the head of that element. A key one past the last element holds
/// comments written just before a closing `)`. Comment text excludes the `;`.
pub type CommentMap = BTreeMap<Vec<usize>, Vec<String>>;

/// Serialization style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Single line, comments dropped
    Compact,
    /// Indented, comments preserved
    #[default]
    Formatted,
}

/// Layout knobs for [`OutputMode::Formatted`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Spaces per nesting level
    pub indent: usize,
    /// Longest line a flat list may produce
    pub max_line_width: usize,
    /// Deepest list nesting still written on one line
    pub flat_depth: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            max_line_width: 80,
            flat_depth: 2,
        }
    }
}

/// Tree-to-text renderer
#[derive(Debug, Clone)]
pub struct Serializer {
    mode: OutputMode,
    options: FormatOptions,
}

impl Serializer {
    /// Renderer for the given mode and layout
    pub fn new(mode: OutputMode, options: FormatOptions) -> Self {
        Self { mode, options }
    }

    /// Single-line renderer
    pub fn compact() -> Self {
        Self::new(OutputMode::Compact, FormatOptions::default())
    }

    /// Indenting renderer with default layout
    pub fn formatted() -> Self {
        Self::new(OutputMode::Formatted, FormatOptions::default())
    }

    /// Render a tree
    pub fn render(&self, node: &Node) -> String {
        self.render_with_comments(node, &CommentMap::new())
    }

    /// Render a tree, writing attached comments in formatted mode
    pub fn render_with_comments(&self, node: &Node, comments: &CommentMap) -> String {
        let mut out = String::new();
        match self.mode {
            OutputMode::Compact => write_flat(node, &mut out),
            OutputMode::Formatted => {
                if let Some(lines) = comments.get(&Vec::new()) {
                    for line in lines {
                        out.push(';');
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                let mut path = Vec::new();
                self.write_formatted(node, &mut path, 0, comments, &mut out);
            }
        }
        out
    }

    fn write_formatted(
        &self,
        node: &Node,
        path: &mut Vec<usize>,
        level: usize,
        comments: &CommentMap,
        out: &mut String,
    ) {
        let mut steps = vec![Step::Visit(node, level)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(Node::Atom(atom), _) => out.push_str(&atom_text(atom)),
                Step::Visit(node, level) => {
                    if !deeper_than(node, self.options.flat_depth)
                        && !has_comments_below(comments, path)
                    {
                        let flat = render_flat(node);
                        if level * self.options.indent + flat.len() <= self.options.max_line_width {
                            out.push_str(&flat);
                            continue;
                        }
                    }
                    let (items, tail) = split_list(node);
                    out.push('(');
                    steps.push(Step::Close {
                        level,
                        count: items.len(),
                        tail,
                    });
                    for (index, item) in items.into_iter().enumerate().rev() {
                        steps.push(Step::Leave);
                        steps.push(Step::Visit(item, level + 1));
                        steps.push(Step::Enter { index, level });
                    }
                }
                Step::Enter { index, level } => {
                    path.push(index);
                    let child_indent = " ".repeat((level + 1) * self.options.indent);
                    let attached = comments.get(path.as_slice());
                    if let Some(lines) = attached {
                        for line in lines {
                            out.push('\n');
                            out.push_str(&child_indent);
                            out.push(';');
                            out.push_str(line);
                        }
                    }
                    if index > 0 || attached.is_some() {
                        out.push('\n');
                        out.push_str(&child_indent);
                    }
                }
                Step::Leave => {
                    path.pop();
                }
                Step::Close { level, count, tail } => {
                    let child_indent = " ".repeat((level + 1) * self.options.indent);
                    if !tail.is_nil() {
                        out.push('\n');
                        out.push_str(&child_indent);
                        out.push_str(". ");
                        write_flat(tail, out);
                    }
                    path.push(count);
                    if let Some(lines) = comments.get(path.as_slice()) {
                        for line in lines {
                            out.push('\n');
                            out.push_str(&child_indent);
                            out.push(';');
                            out.push_str(line);
                        }
                        out.push('\n');
                        out.push_str(&" ".repeat(level * self.options.indent));
                    }
                    path.pop();
                    out.push(')');
                }
            }
        }
    }
}

/// Pending work of the formatted writer
enum Step<'a> {
    Visit(&'a Node, usize),
    /// Before element `index` of a list at `level`
    Enter { index: usize, level: usize },
    Leave,
    Close {
        level: usize,
        count: usize,
        tail: &'a Node,
    },
}

/// True when list nesting below `node` exceeds `limit`, stopping early
fn deeper_than(node: &Node, limit: usize) -> bool {
    let mut stack = vec![(node, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if let Node::Pair(first, rest) = node {
            if depth + 1 > limit {
                return true;
            }
            stack.push((rest, depth));
            stack.push((first, depth + 1));
        }
    }
    false
}

impl Default for Serializer {
    fn default() -> Self {
        Self::formatted()
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&render_flat(self))
    }
}

fn has_comments_below(comments: &CommentMap, path: &[usize]) -> bool {
    comments
        .range(path.to_vec()..)
        .find(|(key, _)| key.as_slice() != path)
        .map(|(key, _)| key.starts_with(path))
        .unwrap_or(false)
}

/// Elements of a list and whatever terminates it (nil for proper lists)
fn split_list(node: &Node) -> (Vec<&Node>, &Node) {
    let mut items = Vec::new();
    let mut cursor = node;
    while let Node::Pair(first, rest) = cursor {
        items.push(first.as_ref());
        cursor = rest;
    }
    (items, cursor)
}

/// One-line rendering
pub fn render_flat(node: &Node) -> String {
    let mut out = String::new();
    write_flat(node, &mut out);
    out
}

fn write_flat(node: &Node, out: &mut String) {
    enum Flat<'a> {
        Node(&'a Node),
        Text(&'static str),
    }

    let mut pending = vec![Flat::Node(node)];
    while let Some(next) = pending.pop() {
        match next {
            Flat::Text(text) => out.push_str(text),
            Flat::Node(Node::Atom(atom)) => out.push_str(&atom_text(atom)),
            Flat::Node(node) => {
                let (items, tail) = split_list(node);
                out.push('(');
                pending.push(Flat::Text(")"));
                if !tail.is_nil() {
                    pending.push(Flat::Node(tail));
                    pending.push(Flat::Text(" . "));
                }
                for (index, item) in items.into_iter().enumerate().rev() {
                    pending.push(Flat::Node(item));
                    if index > 0 {
                        pending.push(Flat::Text(" "));
                    }
                }
            }
        }
    }
}

/// Source text for a single atom
pub fn atom_text(atom: &Atom) -> String {
    if atom.is_empty() {
        return match atom.hint() {
            AtomHint::Int => "0".to_string(),
            AtomHint::Str => "\"\"".to_string(),
            _ => "()".to_string(),
        };
    }
    match atom.hint() {
        AtomHint::Symbol => match atom.as_str() {
            Some(text) if is_bare_symbol(text) => text.to_string(),
            _ => quoted_or_hex(atom),
        },
        AtomHint::Str => quoted_or_hex(atom),
        // a decimal would read back as the minimal encoding
        AtomHint::Int if is_canonical_int(atom.as_bytes()) => atom.to_int().to_string(),
        AtomHint::Int | AtomHint::Bytes => format!("0x{}", hex::encode(atom.as_bytes())),
    }
}

fn quoted_or_hex(atom: &Atom) -> String {
    match atom.as_str() {
        Some(text) if text.chars().all(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r')) => {
            let mut out = String::with_capacity(text.len() + 2);
            out.push('"');
            for c in text.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
        _ => format!("0x{}", hex::encode(atom.as_bytes())),
    }
}

/// True when `text` reads back as a symbol of the same bytes
pub fn is_bare_symbol(text: &str) -> bool {
    if text.is_empty() || text == "." {
        return false;
    }
    if text
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '(' | ')' | '"' | ';'))
    {
        return false;
    }
    if text.starts_with("0x") || text.starts_with("0X") {
        return false;
    }
    !looks_like_integer(text)
}

/// `-?[0-9]+`
pub fn looks_like_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
