//! S-expression tree
//!
//! Tokens from [`super::lexer`] are folded into an arena of nodes. Lists hold
//! the ids of their children, so the tree is flat in memory, cheap to share
//! across threads and never recursive in ownership. [`NodeRef`] is the
//! borrowed view extractors walk.
//!
//! [`SExp`] is the owned counterpart used when writing S-expressions back
//! out.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use thiserror::Error;

use super::lexer::{LexError, Lexer, Location, SpannedToken, Token};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unbalanced parentheses: unexpected ')' at {location}")]
    UnbalancedParens { location: Location },
    #[error("unterminated list: {depth} list(s) still open at end of input, outermost opened at {location}")]
    UnterminatedList { depth: usize, location: Location },
    #[error("empty document")]
    EmptyInput,
    #[error("unexpected content after the root expression at {location}")]
    TrailingContent { location: Location },
}

impl ParseError {
    pub fn location(&self) -> Option<Location> {
        match self {
            ParseError::Lex(e) => Some(e.location()),
            ParseError::UnbalancedParens { location }
            | ParseError::UnterminatedList { location, .. }
            | ParseError::TrailingContent { location } => Some(*location),
            ParseError::EmptyInput => None,
        }
    }
}

/// Handle of a node inside its [`SExpTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Atom {
        text: String,
        quoted: bool,
        span: Range<usize>,
    },
    List {
        children: Vec<NodeId>,
        span: Range<usize>,
    },
}

impl Node {
    pub fn span(&self) -> Range<usize> {
        match self {
            Node::Atom { span, .. } | Node::List { span, .. } => span.clone(),
        }
    }
}

/// One parsed document: an arena of nodes plus the id of the root.
#[derive(Debug, Clone)]
pub struct SExpTree {
    nodes: Vec<Node>,
    root: NodeId,
    line_starts: Vec<usize>,
}

struct Frame {
    start: usize,
    children: Vec<NodeId>,
}

impl SExpTree {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Self::from_tokens(input, Lexer::new(input))
    }

    /// Build a tree from an already produced token stream. `input` is only
    /// used to resolve error locations.
    pub fn from_tokens<'a, I>(input: &str, tokens: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<SpannedToken<'a>, LexError>>,
    {
        let locate = |offset| Location::locate(input, offset);
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<NodeId> = None;

        for tok in tokens {
            let SpannedToken { token, span } = tok?;
            let finished = match token {
                Token::OpenParen => {
                    if stack.is_empty() && root.is_some() {
                        return Err(ParseError::TrailingContent {
                            location: locate(span.start),
                        });
                    }
                    stack.push(Frame {
                        start: span.start,
                        children: Vec::new(),
                    });
                    continue;
                }
                Token::CloseParen => {
                    let frame = stack.pop().ok_or_else(|| ParseError::UnbalancedParens {
                        location: locate(span.start),
                    })?;
                    Node::List {
                        children: frame.children,
                        span: frame.start..span.end,
                    }
                }
                Token::Atom(text) => Node::Atom {
                    text: text.to_string(),
                    quoted: false,
                    span,
                },
                Token::QuotedString(text) => Node::Atom {
                    text: text.into_owned(),
                    quoted: true,
                    span,
                },
            };

            let start = finished.span().start;
            let id = NodeId(nodes.len() as u32);
            nodes.push(finished);
            match stack.last_mut() {
                Some(frame) => frame.children.push(id),
                None if root.is_none() => root = Some(id),
                None => {
                    return Err(ParseError::TrailingContent {
                        location: locate(start),
                    })
                }
            }
        }

        if let Some(outermost) = stack.first() {
            return Err(ParseError::UnterminatedList {
                depth: stack.len(),
                location: locate(outermost.start),
            });
        }
        let root = root.ok_or(ParseError::EmptyInput)?;

        let line_starts = std::iter::once(0)
            .chain(input.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Ok(Self {
            nodes,
            root,
            line_starts,
        })
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn location(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Location {
            offset,
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SExpTree,
    id: NodeId,
}

pub struct Children<'t> {
    tree: &'t SExpTree,
    ids: std::slice::Iter<'t, NodeId>,
}

impl<'t> Iterator for Children<'t> {
    type Item = NodeRef<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|&id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'t Node {
        &self.tree.nodes[self.id.index()]
    }

    pub fn span(&self) -> Range<usize> {
        self.node().span()
    }

    pub fn location(&self) -> Location {
        self.tree.location(self.span().start)
    }

    pub fn as_atom(&self) -> Option<&'t str> {
        match self.node() {
            Node::Atom { text, .. } => Some(text),
            Node::List { .. } => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.node(), Node::List { .. })
    }

    pub fn children(&self) -> Children<'t> {
        let empty: &'static [NodeId] = &[];
        let ids = match self.node() {
            Node::List { children, .. } => children.iter(),
            Node::Atom { .. } => empty.iter(),
        };
        Children {
            tree: self.tree,
            ids,
        }
    }

    pub fn len(&self) -> usize {
        match self.node() {
            Node::List { children, .. } => children.len(),
            Node::Atom { .. } => 0,
        }
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'t>> {
        self.children().nth(index)
    }

    /// The keyword of a list, i.e. its leading atom.
    pub fn head(&self) -> Option<&'t str> {
        self.child(0).and_then(|c| c.as_atom())
    }

    /// Atom at position `index` after the head.
    pub fn arg(&self, index: usize) -> Option<&'t str> {
        self.child(index + 1).and_then(|c| c.as_atom())
    }

    pub fn parse_arg<T: FromStr>(&self, index: usize) -> Option<T> {
        self.arg(index).and_then(|s| s.parse().ok())
    }

    /// First child list whose head is `key`.
    pub fn get(&self, key: &str) -> Option<NodeRef<'t>> {
        self.children().find(|c| c.head() == Some(key))
    }

    pub fn get_all<'k>(&self, key: &'k str) -> impl Iterator<Item = NodeRef<'t>> + 'k
    where
        't: 'k,
    {
        self.children().filter(move |c| c.head() == Some(key))
    }

    /// First argument of the `(key value ...)` child.
    pub fn value(&self, key: &str) -> Option<&'t str> {
        self.get(key).and_then(|c| c.arg(0))
    }

    pub fn parse_value<T: FromStr>(&self, key: &str) -> Option<T> {
        self.value(key).and_then(|s| s.parse().ok())
    }

    /// True for a bare `flag` atom among the children or a `(flag yes)` child.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.children().any(|c| match c.as_atom() {
            Some(a) => a == flag,
            None => c.head() == Some(flag) && c.arg(0).map_or(true, |v| v == "yes"),
        })
    }

    /// Copy this subtree into an owned [`SExp`].
    pub fn to_sexp(&self) -> SExp {
        match self.node() {
            Node::Atom { text, quoted, .. } => {
                if *quoted {
                    SExp::Str(text.clone())
                } else {
                    SExp::Atom(text.clone())
                }
            }
            Node::List { .. } => SExp::List(self.children().map(|c| c.to_sexp()).collect()),
        }
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:?}, {})", self.id, self)
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_sexp(), f)
    }
}

/// Owned S-expression used for emitting files.
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    /// Always written quoted
    Str(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn atom(s: impl Into<String>) -> Self {
        SExp::Atom(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        SExp::Str(s.into())
    }

    /// `(head items...)`
    pub fn list(head: &str, items: impl IntoIterator<Item = SExp>) -> Self {
        let mut v = vec![SExp::atom(head)];
        v.extend(items);
        SExp::List(v)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) | SExp::Str(s) => Some(s),
            SExp::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Multi-line rendering: nested lists go on their own indented line.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        match self {
            SExp::List(items) if items.iter().any(|i| matches!(i, SExp::List(_))) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    match item {
                        SExp::List(_) => {
                            out.push('\n');
                            out.push_str(&"  ".repeat(depth + 1));
                            item.write_pretty(out, depth + 1);
                        }
                        _ => {
                            if i > 0 {
                                out.push(' ');
                            }
                            out.push_str(&item.to_string());
                        }
                    }
                }
                out.push(')');
            }
            _ => out.push_str(&self.to_string()),
        }
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '\\')
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            _ => write!(f, "{}", ch)?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Atom(s) if needs_quotes(s) => write_quoted(f, s),
            SExp::Atom(s) => write!(f, "{}", s),
            SExp::Str(s) => write_quoted(f, s),
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
