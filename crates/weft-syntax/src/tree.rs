use std::fmt;
use std::sync::Arc;

use text_size::{TextRange, TextSize};

use crate::SyntaxKind;

/// Node-or-token wrapper used throughout the tree API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeOrToken<N, T> {
    Node(N),
    Token(T),
}

impl<N, T> NodeOrToken<N, T> {
    /// Converts into the node variant, if any.
    pub fn into_node(self) -> Option<N> {
        match self {
            NodeOrToken::Node(node) => Some(node),
            NodeOrToken::Token(_) => None,
        }
    }

    /// Converts into the token variant, if any.
    pub fn into_token(self) -> Option<T> {
        match self {
            NodeOrToken::Node(_) => None,
            NodeOrToken::Token(token) => Some(token),
        }
    }

    /// Returns a shared reference to the node, if any.
    pub fn as_node(&self) -> Option<&N> {
        match self {
            NodeOrToken::Node(node) => Some(node),
            NodeOrToken::Token(_) => None,
        }
    }

    /// Returns a shared reference to the token, if any.
    pub fn as_token(&self) -> Option<&T> {
        match self {
            NodeOrToken::Node(_) => None,
            NodeOrToken::Token(token) => Some(token),
        }
    }
}

/// An element of the parse tree.
///
/// Equality is structural. Use [`ParseNode::ptr_eq`] to check whether two
/// handles refer to the very same shared subtree.
pub type ParseNode = NodeOrToken<GreenNode, GreenToken>;

impl ParseNode {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            NodeOrToken::Node(node) => node.kind(),
            NodeOrToken::Token(token) => token.kind(),
        }
    }

    pub fn text_len(&self) -> TextSize {
        match self {
            NodeOrToken::Node(node) => node.text_len(),
            NodeOrToken::Token(token) => token.text_len(),
        }
    }

    /// Returns `true` if this element is, or contains, an error token.
    pub fn has_errors(&self) -> bool {
        match self {
            NodeOrToken::Node(node) => node.has_errors(),
            NodeOrToken::Token(token) => token.is_error(),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeOrToken::Node(a), NodeOrToken::Node(b)) => a.ptr_eq(b),
            (NodeOrToken::Token(a), NodeOrToken::Token(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Concatenated text of all tokens in document order.
    pub fn text(&self) -> String {
        let mut buf = String::with_capacity(u32::from(self.text_len()) as usize);
        self.write_text(&mut buf);
        buf
    }

    pub fn write_text(&self, buf: &mut String) {
        match self {
            NodeOrToken::Node(node) => {
                for child in node.children() {
                    child.write_text(buf);
                }
            }
            NodeOrToken::Token(token) => buf.push_str(token.text()),
        }
    }

    /// Returns a copy of `self` where the subtree identical to `old` is
    /// replaced by `new`, or `None` if `old` does not occur in `self`.
    ///
    /// Only the nodes on the path from the root to `old` are rebuilt; every
    /// other subtree is shared with `self`.
    pub fn replace(&self, old: &ParseNode, new: &ParseNode) -> Option<ParseNode> {
        if self.ptr_eq(old) {
            return Some(new.clone());
        }
        let node = self.as_node()?;
        node.children().iter().enumerate().find_map(|(index, child)| {
            let child = child.replace(old, new)?;
            Some(NodeOrToken::Node(node.replace_child(index, child)))
        })
    }

    /// Range of the subtree identical to `target`, relative to the start of
    /// `self`.
    pub fn range_of(&self, target: &ParseNode) -> Option<TextRange> {
        self.range_of_at(target, TextSize::new(0))
    }

    fn range_of_at(&self, target: &ParseNode, start: TextSize) -> Option<TextRange> {
        if self.ptr_eq(target) {
            return Some(TextRange::at(start, self.text_len()));
        }
        let mut offset = start;
        for child in self.as_node()?.children() {
            if let Some(range) = child.range_of_at(target, offset) {
                return Some(range);
            }
            offset += child.text_len();
        }
        None
    }

    /// Ranges of all error tokens, relative to the start of `self`.
    pub fn error_ranges(&self) -> Vec<TextRange> {
        let mut ranges = Vec::new();
        self.walk(&mut |element, start, _| {
            if let NodeOrToken::Token(token) = element
                && token.is_error()
            {
                ranges.push(TextRange::at(start, token.text_len()));
            }
        });
        ranges
    }

    /// Visits every element in preorder with its start offset and depth.
    pub fn walk(&self, f: &mut dyn FnMut(&ParseNode, TextSize, usize)) {
        self.walk_at(f, TextSize::new(0), 0);
    }

    fn walk_at(
        &self,
        f: &mut dyn FnMut(&ParseNode, TextSize, usize),
        start: TextSize,
        depth: usize,
    ) {
        f(self, start, depth);
        if let NodeOrToken::Node(node) = self {
            let mut offset = start;
            for child in node.children() {
                child.walk_at(f, offset, depth + 1);
                offset += child.text_len();
            }
        }
    }
}

impl From<GreenNode> for ParseNode {
    fn from(node: GreenNode) -> Self {
        NodeOrToken::Node(node)
    }
}

impl From<GreenToken> for ParseNode {
    fn from(token: GreenToken) -> Self {
        NodeOrToken::Token(token)
    }
}

/// Composite element: a matched non-terminal or a repetition.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GreenNode(Arc<GreenNodeData>);

#[derive(PartialEq, Eq, Hash)]
struct GreenNodeData {
    kind: SyntaxKind,
    repeat: bool,
    children: Vec<ParseNode>,
    text_len: TextSize,
    has_errors: bool,
}

impl GreenNode {
    pub fn new(kind: SyntaxKind, children: Vec<ParseNode>) -> Self {
        Self::alloc(kind, false, children)
    }

    /// A node standing for a repetition: each child is one element.
    pub fn repeat(kind: SyntaxKind, children: Vec<ParseNode>) -> Self {
        Self::alloc(kind, true, children)
    }

    fn alloc(kind: SyntaxKind, repeat: bool, children: Vec<ParseNode>) -> Self {
        let text_len = children.iter().map(ParseNode::text_len).sum();
        let has_errors = children.iter().any(ParseNode::has_errors);
        Self(Arc::new(GreenNodeData { kind, repeat, children, text_len, has_errors }))
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.kind
    }

    pub fn is_repeat(&self) -> bool {
        self.0.repeat
    }

    pub fn children(&self) -> &[ParseNode] {
        &self.0.children
    }

    pub fn text_len(&self) -> TextSize {
        self.0.text_len
    }

    pub fn has_errors(&self) -> bool {
        self.0.has_errors
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A node of the same kind and shape with different children.
    pub fn with_children(&self, children: Vec<ParseNode>) -> Self {
        Self::alloc(self.kind(), self.is_repeat(), children)
    }

    pub fn replace_child(&self, index: usize, child: ParseNode) -> Self {
        let mut children = self.children().to_vec();
        children[index] = child;
        self.with_children(children)
    }

    pub fn insert_child(&self, index: usize, child: ParseNode) -> Self {
        let mut children = self.children().to_vec();
        children.insert(index, child);
        self.with_children(children)
    }

    pub fn remove_child(&self, index: usize) -> Self {
        let mut children = self.children().to_vec();
        children.remove(index);
        self.with_children(children)
    }
}

impl fmt::Debug for GreenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenNode")
            .field("kind", &self.kind())
            .field("repeat", &self.is_repeat())
            .field("text_len", &self.text_len())
            .field("children", &self.children())
            .finish()
    }
}

/// Leaf element: matched text, or an error token covering skipped or
/// missing input.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GreenToken(Arc<GreenTokenData>);

#[derive(PartialEq, Eq, Hash)]
struct GreenTokenData {
    kind: SyntaxKind,
    text: Box<str>,
    error: bool,
}

impl GreenToken {
    pub fn new(kind: SyntaxKind, text: &str) -> Self {
        Self(Arc::new(GreenTokenData { kind, text: text.into(), error: false }))
    }

    /// An error token. `text` is empty for missing input.
    pub fn error(kind: SyntaxKind, text: &str) -> Self {
        Self(Arc::new(GreenTokenData { kind, text: text.into(), error: true }))
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.kind
    }

    pub fn text(&self) -> &str {
        &self.0.text
    }

    pub fn text_len(&self) -> TextSize {
        TextSize::of(self.text())
    }

    pub fn is_error(&self) -> bool {
        self.0.error
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for GreenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenToken")
            .field("kind", &self.kind())
            .field("text", &self.text())
            .field("error", &self.is_error())
            .finish()
    }
}
