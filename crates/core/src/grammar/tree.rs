use serde::{Deserialize, Serialize};

use super::delimiters::DelimiterSet;
use super::diag::Span;
use crate::escape::{DecodeConfig, Decoded, decode};

/// Index of a node within its owning [`SyntaxTree`].
///
/// Ids are only meaningful against the tree that produced them; indexing a
/// different tree with them is a logic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed set of node kinds in an HL7v2 syntax tree.
///
/// Modeling the hierarchy as one tagged union (rather than a struct per
/// level) keeps traversal uniform and `match`es exhaustive: every node
/// answers `kind`, `span`, `children`, and `parent` the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The root; children are segments, error nodes, and terminator leaves.
    Message,
    /// One line-like unit, identified by a three-character type code.
    Segment,
    /// A field within a segment.
    Field,
    /// One repetition of a field.
    Repetition,
    /// A component within a repetition.
    Component,
    /// A subcomponent within a component.
    Subcomponent,
    /// A leaf covering raw source text: content, a separator character, or
    /// a segment terminator. Never has children.
    Literal,
    /// A malformed construct kept in the tree so parsing stays total. Holds
    /// a message plus best-effort children.
    Error,
}

/// One node in the tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Node kind.
    pub kind: NodeKind,
    /// Byte span in the source text.
    pub span: Span,
    /// Parent node, if any (only the root has none). Non-owning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Children in source order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<NodeId>,
    /// Segment type code, for segment (and salvaged error) nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Diagnostic message, for error nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An immutable HL7v2 concrete syntax tree.
///
/// The tree owns a copy of the source text and the resolved [`DelimiterSet`],
/// so span-to-text projection and lazy escape decoding need no external
/// state. Nodes live in an arena indexed by [`NodeId`]; the root `Message`
/// node is always index 0. Flattening the `Literal` leaves of a well-formed
/// parse reproduces the source text exactly — decoding is an on-demand
/// projection, never a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    text: String,
    delimiters: DelimiterSet,
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    /// The root `Message` node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Kind of a node.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    /// Source span of a node.
    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    /// Parent of a node (`None` for the root).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Children of a node in source order, separators included.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Child at `index`, if any.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(index).copied()
    }

    /// Segment type code of a node, if it has one. Error nodes that
    /// salvaged a recognizable code carry it too.
    pub fn segment_code(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].code.as_deref()
    }

    /// Error message of an [`NodeKind::Error`] node.
    pub fn error_message(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].message.as_deref()
    }

    /// The delimiter set resolved from this message's header.
    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delimiters
    }

    /// The source text the tree was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw (undecoded) source text covered by a node's span.
    pub fn raw_text(&self, id: NodeId) -> &str {
        let span = self.span(id);
        &self.text[span.start..span.end]
    }

    /// Decode a node's raw text through the escape decoder.
    ///
    /// Pure and idempotent: the same node under the same config always
    /// yields the same output, and the tree is never mutated. Diagnostic
    /// spans in the result are rebased to whole-message offsets.
    pub fn decoded_text(&self, id: NodeId, config: &DecodeConfig) -> Decoded {
        let base = self.span(id).start;
        let mut decoded = decode(self.raw_text(id), &self.delimiters, config);
        for diag in &mut decoded.diagnostics {
            diag.span = diag.span.map(|s| s.offset(base));
        }
        decoded
    }

    // ── Structural enumeration ──────────────────────────────────────────
    // Separator and terminator leaves sit between structural siblings, so
    // positional APIs filter by kind instead of indexing children directly.

    /// All segments at the message level, error stand-ins included, in
    /// source order.
    pub fn segments(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children(self.root())
            .iter()
            .copied()
            .filter(|id| matches!(self.kind(*id), NodeKind::Segment | NodeKind::Error))
    }

    /// Segments matching a literal type code (e.g. `"PID"`), in source order.
    pub fn segments_of<'a>(&'a self, code: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.segments()
            .filter(move |id| self.segment_code(*id) == Some(code))
    }

    /// Fields of a segment, in source order. The first field is the type
    /// code itself.
    pub fn fields(&self, segment: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.filtered(segment, NodeKind::Field)
    }

    /// Repetitions of a field, in source order.
    pub fn repetitions(&self, field: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.filtered(field, NodeKind::Repetition)
    }

    /// Components of a repetition, in source order.
    pub fn components(&self, repetition: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.filtered(repetition, NodeKind::Component)
    }

    /// Subcomponents of a component, in source order.
    pub fn subcomponents(&self, component: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.filtered(component, NodeKind::Subcomponent)
    }

    fn filtered(&self, id: NodeId, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.kind(*c) == kind)
    }

    /// All `Literal` leaves of the tree in source order (pre-order walk).
    ///
    /// For a complete, untruncated parse the leaf spans are contiguous and
    /// concatenate back to the source text.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            if node.kind == NodeKind::Literal {
                out.push(id);
            }
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Number of nodes in the tree (root included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree is never empty; this exists to pair with [`SyntaxTree::len`].
    pub fn is_empty(&self) -> bool {
        false
    }
}

// ── Construction (tree builder side) ────────────────────────────────────

/// Append-only arena used by the parser while building a tree.
///
/// The finished [`SyntaxTree`] is immutable; all mutation happens here,
/// before `finish` seals it.
pub(crate) struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    /// Start a tree with a root `Message` node spanning the whole input.
    pub(crate) fn new(input_len: usize) -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Message,
                span: Span::new(0, input_len),
                parent: None,
                children: Vec::new(),
                code: None,
                message: None,
            }],
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child node under `parent` and return its id.
    pub(crate) fn push(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
            code: None,
            message: None,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub(crate) fn set_code(&mut self, id: NodeId, code: impl Into<String>) {
        self.nodes[id.index()].code = Some(code.into());
    }

    pub(crate) fn set_message(&mut self, id: NodeId, message: impl Into<String>) {
        self.nodes[id.index()].message = Some(message.into());
    }

    /// Seal the arena into an immutable tree.
    pub(crate) fn finish(self, text: String, delimiters: DelimiterSet) -> SyntaxTree {
        SyntaxTree {
            text,
            delimiters,
            nodes: self.nodes,
        }
    }
}
