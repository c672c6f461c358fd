//! HL7v2 toolchain core library.
//!
//! Structural parsing of HL7v2 messages: the delimiter set is resolved from
//! the message's own header segment, the input is tokenized under that set,
//! and a span-preserving concrete syntax tree is built with best-effort
//! recovery. The main entry points are [`parse`] for parsing and
//! [`SyntaxTree::decoded_text`] for lazy escape decoding.
//!
//! Parsing one message is a pure, synchronous computation with no shared
//! mutable state; independent messages parse concurrently without locking.

#![warn(missing_docs)]

/// Escape decoding as a lazy projection over leaf spans.
pub mod escape;
/// HL7v2 grammar: delimiter resolution, lexer, parser, syntax tree.
pub mod grammar;

// ── Convenience re-exports ──────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Parser
pub use grammar::parser::{ParseOptions, ParseResult, parse, parse_with_options};

// Syntax tree
pub use grammar::tree::{NodeId, NodeKind, SyntaxTree};

// Delimiters
pub use grammar::delimiters::{DelimiterSet, HeaderError};

// Escape decoding
pub use escape::{DecodeConfig, Decoded, SemanticEscapes, decode};

// Diagnostics (re-exported from the diagnostics crate)
pub use grammar::diag::{Diagnostic, LineIndex, Severity, Span, codes};

// Serialization helpers
pub use grammar::dump::to_pretty_json;
