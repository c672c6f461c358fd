/// Delimiter resolution from the message header.
pub mod delimiters;
/// Re-exports from the diagnostics crate.
pub mod diag;
/// JSON serialization helpers for the syntax tree.
pub mod dump;
/// HL7v2 lexer — tokenizes raw input into a stream of borrowed tokens.
pub mod lexer;
/// HL7v2 parser — converts tokens into a concrete syntax tree.
pub mod parser;
/// The concrete syntax tree and its traversal surface.
pub mod tree;
