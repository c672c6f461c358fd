//! Shared test helpers for `hl7v2_toolchain_core` integration tests.

#![allow(unreachable_pub)]

use hl7v2_toolchain_core::grammar::parser::ParseResult;
use hl7v2_toolchain_core::{NodeId, NodeKind, SyntaxTree};

// ─── Parse-result helpers ───────────────────────────────────────────────

/// Collect segment type codes (in order) from the message level.
/// Error stand-ins without a salvageable code appear as `"<error>"`.
#[allow(dead_code)]
pub fn segment_codes(tree: &SyntaxTree) -> Vec<String> {
    tree.segments()
        .map(|s| {
            tree.segment_code(s)
                .map_or_else(|| "<error>".to_string(), str::to_string)
        })
        .collect()
}

/// Collect diagnostic codes from parser diagnostics.
#[allow(dead_code)]
pub fn diag_codes(result: &ParseResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .map(|d| d.id.to_string())
        .collect()
}

/// The nth segment at the message level (error stand-ins included).
#[allow(dead_code)]
pub fn segment(tree: &SyntaxTree, n: usize) -> NodeId {
    tree.segments()
        .nth(n)
        .unwrap_or_else(|| panic!("no segment at index {n}"))
}

/// Raw text of the nth field of a segment (0-based; field 0 is the type
/// code).
#[allow(dead_code)]
pub fn field_text<'t>(tree: &'t SyntaxTree, seg: NodeId, n: usize) -> &'t str {
    let field = tree
        .fields(seg)
        .nth(n)
        .unwrap_or_else(|| panic!("no field at index {n}"));
    tree.raw_text(field)
}

/// Raw texts of the components of a field's first repetition.
#[allow(dead_code)]
pub fn component_texts<'t>(tree: &'t SyntaxTree, seg: NodeId, field_n: usize) -> Vec<&'t str> {
    let field = tree
        .fields(seg)
        .nth(field_n)
        .unwrap_or_else(|| panic!("no field at index {field_n}"));
    let rep = tree
        .repetitions(field)
        .next()
        .expect("field has no repetition");
    tree.components(rep).map(|c| tree.raw_text(c)).collect()
}

/// Concatenate the raw text of every literal leaf, in source order.
#[allow(dead_code)]
pub fn leaf_concat(tree: &SyntaxTree) -> String {
    tree.leaves().iter().map(|l| tree.raw_text(*l)).collect()
}

/// Count message-level children of a given kind.
#[allow(dead_code)]
pub fn count_kind(tree: &SyntaxTree, kind: NodeKind) -> usize {
    tree.children(tree.root())
        .iter()
        .filter(|c| tree.kind(**c) == kind)
        .count()
}
