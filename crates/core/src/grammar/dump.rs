use super::tree::SyntaxTree;

/// Serialize a syntax tree to a pretty-printed JSON string.
pub fn to_pretty_json(tree: &SyntaxTree) -> String {
    serde_json::to_string_pretty(tree).expect("SyntaxTree serialization cannot fail")
}
