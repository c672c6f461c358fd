//! Diagnostic ID constants.
//!
//! Use these instead of string literals to get compile-time typo detection
//! and IDE autocomplete. IDs are stable across releases; new codes are only
//! ever appended.

/// Header segment absent or too short to declare the delimiter set.
pub const MALFORMED_HEADER: &str = "HL71001";

/// The header declares duplicate, non-ASCII, or terminator-valued delimiters.
pub const AMBIGUOUS_DELIMITERS: &str = "HL71002";

/// An escape character was opened but never closed before a segment boundary.
pub const UNTERMINATED_ESCAPE: &str = "HL71003";

/// A segment contains no field separator after its type code.
pub const MISSING_SEPARATOR: &str = "HL71004";

/// A segment was cut short (empty between two terminators).
pub const TRUNCATED_SEGMENT: &str = "HL71005";

/// An escape code outside the recognized table; passed through verbatim.
pub const UNRECOGNIZED_ESCAPE_CODE: &str = "HL71006";

/// Input exceeded the configured scan bound and was not fully tokenized.
pub const TRUNCATED: &str = "HL71007";

/// A second MSH header segment appeared after the first.
pub const DUPLICATE_HEADER: &str = "HL71008";

/// A segment's first field is not a valid three-character type code.
pub const INVALID_SEGMENT_CODE: &str = "HL71009";
