//! Diagnostics for the HL7v2 toolchain.
//!
//! Provides [`Diagnostic`], [`Severity`], [`Span`], and [`LineIndex`] types
//! used to report errors, warnings, and informational messages from the
//! parser and escape decoder. Diagnostic codes are defined in the [`codes`]
//! module.

#![warn(missing_docs)]

/// Diagnostic ID constants for the parser core.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

// ── LineIndex ────────────────────────────────────────────────────────────

/// Maps byte offsets in a source message to line and column positions.
///
/// Lines and columns are **0-indexed** internally. Use [`LineIndex::line_col`]
/// to get a `(line, col)` pair and add 1 when displaying to users. HL7v2
/// segments are terminated by `\r` in the wire format, so both `\r` and `\n`
/// start a new line here (a `\r\n` pair counts once).
///
/// The index is built in O(n) time and each lookup is O(log n) via binary
/// search. This struct is intentionally dependency-free so it can be reused
/// by an LSP server, a highlighter, or any other consumer that needs
/// row/column positions instead of byte offsets.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    /// `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a `LineIndex` from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0usize];
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    // \r\n counts as a single terminator.
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 2;
                    } else {
                        i += 1;
                    }
                    line_starts.push(i);
                }
                b'\n' => {
                    i += 1;
                    line_starts.push(i);
                }
                _ => i += 1,
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    ///
    /// If `offset` is past the end of the source, the last line is returned
    /// with the column measured from that line's start.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line, col)
    }

    /// Byte offset of the start of the given 0-indexed line.
    ///
    /// Returns `None` if `line` is out of bounds.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Total number of lines (at least 1, even for empty input).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// Hard error — the construct is invalid.
    Error,
    /// Warning — the input may not mean what the sender intended.
    Warn,
    /// Informational note.
    Info,
}

/// Byte span in the source input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first character (0-based).
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    /// Create a span covering `[start, end)`.
    ///
    /// Panics if `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "Span end ({end}) < start ({start})");
        Self { start, end }
    }

    /// Create a zero-width span at the given position.
    pub fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shift both offsets forward by `base`.
    ///
    /// Used to rebase spans produced against a text slice (e.g. the escape
    /// decoder working on one leaf) onto the whole-message coordinate space.
    pub fn offset(self, base: usize) -> Self {
        Self {
            start: self.start + base,
            end: self.end + base,
        }
    }
}

/// A diagnostic message produced by the parser or escape decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unique diagnostic code (e.g., `"HL71001"`).
    pub id: Cow<'static, str>,
    /// Severity level.
    pub severity: Severity,
    /// Human-readable diagnostic message.
    pub message: String,
    /// Optional byte span in the source input that this diagnostic relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Machine-readable context for tooling. Keys and values are free-form
    /// strings. Absent when no context is applicable.
    ///
    /// Uses `BTreeMap` for deterministic key ordering in serialized output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Diagnostic {
    /// Create a diagnostic with the given fields.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        severity: Severity,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            span,
            context: None,
        }
    }

    /// Shorthand for an `Error` diagnostic.
    pub fn error(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Error, message, span)
    }

    /// Shorthand for a `Warn` diagnostic.
    pub fn warn(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Warn, message, span)
    }

    /// Shorthand for an `Info` diagnostic.
    pub fn info(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Info, message, span)
    }

    /// Attach machine-readable context metadata (builder pattern).
    ///
    /// Context is a set of key-value string pairs providing structured
    /// details about the diagnostic for tooling, filtering, and programmatic
    /// consumption. Keys are short descriptors like `"segment"`, `"code"`,
    /// `"declared"`, etc.
    pub fn with_context(mut self, ctx: BTreeMap<String, String>) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Returns the human-readable explanation for this diagnostic's code,
    /// if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.id)
    }

    /// Whether this diagnostic aborted the parse.
    ///
    /// Only [`codes::MALFORMED_HEADER`] is fatal; every other condition
    /// degrades to best-effort recovery.
    pub fn is_fatal(&self) -> bool {
        is_fatal(&self.id)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.id, self.message)
    }
}

/// Returns the human-readable explanation for a diagnostic code, if known.
pub fn explain(id: &str) -> Option<&'static str> {
    match id {
        codes::MALFORMED_HEADER => Some(
            "The message does not begin with an MSH header segment long enough \
             to declare all five delimiter characters. Without the declared \
             delimiter set the rest of the message cannot be tokenized, so \
             this is the only condition that aborts a parse.",
        ),
        codes::AMBIGUOUS_DELIMITERS => Some(
            "The header declares a delimiter set whose characters are not \
             mutually distinct, are not ASCII, or collide with a segment \
             terminator. Parsing continues with the default set (| ^ ~ \\ &).",
        ),
        codes::UNTERMINATED_ESCAPE => Some(
            "An escape character opened a sequence that was never closed \
             before the end of the segment or input. The escape character is \
             treated as literal content and scanning continues normally.",
        ),
        codes::MISSING_SEPARATOR => Some(
            "A segment contains no field separator after its type code, so \
             its fields cannot be delimited. The segment is kept as an error \
             node and parsing resumes at the next segment terminator.",
        ),
        codes::TRUNCATED_SEGMENT => Some(
            "A segment was cut short: nothing appears between two adjacent \
             segment terminators. An empty error node stands in for it.",
        ),
        codes::UNRECOGNIZED_ESCAPE_CODE => Some(
            "An escape sequence uses a code outside the recognized table. \
             The sequence is passed through verbatim so no data is lost.",
        ),
        codes::TRUNCATED => Some(
            "The input exceeded the configured scan bound. Tokenization \
             stopped at the bound; the tree covers only the scanned prefix.",
        ),
        codes::DUPLICATE_HEADER => Some(
            "A second MSH segment appeared after the header. Its delimiter \
             declaration is ignored; the segment is kept as an error node.",
        ),
        codes::INVALID_SEGMENT_CODE => Some(
            "A segment's first field is not a three-character type code made \
             of uppercase letters and digits. The segment is kept as an error \
             node with its fields parsed best-effort.",
        ),
        _ => None,
    }
}

/// Default severity for a diagnostic code, if known.
pub fn default_severity(id: &str) -> Option<Severity> {
    match id {
        codes::MALFORMED_HEADER => Some(Severity::Error),
        codes::AMBIGUOUS_DELIMITERS => Some(Severity::Warn),
        codes::UNTERMINATED_ESCAPE => Some(Severity::Warn),
        codes::MISSING_SEPARATOR => Some(Severity::Error),
        codes::TRUNCATED_SEGMENT => Some(Severity::Error),
        codes::UNRECOGNIZED_ESCAPE_CODE => Some(Severity::Info),
        codes::TRUNCATED => Some(Severity::Warn),
        codes::DUPLICATE_HEADER => Some(Severity::Warn),
        codes::INVALID_SEGMENT_CODE => Some(Severity::Error),
        _ => None,
    }
}

/// Whether a diagnostic code aborts the whole parse.
pub fn is_fatal(id: &str) -> bool {
    id == codes::MALFORMED_HEADER
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [&str; 9] = [
        codes::MALFORMED_HEADER,
        codes::AMBIGUOUS_DELIMITERS,
        codes::UNTERMINATED_ESCAPE,
        codes::MISSING_SEPARATOR,
        codes::TRUNCATED_SEGMENT,
        codes::UNRECOGNIZED_ESCAPE_CODE,
        codes::TRUNCATED,
        codes::DUPLICATE_HEADER,
        codes::INVALID_SEGMENT_CODE,
    ];

    // ── LineIndex ────────────────────────────────────────────────────────

    #[test]
    fn line_index_single_line() {
        let idx = LineIndex::new("MSH|^~\\&|A");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.line_col(0), (0, 0));
        assert_eq!(idx.line_col(9), (0, 9));
    }

    #[test]
    fn line_index_cr_terminators() {
        let idx = LineIndex::new("ab\rcd");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line_col(1), (0, 1)); // 'b'
        assert_eq!(idx.line_col(3), (1, 0)); // 'c'
        assert_eq!(idx.line_col(4), (1, 1)); // 'd'
    }

    #[test]
    fn line_index_crlf_counts_once() {
        let idx = LineIndex::new("ab\r\ncd");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line_col(4), (1, 0)); // 'c'
    }

    #[test]
    fn line_index_lf_terminators() {
        let idx = LineIndex::new("a\n\nb\n");
        assert_eq!(idx.line_count(), 4);
        assert_eq!(idx.line_col(0), (0, 0)); // 'a'
        assert_eq!(idx.line_col(2), (1, 0)); // empty line
        assert_eq!(idx.line_col(3), (2, 0)); // 'b'
        assert_eq!(idx.line_col(5), (3, 0)); // empty trailing line
    }

    #[test]
    fn line_index_empty_input() {
        let idx = LineIndex::new("");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.line_col(0), (0, 0));
    }

    #[test]
    fn line_index_multibyte_utf8() {
        // 'é' is 2 bytes in UTF-8
        let idx = LineIndex::new("é\ra");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line_col(0), (0, 0)); // start of 'é'
        assert_eq!(idx.line_col(2), (0, 2)); // '\r' (byte offset 2)
        assert_eq!(idx.line_col(3), (1, 0)); // 'a'
    }

    #[test]
    fn line_index_line_start() {
        let idx = LineIndex::new("ab\rcd\ref");
        assert_eq!(idx.line_start(0), Some(0));
        assert_eq!(idx.line_start(1), Some(3));
        assert_eq!(idx.line_start(2), Some(6));
        assert_eq!(idx.line_start(3), None);
    }

    #[test]
    fn line_index_offset_past_end() {
        let idx = LineIndex::new("hi");
        let (line, col) = idx.line_col(100);
        assert_eq!(line, 0);
        assert_eq!(col, 100);
    }

    // ── Span ────────────────────────────────────────────────────────────

    #[test]
    fn span_new_valid() {
        let s = Span::new(5, 10);
        assert_eq!(s.start, 5);
        assert_eq!(s.end, 10);
        assert_eq!(s.len(), 5);
        assert!(!s.is_empty());
    }

    #[test]
    fn span_empty() {
        let s = Span::empty(7);
        assert_eq!(s.start, 7);
        assert_eq!(s.end, 7);
        assert!(s.is_empty());
    }

    #[test]
    fn span_offset() {
        let s = Span::new(2, 5).offset(10);
        assert_eq!(s, Span::new(12, 15));
    }

    #[test]
    #[should_panic(expected = "Span end (3) < start (5)")]
    fn span_new_inverted_panics() {
        Span::new(5, 3);
    }

    // ── Severity / Diagnostic Display ───────────────────────────────────

    #[test]
    fn severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warn), "warn");
        assert_eq!(format!("{}", Severity::Info), "info");
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::error(codes::MALFORMED_HEADER, "message has no MSH header", None);
        assert_eq!(
            format!("{}", d),
            "error[HL71001]: message has no MSH header"
        );
    }

    // ── Constructors ────────────────────────────────────────────────────

    #[test]
    fn diagnostic_error_constructor() {
        let d = Diagnostic::error(codes::MISSING_SEPARATOR, "no field separator", None);
        assert_eq!(d.id, "HL71004");
        assert_eq!(d.severity, Severity::Error);
        assert!(d.span.is_none());
    }

    #[test]
    fn diagnostic_warn_constructor() {
        let d = Diagnostic::warn(codes::UNTERMINATED_ESCAPE, "open escape", Some(Span::new(0, 5)));
        assert_eq!(d.severity, Severity::Warn);
        assert_eq!(d.span, Some(Span::new(0, 5)));
    }

    #[test]
    fn diagnostic_info_constructor() {
        let d = Diagnostic::info("CUSTOM", "custom message", None);
        assert_eq!(d.severity, Severity::Info);
        assert_eq!(d.id, "CUSTOM");
    }

    // ── explain / default_severity / is_fatal ───────────────────────────

    #[test]
    fn all_codes_have_explanations() {
        for code in &ALL_CODES {
            assert!(
                explain(code).is_some(),
                "diagnostic code {code} has no explain() entry"
            );
        }
    }

    #[test]
    fn all_codes_have_default_severity() {
        for code in &ALL_CODES {
            assert!(
                default_severity(code).is_some(),
                "diagnostic code {code} has no default severity"
            );
        }
    }

    #[test]
    fn only_malformed_header_is_fatal() {
        for code in &ALL_CODES {
            assert_eq!(is_fatal(code), *code == codes::MALFORMED_HEADER);
        }
        assert!(!is_fatal("UNKNOWN"));
    }

    #[test]
    fn explain_unknown_code() {
        assert!(explain("HL79999").is_none());
        let d = Diagnostic::error("HL79999", "test", None);
        assert!(d.explain().is_none());
    }

    // ── Serde ───────────────────────────────────────────────────────────

    #[test]
    fn diagnostic_serde_roundtrip() {
        let d = Diagnostic::warn(
            codes::AMBIGUOUS_DELIMITERS,
            "duplicate delimiter",
            Some(Span::new(4, 8)),
        );
        let json = serde_json::to_string(&d).unwrap();
        let d2: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn diagnostic_serde_omits_none_fields() {
        let d = Diagnostic::error(codes::MALFORMED_HEADER, "test", None);
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("span"), "None span should be omitted: {json}");
        assert!(
            !json.contains("context"),
            "None context should be omitted: {json}"
        );
    }

    // ── Context ─────────────────────────────────────────────────────────

    #[test]
    fn diagnostic_with_context() {
        let d = Diagnostic::warn(codes::DUPLICATE_HEADER, "second MSH", None).with_context(
            BTreeMap::from([
                ("segment".into(), "MSH".into()),
                ("index".into(), "3".into()),
            ]),
        );
        let ctx = d.context.as_ref().unwrap();
        assert_eq!(ctx.get("segment").unwrap(), "MSH");
        assert_eq!(ctx.get("index").unwrap(), "3");
    }

    #[test]
    fn diagnostic_context_deterministic_order() {
        let d = Diagnostic::error(codes::INVALID_SEGMENT_CODE, "test", None).with_context(
            BTreeMap::from([
                ("z_last".into(), "1".into()),
                ("a_first".into(), "2".into()),
            ]),
        );
        let json = serde_json::to_string(&d).unwrap();
        let a_pos = json.find("a_first").unwrap();
        let z_pos = json.find("z_last").unwrap();
        assert!(
            a_pos < z_pos,
            "BTreeMap should serialize in alphabetical key order: {json}"
        );
    }
}
