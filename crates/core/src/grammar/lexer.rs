use super::delimiters::DelimiterSet;
use super::diag::{Diagnostic, Span, codes};

/// Classification of an HL7v2 lexer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    /// Segment terminator (`\r`, `\n`, or `\r\n` as a unit).
    SegmentEnd,
    /// Field separator.
    FieldSep,
    /// Repetition separator.
    RepetitionSep,
    /// Component separator.
    ComponentSep,
    /// Subcomponent separator.
    SubcomponentSep,
    /// A complete escape sequence, opening and closing escape characters
    /// included. Delimiters inside the sequence are not significant.
    Escape,
    /// A maximal run of characters containing no delimiter, terminator, or
    /// complete escape sequence.
    Literal,
}

/// A token that borrows its text directly from the source input — zero
/// allocation.
///
/// `text` is always exactly `&input[start..end]`. The `start`/`end` byte
/// offsets are stored alongside for consumers that need numeric positions
/// (spans, slicing).
#[derive(Debug)]
pub struct Token<'a> {
    /// The classification of this token.
    pub kind: TokKind,
    /// Borrowed slice of the source input for this token.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// Result of one lexer pass: the token stream plus any scan diagnostics
/// (unterminated escapes, truncation at the scan bound).
#[derive(Debug, Default)]
pub struct Scan<'a> {
    /// Tokens in source order, covering `start..bound` without gaps.
    pub tokens: Vec<Token<'a>>,
    /// Diagnostics attached to token spans during scanning.
    pub diagnostics: Vec<Diagnostic>,
}

/// Tokenize HL7v2 input from `start` using a resolved delimiter set.
///
/// Every token's `text` borrows directly from `input`, so the returned
/// [`Scan`] is valid for as long as `input` is alive. The header prefix
/// (which declares the delimiters and must not be re-tokenized) is skipped
/// by passing its end offset as `start`.
///
/// `max_len` is a cooperative cancellation bound: scanning stops at that
/// byte offset and a `Truncated` diagnostic covers the unscanned suffix.
/// The grammar has no backtracking, so bounding input size is the only
/// resource control the lexer needs.
///
/// # Safety of `b[i] as char`
///
/// The resolver guarantees every delimiter is ASCII (falling back to the
/// defaults otherwise), and the terminator tests compare against `\r`/`\n`.
/// UTF-8 continuation bytes are in 0x80–0xBF and never match any of these,
/// so byte-wise comparison is safe without full UTF-8 decoding.
pub fn tokenize<'a>(
    input: &'a str,
    delims: &DelimiterSet,
    start: usize,
    max_len: Option<usize>,
) -> Scan<'a> {
    let mut bound = max_len.map_or(input.len(), |m| m.min(input.len()));
    // Never cut a UTF-8 sequence in half at the scan bound.
    while !input.is_char_boundary(bound) {
        bound -= 1;
    }
    let b = input.as_bytes();
    let mut scan = Scan::default();
    let mut i = start;

    let sep_kind = |c: u8| -> Option<TokKind> {
        if c == delims.field as u8 {
            Some(TokKind::FieldSep)
        } else if c == delims.repetition as u8 {
            Some(TokKind::RepetitionSep)
        } else if c == delims.component as u8 {
            Some(TokKind::ComponentSep)
        } else if c == delims.subcomponent as u8 {
            Some(TokKind::SubcomponentSep)
        } else {
            None
        }
    };
    let esc = delims.escape as u8;

    while i < bound {
        let c = b[i];
        let tok_start = i;

        if let Some(kind) = sep_kind(c) {
            i += 1;
            scan.tokens.push(Token {
                kind,
                text: &input[tok_start..i],
                start: tok_start,
                end: i,
            });
        } else if c == b'\r' || c == b'\n' {
            // Normalize CRLF/CR/LF into a single SegmentEnd token.
            if c == b'\r' && i + 1 < bound && b[i + 1] == b'\n' {
                i += 2;
            } else {
                i += 1;
            }
            scan.tokens.push(Token {
                kind: TokKind::SegmentEnd,
                text: &input[tok_start..i],
                start: tok_start,
                end: i,
            });
        } else if c == esc {
            // Raw capture: everything up to the matching escape character is
            // opaque, so delimiters inside escaped payloads cannot break
            // structure. The capture never crosses a segment terminator.
            if let Some(close) = find_escape_close(b, i + 1, bound, esc) {
                i = close + 1;
                scan.tokens.push(Token {
                    kind: TokKind::Escape,
                    text: &input[tok_start..i],
                    start: tok_start,
                    end: i,
                });
            } else {
                // No closing escape before the next sync point: fold the
                // escape character into an ordinary literal run and record
                // the failure once, so later fields still parse cleanly.
                i += 1;
                while i < bound && sep_kind(b[i]).is_none() && b[i] != b'\r' && b[i] != b'\n' {
                    i += 1;
                }
                let span = Span::new(tok_start, i);
                scan.diagnostics.push(Diagnostic::warn(
                    codes::UNTERMINATED_ESCAPE,
                    format!(
                        "escape character {:?} opened at offset {tok_start} is never closed",
                        delims.escape
                    ),
                    Some(span),
                ));
                scan.tokens.push(Token {
                    kind: TokKind::Literal,
                    text: &input[tok_start..i],
                    start: tok_start,
                    end: i,
                });
            }
        } else {
            // Literal run — stop on any delimiter, terminator, or escape.
            i += 1;
            while i < bound
                && sep_kind(b[i]).is_none()
                && b[i] != b'\r'
                && b[i] != b'\n'
                && b[i] != esc
            {
                i += 1;
            }
            scan.tokens.push(Token {
                kind: TokKind::Literal,
                text: &input[tok_start..i],
                start: tok_start,
                end: i,
            });
        }
    }

    if bound < input.len() {
        scan.diagnostics.push(Diagnostic::warn(
            codes::TRUNCATED,
            format!(
                "input exceeds the configured scan bound of {bound} bytes; \
                 {} bytes were not tokenized",
                input.len() - bound
            ),
            Some(Span::new(bound, input.len())),
        ));
    }

    scan
}

/// Find the closing escape character at or after `from`, stopping at the
/// scan bound or a segment terminator.
fn find_escape_close(b: &[u8], from: usize, bound: usize, esc: u8) -> Option<usize> {
    let mut j = from;
    while j < bound {
        match b[j] {
            c if c == esc => return Some(j),
            b'\r' | b'\n' => return None,
            _ => j += 1,
        }
    }
    None
}
