//! Escape decoding for HL7v2 field content.
//!
//! HL7v2 escapes delimiter characters in-band: `\F\` stands for a literal
//! field separator, `\S\` a component separator, `\R\` a repetition
//! separator, `\T\` a subcomponent separator, and `\E\` the escape character
//! itself (where `\` is whatever escape character the message declared).
//! Two semantic escapes are recognized as well: `\.br\` (line break) and
//! `\Xhh..\` (raw hex bytes).
//!
//! Decoding is a pure projection of `(raw text, delimiter set, config)` —
//! the syntax tree keeps raw spans and is never rewritten, so source
//! positions stay exact for tooling.

use std::collections::BTreeMap;

use hl7v2_toolchain_diagnostics::{Diagnostic, Span, codes};

use crate::grammar::delimiters::DelimiterSet;

/// How to treat the semantic escapes (`\.br\`, `\Xhh..\`).
///
/// Delimiter escapes always expand; only the semantic ones are switchable,
/// since some consumers want the wire form preserved byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticEscapes {
    /// Expand to the content they denote (`\.br\` → newline, `\X..\` → bytes).
    #[default]
    Expand,
    /// Pass through verbatim, framing included.
    Preserve,
}

/// Escape decoding configuration.
///
/// Shared immutably across parses; establish it once before decoding
/// concurrently. The exact table of extension escape codes varies between
/// real-world HL7v2 producers, so `custom` lets callers extend it: keys are
/// escape codes without framing (e.g. `".sp"`), values their replacement
/// text. Custom entries are consulted after the built-in table.
#[derive(Debug, Clone, Default)]
pub struct DecodeConfig {
    /// Treatment of the semantic escapes.
    pub semantic: SemanticEscapes,
    /// Additional escape codes and their replacement text.
    pub custom: BTreeMap<String, String>,
}

/// Decoded text plus any non-fatal diagnostics produced along the way.
///
/// Spans in `diagnostics` are relative to the raw input handed to
/// [`decode`]; [`SyntaxTree::decoded_text`](crate::SyntaxTree::decoded_text)
/// rebases them to whole-message offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded text. Hex escapes decoding to non-UTF-8 byte sequences
    /// are converted lossily.
    pub text: String,
    /// Unrecognized or unterminated escape sequences encountered.
    pub diagnostics: Vec<Diagnostic>,
}

/// Decode the escape sequences in `raw` under the given delimiter set.
///
/// Pure and idempotent with respect to its inputs: the same `(raw, delims,
/// config)` triple always yields the same output. Unrecognized escape codes
/// decode to themselves verbatim — no data loss — plus an informational
/// diagnostic, matching the format's permissive real-world usage.
pub fn decode(raw: &str, delims: &DelimiterSet, config: &DecodeConfig) -> Decoded {
    let esc = delims.escape as u8;
    let b = raw.as_bytes();
    let mut text = String::with_capacity(raw.len());
    let mut diagnostics = Vec::new();
    let mut i = 0;

    while i < b.len() {
        if b[i] != esc {
            // Copy the maximal unescaped run in one slice.
            let run_start = i;
            while i < b.len() && b[i] != esc {
                i += 1;
            }
            text.push_str(&raw[run_start..i]);
            continue;
        }

        let open = i;
        let Some(close) = b[open + 1..].iter().position(|c| *c == esc).map(|p| open + 1 + p)
        else {
            // Unterminated escape in leaf content: keep the remainder
            // verbatim. The lexer reports the same condition at parse time;
            // repeating it here keeps standalone decoding honest.
            diagnostics.push(Diagnostic::warn(
                codes::UNTERMINATED_ESCAPE,
                format!(
                    "escape character {:?} opened at offset {open} is never closed",
                    delims.escape
                ),
                Some(Span::new(open, b.len())),
            ));
            text.push_str(&raw[open..]);
            break;
        };

        let code = &raw[open + 1..close];
        let verbatim = &raw[open..=close];
        match code {
            "F" => text.push(delims.field),
            "S" => text.push(delims.component),
            "R" => text.push(delims.repetition),
            "T" => text.push(delims.subcomponent),
            "E" => text.push(delims.escape),
            ".br" => match config.semantic {
                SemanticEscapes::Expand => text.push('\n'),
                SemanticEscapes::Preserve => text.push_str(verbatim),
            },
            _ if code.starts_with('X') => {
                decode_hex(code, verbatim, open, config, &mut text, &mut diagnostics);
            }
            _ => {
                if let Some(replacement) = config.custom.get(code) {
                    text.push_str(replacement);
                } else {
                    text.push_str(verbatim);
                    diagnostics.push(
                        Diagnostic::info(
                            codes::UNRECOGNIZED_ESCAPE_CODE,
                            format!("unrecognized escape code {code:?}; passed through verbatim"),
                            Some(Span::new(open, close + 1)),
                        )
                        .with_context(BTreeMap::from([(
                            "code".to_string(),
                            code.to_string(),
                        )])),
                    );
                }
            }
        }
        i = close + 1;
    }

    Decoded { text, diagnostics }
}

/// Expand an `\Xhh..\` escape: pairs of hex digits become raw bytes.
fn decode_hex(
    code: &str,
    verbatim: &str,
    open: usize,
    config: &DecodeConfig,
    text: &mut String,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let digits = &code[1..];
    let well_formed =
        !digits.is_empty() && digits.len() % 2 == 0 && digits.bytes().all(|c| c.is_ascii_hexdigit());
    if !well_formed {
        text.push_str(verbatim);
        diagnostics.push(
            Diagnostic::info(
                codes::UNRECOGNIZED_ESCAPE_CODE,
                format!(
                    "hex escape {code:?} does not contain an even number of \
                     hex digits; passed through verbatim"
                ),
                Some(Span::new(open, open + verbatim.len())),
            )
            .with_context(BTreeMap::from([("code".to_string(), code.to_string())])),
        );
        return;
    }
    match config.semantic {
        SemanticEscapes::Preserve => text.push_str(verbatim),
        SemanticEscapes::Expand => {
            let bytes: Vec<u8> = digits
                .as_bytes()
                .chunks(2)
                .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
                .collect();
            text.push_str(&String::from_utf8_lossy(&bytes));
        }
    }
}

/// Numeric value of an ASCII hex digit (pre-validated).
fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        b'a'..=b'f' => c - b'a' + 10,
        _ => unreachable!("hex_value called with non-hex byte: {}", c),
    }
}
