use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::diag::{Diagnostic, Span, codes};

/// Minimum header prefix: `MSH` + field separator + four encoding characters.
const HEADER_MIN_LEN: usize = 8;

/// Segment type code of the message header.
const HEADER_CODE: &str = "MSH";

/// The five delimiter characters a message declares in its header segment.
///
/// HL7v2 is self-describing: the character immediately after `MSH` is the
/// field separator and the next four characters (the "encoding characters"
/// field) are the component, repetition, escape, and subcomponent separators
/// in that fixed order. A `DelimiterSet` is resolved once per message and
/// shared read-only by the lexer, the tree builder, and the escape decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterSet {
    /// Field separator (`|` by convention).
    pub field: char,
    /// Component separator (`^` by convention).
    pub component: char,
    /// Repetition separator (`~` by convention).
    pub repetition: char,
    /// Escape character (`\` by convention).
    pub escape: char,
    /// Subcomponent separator (`&` by convention).
    pub subcomponent: char,
}

impl Default for DelimiterSet {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl DelimiterSet {
    /// Whether the set is usable for lexing: all five characters ASCII,
    /// mutually distinct, and none a segment terminator.
    pub fn is_unambiguous(&self) -> bool {
        let cs = [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ];
        for (i, c) in cs.iter().enumerate() {
            if !c.is_ascii() || *c == '\r' || *c == '\n' {
                return false;
            }
            if cs[i + 1..].contains(c) {
                return false;
            }
        }
        true
    }
}

/// Fatal header resolution failure.
///
/// This is the only error in the core that aborts a parse; everything else
/// degrades to diagnostics attached to error nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The input does not begin with the `MSH` segment type code.
    #[error("message does not begin with an MSH header segment")]
    MissingHeader,
    /// The header line ends before all five delimiters are declared.
    #[error(
        "header segment too short to declare delimiters ({len} bytes before \
         the first terminator, need {HEADER_MIN_LEN})"
    )]
    TooShort {
        /// Bytes available before the first segment terminator (or EOF).
        len: usize,
    },
}

/// Outcome of header delimiter resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolution {
    /// The delimiter set in effect for the rest of the message.
    pub(crate) delimiters: DelimiterSet,
    /// Byte offset one past the field separator (start of the encoding field).
    pub(crate) encoding_start: usize,
    /// Byte offset one past the encoding characters, where lexing resumes.
    pub(crate) resume: usize,
    /// Non-fatal diagnostics recorded while resolving (duplicate delimiters).
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// Resolve the delimiter set from the start of a raw message.
///
/// Reads only the header prefix. On success the returned [`Resolution`]
/// tells the caller where delimiter-dependent lexing should resume. A header
/// that declares a conflicting set still resolves — the defaults stand in
/// and an `AmbiguousDelimiters` diagnostic records the conflict — because
/// real-world consumers expect best-effort recovery over hard failure.
pub(crate) fn resolve(input: &str) -> Result<Resolution, HeaderError> {
    // Length of the header line, bounded by the first segment terminator.
    let line_len = input
        .find(['\r', '\n'])
        .unwrap_or(input.len());

    if !input.starts_with(HEADER_CODE) {
        // A short prefix of "MSH" is a truncation, not a missing header.
        // Byte-wise so a multibyte character straddling the cutoff cannot
        // panic the slice.
        let prefix = &input.as_bytes()[..line_len.min(HEADER_CODE.len())];
        if HEADER_CODE.as_bytes().starts_with(prefix) {
            return Err(HeaderError::TooShort { len: line_len });
        }
        return Err(HeaderError::MissingHeader);
    }
    if line_len < HEADER_MIN_LEN {
        return Err(HeaderError::TooShort { len: line_len });
    }

    // Field separator, then the four encoding characters, in declared order.
    let mut chars = input[HEADER_CODE.len()..].chars();
    let mut next = |resume: &mut usize| -> Option<char> {
        let c = chars.next()?;
        *resume += c.len_utf8();
        Some(c)
    };
    let mut resume = HEADER_CODE.len();
    let field = next(&mut resume);
    let encoding_start = resume;
    let component = next(&mut resume);
    let repetition = next(&mut resume);
    let escape = next(&mut resume);
    let subcomponent = next(&mut resume);

    let (Some(field), Some(component), Some(repetition), Some(escape), Some(subcomponent)) =
        (field, component, repetition, escape, subcomponent)
    else {
        return Err(HeaderError::TooShort { len: line_len });
    };
    if [field, component, repetition, escape, subcomponent]
        .iter()
        .any(|c| *c == '\r' || *c == '\n')
    {
        return Err(HeaderError::TooShort { len: line_len });
    }

    let declared = DelimiterSet {
        field,
        component,
        repetition,
        escape,
        subcomponent,
    };

    let mut diagnostics = Vec::new();
    let delimiters = if declared.is_unambiguous() {
        declared
    } else {
        diagnostics.push(
            Diagnostic::warn(
                codes::AMBIGUOUS_DELIMITERS,
                format!(
                    "header declares an ambiguous delimiter set \
                     {field:?} {component:?} {repetition:?} {escape:?} {subcomponent:?}; \
                     falling back to the defaults"
                ),
                Some(Span::new(HEADER_CODE.len(), resume)),
            )
            .with_context(std::collections::BTreeMap::from([(
                "declared".to_string(),
                format!("{field}{component}{repetition}{escape}{subcomponent}"),
            )])),
        );
        DelimiterSet::default()
    };

    Ok(Resolution {
        delimiters,
        encoding_start,
        resume,
        diagnostics,
    })
}
