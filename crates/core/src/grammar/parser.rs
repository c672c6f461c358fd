use super::delimiters::{self, DelimiterSet};
use super::diag::{Diagnostic, Span, codes};
use super::lexer::{TokKind, Token, tokenize};
use super::tree::{NodeId, NodeKind, SyntaxTree, TreeBuilder};

/// Shorthand for building a `BTreeMap<String, String>` context from
/// key-value pairs.
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        std::collections::BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}

/// Result of parsing an HL7v2 message.
///
/// The tree is always present: recoverable anomalies become error nodes and
/// diagnostics, and even the one fatal condition (an unresolvable header)
/// yields a root-only tree rather than no tree at all. Callers decide
/// whether a non-empty diagnostic set is an application-level failure.
#[derive(Debug, serde::Serialize)]
pub struct ParseResult {
    /// The parsed concrete syntax tree.
    pub tree: SyntaxTree,
    /// Diagnostics (errors, warnings, info) produced during parsing.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Whether the parse aborted on an unresolvable header.
    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_fatal)
    }
}

/// Parsing options.
///
/// Immutable once parses are running; a single instance may be shared across
/// any number of concurrent parses.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Maximum number of input bytes to scan. Anything beyond is left
    /// untokenized and reported with a `Truncated` diagnostic, bounding the
    /// work an attacker-supplied message can demand.
    pub max_len: Option<usize>,
}

// ─── Public API ─────────────────────────────────────────────────────────

/// Parse an HL7v2 message with default options.
pub fn parse(input: &str) -> ParseResult {
    parse_with_options(input, &ParseOptions::default())
}

/// Parse an HL7v2 message.
///
/// The whole pipeline is a deterministic, synchronous fold over `input`:
/// resolve delimiters from the header, tokenize the remainder, group tokens
/// into the segment/field/repetition/component/subcomponent hierarchy.
pub fn parse_with_options(input: &str, options: &ParseOptions) -> ParseResult {
    let resolution = match delimiters::resolve(input) {
        Ok(res) => res,
        Err(err) => {
            // The only non-recoverable condition: without delimiters there
            // are no lexical rules to scan with. Root-only tree, one fatal
            // diagnostic.
            let builder = TreeBuilder::new(input.len());
            let span = Span::new(0, input.find(['\r', '\n']).unwrap_or(input.len()));
            return ParseResult {
                tree: builder.finish(input.to_string(), DelimiterSet::default()),
                diagnostics: vec![Diagnostic::error(
                    codes::MALFORMED_HEADER,
                    err.to_string(),
                    Some(span),
                )],
            };
        }
    };

    Parser::new(input, resolution, options).parse()
}

// ─── Parser Implementation ──────────────────────────────────────────────

/// Nesting levels below the segment, outermost first. Each level splits its
/// token group on one separator kind; the level below a subcomponent is a
/// literal leaf.
const LEVELS: [(NodeKind, TokKind); 4] = [
    (NodeKind::Field, TokKind::FieldSep),
    (NodeKind::Repetition, TokKind::RepetitionSep),
    (NodeKind::Component, TokKind::ComponentSep),
    (NodeKind::Subcomponent, TokKind::SubcomponentSep),
];

struct Parser<'a> {
    input: &'a str,
    resolution: delimiters::Resolution,
    toks: Vec<Token<'a>>,
    diags: Vec<Diagnostic>,
    tree: TreeBuilder,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, mut resolution: delimiters::Resolution, options: &ParseOptions) -> Self {
        let mut diags = std::mem::take(&mut resolution.diagnostics);
        let scan = tokenize(input, &resolution.delimiters, resolution.resume, options.max_len);
        diags.extend(scan.diagnostics);
        Self {
            input,
            resolution,
            toks: scan.tokens,
            diags,
            tree: TreeBuilder::new(input.len()),
        }
    }

    fn parse(mut self) -> ParseResult {
        // Token groups are delimited by SegmentEnd; each group is one
        // segment. The terminator after the last group produces no trailing
        // empty segment.
        let root = self.tree.root();
        let mut i = 0;
        let mut first = true;
        while i <= self.toks.len() {
            let group_end = self.toks[i..]
                .iter()
                .position(|t| t.kind == TokKind::SegmentEnd)
                .map(|p| i + p);

            let (end, at_eof) = match group_end {
                Some(e) => (e, false),
                None => (self.toks.len(), true),
            };

            if first {
                // The first group always exists (the resolver succeeded),
                // even when it holds zero tokens past the encoding field.
                self.build_header(i, end);
                first = false;
            } else if i == end {
                if !at_eof {
                    // Nothing between two terminators: an empty segment is
                    // a structural anomaly, kept as an empty error node.
                    let pos = self.toks[end].start;
                    let seg = self.tree.push(root, NodeKind::Error, Span::empty(pos));
                    let message = "empty segment between two terminators";
                    self.tree.set_message(seg, message);
                    self.diags.push(Diagnostic::error(
                        codes::TRUNCATED_SEGMENT,
                        message,
                        Some(Span::empty(pos)),
                    ));
                }
                // At EOF an empty final group just means the input ended
                // with a terminator.
            } else {
                self.build_segment(i, end);
            }

            match group_end {
                Some(e) => {
                    // The terminator itself is a literal leaf under the
                    // root, keeping leaf spans lossless.
                    let t = &self.toks[e];
                    self.tree
                        .push(root, NodeKind::Literal, Span::new(t.start, t.end));
                    i = e + 1;
                }
                None => break,
            }
        }

        ParseResult {
            tree: self
                .tree
                .finish(self.input.to_string(), self.resolution.delimiters),
            diagnostics: self.diags,
        }
    }

    // ── Header segment ──────────────────────────────────────────────────

    /// Build the MSH segment. Its first two fields — the type code and the
    /// encoding-characters field — were consumed by the resolver, not the
    /// lexer, so they are laid down from the resolution offsets and stored
    /// as ordinary field content. The delimiter-declaration field is
    /// deliberately never re-tokenized: `^~\&` is literal text here.
    fn build_header(&mut self, start: usize, end: usize) {
        let encoding_start = self.resolution.encoding_start;
        let mut resume = self.resolution.resume;

        let group = &self.toks[start..end];
        let seg_end = group.last().map_or(resume, |t| t.end);
        let seg = self
            .tree
            .push(self.tree.root(), NodeKind::Segment, Span::new(0, seg_end));
        self.tree.set_code(seg, "MSH");

        // Field 1: the type code.
        self.chain_leaf(seg, Span::new(0, 3));
        // The field separator between code and encoding characters (may be
        // wider than one byte when a non-ASCII declaration fell back to the
        // defaults).
        self.tree
            .push(seg, NodeKind::Literal, Span::new(3, encoding_start));
        // Field 2: the encoding characters. Any tokens before the first
        // field separator still belong to this field (an over-long
        // declaration is the sender's problem, not a new field).
        let mut k = start;
        while k < end && self.toks[k].kind != TokKind::FieldSep {
            resume = self.toks[k].end;
            k += 1;
        }
        self.chain_leaf(seg, Span::new(encoding_start, resume));

        // Remaining fields, if any, follow the separator the loop stopped on.
        if k < end {
            let sep = &self.toks[k];
            self.tree
                .push(seg, NodeKind::Literal, Span::new(sep.start, sep.end));
            let rest_origin = sep.end;
            self.build_fields(seg, k + 1, end, rest_origin, 0);
        }
    }

    // ── Ordinary segments ───────────────────────────────────────────────

    fn build_segment(&mut self, start: usize, end: usize) {
        let group = &self.toks[start..end];
        let span = Span::new(group[0].start, group[group.len() - 1].end);

        // The first field doubles as the segment's type code: exactly one
        // literal token of three uppercase letters or digits.
        let code_end = group
            .iter()
            .position(|t| t.kind == TokKind::FieldSep)
            .unwrap_or(group.len());
        let code = match &group[..code_end] {
            [t] if t.kind == TokKind::Literal && is_segment_code(t.text) => Some(t.text),
            _ => None,
        };
        let has_sep = code_end < group.len();

        let (kind, anomaly) = match code {
            Some("MSH") => (
                NodeKind::Error,
                Some(Diagnostic::warn(
                    codes::DUPLICATE_HEADER,
                    "duplicate MSH header segment; its delimiter declaration is ignored",
                    Some(span),
                )
                .with_context(ctx!("segment" => "MSH"))),
            ),
            Some(_) => (NodeKind::Segment, None),
            None if !has_sep => (
                NodeKind::Error,
                Some(Diagnostic::error(
                    codes::MISSING_SEPARATOR,
                    "segment contains no field separator after its type code",
                    Some(span),
                )),
            ),
            None => {
                let code_span = if code_end == 0 {
                    Span::empty(group[0].start)
                } else {
                    Span::new(group[0].start, group[code_end - 1].end)
                };
                let raw = &self.input[code_span.start..code_span.end];
                (
                    NodeKind::Error,
                    Some(
                        Diagnostic::error(
                            codes::INVALID_SEGMENT_CODE,
                            if raw.is_empty() {
                                "segment type code is empty".to_string()
                            } else {
                                format!("invalid segment type code {raw:?}")
                            },
                            Some(code_span),
                        )
                        .with_context(ctx!("code" => raw)),
                    ),
                )
            }
        };

        let seg = self.tree.push(self.tree.root(), kind, span);
        // Error nodes keep the salvaged code (e.g. a duplicate MSH) so
        // code-keyed lookups still find them.
        if let Some(code) = code {
            self.tree.set_code(seg, code);
        }
        if let Some(diag) = anomaly {
            self.tree.set_message(seg, diag.message.clone());
            self.diags.push(diag);
        }

        // Fields are built best-effort regardless of the segment's fate:
        // one bad segment must not cost the caller its content.
        self.build_fields(seg, start, end, span.start, 0);
    }

    // ── Recursive level splitting ───────────────────────────────────────

    /// Split `toks[start..end]` on the separator of `level`, emitting one
    /// structural node per chunk and a literal leaf per separator, then
    /// recurse into the next level. Past the last level a chunk becomes a
    /// single literal leaf. `origin` is where a leading empty chunk sits.
    fn build_fields(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        origin: usize,
        level: usize,
    ) {
        if level == LEVELS.len() {
            let span = if start == end {
                Span::empty(origin)
            } else {
                Span::new(self.toks[start].start, self.toks[end - 1].end)
            };
            self.tree.push(parent, NodeKind::Literal, span);
            return;
        }

        let (kind, sep) = LEVELS[level];
        let mut chunk_start = start;
        let mut pos = origin;
        let mut i = start;
        loop {
            let at_boundary = i == end || self.toks[i].kind == sep;
            if at_boundary {
                let span = if chunk_start == i {
                    Span::empty(pos)
                } else {
                    Span::new(self.toks[chunk_start].start, self.toks[i - 1].end)
                };
                let node = self.tree.push(parent, kind, span);
                self.build_fields(node, chunk_start, i, pos, level + 1);

                if i == end {
                    break;
                }
                let t = &self.toks[i];
                self.tree
                    .push(parent, NodeKind::Literal, Span::new(t.start, t.end));
                pos = t.end;
                chunk_start = i + 1;
            }
            i += 1;
        }
    }

    // ── Leaf chains for resolver-produced fields ────────────────────────

    /// Wrap a raw span in the full Field > Repetition > Component >
    /// Subcomponent > Literal chain, so resolver-built header fields share
    /// the uniform shape of lexed ones.
    fn chain_leaf(&mut self, parent: NodeId, span: Span) {
        let field = self.tree.push(parent, NodeKind::Field, span);
        let rep = self.tree.push(field, NodeKind::Repetition, span);
        let comp = self.tree.push(rep, NodeKind::Component, span);
        let sub = self.tree.push(comp, NodeKind::Subcomponent, span);
        self.tree.push(sub, NodeKind::Literal, span);
    }
}

/// Whether `text` is a well-formed segment type code: exactly three
/// uppercase ASCII letters or digits.
fn is_segment_code(text: &str) -> bool {
    text.len() == 3
        && text
            .bytes()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
