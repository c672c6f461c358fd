pub use hl7v2_toolchain_diagnostics::{
    Diagnostic, LineIndex, Severity, Span, codes, default_severity, explain, is_fatal,
};
