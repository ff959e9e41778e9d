//! Compile diagnostics and their source-annotated formatting

use ariadne::{Color, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Everything the compiler can complain about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    VarSyntax,

    IfNoRightDelimiter,
    IfNoArguments,
    IfUnbalancedParens,
    IfOperatorNotAllowed,
    IfMissingExpressionAfter,
    IfVarNotAllowed,
    IfFuncNotAllowed,
    IfFuncNotSupported,
    IfOpenParenNotAllowed,
    IfCloseParenNotAllowed,
    IfNoOpenParenBefore,
    IfSingleEqualSign,
    IfUnknownExpression,
    IfNoEndIf,
    /// Groups, calls and unary operators nested past the supported depth
    IfNestingTooDeep,

    ElseNoRightDelimiter,
    ElseNoIf,
    ElseOnlyOneAllowed,

    EndIfNoRightDelimiter,
    EndIfNoIf,

    ElseIfNoIf,

    BlockNoEndBlock,

    /// The scanner failed to advance; a defect, never a user error
    ScannerStalled,
}

/// Coarse grouping of [`ErrorKind`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Syntax,
    ExpressionGrammar,
    Structural,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl ErrorKind {
    /// Stable numeric code, suitable for machine consumption
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::VarSyntax => 1,
            ErrorKind::IfNoRightDelimiter => 2,
            ErrorKind::IfNoArguments => 3,
            ErrorKind::IfUnbalancedParens => 4,
            ErrorKind::IfOperatorNotAllowed => 5,
            ErrorKind::IfMissingExpressionAfter => 6,
            ErrorKind::IfVarNotAllowed => 7,
            ErrorKind::IfFuncNotAllowed => 8,
            ErrorKind::IfFuncNotSupported => 9,
            ErrorKind::IfOpenParenNotAllowed => 10,
            ErrorKind::IfCloseParenNotAllowed => 11,
            ErrorKind::IfNoOpenParenBefore => 12,
            ErrorKind::IfSingleEqualSign => 13,
            ErrorKind::IfUnknownExpression => 14,
            ErrorKind::IfNoEndIf => 15,
            ErrorKind::ElseNoRightDelimiter => 16,
            ErrorKind::ElseNoIf => 17,
            ErrorKind::ElseOnlyOneAllowed => 18,
            ErrorKind::EndIfNoRightDelimiter => 19,
            ErrorKind::EndIfNoIf => 20,
            ErrorKind::ElseIfNoIf => 21,
            ErrorKind::IfNestingTooDeep => 22,
            ErrorKind::BlockNoEndBlock => 40,
            ErrorKind::ScannerStalled => 99,
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::VarSyntax
            | ErrorKind::IfNoRightDelimiter
            | ErrorKind::ElseNoRightDelimiter
            | ErrorKind::EndIfNoRightDelimiter => ErrorCategory::Syntax,

            ErrorKind::IfNoArguments
            | ErrorKind::IfUnbalancedParens
            | ErrorKind::IfOperatorNotAllowed
            | ErrorKind::IfMissingExpressionAfter
            | ErrorKind::IfVarNotAllowed
            | ErrorKind::IfFuncNotAllowed
            | ErrorKind::IfFuncNotSupported
            | ErrorKind::IfOpenParenNotAllowed
            | ErrorKind::IfCloseParenNotAllowed
            | ErrorKind::IfNoOpenParenBefore
            | ErrorKind::IfSingleEqualSign
            | ErrorKind::IfUnknownExpression
            | ErrorKind::IfNestingTooDeep => ErrorCategory::ExpressionGrammar,

            ErrorKind::IfNoEndIf
            | ErrorKind::ElseNoIf
            | ErrorKind::ElseOnlyOneAllowed
            | ErrorKind::EndIfNoIf
            | ErrorKind::ElseIfNoIf
            | ErrorKind::BlockNoEndBlock => ErrorCategory::Structural,

            ErrorKind::ScannerStalled => ErrorCategory::Internal,
        }
    }

    /// Only the auto-corrected `=` is a warning; it never fails a compile.
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::IfSingleEqualSign => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A single compiler complaint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Byte offset into the template
    pub offset: usize,
    /// The offending token, empty when there is none
    pub token: String,
    pub message: String,
    /// Whether this diagnostic aborted the compile
    pub fatal: bool,
}

impl Diagnostic {
    pub fn new(
        kind: ErrorKind,
        offset: usize,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            offset,
            token: token.into(),
            message: message.into(),
            fatal: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind.severity() == Severity::Error
    }

    /// Byte range this diagnostic points at, clamped to `source`
    pub fn span(&self, source: &str) -> Span {
        let start = self.offset.min(source.len());
        let end = (start + self.token.len().max(1)).min(source.len());
        start..end
    }

    /// Format the diagnostic with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let bytes = self.span(source);
        // ariadne counts characters, not bytes
        let span = char_index(source, bytes.start)..char_index(source, bytes.end);
        let (kind, color) = match self.kind.severity() {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let mut buf = Vec::new();
        let written = Report::build(kind, filename, span.start)
            .with_code(self.kind.code())
            .with_message(&self.message)
            .with_label(
                Label::new((filename, span))
                    .with_message(&self.message)
                    .with_color(color),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);
        if written.is_err() {
            return format!("{}: {}", filename, self);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn char_index(source: &str, byte: usize) -> usize {
    source
        .char_indices()
        .take_while(|(i, _)| *i < byte)
        .count()
}

/// Marker for a fatal diagnostic; unwinds to the top of `compile`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Halt;

/// Collects diagnostics for one compile run
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.list.push(diagnostic);
    }

    /// Record a fatal diagnostic and return the marker to propagate
    pub fn halt(&mut self, mut diagnostic: Diagnostic) -> Halt {
        diagnostic.fatal = true;
        self.list.push(diagnostic);
        Halt
    }

    /// Number of error-severity diagnostics recorded so far
    pub fn error_count(&self) -> usize {
        self.list.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_equal_sign_is_warning() {
        assert_eq!(ErrorKind::IfSingleEqualSign.severity(), Severity::Warning);
        assert_eq!(ErrorKind::EndIfNoIf.severity(), Severity::Error);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorKind::VarSyntax.category(), ErrorCategory::Syntax);
        assert_eq!(
            ErrorKind::IfUnbalancedParens.category(),
            ErrorCategory::ExpressionGrammar
        );
        assert_eq!(ErrorKind::IfNoEndIf.category(), ErrorCategory::Structural);
        assert_eq!(ErrorKind::ScannerStalled.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::VarSyntax.code(), 1);
        assert_eq!(ErrorKind::IfNoEndIf.code(), 15);
        assert_eq!(ErrorKind::ElseIfNoIf.code(), 21);
        assert_eq!(ErrorKind::IfNestingTooDeep.code(), 22);
        assert_eq!(ErrorKind::BlockNoEndBlock.code(), 40);
    }

    #[test]
    fn test_error_count_ignores_warnings() {
        let mut diags = Diagnostics::default();
        diags.record(Diagnostic::new(ErrorKind::IfSingleEqualSign, 3, "=", "Should be =="));
        assert!(!diags.has_errors());
        let halt = diags.halt(Diagnostic::new(ErrorKind::IfNoArguments, 0, "", "no args"));
        assert_eq!(halt, Halt);
        assert_eq!(diags.error_count(), 1);
        let list = diags.into_vec();
        assert!(!list[0].fatal);
        assert!(list[1].fatal);
    }

    #[test]
    fn test_span_is_clamped() {
        let d = Diagnostic::new(ErrorKind::IfNoEndIf, 10, "", "x");
        assert_eq!(d.span("abc"), 3..3);
        let d = Diagnostic::new(ErrorKind::IfOperatorNotAllowed, 1, "&&", "x");
        assert_eq!(d.span("a&&b"), 1..3);
    }

    #[test]
    fn test_format_mentions_message() {
        let source = "héllo {/if}";
        let d = Diagnostic::new(ErrorKind::EndIfNoIf, 9, "", "No if-statement found");
        let out = d.format(source, "page.zp");
        assert!(out.contains("No if-statement found"));
        assert!(out.contains("page.zp"));
    }
}
