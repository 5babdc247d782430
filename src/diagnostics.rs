use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An ignored class looks like a utility or variant, most likely built
    /// dynamically at runtime.
    LikelyMistypedUtility { token: String },
    /// `@apply` referenced a utility the compiler does not know.
    UnknownApplyUtility { utility: String },
}

/// A non-fatal finding returned alongside the rewritten document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub filename: String,
    /// One-based line of the element (or style block) the finding belongs to.
    pub line: u32,
    /// One-based column.
    pub column: u32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: ", self.filename, self.line, self.column)?;
        match &self.kind {
            DiagnosticKind::LikelyMistypedUtility { token } => write!(
                f,
                "`{}` looks like a utility class but was not compiled; dynamic classes are not supported, generate them at runtime instead",
                token
            ),
            DiagnosticKind::UnknownApplyUtility { utility } => {
                write!(f, "unknown utility in @apply: {}", utility)
            }
        }
    }
}
