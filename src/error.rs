use crate::markup::ParseError;
use thiserror::Error;

/// Errors that abort a rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreprocessError {
    #[error(
        "{filename}:{line}:{column}: `{attribute}` has no value and `{name}` is not a valid identifier"
    )]
    InvalidDirectiveName {
        filename: String,
        attribute: String,
        name: String,
        line: u32,
        column: u32,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}
