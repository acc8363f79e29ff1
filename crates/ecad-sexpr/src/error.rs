use ecad_core::Location;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SexprErrorKind {
    /// The stream held something other than what the production requires.
    Expecting { expected: String, found: String },
    UnterminatedString,
    UnexpectedChar(char),
    UnexpectedEof,
    /// A number atom whose spelling does not parse as the requested type.
    BadNumber { what: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", location, describe(kind))]
pub struct SexprError {
    pub kind: SexprErrorKind,
    pub location: Location,
}

fn describe(kind: &SexprErrorKind) -> String {
    match kind {
        SexprErrorKind::Expecting { expected, found } => {
            format!("expected {expected}, found '{found}'")
        }
        SexprErrorKind::UnterminatedString => "unterminated quoted string".to_owned(),
        SexprErrorKind::UnexpectedChar(ch) => format!("unexpected character '{ch}'"),
        SexprErrorKind::UnexpectedEof => "unexpected end of file".to_owned(),
        SexprErrorKind::BadNumber { what, text } => {
            format!("invalid {what} '{text}'")
        }
    }
}
