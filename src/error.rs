//! Error types for parsing and schema definition.
//!
//! Runtime errors carry the byte position at which they were observed.
//! All runtime errors are terminal for the producing parser: after the
//! first `Err`, further calls return `Ok(None)` and the stored kind
//! stays readable through `EventParser::last_error`.

use std::fmt;
use thiserror::Error;

/// A parse or binding failure, located in the input.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    position: usize,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, position: usize) -> Self {
        Error { kind, position }
    }

    /// The failure class.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Byte offset into the consumed input at which the failure was observed.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.kind, self.position)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure classes for the event parser and the schema dispatcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source shape
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("unterminated token")]
    UnterminatedToken,
    #[error("token exceeds the scan ceiling")]
    TokenTooLarge,

    // Markup structure
    #[error("invalid markup")]
    InvalidMarkup,
    #[error("expected '>'")]
    ExpectedClosingBracket,
    #[error("expected '=' after attribute name")]
    ExpectedEquals,
    #[error("expected quote around attribute value")]
    ExpectedQuote,
    #[error("unterminated attribute value")]
    UnterminatedAttributeValue,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated CDATA section")]
    UnterminatedCData,
    #[error("unterminated processing instruction")]
    UnterminatedProcessingInstruction,
    #[error("unterminated DOCTYPE declaration")]
    UnterminatedDoctype,
    #[error("invalid XML declaration")]
    InvalidXmlDeclaration,
    #[error("invalid DOCTYPE declaration")]
    InvalidDoctype,
    #[error("invalid element name")]
    InvalidElementName,

    // Structure
    #[error("end tag does not match open element '{open}'")]
    MismatchedTags { open: String },
    #[error("closing tag without a matching open element")]
    UnmatchedClosingTag,
    #[error("element nesting exceeds the depth bound")]
    TooManyNestedElements,
    #[error("element exceeds the per-element attribute bound")]
    TooManyAttributes,
    #[error("empty text where content was required")]
    EmptyText,

    // Schema binding
    #[error("required field '{field}' was not present")]
    MissingRequiredField { field: String },
    #[error("unexpected element '{name}'")]
    UnexpectedElement { name: String },
    #[error("lazy record field '{field}' must be a primitive")]
    NonPrimitiveLazyField { field: String },
    #[error("document contains no root element")]
    NoRootElement,
    #[error("document ended inside a record")]
    UnexpectedEndOfDocument,

    // Conversion
    #[error("invalid integer in field '{field}'")]
    InvalidInteger { field: String },
    #[error("invalid float in field '{field}'")]
    InvalidFloat { field: String },
    #[error("invalid boolean in field '{field}'")]
    InvalidBoolean { field: String },
    #[error("conversion failed for field '{field}': {reason}")]
    Convert { field: String, reason: String },

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorKind {
    pub(crate) fn at(self, position: usize) -> Error {
        Error::new(self, position)
    }
}

/// Schema-definition diagnostics, reported by [`SchemaBuilder::build`]
/// before any parsing is attempted.
///
/// [`SchemaBuilder::build`]: crate::schema::SchemaBuilder::build
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("record '{record}' declares more than one iterator field")]
    MultipleIterators { record: String },
    #[error("eager record '{record}' reaches lazy record '{lazy}' through nested fields")]
    LazyInsideEager { record: String, lazy: String },
    #[error("record '{record}' renames unknown field '{field}'")]
    UnknownFieldOverride { record: String, field: String },
    #[error("variant '{variant}' renames unknown case '{case}'")]
    UnknownVariantOverride { variant: String, case: String },
    #[error("the schema root must be a record")]
    RootNotRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let e = ErrorKind::UnexpectedEndOfInput.at(17);
        assert_eq!(e.to_string(), "unexpected end of input at byte 17");
        assert_eq!(e.position(), 17);
    }

    #[test]
    fn test_mismatched_tags_names_open_element() {
        let e = ErrorKind::MismatchedTags { open: "svg".into() }.at(0);
        assert!(e.to_string().contains("svg"));
    }
}
