//! Event types for pull parsing.
//!
//! The state machine emits [`RawEvent`]s carrying location-tagged
//! spans and no borrows; public [`Event`]s resolve those spans to
//! `Cow` payloads against the document or the arena.

use std::borrow::Cow;

use crate::core::arena::Span;

/// Where a stored byte range lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSource {
    /// A subslice of the original input (slice-backed sources only).
    Input,
    /// A range inside the parser's string arena.
    Arena,
}

/// A location-tagged byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrSpan {
    pub src: SpanSource,
    pub span: Span,
}

impl StrSpan {
    #[inline]
    pub(crate) fn input(offset: usize, len: usize) -> Self {
        StrSpan {
            src: SpanSource::Input,
            span: Span::new(offset, len),
        }
    }

    #[inline]
    pub(crate) fn arena(span: Span) -> Self {
        StrSpan {
            src: SpanSource::Arena,
            span,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.span.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }
}

/// Span-based parsing event.
///
/// Attribute spans for a start element live in the parser's attribute
/// workspace at `attr_start..attr_start + attr_count` and are released
/// when the element closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    DocumentStart,
    DocumentEnd,
    StartElement {
        name: StrSpan,
        attr_start: usize,
        attr_count: usize,
    },
    EndElement {
        name: StrSpan,
    },
    Text {
        content: StrSpan,
    },
    Whitespace {
        content: StrSpan,
    },
    CData {
        content: StrSpan,
    },
    Comment {
        content: StrSpan,
    },
    ProcessingInstruction {
        target: StrSpan,
        data: Option<StrSpan>,
    },
    XmlDeclaration {
        version: StrSpan,
        encoding: Option<StrSpan>,
        standalone: Option<bool>,
    },
    Doctype {
        name: StrSpan,
        system_id: Option<StrSpan>,
        public_id: Option<StrSpan>,
    },
}

/// A resolved parsing event.
///
/// String payloads borrow the document on slice-backed sources (owned
/// only where entity resolution rewrote them) and the parser's arena
/// on stream-backed sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<'a> {
    /// Emitted once before any markup.
    DocumentStart,
    /// Emitted once at end of input.
    DocumentEnd,
    StartElement(StartElement<'a>),
    EndElement(EndElement<'a>),
    /// Character data containing at least one non-whitespace byte
    /// (any run when whitespace preservation is on).
    Text(Cow<'a, [u8]>),
    /// All-whitespace run between markup; only emitted when
    /// whitespace preservation is on.
    Whitespace(Cow<'a, [u8]>),
    /// Raw character data from a `<![CDATA[...]]>` section.
    CData(Cow<'a, [u8]>),
    Comment(Cow<'a, [u8]>),
    ProcessingInstruction {
        target: Cow<'a, [u8]>,
        data: Option<Cow<'a, [u8]>>,
    },
    XmlDeclaration {
        version: Cow<'a, [u8]>,
        encoding: Option<Cow<'a, [u8]>>,
        standalone: Option<bool>,
    },
    Doctype {
        name: Cow<'a, [u8]>,
        system_id: Option<Cow<'a, [u8]>>,
        public_id: Option<Cow<'a, [u8]>>,
    },
}

/// Start-element payload: name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement<'a> {
    pub name: Cow<'a, [u8]>,
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> StartElement<'a> {
    /// Element name as UTF-8, if valid.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name.as_ref()).ok()
    }

    /// Look up an attribute by exact name.
    pub fn get_attribute(&self, name: &[u8]) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|a| a.name.as_ref() == name)
    }

    /// Look up an attribute value by name, as UTF-8.
    pub fn get_attribute_value(&self, name: &str) -> Option<&str> {
        self.get_attribute(name.as_bytes())
            .and_then(|a| std::str::from_utf8(a.value.as_ref()).ok())
    }
}

/// End-element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndElement<'a> {
    pub name: Cow<'a, [u8]>,
}

impl<'a> EndElement<'a> {
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name.as_ref()).ok()
    }
}

/// An attribute as it appeared in the start tag, entities resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: Cow<'a, [u8]>,
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name.as_ref()).ok()
    }

    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value.as_ref()).ok()
    }
}

impl<'a> Event<'a> {
    pub fn is_start_element(&self) -> bool {
        matches!(self, Event::StartElement(_))
    }

    pub fn is_end_element(&self) -> bool {
        matches!(self, Event::EndElement(_))
    }

    pub fn as_start_element(&self) -> Option<&StartElement<'a>> {
        match self {
            Event::StartElement(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_end_element(&self) -> Option<&EndElement<'a>> {
        match self {
            Event::EndElement(e) => Some(e),
            _ => None,
        }
    }

    /// Character data payload for text and CDATA events.
    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            Event::Text(t) | Event::CData(t) | Event::Whitespace(t) => Some(t.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let elem = StartElement {
            name: Cow::Borrowed(b"p" as &[u8]),
            attributes: vec![
                Attribute {
                    name: Cow::Borrowed(b"x" as &[u8]),
                    value: Cow::Borrowed(b"1" as &[u8]),
                },
                Attribute {
                    name: Cow::Borrowed(b"y" as &[u8]),
                    value: Cow::Borrowed(b"2" as &[u8]),
                },
            ],
        };
        assert_eq!(elem.get_attribute_value("y"), Some("2"));
        assert_eq!(elem.get_attribute_value("z"), None);
    }

    #[test]
    fn test_event_predicates() {
        let e = Event::Text(Cow::Borrowed(b"hi" as &[u8]));
        assert!(!e.is_start_element());
        assert_eq!(e.as_text(), Some(b"hi" as &[u8]));
    }
}
