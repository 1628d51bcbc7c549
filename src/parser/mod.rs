//! The XML event parser.
//!
//! [`EventParser`] translates raw XML syntax from any [`Source`] into a
//! lazy sequence of events, enforces well-formedness with an element
//! stack, and coordinates string lifetime with element nesting through
//! the arena: a mark is pushed when an element opens and the arena is
//! reset to it when the element closes. The reset for a closed element
//! is applied at the next parser step so the close event's own strings
//! survive their delivery.

pub mod event;

pub use event::{Attribute, EndElement, Event, RawEvent, SpanSource, StartElement, StrSpan};

use std::borrow::Cow;
use std::io::Read;

use log::warn;
use memchr::memchr;

use crate::core::arena::{Mark, StringArena};
use crate::core::dtd::EntityTable;
use crate::error::{Error, ErrorKind};
use crate::reader::{SliceSource, Source, StreamSource};

/// Per-instance parser options and resource bounds.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Emit all-whitespace runs between markup as `Whitespace` events.
    /// Off by default; attribute values are unaffected either way.
    pub preserve_whitespace: bool,
    /// Resolve `&...;` references in text and attribute values.
    /// On by default; off makes entity substitution the identity.
    pub resolve_entities: bool,
    /// Maximum concurrently open elements.
    pub max_depth: usize,
    /// Maximum attributes on a single element.
    pub max_attributes: usize,
    /// Per-token scan ceiling in bytes.
    pub max_token_len: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            preserve_whitespace: false,
            resolve_entities: true,
            max_depth: 256,
            max_attributes: 256,
            max_token_len: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Parsing,
    Done,
    Failed,
}

/// One open element.
#[derive(Debug, Clone, Copy)]
struct Frame {
    name: StrSpan,
    /// Arena top recorded just before the name was stored.
    mark: Mark,
    /// First attribute-workspace slot owned by this element.
    attr_start: usize,
}

/// Pull parser over a [`Source`].
///
/// `next_event` yields resolved events borrowing the parser;
/// slice-backed parsers additionally implement `Iterator` with events
/// that borrow the document itself (see [`EventRead::next_durable`]).
pub struct EventParser<S: Source> {
    source: S,
    arena: StringArena,
    entities: EntityTable,
    config: ParserConfig,
    stack: Vec<Frame>,
    attrs: Vec<(StrSpan, StrSpan)>,
    state: State,
    /// Synthesized close for a self-closing element.
    pending_end: Option<StrSpan>,
    /// Frame release deferred to the next step.
    pending_reset: Option<(Mark, usize)>,
    last_error: Option<(String, usize)>,
}

impl<S: Source> EventParser<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, ParserConfig::default())
    }

    pub fn with_config(source: S, config: ParserConfig) -> Self {
        EventParser {
            source,
            arena: StringArena::new(),
            entities: EntityTable::new(),
            config,
            stack: Vec::with_capacity(16),
            attrs: Vec::with_capacity(16),
            state: State::Init,
            pending_end: None,
            pending_reset: None,
            last_error: None,
        }
    }

    /// Number of currently open elements.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The error that moved the parser into its terminal state, if any.
    pub fn last_error(&self) -> Option<(&str, usize)> {
        self.last_error.as_ref().map(|(m, p)| (m.as_str(), *p))
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Advance to the next span-based event.
    ///
    /// The first failure is returned once; afterwards the parser is
    /// terminal and this returns `Ok(None)`.
    pub fn next_raw(&mut self) -> Result<Option<RawEvent>, Error> {
        if matches!(self.state, State::Done | State::Failed) {
            return Ok(None);
        }
        match self.step() {
            Ok(ev) => Ok(ev),
            Err(e) => {
                self.state = State::Failed;
                self.last_error = Some((e.kind().to_string(), e.position()));
                Err(e)
            }
        }
    }

    /// Advance and resolve against the parser's own storage.
    ///
    /// Zero-copy on both backends; the event borrows the parser until
    /// the next call.
    pub fn next_event(&mut self) -> Result<Option<Event<'_>>, Error> {
        let raw = match self.next_raw()? {
            Some(r) => r,
            None => return Ok(None),
        };
        let ev = build_event(
            raw,
            |span| Cow::Borrowed(self.span_bytes_at(span)),
            |idx| self.attrs[idx],
        );
        Ok(Some(ev))
    }

    fn error(&self, kind: ErrorKind) -> Error {
        kind.at(self.source.pos())
    }

    /// Resolve a span against the input or the arena.
    fn span_bytes_at(&self, span: StrSpan) -> &[u8] {
        let range = span.span.offset..span.span.offset + span.span.len;
        match span.src {
            SpanSource::Input => self.source.slice_all().get(range).unwrap_or(&[]),
            SpanSource::Arena => self.arena.get(span.span),
        }
    }

    /// Consume `n` bytes into a durable span. Input-relative on
    /// slice-backed sources, arena-stored otherwise; always
    /// arena-stored when entity resolution rewrites the bytes.
    fn consume_span(&mut self, n: usize, resolve: bool) -> Result<StrSpan, Error> {
        if resolve {
            let raw = self.source.take(n)?;
            let span = self.arena.store_with_entities(raw, &self.entities);
            Ok(StrSpan::arena(span))
        } else if S::SLICE_BACKED {
            let offset = self.source.pos();
            self.source.toss(n)?;
            Ok(StrSpan::input(offset, n))
        } else {
            let raw = self.source.take(n)?;
            Ok(StrSpan::arena(self.arena.store(raw)))
        }
    }

    fn skip_ws(&mut self) -> Result<(), Error> {
        while let Some(b) = self.source.peek_byte()? {
            if !is_ws(b) {
                break;
            }
            self.source.toss(1)?;
        }
        Ok(())
    }

    /// Offset of the next `delim`, or `None` if the input ends first.
    fn find_byte(&mut self, delim: u8) -> Result<Option<usize>, Error> {
        let max = self.config.max_token_len;
        let mut searched = 0usize;
        let mut win = 256usize;
        loop {
            let win_c = win.min(max);
            let (found, len, short) = {
                let w = self.source.peek(win_c)?;
                let from = searched.min(w.len());
                (
                    memchr(delim, &w[from..]).map(|i| from + i),
                    w.len(),
                    w.len() < win_c,
                )
            };
            if let Some(p) = found {
                return Ok(Some(p));
            }
            if short {
                return Ok(None);
            }
            if win_c == max {
                return Err(self.error(ErrorKind::TokenTooLarge));
            }
            searched = len;
            win *= 2;
        }
    }

    /// Offset of the next occurrence of `needle`, or `None` at EOF.
    fn find_seq(&mut self, needle: &[u8]) -> Result<Option<usize>, Error> {
        debug_assert!(needle.len() >= 2);
        let max = self.config.max_token_len;
        let mut checked = 0usize;
        let mut win = 256usize;
        loop {
            let win_c = win.min(max);
            let (found, ruled_out, short) = {
                let w = self.source.peek(win_c)?;
                let mut found = None;
                if w.len() >= needle.len() {
                    let limit = w.len() - needle.len();
                    let mut i = checked.min(limit);
                    while i <= limit {
                        match memchr(needle[0], &w[i..=limit]) {
                            Some(o) => {
                                let p = i + o;
                                if &w[p..p + needle.len()] == needle {
                                    found = Some(p);
                                    break;
                                }
                                i = p + 1;
                            }
                            None => break,
                        }
                    }
                }
                let ruled_out = w.len().saturating_sub(needle.len() - 1);
                (found, ruled_out, w.len() < win_c)
            };
            if let Some(p) = found {
                return Ok(Some(p));
            }
            if short {
                return Ok(None);
            }
            if win_c == max {
                return Err(self.error(ErrorKind::TokenTooLarge));
            }
            checked = ruled_out;
            win *= 2;
        }
    }

    /// Bytes remaining to end of input (for a trailing text run).
    fn remaining_len(&mut self) -> Result<usize, Error> {
        let max = self.config.max_token_len;
        let mut win = 256usize;
        loop {
            let win_c = win.min(max);
            let len = self.source.peek(win_c)?.len();
            if len < win_c {
                return Ok(len);
            }
            if win_c == max {
                return Err(self.error(ErrorKind::TokenTooLarge));
            }
            win *= 2;
        }
    }

    /// Length of the name at the cursor, without consuming it.
    ///
    /// Fast path for `[A-Za-z_][A-Za-z0-9._:-]*`; a byte ≥ 0x80
    /// switches to a permissive scan that stops at ASCII whitespace or
    /// one of `> / = <`. Returns 0 for an invalid first byte.
    fn scan_name_len(&mut self) -> Result<usize, Error> {
        enum Outcome {
            Stop(usize),
            Invalid,
            More,
            TooLarge,
        }
        let max = self.config.max_token_len;
        let mut i = 0usize;
        let mut permissive = false;
        let mut win = 64usize;
        loop {
            let win_c = win.min(max);
            let outcome = {
                let w = self.source.peek(win_c)?;
                let mut out = None;
                while i < w.len() {
                    let b = w[i];
                    if b >= 0x80 {
                        permissive = true;
                        i += 1;
                        continue;
                    }
                    if permissive {
                        if matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/' | b'=' | b'<') {
                            out = Some(Outcome::Stop(i));
                            break;
                        }
                        i += 1;
                    } else if i == 0 {
                        if b.is_ascii_alphabetic() || b == b'_' {
                            i += 1;
                        } else {
                            out = Some(Outcome::Invalid);
                            break;
                        }
                    } else if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-') {
                        i += 1;
                    } else {
                        out = Some(Outcome::Stop(i));
                        break;
                    }
                }
                match out {
                    Some(o) => o,
                    None if w.len() < win_c => Outcome::Stop(i),
                    None if win_c == max => Outcome::TooLarge,
                    None => Outcome::More,
                }
            };
            match outcome {
                Outcome::Stop(n) => return Ok(n),
                Outcome::Invalid => return Ok(0),
                Outcome::TooLarge => return Err(self.error(ErrorKind::TokenTooLarge)),
                Outcome::More => win *= 2,
            }
        }
    }

    fn step(&mut self) -> Result<Option<RawEvent>, Error> {
        if let Some((mark, attr_start)) = self.pending_reset.take() {
            self.arena.reset_to(mark);
            self.attrs.truncate(attr_start);
        }
        if self.state == State::Init {
            self.state = State::Parsing;
            return Ok(Some(RawEvent::DocumentStart));
        }
        if let Some(name) = self.pending_end.take() {
            if let Some(frame) = self.stack.pop() {
                self.pending_reset = Some((frame.mark, frame.attr_start));
            }
            return Ok(Some(RawEvent::EndElement { name }));
        }
        loop {
            let b = match self.source.peek_byte()? {
                None => {
                    if !self.stack.is_empty() {
                        return Err(self.error(ErrorKind::UnexpectedEndOfInput));
                    }
                    self.state = State::Done;
                    return Ok(Some(RawEvent::DocumentEnd));
                }
                Some(b) => b,
            };
            if b == b'<' {
                return self.parse_markup().map(Some);
            }
            if let Some(ev) = self.parse_text()? {
                return Ok(Some(ev));
            }
            // suppressed whitespace run; keep scanning
        }
    }

    fn parse_markup(&mut self) -> Result<RawEvent, Error> {
        let next = {
            let w = self.source.peek(2)?;
            if w.len() < 2 {
                None
            } else {
                Some(w[1])
            }
        };
        match next {
            None => Err(self.error(ErrorKind::UnexpectedEndOfInput)),
            Some(b'/') => self.parse_end_tag(),
            Some(b'!') => self.parse_bang(),
            Some(b'?') => self.parse_pi(),
            Some(_) => self.parse_start_tag(),
        }
    }

    fn parse_start_tag(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(1)?; // '<'
        let mark = self.arena.mark();
        let name_len = self.scan_name_len()?;
        if name_len == 0 {
            return Err(self.error(ErrorKind::InvalidElementName));
        }
        let name = self.consume_span(name_len, false)?;
        let attr_start = self.attrs.len();
        let mut self_closing = false;
        loop {
            self.skip_ws()?;
            match self.source.peek_byte()? {
                None => return Err(self.error(ErrorKind::UnexpectedEndOfInput)),
                Some(b'>') => {
                    self.source.toss(1)?;
                    break;
                }
                Some(b'/') => {
                    let closed = {
                        let w = self.source.peek(2)?;
                        w.len() == 2 && w[1] == b'>'
                    };
                    if !closed {
                        return Err(self.error(ErrorKind::ExpectedClosingBracket));
                    }
                    self.source.toss(2)?;
                    self_closing = true;
                    break;
                }
                Some(_) => self.parse_attribute(attr_start)?,
            }
        }
        if self.stack.len() >= self.config.max_depth {
            warn!("element depth bound {} exceeded", self.config.max_depth);
            return Err(self.error(ErrorKind::TooManyNestedElements));
        }
        self.stack.push(Frame {
            name,
            mark,
            attr_start,
        });
        if self_closing {
            self.pending_end = Some(name);
        }
        Ok(RawEvent::StartElement {
            name,
            attr_start,
            attr_count: self.attrs.len() - attr_start,
        })
    }

    fn parse_attribute(&mut self, attr_start: usize) -> Result<(), Error> {
        if self.attrs.len() - attr_start >= self.config.max_attributes {
            warn!(
                "attribute bound {} exceeded on one element",
                self.config.max_attributes
            );
            return Err(self.error(ErrorKind::TooManyAttributes));
        }
        let name_len = self.scan_name_len()?;
        if name_len == 0 {
            return Err(self.error(ErrorKind::InvalidMarkup));
        }
        let name = self.consume_span(name_len, false)?;
        self.skip_ws()?;
        match self.source.peek_byte()? {
            Some(b'=') => self.source.toss(1)?,
            _ => return Err(self.error(ErrorKind::ExpectedEquals)),
        }
        self.skip_ws()?;
        let quote = match self.source.peek_byte()? {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error(ErrorKind::ExpectedQuote)),
        };
        self.source.toss(1)?;
        let value_len = match self.find_byte(quote)? {
            Some(l) => l,
            None => return Err(self.error(ErrorKind::UnterminatedAttributeValue)),
        };
        let resolve = self.config.resolve_entities && {
            let w = self.source.peek(value_len)?;
            memchr(b'&', w).is_some()
        };
        let value = self.consume_span(value_len, resolve)?;
        self.source.toss(1)?; // closing quote
        self.attrs.push((name, value));
        Ok(())
    }

    fn parse_end_tag(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(2)?; // '</'
        let name_len = self.scan_name_len()?;
        if name_len == 0 {
            return Err(self.error(ErrorKind::InvalidElementName));
        }
        let top = match self.stack.last() {
            Some(f) => *f,
            None => return Err(self.error(ErrorKind::UnmatchedClosingTag)),
        };
        if !self.end_name_matches(top.name, name_len)? {
            let open = String::from_utf8_lossy(self.span_bytes_at(top.name)).into_owned();
            return Err(self.error(ErrorKind::MismatchedTags { open }));
        }
        self.source.toss(name_len)?;
        self.skip_ws()?;
        match self.source.peek_byte()? {
            Some(b'>') => self.source.toss(1)?,
            Some(_) => return Err(self.error(ErrorKind::ExpectedClosingBracket)),
            None => return Err(self.error(ErrorKind::UnexpectedEndOfInput)),
        }
        self.stack.pop();
        self.pending_reset = Some((top.mark, top.attr_start));
        Ok(RawEvent::EndElement { name: top.name })
    }

    /// Compare the end-tag name at the cursor against the open frame,
    /// character for character, without storing it.
    fn end_name_matches(&mut self, expected: StrSpan, name_len: usize) -> Result<bool, Error> {
        if expected.len() != name_len {
            return Ok(false);
        }
        if S::SLICE_BACKED {
            let all = self.source.slice_all();
            let start = self.source.pos();
            let candidate = &all[start..start + name_len];
            let open = match expected.src {
                SpanSource::Input => {
                    &all[expected.span.offset..expected.span.offset + expected.span.len]
                }
                SpanSource::Arena => self.arena.get(expected.span),
            };
            Ok(candidate == open)
        } else {
            let open = self.arena.get(expected.span);
            let w = self.source.peek(name_len)?;
            Ok(w == open)
        }
    }

    fn parse_bang(&mut self) -> Result<RawEvent, Error> {
        enum Kind {
            Comment,
            CData,
            Doctype,
            Bad,
        }
        let kind = {
            let w = self.source.peek(9)?;
            if w.len() >= 4 && &w[..4] == b"<!--" {
                Kind::Comment
            } else if w.len() >= 9 && &w[..9] == b"<![CDATA[" {
                Kind::CData
            } else if w.len() >= 9 && &w[..9] == b"<!DOCTYPE" {
                Kind::Doctype
            } else {
                Kind::Bad
            }
        };
        match kind {
            Kind::Comment => self.parse_comment(),
            Kind::CData => self.parse_cdata(),
            Kind::Doctype => self.parse_doctype(),
            Kind::Bad => Err(self.error(ErrorKind::InvalidMarkup)),
        }
    }

    fn parse_comment(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(4)?; // '<!--'
        let len = match self.find_seq(b"-->")? {
            Some(l) => l,
            None => return Err(self.error(ErrorKind::UnterminatedComment)),
        };
        let content = self.consume_span(len, false)?;
        self.source.toss(3)?;
        Ok(RawEvent::Comment { content })
    }

    fn parse_cdata(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(9)?; // '<![CDATA['
        let len = match self.find_seq(b"]]>")? {
            Some(l) => l,
            None => return Err(self.error(ErrorKind::UnterminatedCData)),
        };
        let content = self.consume_span(len, false)?;
        self.source.toss(3)?;
        Ok(RawEvent::CData { content })
    }

    fn parse_pi(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(2)?; // '<?'
        let name_len = self.scan_name_len()?;
        if name_len == 0 {
            return Err(self.error(ErrorKind::InvalidMarkup));
        }
        // The XML declaration is '<?xml' with 'xml' delimited by
        // whitespace or '?'. Anything else is a plain instruction.
        let is_declaration = name_len == 3 && {
            let w = self.source.peek(4)?;
            w.len() >= 3
                && &w[..3] == b"xml"
                && (w.len() == 3 || matches!(w[3], b' ' | b'\t' | b'\n' | b'\r' | b'?'))
        };
        if is_declaration {
            return self.parse_xml_declaration();
        }
        let target = self.consume_span(name_len, false)?;
        self.skip_ws()?;
        let data_len = match self.find_seq(b"?>")? {
            Some(l) => l,
            None => return Err(self.error(ErrorKind::UnterminatedProcessingInstruction)),
        };
        let data = if data_len == 0 {
            None
        } else {
            Some(self.consume_span(data_len, false)?)
        };
        self.source.toss(2)?;
        Ok(RawEvent::ProcessingInstruction { target, data })
    }

    fn parse_xml_declaration(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(3)?; // 'xml'
        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        loop {
            self.skip_ws()?;
            match self.source.peek_byte()? {
                None => return Err(self.error(ErrorKind::UnterminatedProcessingInstruction)),
                Some(b'?') => {
                    let closed = {
                        let w = self.source.peek(2)?;
                        w.len() == 2 && w[1] == b'>'
                    };
                    if !closed {
                        return Err(self.error(ErrorKind::InvalidXmlDeclaration));
                    }
                    self.source.toss(2)?;
                    break;
                }
                Some(_) => {
                    let name_len = self.scan_name_len()?;
                    if name_len == 0 {
                        return Err(self.error(ErrorKind::InvalidXmlDeclaration));
                    }
                    #[derive(PartialEq)]
                    enum Field {
                        Version,
                        Encoding,
                        Standalone,
                        Other,
                    }
                    let field = {
                        let w = self.source.peek(name_len)?;
                        match w {
                            b"version" => Field::Version,
                            b"encoding" => Field::Encoding,
                            b"standalone" => Field::Standalone,
                            _ => Field::Other,
                        }
                    };
                    self.source.toss(name_len)?;
                    self.skip_ws()?;
                    match self.source.peek_byte()? {
                        Some(b'=') => self.source.toss(1)?,
                        _ => return Err(self.error(ErrorKind::InvalidXmlDeclaration)),
                    }
                    self.skip_ws()?;
                    let quote = match self.source.peek_byte()? {
                        Some(q @ (b'"' | b'\'')) => q,
                        _ => return Err(self.error(ErrorKind::InvalidXmlDeclaration)),
                    };
                    self.source.toss(1)?;
                    let value_len = match self.find_byte(quote)? {
                        Some(l) => l,
                        None => return Err(self.error(ErrorKind::InvalidXmlDeclaration)),
                    };
                    match field {
                        Field::Version => version = Some(self.consume_span(value_len, false)?),
                        Field::Encoding => encoding = Some(self.consume_span(value_len, false)?),
                        Field::Standalone => {
                            // Literal 'yes' is true; anything else is false.
                            let yes = {
                                let w = self.source.peek(value_len)?;
                                w == b"yes"
                            };
                            self.source.toss(value_len)?;
                            standalone = Some(yes);
                        }
                        Field::Other => self.source.toss(value_len)?,
                    }
                    self.source.toss(1)?; // closing quote
                }
            }
        }
        match version {
            Some(version) => Ok(RawEvent::XmlDeclaration {
                version,
                encoding,
                standalone,
            }),
            None => Err(self.error(ErrorKind::InvalidXmlDeclaration)),
        }
    }

    fn parse_doctype(&mut self) -> Result<RawEvent, Error> {
        self.source.toss(9)?; // '<!DOCTYPE'
        self.skip_ws()?;
        let name_len = self.scan_name_len()?;
        if name_len == 0 {
            return Err(self.error(ErrorKind::InvalidDoctype));
        }
        let name = self.consume_span(name_len, false)?;
        self.skip_ws()?;
        let mut system_id = None;
        let mut public_id = None;
        enum ExternalId {
            None,
            System,
            Public,
        }
        let external = {
            let w = self.source.peek(6)?;
            if w.len() >= 6 && &w[..6] == b"SYSTEM" {
                ExternalId::System
            } else if w.len() >= 6 && &w[..6] == b"PUBLIC" {
                ExternalId::Public
            } else {
                ExternalId::None
            }
        };
        match external {
            ExternalId::System => {
                self.source.toss(6)?;
                self.skip_ws()?;
                system_id = Some(self.doctype_literal()?);
            }
            ExternalId::Public => {
                self.source.toss(6)?;
                self.skip_ws()?;
                public_id = Some(self.doctype_literal()?);
                self.skip_ws()?;
                system_id = Some(self.doctype_literal()?);
            }
            ExternalId::None => {}
        }
        self.skip_ws()?;
        if self.source.peek_byte()? == Some(b'[') {
            self.source.toss(1)?;
            self.scan_internal_subset()?;
        }
        self.skip_ws()?;
        match self.source.peek_byte()? {
            Some(b'>') => self.source.toss(1)?,
            Some(_) => return Err(self.error(ErrorKind::InvalidDoctype)),
            None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
        }
        Ok(RawEvent::Doctype {
            name,
            system_id,
            public_id,
        })
    }

    fn doctype_literal(&mut self) -> Result<StrSpan, Error> {
        let quote = match self.source.peek_byte()? {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error(ErrorKind::InvalidDoctype)),
        };
        self.source.toss(1)?;
        let len = match self.find_byte(quote)? {
            Some(l) => l,
            None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
        };
        let span = self.consume_span(len, false)?;
        self.source.toss(1)?;
        Ok(span)
    }

    /// Scan the internal subset after its opening '['. Records
    /// `<!ENTITY name "value">` declarations; everything else inside
    /// is skipped with quote and bracket tracking.
    fn scan_internal_subset(&mut self) -> Result<(), Error> {
        let mut depth = 0usize;
        loop {
            match self.source.peek_byte()? {
                None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
                Some(b']') => {
                    self.source.toss(1)?;
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Some(b'[') => {
                    depth += 1;
                    self.source.toss(1)?;
                }
                Some(q @ (b'"' | b'\'')) => {
                    self.source.toss(1)?;
                    let len = match self.find_byte(q)? {
                        Some(l) => l,
                        None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
                    };
                    self.source.toss(len + 1)?;
                }
                Some(b'<') => {
                    enum Decl {
                        Comment,
                        Pi,
                        Entity,
                        Other,
                    }
                    let decl = {
                        let w = self.source.peek(8)?;
                        if w.len() >= 4 && &w[..4] == b"<!--" {
                            Decl::Comment
                        } else if w.len() >= 2 && w[1] == b'?' {
                            Decl::Pi
                        } else if w.len() == 8 && &w[..8] == b"<!ENTITY" {
                            Decl::Entity
                        } else {
                            Decl::Other
                        }
                    };
                    match decl {
                        Decl::Comment => {
                            self.source.toss(4)?;
                            let len = match self.find_seq(b"-->")? {
                                Some(l) => l,
                                None => return Err(self.error(ErrorKind::UnterminatedComment)),
                            };
                            self.source.toss(len + 3)?;
                        }
                        Decl::Pi => {
                            self.source.toss(2)?;
                            let len = match self.find_seq(b"?>")? {
                                Some(l) => l,
                                None => {
                                    return Err(
                                        self.error(ErrorKind::UnterminatedProcessingInstruction)
                                    )
                                }
                            };
                            self.source.toss(len + 2)?;
                        }
                        Decl::Entity => self.parse_entity_decl()?,
                        Decl::Other => self.source.toss(1)?,
                    }
                }
                Some(_) => self.source.toss(1)?,
            }
        }
    }

    /// `<!ENTITY name "value">`: record an internal general entity.
    /// Parameter entities and external entities are skipped.
    fn parse_entity_decl(&mut self) -> Result<(), Error> {
        self.source.toss(8)?; // '<!ENTITY'
        self.skip_ws()?;
        if self.source.peek_byte()? == Some(b'%') {
            return self.skip_declaration();
        }
        let name_len = self.scan_name_len()?;
        if name_len == 0 {
            return self.skip_declaration();
        }
        let name: Vec<u8> = {
            let w = self.source.peek(name_len)?;
            w.to_vec()
        };
        self.source.toss(name_len)?;
        self.skip_ws()?;
        match self.source.peek_byte()? {
            Some(q @ (b'"' | b'\'')) => {
                self.source.toss(1)?;
                let len = match self.find_byte(q)? {
                    Some(l) => l,
                    None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
                };
                {
                    let value = self.source.take(len)?;
                    self.entities.declare(&name, value);
                }
                self.source.toss(1)?;
                self.skip_declaration()
            }
            _ => self.skip_declaration(),
        }
    }

    /// Skip to the '>' closing the current declaration, honoring quotes.
    fn skip_declaration(&mut self) -> Result<(), Error> {
        loop {
            match self.source.peek_byte()? {
                None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
                Some(b'>') => {
                    self.source.toss(1)?;
                    return Ok(());
                }
                Some(q @ (b'"' | b'\'')) => {
                    self.source.toss(1)?;
                    let len = match self.find_byte(q)? {
                        Some(l) => l,
                        None => return Err(self.error(ErrorKind::UnterminatedDoctype)),
                    };
                    self.source.toss(len + 1)?;
                }
                Some(_) => self.source.toss(1)?,
            }
        }
    }

    /// Character data until the next '<'. Returns `None` for runs the
    /// configuration suppresses.
    fn parse_text(&mut self) -> Result<Option<RawEvent>, Error> {
        let len = match self.find_byte(b'<')? {
            Some(l) => l,
            None => self.remaining_len()?,
        };
        if len == 0 {
            return Ok(None);
        }
        let (all_ws, has_amp) = {
            let w = self.source.peek(len)?;
            (w.iter().all(|&b| is_ws(b)), memchr(b'&', w).is_some())
        };
        if all_ws {
            if self.config.preserve_whitespace {
                let content = self.consume_span(len, false)?;
                return Ok(Some(RawEvent::Whitespace { content }));
            }
            self.source.toss(len)?;
            return Ok(None);
        }
        if self.stack.is_empty() {
            // Character data is only valid inside the root element.
            return Err(self.error(ErrorKind::InvalidMarkup));
        }
        let resolve = has_amp && self.config.resolve_entities;
        let content = self.consume_span(len, resolve)?;
        Ok(Some(RawEvent::Text { content }))
    }
}

#[inline]
fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Build a resolved event from a raw one through a span resolver and
/// an attribute accessor.
fn build_event<'a>(
    raw: RawEvent,
    mut resolve: impl FnMut(StrSpan) -> Cow<'a, [u8]>,
    mut attr: impl FnMut(usize) -> (StrSpan, StrSpan),
) -> Event<'a> {
    match raw {
        RawEvent::DocumentStart => Event::DocumentStart,
        RawEvent::DocumentEnd => Event::DocumentEnd,
        RawEvent::StartElement {
            name,
            attr_start,
            attr_count,
        } => {
            let attributes = (attr_start..attr_start + attr_count)
                .map(|i| {
                    let (n, v) = attr(i);
                    Attribute {
                        name: resolve(n),
                        value: resolve(v),
                    }
                })
                .collect();
            Event::StartElement(StartElement {
                name: resolve(name),
                attributes,
            })
        }
        RawEvent::EndElement { name } => Event::EndElement(EndElement {
            name: resolve(name),
        }),
        RawEvent::Text { content } => Event::Text(resolve(content)),
        RawEvent::Whitespace { content } => Event::Whitespace(resolve(content)),
        RawEvent::CData { content } => Event::CData(resolve(content)),
        RawEvent::Comment { content } => Event::Comment(resolve(content)),
        RawEvent::ProcessingInstruction { target, data } => Event::ProcessingInstruction {
            target: resolve(target),
            data: data.map(&mut resolve),
        },
        RawEvent::XmlDeclaration {
            version,
            encoding,
            standalone,
        } => Event::XmlDeclaration {
            version: resolve(version),
            encoding: encoding.map(&mut resolve),
            standalone,
        },
        RawEvent::Doctype {
            name,
            system_id,
            public_id,
        } => Event::Doctype {
            name: resolve(name),
            system_id: system_id.map(&mut resolve),
            public_id: public_id.map(&mut resolve),
        },
    }
}

/// Span-level access to a running event parser.
///
/// `'doc` is the lifetime durable strings can be borrowed at: the
/// document itself for slice-backed parsers, nothing (owned copies)
/// for stream-backed ones. The schema dispatcher is written once
/// against this trait.
pub trait EventRead<'doc> {
    fn next_raw(&mut self) -> Result<Option<RawEvent>, Error>;

    /// Resolve a span for immediate use, without copying.
    fn span_bytes(&self, span: StrSpan) -> &[u8];

    /// Resolve a span durably: a document borrow where the backing is
    /// slice-based, an owned copy otherwise.
    fn resolve(&self, span: StrSpan) -> Cow<'doc, [u8]>;

    /// Attribute workspace slot.
    fn attr_raw(&self, idx: usize) -> (StrSpan, StrSpan);

    /// Number of currently open elements.
    fn depth(&self) -> usize;

    /// Absolute byte position, for error reporting.
    fn byte_pos(&self) -> usize;

    /// Advance and resolve durably.
    fn next_durable(&mut self) -> Result<Option<Event<'doc>>, Error> {
        let raw = match self.next_raw()? {
            Some(r) => r,
            None => return Ok(None),
        };
        Ok(Some(build_event(
            raw,
            |span| self.resolve(span),
            |idx| self.attr_raw(idx),
        )))
    }
}

impl<'doc> EventRead<'doc> for EventParser<SliceSource<'doc>> {
    fn next_raw(&mut self) -> Result<Option<RawEvent>, Error> {
        EventParser::next_raw(self)
    }

    fn span_bytes(&self, span: StrSpan) -> &[u8] {
        self.span_bytes_at(span)
    }

    fn resolve(&self, span: StrSpan) -> Cow<'doc, [u8]> {
        match span.src {
            SpanSource::Input => {
                let all = self.source.as_slice();
                Cow::Borrowed(&all[span.span.offset..span.span.offset + span.span.len])
            }
            SpanSource::Arena => Cow::Owned(self.arena.get(span.span).to_vec()),
        }
    }

    fn attr_raw(&self, idx: usize) -> (StrSpan, StrSpan) {
        self.attrs[idx]
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn byte_pos(&self) -> usize {
        self.source.pos()
    }
}

impl<'doc, R: Read> EventRead<'doc> for EventParser<StreamSource<R>> {
    fn next_raw(&mut self) -> Result<Option<RawEvent>, Error> {
        EventParser::next_raw(self)
    }

    fn span_bytes(&self, span: StrSpan) -> &[u8] {
        self.span_bytes_at(span)
    }

    fn resolve(&self, span: StrSpan) -> Cow<'doc, [u8]> {
        Cow::Owned(self.span_bytes_at(span).to_vec())
    }

    fn attr_raw(&self, idx: usize) -> (StrSpan, StrSpan) {
        self.attrs[idx]
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn byte_pos(&self) -> usize {
        self.source.pos()
    }
}

impl<'doc> EventParser<SliceSource<'doc>> {
    /// Parser over a complete in-memory document.
    pub fn from_slice(input: &'doc [u8]) -> Self {
        Self::new(SliceSource::new(input))
    }

    pub fn from_slice_with(input: &'doc [u8], config: ParserConfig) -> Self {
        Self::with_config(SliceSource::new(input), config)
    }
}

impl<R: Read> EventParser<StreamSource<R>> {
    /// Parser over a pull reader.
    pub fn from_reader(reader: R) -> Self {
        Self::new(StreamSource::new(reader))
    }

    pub fn from_reader_with(reader: R, config: ParserConfig) -> Self {
        Self::with_config(StreamSource::new(reader), config)
    }
}

/// Slice-backed parsing yields document-borrowing events, so the
/// parser itself can be iterated.
impl<'doc> Iterator for EventParser<SliceSource<'doc>> {
    type Item = Result<Event<'doc>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_durable() {
            Ok(Some(e)) => Some(Ok(e)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Collect every event of an in-memory document.
pub fn parse_events(input: &[u8]) -> Result<Vec<Event<'_>>, Error> {
    EventParser::from_slice(input).collect()
}
