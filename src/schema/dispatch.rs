//! Schema-directed traversal of the event stream.
//!
//! [`SchemaParser::root`] binds the document's root element to the
//! schema root and returns a [`Node`]: fully materialized for eager
//! records, or a [`LazyRecord`] whose [`Children`] handle advances the
//! underlying event parser on demand.
//!
//! Every span the dispatcher binds is resolved durably before the
//! parser advances again, so values stay valid while iteration
//! continues: document borrows on slice-backed sources, owned copies
//! on stream-backed ones.

use std::borrow::Cow;
use std::io::Read;
use std::marker::PhantomData;

use log::debug;

use crate::error::{Error, ErrorKind};
use crate::parser::{EventParser, EventRead, ParserConfig, RawEvent};
use crate::reader::{MappedFile, SliceSource, StreamSource};

use super::value::{convert, Value};
use super::{FieldDefKind, RecordId, Schema, VariantId};

pub use super::value::Record;

/// Parses one document against a schema.
pub struct SchemaParser<'s, 'doc, P: EventRead<'doc>> {
    schema: &'s Schema,
    parser: P,
    _doc: PhantomData<&'doc ()>,
}

impl<'s, 'doc> SchemaParser<'s, 'doc, EventParser<SliceSource<'doc>>> {
    /// Parse a complete in-memory document.
    pub fn from_slice(schema: &'s Schema, input: &'doc [u8]) -> Self {
        Self::from_slice_with(schema, input, ParserConfig::default())
    }

    pub fn from_slice_with(schema: &'s Schema, input: &'doc [u8], config: ParserConfig) -> Self {
        SchemaParser {
            schema,
            parser: EventParser::from_slice_with(input, config),
            _doc: PhantomData,
        }
    }

    /// Parse a memory-mapped file (a slice-backed source).
    pub fn from_mapped(schema: &'s Schema, file: &'doc MappedFile) -> Self {
        Self::from_slice(schema, file.as_bytes())
    }
}

impl<'s, 'doc, R: Read> SchemaParser<'s, 'doc, EventParser<StreamSource<R>>> {
    /// Parse from a pull reader; bound strings are copied out of the
    /// arena as they are bound.
    pub fn from_reader(schema: &'s Schema, reader: R) -> Self {
        Self::from_reader_with(schema, reader, ParserConfig::default())
    }

    pub fn from_reader_with(schema: &'s Schema, reader: R, config: ParserConfig) -> Self {
        SchemaParser {
            schema,
            parser: EventParser::from_reader_with(reader, config),
            _doc: PhantomData,
        }
    }
}

impl<'s, 'doc, P: EventRead<'doc>> SchemaParser<'s, 'doc, P> {
    /// Advance to the root element and bind it to the schema root.
    ///
    /// Prolog events (declaration, DOCTYPE, comments, processing
    /// instructions, whitespace) are consumed on the way.
    pub fn root(&mut self) -> Result<Node<'_, 'doc, P>, Error> {
        loop {
            match self.parser.next_raw()? {
                None | Some(RawEvent::DocumentEnd) => {
                    return Err(ErrorKind::NoRootElement.at(self.parser.byte_pos()))
                }
                Some(RawEvent::StartElement {
                    attr_start,
                    attr_count,
                    ..
                }) => {
                    return bind_node(
                        self.schema,
                        &mut self.parser,
                        self.schema.root(),
                        attr_start,
                        attr_count,
                    )
                }
                Some(_) => continue,
            }
        }
    }
}

/// A bound record: materialized, or holding a live iterator.
pub enum Node<'a, 'doc, P: EventRead<'doc>> {
    Eager(Record<'doc>),
    Lazy(LazyRecord<'a, 'doc, P>),
}

impl<'a, 'doc, P: EventRead<'doc>> std::fmt::Debug for Node<'a, 'doc, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Eager(r) => f.debug_tuple("Eager").field(r).finish(),
            Node::Lazy(l) => f.debug_tuple("Lazy").field(l).finish(),
        }
    }
}

impl<'a, 'doc, P: EventRead<'doc>> Node<'a, 'doc, P> {
    pub fn into_eager(self) -> Option<Record<'doc>> {
        match self {
            Node::Eager(r) => Some(r),
            Node::Lazy(_) => None,
        }
    }

    pub fn as_eager(&self) -> Option<&Record<'doc>> {
        match self {
            Node::Eager(r) => Some(r),
            Node::Lazy(_) => None,
        }
    }

    pub fn as_lazy(&mut self) -> Option<&mut LazyRecord<'a, 'doc, P>> {
        match self {
            Node::Lazy(l) => Some(l),
            Node::Eager(_) => None,
        }
    }

    /// Field access that works for both shapes.
    pub fn get(&self, field: &str) -> Option<&Value<'doc>> {
        match self {
            Node::Eager(r) => r.get(field),
            Node::Lazy(l) => l.get(field),
        }
    }
}

/// A lazy record: attribute fields materialized, children owned by the
/// iterator handle.
pub struct LazyRecord<'a, 'doc, P: EventRead<'doc>> {
    record: Record<'doc>,
    children: Children<'a, 'doc, P>,
}

impl<'a, 'doc, P: EventRead<'doc>> std::fmt::Debug for LazyRecord<'a, 'doc, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRecord")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl<'a, 'doc, P: EventRead<'doc>> LazyRecord<'a, 'doc, P> {
    /// The attribute fields bound at the start element.
    pub fn record(&self) -> &Record<'doc> {
        &self.record
    }

    pub fn get(&self, field: &str) -> Option<&Value<'doc>> {
        self.record.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.record.str_field(field)
    }

    /// The iterator handle over matching children.
    pub fn children(&mut self) -> &mut Children<'a, 'doc, P> {
        &mut self.children
    }
}

enum IterMode {
    Single { tag: String, item: RecordId },
    Multi(VariantId),
}

/// Iterator handle driving the event parser between the enclosing
/// element's start and end.
///
/// Each produced [`Child`] borrows this handle, so nested iterators
/// must be consumed depth-first; abandoning a nested scope is repaired
/// by a defensive skip to its close on the following `next`.
pub struct Children<'a, 'doc, P: EventRead<'doc>> {
    schema: &'a Schema,
    parser: &'a mut P,
    mode: IterMode,
    /// Parser depth with the enclosing element open.
    parent_depth: usize,
    done: bool,
    _doc: PhantomData<&'doc ()>,
}

/// One iterator item; `variant` carries the matched case name for
/// multi-iterators.
pub struct Child<'a, 'doc, P: EventRead<'doc>> {
    pub variant: Option<&'a str>,
    pub node: Node<'a, 'doc, P>,
}

impl<'a, 'doc, P: EventRead<'doc>> std::fmt::Debug for Children<'a, 'doc, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Children").finish_non_exhaustive()
    }
}

impl<'a, 'doc, P: EventRead<'doc>> std::fmt::Debug for Child<'a, 'doc, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Child")
            .field("variant", &self.variant)
            .field("node", &self.node)
            .finish()
    }
}

impl<'a, 'doc, P: EventRead<'doc>> Children<'a, 'doc, P> {
    /// Advance to the next child matching the iterator's schema.
    ///
    /// Returns `None` once the enclosing element's end tag has been
    /// consumed; subtrees with non-matching tags are skipped whole.
    pub fn next(&mut self) -> Result<Option<Child<'_, 'doc, P>>, Error> {
        if self.done {
            return Ok(None);
        }
        // Repair after a partially consumed nested scope: return to
        // the enclosing element's level before looking for siblings.
        while self.parser.depth() > self.parent_depth {
            if self.parser.next_raw()?.is_none() {
                self.done = true;
                return Err(ErrorKind::UnexpectedEndOfDocument.at(self.parser.byte_pos()));
            }
        }
        loop {
            match self.parser.next_raw()? {
                None | Some(RawEvent::DocumentEnd) => {
                    self.done = true;
                    return Err(ErrorKind::UnexpectedEndOfDocument.at(self.parser.byte_pos()));
                }
                Some(RawEvent::EndElement { .. }) => {
                    if self.parser.depth() < self.parent_depth {
                        self.done = true;
                        return Ok(None);
                    }
                    // Close of a sibling scope we were repairing past.
                }
                Some(RawEvent::StartElement {
                    name,
                    attr_start,
                    attr_count,
                }) => {
                    let schema = self.schema;
                    let matched: Option<(Option<&str>, RecordId)> = {
                        let tag = self.parser.span_bytes(name);
                        match &self.mode {
                            IterMode::Single { tag: want, item } => {
                                (want.as_bytes() == tag).then(|| (None, *item))
                            }
                            IterMode::Multi(vid) => schema
                                .variant(*vid)
                                .cases
                                .iter()
                                .find(|c| c.xml_name.as_bytes() == tag)
                                .map(|c| (Some(c.name.as_str()), c.record)),
                        }
                    };
                    match matched {
                        None => {
                            debug!(
                                "skipping unmatched child <{}>",
                                String::from_utf8_lossy(self.parser.span_bytes(name))
                            );
                            skip_subtree(self.parser)?;
                        }
                        Some((variant, record)) => {
                            let node = bind_node(
                                schema,
                                &mut *self.parser,
                                record,
                                attr_start,
                                attr_count,
                            )?;
                            return Ok(Some(Child { variant, node }));
                        }
                    }
                }
                Some(_) => continue,
            }
        }
    }
}

/// Bind the element whose start event was just consumed.
fn bind_node<'a, 'doc, P: EventRead<'doc>>(
    schema: &'a Schema,
    parser: &'a mut P,
    record: RecordId,
    attr_start: usize,
    attr_count: usize,
) -> Result<Node<'a, 'doc, P>, Error> {
    if schema.is_lazy(record) {
        bind_lazy(schema, parser, record, attr_start, attr_count).map(Node::Lazy)
    } else {
        bind_eager(parser, schema, record, attr_start, attr_count).map(Node::Eager)
    }
}

/// Bind attributes to matching primitive fields.
fn bind_attributes<'doc, P: EventRead<'doc>>(
    parser: &P,
    shape: &super::RecordShape,
    attr_start: usize,
    attr_count: usize,
    values: &mut [Option<Value<'doc>>],
) -> Result<(), Error> {
    for i in attr_start..attr_start + attr_count {
        let (name_span, value_span) = parser.attr_raw(i);
        let field_idx = {
            let name = parser.span_bytes(name_span);
            shape
                .fields
                .iter()
                .position(|f| f.xml_name.as_bytes() == name)
        };
        if let Some(fi) = field_idx {
            if let FieldDefKind::Prim(prim) = &shape.fields[fi].kind {
                let raw = parser.resolve(value_span);
                values[fi] = Some(convert(
                    prim,
                    raw,
                    &shape.fields[fi].name,
                    parser.byte_pos(),
                )?);
            }
        }
    }
    Ok(())
}

/// Apply defaults and optionals; anything still unset is an error.
fn finish_fields<'doc>(
    shape: &super::RecordShape,
    values: &mut [Option<Value<'doc>>],
    pos: usize,
    skip: Option<usize>,
) -> Result<(), Error> {
    for (fi, field) in shape.fields.iter().enumerate() {
        if values[fi].is_some() || skip == Some(fi) {
            continue;
        }
        if let Some(default) = &field.default {
            values[fi] = Some(default.clone());
        } else if field.optional {
            values[fi] = Some(Value::Absent);
        } else {
            return Err(ErrorKind::MissingRequiredField {
                field: field.name.clone(),
            }
            .at(pos));
        }
    }
    Ok(())
}

/// Fully materialize an eager record, consuming events through the
/// enclosing element's end tag.
fn bind_eager<'doc, P: EventRead<'doc>>(
    parser: &mut P,
    schema: &Schema,
    record: RecordId,
    attr_start: usize,
    attr_count: usize,
) -> Result<Record<'doc>, Error> {
    let shape = schema.record(record).clone();
    let mut values: Vec<Option<Value<'doc>>> = vec![None; shape.fields.len()];
    bind_attributes(parser, &shape, attr_start, attr_count, &mut values)?;

    let depth = parser.depth();
    loop {
        match parser.next_raw()? {
            None | Some(RawEvent::DocumentEnd) => {
                return Err(ErrorKind::UnexpectedEndOfDocument.at(parser.byte_pos()))
            }
            Some(RawEvent::EndElement { .. }) if parser.depth() < depth => break,
            Some(RawEvent::StartElement {
                name,
                attr_start,
                attr_count,
            }) => {
                let field_idx = {
                    let tag = parser.span_bytes(name);
                    shape.fields.iter().enumerate().position(|(fi, f)| {
                        values[fi].is_none() && f.xml_name.as_bytes() == tag
                    })
                };
                match field_idx {
                    Some(fi) => match &shape.fields[fi].kind {
                        FieldDefKind::Prim(prim) => {
                            values[fi] =
                                Some(bind_primitive_child(parser, prim, &shape.fields[fi].name)?);
                        }
                        FieldDefKind::Record(child) => {
                            let nested =
                                bind_eager(parser, schema, *child, attr_start, attr_count)?;
                            values[fi] = Some(Value::Record(Box::new(nested)));
                        }
                        // Iterator fields never appear on eager
                        // records (validated ahead of time).
                        FieldDefKind::Iter { .. } | FieldDefKind::Multi(_) => {
                            skip_subtree(parser)?;
                        }
                    },
                    None => {
                        debug!(
                            "skipping unrecognized child <{}> of <{}>",
                            String::from_utf8_lossy(parser.span_bytes(name)),
                            shape.name
                        );
                        skip_subtree(parser)?;
                    }
                }
            }
            Some(_) => continue,
        }
    }

    finish_fields(&shape, &mut values, parser.byte_pos(), None)?;
    Ok(Record {
        shape,
        values: values
            .into_iter()
            .map(|v| v.unwrap_or(Value::Absent))
            .collect(),
    })
}

/// Bind a lazy record: attribute fields now, children through the
/// returned iterator handle.
fn bind_lazy<'a, 'doc, P: EventRead<'doc>>(
    schema: &'a Schema,
    parser: &'a mut P,
    record: RecordId,
    attr_start: usize,
    attr_count: usize,
) -> Result<LazyRecord<'a, 'doc, P>, Error> {
    let shape = schema.record(record).clone();
    let iter_idx = match shape.iter_field {
        Some(i) => i,
        // Unreachable for validated schemas; bind_node routed here
        // because an iterator field exists.
        None => {
            return Err(ErrorKind::NonPrimitiveLazyField {
                field: shape.name.clone(),
            }
            .at(parser.byte_pos()))
        }
    };

    // Everything except the iterator must be a primitive.
    for (fi, field) in shape.fields.iter().enumerate() {
        if fi != iter_idx && !matches!(field.kind, FieldDefKind::Prim(_)) {
            return Err(ErrorKind::NonPrimitiveLazyField {
                field: field.name.clone(),
            }
            .at(parser.byte_pos()));
        }
    }

    let mut values: Vec<Option<Value<'doc>>> = vec![None; shape.fields.len()];
    bind_attributes(parser, &shape, attr_start, attr_count, &mut values)?;
    finish_fields(&shape, &mut values, parser.byte_pos(), Some(iter_idx))?;

    let mode = match &shape.fields[iter_idx].kind {
        FieldDefKind::Iter { tag, item } => IterMode::Single {
            tag: tag.clone(),
            item: *item,
        },
        FieldDefKind::Multi(vid) => IterMode::Multi(*vid),
        FieldDefKind::Prim(_) | FieldDefKind::Record(_) => {
            return Err(ErrorKind::NonPrimitiveLazyField {
                field: shape.fields[iter_idx].name.clone(),
            }
            .at(parser.byte_pos()))
        }
    };
    let parent_depth = parser.depth();

    Ok(LazyRecord {
        record: Record {
            shape,
            values: values
                .into_iter()
                .map(|v| v.unwrap_or(Value::Absent))
                .collect(),
        },
        children: Children {
            schema,
            parser,
            mode,
            parent_depth,
            done: false,
            _doc: PhantomData,
        },
    })
}

/// Consume the single text run of a primitive child element and its
/// closing tag. Text, CDATA, and whitespace runs concatenate; no
/// content converts as the empty string.
fn bind_primitive_child<'doc, P: EventRead<'doc>>(
    parser: &mut P,
    prim: &super::Prim,
    field: &str,
) -> Result<Value<'doc>, Error> {
    let depth = parser.depth();
    let mut content: Option<Cow<'doc, [u8]>> = None;
    loop {
        match parser.next_raw()? {
            None | Some(RawEvent::DocumentEnd) => {
                return Err(ErrorKind::UnexpectedEndOfDocument.at(parser.byte_pos()))
            }
            Some(RawEvent::EndElement { .. }) if parser.depth() < depth => break,
            Some(
                RawEvent::Text { content: span }
                | RawEvent::CData { content: span }
                | RawEvent::Whitespace { content: span },
            ) => {
                let bytes = parser.resolve(span);
                content = Some(match content {
                    None => bytes,
                    Some(mut acc) => {
                        acc.to_mut().extend_from_slice(&bytes);
                        acc
                    }
                });
            }
            Some(RawEvent::StartElement { name, .. }) => {
                let name = String::from_utf8_lossy(parser.span_bytes(name)).into_owned();
                return Err(ErrorKind::UnexpectedElement { name }.at(parser.byte_pos()));
            }
            Some(_) => continue,
        }
    }
    let raw = content.unwrap_or(Cow::Borrowed(&[]));
    convert(prim, raw, field, parser.byte_pos())
}

/// Skip everything up to and including the end of the element whose
/// start event was just consumed.
fn skip_subtree<'doc, P: EventRead<'doc>>(parser: &mut P) -> Result<(), Error> {
    let target = parser.depth().saturating_sub(1);
    while parser.depth() > target {
        if parser.next_raw()?.is_none() {
            return Err(ErrorKind::UnexpectedEndOfDocument.at(parser.byte_pos()));
        }
    }
    Ok(())
}
