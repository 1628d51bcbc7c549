//! Resource bounds and failure-path behavior.

use std::io::Cursor;

use veloxml::schema::{Prim, RecordDef, SchemaBuilder, SchemaParser};
use veloxml::{Event, EventParser, ErrorKind, ParserConfig};

fn drain_expecting_error(parser: &mut EventParser<veloxml::SliceSource<'_>>) -> veloxml::Error {
    loop {
        match parser.next_event() {
            Ok(Some(_)) => {}
            Ok(None) => panic!("expected a parse error"),
            Err(e) => return e,
        }
    }
}

#[test]
fn depth_bound_fails_on_offending_start() {
    let mut doc = Vec::new();
    for _ in 0..300 {
        doc.extend_from_slice(b"<d>");
    }
    let mut parser = EventParser::from_slice(&doc);
    let err = drain_expecting_error(&mut parser);
    assert!(matches!(err.kind(), ErrorKind::TooManyNestedElements));
    assert!(parser.next_event().unwrap().is_none());
}

#[test]
fn attribute_bound_fails_past_the_cap() {
    let mut doc = b"<e".to_vec();
    for i in 0..300 {
        doc.extend_from_slice(format!(" a{i}=\"{i}\"").as_bytes());
    }
    doc.extend_from_slice(b"/>");
    let mut parser = EventParser::from_slice(&doc);
    let err = drain_expecting_error(&mut parser);
    assert!(matches!(err.kind(), ErrorKind::TooManyAttributes));
}

#[test]
fn attribute_cap_is_configurable_upward() {
    let mut doc = b"<e".to_vec();
    for i in 0..300 {
        doc.extend_from_slice(format!(" a{i}=\"{i}\"").as_bytes());
    }
    doc.extend_from_slice(b"/>");
    let cfg = ParserConfig {
        max_attributes: 512,
        ..ParserConfig::default()
    };
    let mut parser = EventParser::from_slice_with(&doc, cfg);
    let mut count = None;
    while let Some(ev) = parser.next_event().unwrap() {
        if let Event::StartElement(e) = ev {
            count = Some(e.attributes.len());
        }
    }
    assert_eq!(count, Some(300));
}

/// The per-element cap must not fire on attributes that are merely
/// live across depth: the workspace is truncated per frame, so many
/// open elements can together hold far more than one element's cap.
#[test]
fn cumulative_live_attributes_across_depth_exceed_the_per_element_cap() {
    const LEVELS: usize = 10;
    const ATTRS_PER_LEVEL: usize = 60; // 600 live in total

    let mut doc = Vec::new();
    for level in 0..LEVELS {
        doc.extend_from_slice(format!("<l{level}").as_bytes());
        for a in 0..ATTRS_PER_LEVEL {
            doc.extend_from_slice(format!(" a{a}=\"v{level}x{a}\"").as_bytes());
        }
        doc.push(b'>');
    }
    for level in (0..LEVELS).rev() {
        doc.extend_from_slice(format!("</l{level}>").as_bytes());
    }

    let mut parser = EventParser::from_slice(&doc);
    let mut starts = 0;
    while let Some(ev) = parser.next_event().unwrap() {
        if let Event::StartElement(e) = ev {
            assert_eq!(e.attributes.len(), ATTRS_PER_LEVEL);
            starts += 1;
        }
    }
    assert_eq!(starts, LEVELS);
}

#[test]
fn token_ceiling_applies_to_text() {
    let cfg = ParserConfig {
        max_token_len: 2048,
        ..ParserConfig::default()
    };
    let mut doc = b"<r>".to_vec();
    doc.extend(std::iter::repeat(b'x').take(1 << 14));
    doc.extend_from_slice(b"</r>");
    let mut parser = EventParser::from_slice_with(&doc, cfg);
    let err = loop {
        match parser.next_event() {
            Ok(Some(_)) => {}
            Ok(None) => panic!("expected a parse error"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err.kind(), ErrorKind::TokenTooLarge));
}

#[test]
fn token_ceiling_applies_to_streams_too() {
    let cfg = ParserConfig {
        max_token_len: 2048,
        ..ParserConfig::default()
    };
    let mut doc = b"<r><!-- ".to_vec();
    doc.extend(std::iter::repeat(b'c').take(1 << 14));
    doc.extend_from_slice(b" --></r>");
    let mut parser = EventParser::from_reader_with(Cursor::new(doc), cfg);
    let err = loop {
        match parser.next_event() {
            Ok(Some(_)) => {}
            Ok(None) => panic!("expected a parse error"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err.kind(), ErrorKind::TokenTooLarge));
}

#[test]
fn errors_are_terminal_and_inspectable() {
    let mut parser = EventParser::from_slice(b"<a><b></c></b></a>");
    let err = drain_expecting_error(&mut parser);
    assert!(matches!(err.kind(), ErrorKind::MismatchedTags { open } if open == "b"));
    for _ in 0..3 {
        assert!(parser.next_event().unwrap().is_none());
    }
    let (message, position) = parser.last_error().expect("error recorded");
    assert!(message.contains('b'));
    assert_eq!(position, err.position());
}

#[test]
fn unterminated_constructs() {
    for (doc, expect_comment) in [
        (&b"<r><!-- never closed"[..], true),
        (&b"<r><![CDATA[ never closed"[..], false),
    ] {
        let mut parser = EventParser::from_slice(doc);
        let err = drain_expecting_error(&mut parser);
        match err.kind() {
            ErrorKind::UnterminatedComment => assert!(expect_comment),
            ErrorKind::UnterminatedCData => assert!(!expect_comment),
            other => panic!("unexpected error {other}"),
        }
    }
}

#[test]
fn malformed_attribute_errors() {
    let cases: [(&[u8], fn(&ErrorKind) -> bool); 3] = [
        (b"<a x>", |k| matches!(k, ErrorKind::ExpectedEquals)),
        (b"<a x=1>", |k| matches!(k, ErrorKind::ExpectedQuote)),
        (b"<a x=\"1>", |k| {
            matches!(k, ErrorKind::UnterminatedAttributeValue)
        }),
    ];
    for (doc, check) in cases {
        let mut parser = EventParser::from_slice(doc);
        let err = drain_expecting_error(&mut parser);
        assert!(check(err.kind()), "doc {:?} gave {}", doc, err);
    }
}

#[test]
fn missing_required_field_is_reported() {
    let mut b = SchemaBuilder::new();
    let root = b.add_record(
        RecordDef::new("R")
            .prim("must", Prim::Bytes)
            .opt("may", Prim::Bytes),
    );
    let schema = b.build(root).unwrap();
    let mut parsed = SchemaParser::from_slice(&schema, b"<r may=\"x\"/>");
    let err = parsed.root().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MissingRequiredField { field } if field == "must"));
}

#[test]
fn conversion_errors_name_the_field() {
    let mut b = SchemaBuilder::new();
    let root = b.add_record(RecordDef::new("R").prim("n", Prim::I32));
    let schema = b.build(root).unwrap();
    let mut parsed = SchemaParser::from_slice(&schema, b"<r n=\"twelve\"/>");
    let err = parsed.root().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidInteger { field } if field == "n"));
}

#[test]
fn element_inside_primitive_field_is_unexpected() {
    let mut b = SchemaBuilder::new();
    let root = b.add_record(RecordDef::new("R").prim("v", Prim::Bytes));
    let schema = b.build(root).unwrap();
    let mut parsed = SchemaParser::from_slice(&schema, b"<r><v><x/></v></r>");
    let err = parsed.root().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnexpectedElement { name } if name == "x"));
}

#[test]
fn lazy_record_rejects_non_primitive_companions() {
    let mut b = SchemaBuilder::new();
    let item = b.add_record(RecordDef::new("Item").prim("v", Prim::Bytes));
    let meta = b.add_record(RecordDef::new("Meta").prim("v", Prim::Bytes));
    let root = b.add_record(
        RecordDef::new("R")
            .record("meta", meta)
            .iterator("items", "item", item),
    );
    let schema = b.build(root).unwrap();
    let mut parsed = SchemaParser::from_slice(&schema, b"<r><item v=\"1\"/></r>");
    let err = parsed.root().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NonPrimitiveLazyField { field } if field == "meta"));
}

#[test]
fn empty_document_has_no_root() {
    let mut b = SchemaBuilder::new();
    let root = b.add_record(RecordDef::new("R").opt("v", Prim::Bytes));
    let schema = b.build(root).unwrap();
    let mut parsed = SchemaParser::from_slice(&schema, b"  <!-- nothing here -->  ");
    let err = parsed.root().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NoRootElement));
}

#[test]
fn truncated_document_fails_inside_a_record() {
    let schema = {
        let mut b = SchemaBuilder::new();
        let path = b.add_record(RecordDef::new("Path").prim("d", Prim::Bytes));
        let root = b.add_record(RecordDef::new("Root").iterator("paths", "path", path));
        b.build(root).unwrap()
    };
    let mut parsed = SchemaParser::from_slice(&schema, b"<root><path d=\"M0 0\"/>");
    let mut root = parsed.root().unwrap();
    let lazy = root.as_lazy().unwrap();
    let first = lazy.children().next().unwrap();
    assert!(first.is_some());
    drop(first);
    let err = lazy.children().next().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnexpectedEndOfInput));
}

#[test]
fn stream_and_slice_agree_on_a_larger_document() {
    let mut doc = String::from("<?xml version=\"1.0\"?><catalog count=\"40\">");
    for i in 0..40 {
        doc.push_str(&format!(
            "<entry id=\"{i}\" label=\"item &amp; {i}\"><note>n{i}</note></entry>"
        ));
    }
    doc.push_str("</catalog>");

    use veloxml::EventRead;

    let slice_events = veloxml::parse_events(doc.as_bytes()).unwrap();

    let mut stream = EventParser::from_reader(Cursor::new(doc.clone().into_bytes()));
    let mut stream_events = Vec::new();
    while let Some(ev) = stream.next_durable().unwrap() {
        stream_events.push(ev);
    }
    assert_eq!(slice_events, stream_events);
}
