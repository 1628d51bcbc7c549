//! Randomized invariants: balanced structure, backend agreement,
//! entity idempotence, and slice-borrow identity.

use proptest::prelude::*;

use std::io::Cursor;

use veloxml::{parse_events, Event, EventParser, EventRead};

/// A well-formed document: one root element with nested children,
/// attributes, and text runs.
fn arb_document() -> impl Strategy<Value = String> {
    let leaf = ("[a-z]{1,6}", "[a-z0-9]{0,8}").prop_map(|(tag, attr)| {
        if attr.is_empty() {
            format!("<{tag}/>")
        } else {
            format!("<{tag} v=\"{attr}\"/>")
        }
    });
    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            "[a-z]{1,6}",
            prop::collection::vec(inner, 0..4),
            "[a-z0-9 .,]{0,12}",
        )
            .prop_map(|(tag, children, text)| {
                let mut doc = format!("<{tag}>{text}");
                for child in &children {
                    doc.push_str(child);
                }
                doc.push_str(&format!("</{tag}>"));
                doc
            })
    })
}

proptest! {
    /// Start/end events form a balanced, matching structure.
    #[test]
    fn start_end_events_balance(doc in arb_document()) {
        let events = parse_events(doc.as_bytes()).unwrap();
        prop_assert!(matches!(events.first(), Some(Event::DocumentStart)));
        prop_assert!(matches!(events.last(), Some(Event::DocumentEnd)));

        let mut stack: Vec<&[u8]> = Vec::new();
        for event in &events {
            match event {
                Event::StartElement(e) => stack.push(e.name.as_ref()),
                Event::EndElement(e) => {
                    let open = stack.pop();
                    prop_assert_eq!(open, Some(e.name.as_ref()));
                }
                _ => {}
            }
        }
        prop_assert!(stack.is_empty());
    }

    /// Slice-backed and stream-backed parsing produce identical events.
    #[test]
    fn backends_agree(doc in arb_document()) {
        let slice_events = parse_events(doc.as_bytes()).unwrap();
        let mut stream = EventParser::from_reader(Cursor::new(doc.clone().into_bytes()));
        let mut stream_events = Vec::new();
        while let Some(ev) = stream.next_durable().unwrap() {
            stream_events.push(ev);
        }
        prop_assert_eq!(slice_events, stream_events);
    }

    /// Entity resolution is the identity on text containing no '&'.
    #[test]
    fn entity_resolution_idempotent_without_ampersand(text in "x[a-zA-Z0-9 .,;:!?-]{0,40}") {
        let doc = format!("<r>{text}</r>");
        let events = parse_events(doc.as_bytes()).unwrap();
        let found = events.iter().find_map(|e| match e {
            Event::Text(t) => Some(t.as_ref().to_vec()),
            _ => None,
        });
        prop_assert_eq!(found, Some(text.into_bytes()));
    }

    /// On slice-backed sources, entity-free strings are subslices of
    /// the input (pointer-and-length identity, not just equality).
    #[test]
    fn slice_strings_are_input_subslices(doc in arb_document()) {
        let bytes = doc.as_bytes();
        let base = bytes.as_ptr() as usize;
        for event in parse_events(bytes).unwrap() {
            let strings: Vec<&[u8]> = match &event {
                Event::StartElement(e) => {
                    let mut all = vec![e.name.as_ref()];
                    all.extend(e.attributes.iter().map(|a| a.value.as_ref()));
                    all
                }
                Event::Text(t) => vec![t.as_ref()],
                _ => continue,
            };
            for s in strings {
                let p = s.as_ptr() as usize;
                prop_assert!(p >= base && p + s.len() <= base + bytes.len());
            }
        }
    }
}
