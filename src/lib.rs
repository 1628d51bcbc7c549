//! veloxml — streaming XML parsing in two layers.
//!
//! The low-level layer is a pull parser producing a lazy sequence of
//! typed events with bounded-memory string storage: a stack-scoped
//! arena holds element-scoped strings and is reset as elements close,
//! so peak memory tracks nesting depth rather than document size.
//!
//! The high-level layer maps a declarative schema — records with typed
//! fields, tagged variants, and lazy iterator fields — onto the event
//! stream, converting primitives and borrowing character data straight
//! from the document wherever the input is a contiguous slice.
//!
//! # Pull parsing
//!
//! ```
//! use veloxml::{Event, EventParser};
//!
//! let mut parser = EventParser::from_slice(b"<greeting lang=\"en\">hi</greeting>");
//! while let Some(event) = parser.next_event()? {
//!     if let Event::Text(text) = &event {
//!         assert_eq!(text.as_ref(), b"hi");
//!     }
//! }
//! # Ok::<(), veloxml::Error>(())
//! ```
//!
//! # Schema-driven parsing
//!
//! ```
//! use veloxml::schema::{Prim, RecordDef, SchemaBuilder, SchemaParser};
//!
//! let mut b = SchemaBuilder::new();
//! let path = b.add_record(RecordDef::new("Path").prim("d", Prim::Bytes));
//! let root = b.add_record(
//!     RecordDef::new("Root")
//!         .prim("name", Prim::Bytes)
//!         .iterator("paths", "path", path),
//! );
//! let schema = b.build(root).unwrap();
//!
//! let doc = br#"<root name="r"><path d="M0 0"/><path d="L1 1"/></root>"#;
//! let mut parsed = SchemaParser::from_slice(&schema, doc);
//! let mut root = parsed.root()?;
//! let lazy = root.as_lazy().expect("root schema declares an iterator");
//! assert_eq!(lazy.str_field("name"), Some("r"));
//!
//! let mut ds = Vec::new();
//! while let Some(child) = lazy.children().next()? {
//!     let record = child.node.into_eager().expect("Path is eager");
//!     ds.push(record.str_field("d").unwrap().to_string());
//! }
//! assert_eq!(ds, ["M0 0", "L1 1"]);
//! # Ok::<(), veloxml::Error>(())
//! ```
//!
//! # Inputs
//!
//! Three input shapes feed either layer: in-memory slices, memory-
//! mapped files ([`MappedFile`]), and arbitrary [`std::io::Read`]
//! streams. Slice-backed parsing is zero-copy; stream-backed parsing
//! copies element-scoped strings into the arena.

pub mod core;
pub mod error;
pub mod parser;
pub mod reader;
pub mod schema;

pub use error::{Error, ErrorKind, SchemaError};
pub use parser::{parse_events, Event, EventParser, EventRead, ParserConfig};
pub use reader::{MappedFile, SliceSource, Source, StreamSource};
pub use schema::{Prim, RecordDef, Schema, SchemaBuilder, SchemaParser, Value, VariantDef};
