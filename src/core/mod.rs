//! Parser-internal storage: the string arena, entity decoding, and the
//! entity table built from the internal DTD subset.

pub mod arena;
pub mod dtd;
pub mod entities;

pub use arena::{Mark, Span, StringArena};
pub use dtd::EntityTable;
