//! Input sources.
//!
//! One lookahead/consume contract over two backings:
//! - [`SliceSource`]: the whole document is a contiguous byte range
//!   (in-memory buffers and memory-mapped files). Lookahead returns
//!   subslices of the input; nothing is ever copied.
//! - [`StreamSource`]: a pull reader with an internal compacting
//!   buffer. Returned bytes are valid only until the next call, so
//!   durable strings must be copied into the arena.

pub mod slice;
pub mod stream;

pub use slice::{MappedFile, SliceSource};
pub use stream::StreamSource;

use crate::error::Error;

/// Lookahead/consume surface shared by both backings.
///
/// A `take` must never extend past the window returned by the last
/// `peek`; the parser always peeks before consuming.
pub trait Source {
    /// Whether `peek`/`take` return stable subslices of a single input
    /// range. Slice-backed parsers borrow the document directly;
    /// stream-backed parsers copy durable bytes into the arena.
    const SLICE_BACKED: bool;

    /// Look at the next `n` bytes without consuming. The returned
    /// window may be shorter at end of input.
    fn peek(&mut self, n: usize) -> Result<&[u8], Error>;

    /// Look at the next byte, or `None` at end of input.
    fn peek_byte(&mut self) -> Result<Option<u8>, Error>;

    /// Consume and return the next `n` bytes. The slice is valid only
    /// until the next `peek`/`take`/`toss`.
    fn take(&mut self, n: usize) -> Result<&[u8], Error>;

    /// Discard `n` bytes.
    fn toss(&mut self, n: usize) -> Result<(), Error>;

    /// Absolute byte offset consumed so far.
    fn pos(&self) -> usize;

    /// The complete input for slice-backed sources, empty otherwise.
    /// Used to resolve input-relative spans.
    fn slice_all(&self) -> &[u8] {
        &[]
    }
}
