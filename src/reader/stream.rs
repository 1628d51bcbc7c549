//! Stream-backed source.
//!
//! Wraps any [`io::Read`] behind the lookahead/consume contract. Bytes
//! are staged in a growable buffer; consumed space is reclaimed by
//! compaction before each refill, so steady-state memory tracks the
//! largest peeked window rather than the document.

use std::io::Read;

use super::Source;
use crate::error::{Error, ErrorKind};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Buffered pull reader over an [`io::Read`].
pub struct StreamSource<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    /// Start of unconsumed data in `buffer`.
    start: usize,
    /// End of valid data in `buffer`.
    end: usize,
    eof: bool,
    /// Absolute offset of `start` in the overall input.
    consumed: usize,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        StreamSource {
            reader,
            buffer: vec![0u8; capacity.max(64)],
            start: 0,
            end: 0,
            eof: false,
            consumed: 0,
        }
    }

    #[inline]
    fn available(&self) -> usize {
        self.end - self.start
    }

    /// Ensure at least `n` unconsumed bytes are buffered, or all that
    /// remain before end of input.
    fn fill_to(&mut self, n: usize) -> Result<(), Error> {
        while self.available() < n && !self.eof {
            // Compact: move unconsumed data to the front.
            if self.start > 0 {
                let len = self.available();
                self.buffer.copy_within(self.start..self.end, 0);
                self.start = 0;
                self.end = len;
            }
            // Grow until the window fits and there is room to read into.
            if self.buffer.len() < n {
                self.buffer.resize(n.next_power_of_two(), 0);
            } else if self.end == self.buffer.len() {
                self.buffer.resize(self.buffer.len() * 2, 0);
            }
            let read = self
                .reader
                .read(&mut self.buffer[self.end..])
                .map_err(|e| ErrorKind::Io(e).at(self.consumed))?;
            if read == 0 {
                self.eof = true;
            } else {
                self.end += read;
            }
        }
        Ok(())
    }
}

impl<R: Read> Source for StreamSource<R> {
    const SLICE_BACKED: bool = false;

    fn peek(&mut self, n: usize) -> Result<&[u8], Error> {
        self.fill_to(n)?;
        let end = (self.start + n).min(self.end);
        Ok(&self.buffer[self.start..end])
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, Error> {
        self.fill_to(1)?;
        if self.available() == 0 {
            Ok(None)
        } else {
            Ok(Some(self.buffer[self.start]))
        }
    }

    fn take(&mut self, n: usize) -> Result<&[u8], Error> {
        self.fill_to(n)?;
        let len = n.min(self.available());
        let start = self.start;
        self.start += len;
        self.consumed += len;
        Ok(&self.buffer[start..start + len])
    }

    fn toss(&mut self, n: usize) -> Result<(), Error> {
        self.fill_to(n)?;
        let len = n.min(self.available());
        self.start += len;
        self.consumed += len;
        Ok(())
    }

    #[inline]
    fn pos(&self) -> usize {
        self.consumed
    }
}

impl<R: Read> std::fmt::Debug for StreamSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("buffered", &self.available())
            .field("consumed", &self.consumed)
            .field("eof", &self.eof)
            .finish()
    }
}

/// Adapter so small chunk sizes can be simulated in tests.
#[cfg(test)]
pub(crate) struct TrickleReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: usize,
}

#[cfg(test)]
impl<'a> TrickleReader<'a> {
    pub fn new(data: &'a [u8], chunk: usize) -> Self {
        TrickleReader {
            data,
            pos: 0,
            chunk,
        }
    }
}

#[cfg(test)]
impl<'a> Read for TrickleReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self
            .chunk
            .min(buf.len())
            .min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
