//! Slice-backed source.
//!
//! The entire document is one contiguous byte range, so lookahead and
//! consumption are pointer arithmetic and every returned window is a
//! subslice of the input.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use super::Source;
use crate::error::Error;

/// Zero-copy source over a byte slice.
#[derive(Debug)]
pub struct SliceSource<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        SliceSource { input, pos: 0 }
    }

    /// The complete input at the document lifetime.
    #[inline]
    pub fn as_slice(&self) -> &'a [u8] {
        self.input
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }
}

impl<'a> Source for SliceSource<'a> {
    const SLICE_BACKED: bool = true;

    #[inline]
    fn peek(&mut self, n: usize) -> Result<&[u8], Error> {
        let end = (self.pos + n).min(self.input.len());
        Ok(&self.input[self.pos..end])
    }

    #[inline]
    fn peek_byte(&mut self) -> Result<Option<u8>, Error> {
        Ok(self.input.get(self.pos).copied())
    }

    #[inline]
    fn take(&mut self, n: usize) -> Result<&[u8], Error> {
        debug_assert!(n <= self.remaining());
        let start = self.pos;
        let end = (start + n).min(self.input.len());
        self.pos = end;
        Ok(&self.input[start..end])
    }

    #[inline]
    fn toss(&mut self, n: usize) -> Result<(), Error> {
        debug_assert!(n <= self.remaining());
        self.pos = (self.pos + n).min(self.input.len());
        Ok(())
    }

    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    fn slice_all(&self) -> &[u8] {
        self.input
    }
}

/// A memory-mapped file usable as a slice-backed source.
///
/// The mapping is released when the value is dropped.
#[derive(Debug)]
pub struct MappedFile {
    map: Mmap,
}

impl MappedFile {
    /// Map the file at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is private and read-only; mutating the
        // underlying file while mapped is outside the supported
        // contract, as with any mapped input.
        let map = unsafe { Mmap::map(&file)? };
        Ok(MappedFile { map })
    }

    /// The mapped bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    /// A source reading from the mapping.
    pub fn source(&self) -> SliceSource<'_> {
        SliceSource::new(&self.map)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_is_short_at_eof() {
        let mut s = SliceSource::new(b"abc");
        assert_eq!(s.peek(10).unwrap(), b"abc");
        assert_eq!(s.pos(), 0);
    }

    #[test]
    fn test_take_advances() {
        let mut s = SliceSource::new(b"abcdef");
        assert_eq!(s.take(3).unwrap(), b"abc");
        assert_eq!(s.pos(), 3);
        assert_eq!(s.peek_byte().unwrap(), Some(b'd'));
        s.toss(3).unwrap();
        assert_eq!(s.peek_byte().unwrap(), None);
    }

    #[test]
    fn test_windows_are_input_subslices() {
        let input = b"<root/>".to_vec();
        let mut s = SliceSource::new(&input);
        let w = s.peek(4).unwrap();
        assert_eq!(w.as_ptr(), input.as_ptr());
    }

    #[test]
    fn test_mapped_file_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("veloxml_mapped_file_test.xml");
        std::fs::write(&path, b"<doc>mapped</doc>").unwrap();
        let mapped = MappedFile::open(&path).unwrap();
        assert_eq!(mapped.as_bytes(), b"<doc>mapped</doc>");
        let mut src = mapped.source();
        assert_eq!(src.take(5).unwrap(), b"<doc>");
        drop(mapped);
        std::fs::remove_file(&path).ok();
    }
}
