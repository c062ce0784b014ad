//! Reading bytes from a (possibly partially loaded) data window.

use crate::chunked::ChunkedData;
use crate::trivia::{is_eol_character, is_white_space_character};
use crate::{Error, Result};
use std::ops::Range;

/// A borrowed view of the document bytes.
///
/// A full window is backed by completely resident data and every read
/// succeeds; a chunked window reports reads through not-yet-loaded chunks as
/// [`Error::NeedsData`].
#[derive(Clone, Copy)]
pub struct Window<'a> {
    data: &'a [u8],
    chunks: Option<&'a ChunkedData>,
}

impl<'a> Window<'a> {
    /// Create a window over fully resident data.
    pub fn full(data: &'a [u8]) -> Self {
        Self { data, chunks: None }
    }

    /// Create a window over a chunked store.
    pub fn chunked(chunks: &'a ChunkedData) -> Self {
        Self {
            data: chunks.bytes(),
            chunks: Some(chunks),
        }
    }

    /// The total length of the document.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn require(&self, begin: usize, end: usize) -> Result<()> {
        match self.chunks {
            Some(chunks) => chunks.needs(begin, end.min(self.data.len())),
            None => Ok(()),
        }
    }

    /// Returns the bytes of an absolute range, clamped to the document
    /// length.
    pub fn slice(&self, range: Range<usize>) -> Result<&'a [u8]> {
        let begin = range.start.min(self.data.len());
        let end = range.end.min(self.data.len());
        self.require(begin, end)?;

        Ok(&self.data[begin..end])
    }
}

/// A cursor for reading bytes from a [`Window`].
#[derive(Clone)]
pub struct Cursor<'a> {
    window: Window<'a>,
    offset: usize,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the start of the window.
    pub fn new(window: Window<'a>) -> Self {
        Self { window, offset: 0 }
    }

    /// Create a new cursor at the given offset.
    pub fn new_at(window: Window<'a>, offset: usize) -> Self {
        Self { window, offset }
    }

    /// The underlying window.
    pub fn window(&self) -> Window<'a> {
        self.window
    }

    /// The current byte offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The total length of the underlying data.
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the underlying data is empty.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Whether the cursor has reached the end of the data.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.offset >= self.window.len()
    }

    /// Moves the cursor to the specified offset.
    #[inline]
    pub fn jump(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Advances the cursor by one byte.
    #[inline]
    pub fn forward(&mut self) {
        self.offset += 1;
    }

    /// Peeks a single byte. `None` means the true end of the document.
    #[inline]
    pub fn peek_byte(&self) -> Result<Option<u8>> {
        if self.at_end() {
            return Ok(None);
        }

        self.window.require(self.offset, self.offset + 1)?;

        Ok(self.window.data.get(self.offset).copied())
    }

    /// Reads a single byte and advances the cursor.
    #[inline]
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let b = self.peek_byte()?;

        if b.is_some() {
            self.forward();
        }

        Ok(b)
    }

    /// Peeks the specified number of bytes, or `None` if fewer remain.
    #[inline]
    pub fn peek_bytes(&self, len: usize) -> Result<Option<&'a [u8]>> {
        let end = self.offset + len;

        if end > self.window.len() {
            return Ok(None);
        }

        self.window.require(self.offset, end)?;

        Ok(self.window.data.get(self.offset..end))
    }

    /// Reads the specified number of bytes and advances the cursor.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        match self.peek_bytes(len)? {
            Some(bytes) => {
                self.offset += len;

                Ok(bytes)
            }
            None => Err(Error::format("unexpected end of data")),
        }
    }

    /// Returns the bytes of an absolute range.
    pub fn slice(&self, range: Range<usize>) -> Result<&'a [u8]> {
        self.window.slice(range)
    }

    /// Eat the next byte if it satisfies the condition.
    #[inline]
    pub fn eat(&mut self, f: impl Fn(u8) -> bool) -> Result<Option<u8>> {
        match self.peek_byte()? {
            Some(b) if f(b) => {
                self.forward();

                Ok(Some(b))
            }
            _ => Ok(None),
        }
    }

    /// Advances the cursor by one byte if the current byte satisfies the
    /// predicate.
    #[inline]
    pub fn forward_if(&mut self, f: impl Fn(u8) -> bool) -> Result<bool> {
        Ok(self.eat(f)?.is_some())
    }

    /// Advances the cursor while bytes satisfy the predicate.
    #[inline]
    pub fn forward_while(&mut self, f: impl Fn(u8) -> bool) -> Result<()> {
        while let Some(b) = self.peek_byte()? {
            if f(b) {
                self.forward();
            } else {
                break;
            }
        }

        Ok(())
    }

    /// Advances the cursor while bytes satisfy the predicate, at least once.
    #[inline]
    pub fn forward_while_1(&mut self, f: impl Fn(u8) -> bool) -> Result<bool> {
        if self.eat(&f)?.is_none() {
            return Ok(false);
        }

        self.forward_while(f)?;

        Ok(true)
    }

    /// Checks whether the next bytes match the specified tag.
    #[inline]
    pub fn peek_tag(&self, tag: &[u8]) -> Result<bool> {
        Ok(self.peek_bytes(tag.len())? == Some(tag))
    }

    /// Advances the cursor if the next bytes match the specified tag.
    #[inline]
    pub fn forward_tag(&mut self, tag: &[u8]) -> Result<bool> {
        if self.peek_tag(tag)? {
            self.offset += tag.len();

            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Skips white space characters.
    #[inline]
    pub fn skip_white_spaces(&mut self) -> Result<()> {
        self.forward_while(is_white_space_character)
    }

    /// Skips end-of-line characters.
    #[inline]
    pub fn skip_eol_characters(&mut self) -> Result<()> {
        self.forward_while(is_eol_character)
    }

    /// Skips a single end-of-line marker (CR, LF or CRLF).
    pub fn skip_single_eol(&mut self) -> Result<()> {
        if self.eat(|b| b == b'\r')?.is_some() {
            self.eat(|b| b == b'\n')?;
        } else {
            self.eat(|b| b == b'\n')?;
        }

        Ok(())
    }

    /// Skips white spaces and `%` comments (terminated by CR or LF).
    pub fn skip_white_spaces_and_comments(&mut self) -> Result<()> {
        while let Some(b) = self.peek_byte()? {
            if is_white_space_character(b) {
                self.forward();
            } else if b == b'%' {
                self.forward_while(|b| !is_eol_character(b))?;
            } else {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;
    use crate::chunked::ChunkedData;
    use crate::reader::{Cursor, Window};

    #[test]
    fn full_window_reads() {
        let mut c = Cursor::new(Window::full(b"abc"));

        assert_eq!(c.read_byte().unwrap(), Some(b'a'));
        assert!(c.forward_tag(b"bc").unwrap());
        assert_eq!(c.read_byte().unwrap(), None);
        assert!(c.at_end());
    }

    #[test]
    fn comments_and_white_space() {
        let mut c = Cursor::new(Window::full(b"  % a comment\n  /Name"));
        c.skip_white_spaces_and_comments().unwrap();

        assert_eq!(c.peek_byte().unwrap(), Some(b'/'));
    }

    #[test]
    fn chunked_window_reports_missing_span() {
        let mut data = ChunkedData::new(300, 100);
        data.write_range(0, &[b'x'; 100]);

        let mut c = Cursor::new_at(Window::chunked(&data), 99);
        assert_eq!(c.read_byte().unwrap(), Some(b'x'));

        match c.read_byte() {
            Err(Error::NeedsData { begin, end }) => {
                assert_eq!((begin, end), (100, 200));
            }
            other => panic!("expected NeedsData, got {other:?}"),
        }
    }

    #[test]
    fn eof_is_not_missing_data() {
        let data = ChunkedData::new(0, 100);
        let mut c = Cursor::new(Window::chunked(&data));

        assert_eq!(c.read_byte().unwrap(), None);
    }
}
