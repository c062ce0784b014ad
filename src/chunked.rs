//! Accounting for a partially loaded document.

use crate::{Error, Result};

/// The byte store of a document that arrives in chunks.
///
/// The full document length is known up front; the buffer is allocated once
/// and filled in as ranges arrive from the byte-range source. A chunk only
/// counts as resident when every byte of it has been written, so reads
/// through a hole can name the exact chunk-aligned span that is still
/// missing.
pub struct ChunkedData {
    buf: Box<[u8]>,
    chunk_size: usize,
    loaded: Vec<bool>,
    loaded_chunks: usize,
}

impl ChunkedData {
    /// Create an empty store for a document of `total_len` bytes, tracked at
    /// `chunk_size` granularity.
    pub fn new(total_len: usize, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");

        let num_chunks = total_len.div_ceil(chunk_size);

        Self {
            buf: vec![0; total_len].into_boxed_slice(),
            chunk_size,
            loaded: vec![false; num_chunks],
            loaded_chunks: 0,
        }
    }

    /// The total length of the document.
    pub fn total_len(&self) -> usize {
        self.buf.len()
    }

    /// The chunk granularity.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The number of chunks currently resident.
    pub fn loaded_chunks(&self) -> usize {
        self.loaded_chunks
    }

    /// Whether every chunk is resident.
    pub fn is_fully_loaded(&self) -> bool {
        self.loaded_chunks == self.loaded.len()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Merge a fetched range into the store.
    ///
    /// Bytes are copied at `begin`; every chunk that is completely covered
    /// by the write (or that ends at the end of the document) becomes
    /// resident. The range is clamped to the document length.
    pub fn write_range(&mut self, begin: u64, bytes: &[u8]) {
        let begin = (begin as usize).min(self.buf.len());
        let end = (begin + bytes.len()).min(self.buf.len());

        if begin == end {
            return;
        }

        self.buf[begin..end].copy_from_slice(&bytes[..end - begin]);

        let first = begin.div_ceil(self.chunk_size);
        // A trailing partial chunk still becomes resident when the write
        // reaches the end of the document.
        let last = if end == self.buf.len() {
            self.loaded.len()
        } else {
            end / self.chunk_size
        };

        for chunk in first..last {
            if !self.loaded[chunk] {
                self.loaded[chunk] = true;
                self.loaded_chunks += 1;
            }
        }
    }

    /// Whether every byte of `[begin, end)` is resident.
    pub(crate) fn is_resident(&self, begin: usize, end: usize) -> bool {
        if begin >= end {
            return true;
        }

        let first = begin / self.chunk_size;
        let last = (end - 1) / self.chunk_size;

        (first..=last).all(|c| self.loaded.get(c).copied().unwrap_or(false))
    }

    /// The chunk-aligned span of missing bytes that covers `[begin, end)`,
    /// or `None` when the range is fully resident.
    pub(crate) fn missing_span(&self, begin: usize, end: usize) -> Option<(u64, u64)> {
        if begin >= end {
            return None;
        }

        let first = begin / self.chunk_size;
        let last = (end - 1) / self.chunk_size;

        let lo = (first..=last).find(|&c| !self.loaded.get(c).copied().unwrap_or(false))?;
        let hi = (first..=last)
            .rev()
            .find(|&c| !self.loaded.get(c).copied().unwrap_or(false))?;

        let span_begin = (lo * self.chunk_size) as u64;
        let span_end = (((hi + 1) * self.chunk_size).min(self.buf.len())) as u64;

        Some((span_begin, span_end))
    }

    pub(crate) fn needs(&self, begin: usize, end: usize) -> Result<()> {
        match self.missing_span(begin, end) {
            Some((begin, end)) => Err(Error::NeedsData { begin, end }),
            None => Ok(()),
        }
    }
}
