/*!
A low-level crate for incrementally reading PDF files.

The crate turns an arbitrary, possibly incomplete and possibly malformed,
byte stream into a graph of typed objects and decodes the binary
sub-encodings embedded in that stream. It is built around three ideas:

- An interned, cycle-aware object model ([`object::Object`]) whose
  dictionaries lazily dereference indirect references through a resolver.
- A tokenizer and parser with recovery heuristics for broken input: wrong
  stream lengths, inline raster data, non-standard whitespace.
- A chunked-fetch protocol: any object access can fail with
  [`Error::NeedsData`], naming the byte range that has to be loaded before
  the same access can be retried. [`manager::ChunkedManager`] drives the
  fetch-and-retry loop, so a document can be read while only a few kilobytes
  of it are resident.

Higher-level document semantics (pages, content streams, fonts, rendering)
are out of scope; the crate ends at the object graph and the decoded stream
bytes.
*/

use log::warn;

pub mod chunked;
pub mod crypt;
pub mod filter;
pub mod lexer;
pub mod manager;
pub mod object;
pub mod parser;
pub mod reader;
pub(crate) mod trivia;

/// The error type used throughout the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bytes in the half-open range `[begin, end)` are required but not
    /// resident yet.
    ///
    /// This is a control signal, not a failure: it is consumed by the
    /// resolution manager, which fetches the range and retries the access
    /// that raised it. It must never surface to an end user.
    #[error("bytes {begin}..{end} are required but not loaded")]
    NeedsData {
        /// First missing byte offset.
        begin: u64,
        /// One past the last missing byte offset.
        end: u64,
    },
    /// The document is malformed in a way no recovery heuristic could
    /// compensate for.
    #[error("malformed document: {0}")]
    Format(String),
    /// An I/O failure reported by the byte-range source. Propagated
    /// verbatim, never retried.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) trait OptionLog {
    fn warn_none(self, f: &str) -> Self;
}

impl<T> OptionLog for Option<T> {
    #[inline]
    fn warn_none(self, f: &str) -> Self {
        self.or_else(|| {
            warn!("{f}");

            None
        })
    }
}
