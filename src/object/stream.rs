//! Streams.

use crate::Result;
use crate::filter::decode_chain;
use crate::object::Dict;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock};

/// A stream: a dictionary paired with a byte payload.
///
/// The payload held here is the raw (still filter-encoded, already
/// decrypted) data; the decode chain declared by the dictionary runs on the
/// first call to [`Stream::decoded`] and its result is cached.
#[derive(Clone)]
pub struct Stream(Arc<Repr>);

struct Repr {
    dict: Dict,
    raw: Box<[u8]>,
    decoded: OnceLock<Vec<u8>>,
}

impl Stream {
    /// Create a stream from its dictionary and raw payload.
    pub fn new(dict: Dict, raw: Vec<u8>) -> Self {
        Self(Arc::new(Repr {
            dict,
            raw: raw.into_boxed_slice(),
            decoded: OnceLock::new(),
        }))
    }

    /// The stream dictionary.
    pub fn dict(&self) -> &Dict {
        &self.0.dict
    }

    /// Whether two handles share the same underlying stream.
    #[cfg(test)]
    pub(crate) fn shares_repr(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The raw (potentially filter-encoded) payload.
    pub fn raw_data(&self) -> &[u8] {
        &self.0.raw
    }

    /// The decoded payload.
    ///
    /// Decoding runs once and is cached; a failed decode is not cached, so
    /// an access that was interrupted by missing data succeeds when retried.
    pub fn decoded(&self) -> Result<&[u8]> {
        if let Some(decoded) = self.0.decoded.get() {
            return Ok(decoded);
        }

        let decoded = decode_chain(&self.0.dict, &self.0.raw)?;

        Ok(self.0.decoded.get_or_init(|| decoded))
    }
}

// Structural equality, like dictionaries: same entries, same raw bytes.
impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.0.dict == other.0.dict && self.0.raw == other.0.raw
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream (len: {})", self.0.raw.len())
    }
}
