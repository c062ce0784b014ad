//! The decode-stream pipeline.

mod ascii_85;
mod ascii_hex;
mod ccitt;
mod dct;
mod jpx;
mod lzw_flate;
mod run_length;

use crate::object::dict::keys::*;
use crate::object::{Atom, Dict, Object};
use crate::{Error, Result};
use log::warn;
use smallvec::SmallVec;

/// A recognized stream filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    AsciiHexDecode,
    Ascii85Decode,
    LzwDecode,
    FlateDecode,
    RunLengthDecode,
    CcittFaxDecode,
    DctDecode,
    JpxDecode,
}

impl Filter {
    fn debug_name(&self) -> &'static str {
        match self {
            Self::AsciiHexDecode => "ascii_hex",
            Self::Ascii85Decode => "ascii_85",
            Self::LzwDecode => "lzw",
            Self::FlateDecode => "flate",
            Self::RunLengthDecode => "run-length",
            Self::CcittFaxDecode => "ccitt_fax",
            Self::DctDecode => "dct",
            Self::JpxDecode => "jpx",
        }
    }

    /// Identify a filter by its name, accepting the abbreviated aliases used
    /// by inline images.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            ASCII_HEX_DECODE | ASCII_HEX_DECODE_ABBREVIATION => Some(Self::AsciiHexDecode),
            ASCII85_DECODE | ASCII85_DECODE_ABBREVIATION => Some(Self::Ascii85Decode),
            LZW_DECODE | LZW_DECODE_ABBREVIATION => Some(Self::LzwDecode),
            FLATE_DECODE | FLATE_DECODE_ABBREVIATION => Some(Self::FlateDecode),
            RUN_LENGTH_DECODE | RUN_LENGTH_DECODE_ABBREVIATION => Some(Self::RunLengthDecode),
            CCITTFAX_DECODE | CCITTFAX_DECODE_ABBREVIATION => Some(Self::CcittFaxDecode),
            DCT_DECODE | DCT_DECODE_ABBREVIATION => Some(Self::DctDecode),
            JPX_DECODE => Some(Self::JpxDecode),
            _ => None,
        }
    }

    /// Apply the filter to the given bytes.
    pub fn apply(&self, data: &[u8], params: Option<&Dict>) -> Result<Vec<u8>> {
        let res = match self {
            Self::AsciiHexDecode => ascii_hex::decode(data),
            Self::Ascii85Decode => ascii_85::decode(data),
            Self::RunLengthDecode => run_length::decode(data),
            Self::LzwDecode => lzw_flate::lzw::decode(data, params)?,
            Self::FlateDecode => lzw_flate::flate::decode(data, params)?,
            Self::CcittFaxDecode => ccitt::decode(data, params)?,
            Self::DctDecode => dct::decode(data, params)?,
            Self::JpxDecode => jpx::decode(data),
        };

        res.ok_or_else(|| {
            warn!("failed to apply filter {}", self.debug_name());

            Error::format(format!("invalid {} data", self.debug_name()))
        })
    }
}

/// Decode stream bytes through the filter chain declared by a stream
/// dictionary.
///
/// The filter entry may be a single name or an array of names with a
/// parallel (optional) parameter entry; stages are folded left to right, so
/// only the first stage sees the stream's authoritative raw length. An
/// unrecognized filter name passes the bytes through unchanged with a
/// diagnostic. A zero-length payload short-circuits without invoking any
/// codec.
pub fn decode_chain(dict: &Dict, raw: &[u8]) -> Result<Vec<u8>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let filters = filter_names(dict)?;

    if filters.is_empty() {
        return Ok(raw.to_vec());
    }

    let params = decode_params(dict, filters.len())?;

    let mut current = raw.to_vec();

    for (i, name) in filters.iter().enumerate() {
        let Some(filter) = Filter::from_name(name) else {
            warn!("unknown filter {}, passing data through", name.as_str());
            continue;
        };

        current = filter.apply(&current, params.get(i).and_then(Option::as_ref))?;
    }

    Ok(current)
}

/// The declared filter names, in application order.
///
/// Inline image dictionaries abbreviate the `Filter` key as `F`; for
/// ordinary streams an `F` entry is a file specification, which a name or
/// array value cannot be, so looking at both keys is unambiguous.
fn filter_names(dict: &Dict) -> Result<SmallVec<[Atom; 2]>> {
    let entry = match dict.get(FILTER)? {
        Some(f) => Some(f),
        None => dict.get(F)?,
    };

    let mut names = SmallVec::new();

    match entry {
        None => {}
        Some(Object::Name(name)) => names.push(name),
        Some(Object::Array(entries)) => {
            for entry in &entries {
                match dict.resolve_obj(entry)? {
                    Object::Name(name) => names.push(name),
                    other => {
                        warn!("ignoring non-name filter entry: {other:?}");
                    }
                }
            }
        }
        Some(other) => {
            warn!("ignoring malformed filter entry: {other:?}");
        }
    }

    Ok(names)
}

/// The per-stage parameter dictionaries, padded to `len` entries.
fn decode_params(dict: &Dict, len: usize) -> Result<Vec<Option<Dict>>> {
    let entry = match dict.get(DECODE_PARMS)? {
        Some(p) => Some(p),
        None => dict.get(DP)?,
    };

    let mut params = vec![None; len];

    match entry {
        None => {}
        Some(Object::Dict(d)) => {
            if let Some(slot) = params.first_mut() {
                *slot = Some(d);
            }
        }
        Some(Object::Array(entries)) => {
            for (i, entry) in entries.iter().take(len).enumerate() {
                if let Object::Dict(d) = dict.resolve_obj(entry)? {
                    params[i] = Some(d);
                }
            }
        }
        Some(Object::Null) => {}
        Some(other) => {
            warn!("ignoring malformed decode parameters: {other:?}");
        }
    }

    Ok(params)
}
