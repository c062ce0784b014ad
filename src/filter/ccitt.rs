//! A decoder for CCITT-fax-encoded streams, delegating to `hayro-ccitt`.

use crate::Result;
use crate::object::Dict;
use crate::object::dict::keys::{
    BLACK_IS_1, COLUMNS, ENCODED_BYTE_ALIGN, END_OF_BLOCK, END_OF_LINE, K, ROWS,
};
use hayro_ccitt::{DecodeSettings, Decoder, EncodingMode};

/// Collects the decoded scanlines as packed bytes.
#[derive(Default)]
struct PackedSink {
    out: Vec<u8>,
}

impl Decoder for PackedSink {
    fn push_byte(&mut self, byte: u8) {
        self.out.push(byte);
    }

    fn push_bytes(&mut self, byte: u8, count: usize) {
        self.out.resize(self.out.len() + count, byte);
    }

    fn next_line(&mut self) {}
}

pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Result<Option<Vec<u8>>> {
    let (settings, black_is_1) = match params {
        Some(dict) => {
            let k = dict.get_int(K)?.unwrap_or(0);

            let encoding = if k < 0 {
                EncodingMode::Group4
            } else if k == 0 {
                EncodingMode::Group3_1D
            } else {
                EncodingMode::Group3_2D { k: k as u32 }
            };

            (
                DecodeSettings {
                    invert_black: false,
                    columns: dict.get_int(COLUMNS)?.unwrap_or(1728) as u32,
                    rows: dict.get_int(ROWS)?.unwrap_or(0) as u32,
                    end_of_block: dict.get_bool(END_OF_BLOCK)?.unwrap_or(true),
                    end_of_line: dict.get_bool(END_OF_LINE)?.unwrap_or(false),
                    rows_are_byte_aligned: dict.get_bool(ENCODED_BYTE_ALIGN)?.unwrap_or(false),
                    encoding,
                },
                dict.get_bool(BLACK_IS_1)?.unwrap_or(false),
            )
        }
        None => (
            DecodeSettings {
                invert_black: false,
                columns: 1728,
                rows: 0,
                end_of_block: true,
                end_of_line: false,
                rows_are_byte_aligned: false,
                encoding: EncodingMode::Group3_1D,
            },
            false,
        ),
    };

    let mut sink = PackedSink::default();

    if hayro_ccitt::decode(data, &mut sink, &settings).is_none() {
        return Ok(None);
    }

    let mut out = sink.out;

    // The decoder emits 1 = white, which is the default interpretation
    // (black is 0); `BlackIs1` asks for the opposite.
    if black_is_1 {
        for b in &mut out {
            *b = !*b;
        }
    }

    Ok(Some(out))
}
