//! Decoders for LZW- and flate-encoded streams, with the shared predictor
//! stage.

use crate::Result;
use crate::object::Dict;
use crate::object::dict::keys::{BITS_PER_COMPONENT, COLORS, COLUMNS, EARLY_CHANGE, PREDICTOR};
use log::warn;

struct PredictorParams {
    predictor: u8,
    colors: u8,
    bits_per_component: u8,
    columns: usize,
    early_change: bool,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: true,
        }
    }
}

impl PredictorParams {
    fn from_params(dict: Option<&Dict>) -> Result<Self> {
        let Some(dict) = dict else {
            return Ok(Self::default());
        };

        let d = Self::default();

        Ok(Self {
            predictor: dict.get_int(PREDICTOR)?.unwrap_or(1) as u8,
            colors: dict.get_int(COLORS)?.unwrap_or(d.colors as i64) as u8,
            bits_per_component: dict
                .get_int(BITS_PER_COMPONENT)?
                .unwrap_or(d.bits_per_component as i64) as u8,
            columns: dict.get_int(COLUMNS)?.unwrap_or(1).max(1) as usize,
            early_change: dict.get_int(EARLY_CHANGE)?.map(|e| e != 0).unwrap_or(true),
        })
    }

    fn bits_per_pixel(&self) -> usize {
        self.bits_per_component as usize * self.colors as usize
    }

    /// The distance in bytes between a sample and its left neighbor.
    fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel().div_ceil(8).max(1)
    }

    fn row_length_in_bytes(&self) -> usize {
        (self.columns * self.bits_per_pixel()).div_ceil(8)
    }
}

fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    match params.predictor {
        1 => Some(data),
        2 => apply_tiff_predictor(data, params),
        10.. => apply_png_predictor(data, params),
        _ => {
            warn!("unsupported predictor {}", params.predictor);

            None
        }
    }
}

/// The TIFF horizontal predictor: each sample is stored as the difference to
/// its left neighbor.
fn apply_tiff_predictor(mut data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    if params.bits_per_component != 8 {
        warn!(
            "TIFF predictor with {} bits per component is unsupported",
            params.bits_per_component
        );

        return None;
    }

    let colors = params.colors as usize;
    let row_len = params.row_length_in_bytes();

    for row in data.chunks_mut(row_len) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }

    Some(data)
}

/// The PNG row predictors (None/Sub/Up/Average/Paeth). Each row carries its
/// filter type in a leading tag byte.
fn apply_png_predictor(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    let row_len = params.row_length_in_bytes();
    let bpp = params.bytes_per_pixel();
    let num_rows = data.len() / (row_len + 1);

    // Sanity check.
    if num_rows * (row_len + 1) != data.len() {
        warn!("predictor input is not a whole number of rows");

        return None;
    }

    let mut out = vec![0u8; num_rows * row_len];

    for row in 0..num_rows {
        let tag = data[row * (row_len + 1)];
        let cur = &data[row * (row_len + 1) + 1..(row + 1) * (row_len + 1)];

        let (prev_rows, out_row) = out.split_at_mut(row * row_len);
        let out_row = &mut out_row[..row_len];
        let prev_row = prev_rows.get((row - 1).wrapping_mul(row_len)..).filter(|_| row > 0);

        let up = |i: usize| prev_row.map(|p| p[i]).unwrap_or(0);

        match tag {
            0 => out_row.copy_from_slice(cur),
            1 => {
                for i in 0..row_len {
                    let left = if i >= bpp { out_row[i - bpp] } else { 0 };
                    out_row[i] = cur[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_len {
                    out_row[i] = cur[i].wrapping_add(up(i));
                }
            }
            3 => {
                for i in 0..row_len {
                    let left = if i >= bpp { out_row[i - bpp] } else { 0 };
                    let avg = ((left as u16 + up(i) as u16) / 2) as u8;
                    out_row[i] = cur[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 0..row_len {
                    let left = if i >= bpp { out_row[i - bpp] } else { 0 };
                    let up_left = if i >= bpp { up(i - bpp) } else { 0 };
                    out_row[i] = cur[i].wrapping_add(paeth(left, up(i), up_left));
                }
            }
            _ => {
                warn!("invalid PNG predictor row tag {tag}");

                return None;
            }
        }
    }

    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

pub(crate) mod flate {
    use super::PredictorParams;
    use crate::Result;
    use crate::object::Dict;
    use std::io::Read;

    pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Result<Option<Vec<u8>>> {
        let params = PredictorParams::from_params(params)?;

        let Some(decoded) = zlib(data).or_else(|| deflate(data)) else {
            return Ok(None);
        };

        Ok(super::apply_predictor(decoded, &params))
    }

    fn zlib(data: &[u8]) -> Option<Vec<u8>> {
        let mut out = vec![];
        flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .ok()?;

        Some(out)
    }

    fn deflate(data: &[u8]) -> Option<Vec<u8>> {
        let mut out = vec![];
        flate2::read::DeflateDecoder::new(data)
            .read_to_end(&mut out)
            .ok()?;

        Some(out)
    }
}

pub(crate) mod lzw {
    use super::PredictorParams;
    use crate::Result;
    use crate::object::Dict;
    use log::warn;

    const CLEAR_TABLE: u16 = 256;
    const EOD: u16 = 257;
    const FIRST_DYNAMIC: u16 = 258;
    const MAX_ENTRIES: usize = 4096;
    const ROOT: u16 = u16::MAX;

    pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Result<Option<Vec<u8>>> {
        let params = PredictorParams::from_params(params)?;

        let Some(decoded) = decode_impl(data, params.early_change) else {
            return Ok(None);
        };

        Ok(super::apply_predictor(decoded, &params))
    }

    fn decode_impl(data: &[u8], early_change: bool) -> Option<Vec<u8>> {
        let mut table = Table::new(early_change);
        let mut bits = Bits::new(data);
        let mut decoded = vec![];
        let mut prev: Option<u16> = None;

        loop {
            let Some(code) = bits.next_code(table.code_width()) else {
                warn!("lzw stream ended without an end-of-data code");
                return Some(decoded);
            };

            match code {
                CLEAR_TABLE => {
                    table.clear();
                    prev = None;
                }
                EOD => return Some(decoded),
                code if table.is_known(code) => {
                    table.expand(code, &mut decoded);

                    if let Some(prev) = prev {
                        table.register(prev, table.first_byte(code));
                    }

                    prev = Some(code);
                }
                code => {
                    // The encoder emitted the entry it is just about to
                    // create; only valid for the very next table slot.
                    let prev_code = prev?;

                    if code != table.next {
                        return None;
                    }

                    let first = table.first_byte(prev_code);
                    table.register(prev_code, first);
                    table.expand(code, &mut decoded);
                    prev = Some(code);
                }
            }
        }
    }

    struct Table {
        // A prefix table: each entry is its predecessor code plus one byte.
        prefix: [u16; MAX_ENTRIES],
        suffix: [u8; MAX_ENTRIES],
        next: u16,
        early_change: bool,
    }

    impl Table {
        fn new(early_change: bool) -> Self {
            let mut suffix = [0; MAX_ENTRIES];

            for (i, s) in suffix.iter_mut().enumerate().take(256) {
                *s = i as u8;
            }

            Self {
                prefix: [ROOT; MAX_ENTRIES],
                suffix,
                next: FIRST_DYNAMIC,
                early_change,
            }
        }

        fn clear(&mut self) {
            self.next = FIRST_DYNAMIC;
        }

        fn is_known(&self, code: u16) -> bool {
            code < 256 || (FIRST_DYNAMIC..self.next).contains(&code)
        }

        fn register(&mut self, prev: u16, byte: u8) {
            // A full table keeps decoding; the encoder is expected to emit a
            // clear-table code eventually.
            if (self.next as usize) < MAX_ENTRIES {
                self.prefix[self.next as usize] = prev;
                self.suffix[self.next as usize] = byte;
                self.next += 1;
            }
        }

        fn first_byte(&self, mut code: u16) -> u8 {
            while self.prefix[code as usize] != ROOT {
                code = self.prefix[code as usize];
            }

            self.suffix[code as usize]
        }

        fn expand(&self, code: u16, out: &mut Vec<u8>) {
            let start = out.len();
            let mut code = code;

            loop {
                out.push(self.suffix[code as usize]);

                if self.prefix[code as usize] == ROOT {
                    break;
                }

                code = self.prefix[code as usize];
            }

            out[start..].reverse();
        }

        fn code_width(&self) -> u8 {
            let adjusted = self.next as usize + usize::from(self.early_change);

            match adjusted {
                2048.. => 12,
                1024.. => 11,
                512.. => 10,
                _ => 9,
            }
        }
    }

    struct Bits<'a> {
        data: &'a [u8],
        byte: usize,
        bit: u8,
    }

    impl<'a> Bits<'a> {
        fn new(data: &'a [u8]) -> Self {
            Self {
                data,
                byte: 0,
                bit: 0,
            }
        }

        // MSB-first.
        fn next_code(&mut self, width: u8) -> Option<u16> {
            let mut code = 0u16;

            for _ in 0..width {
                let byte = *self.data.get(self.byte)?;
                code = code << 1 | ((byte >> (7 - self.bit)) & 1) as u16;

                self.bit += 1;
                if self.bit == 8 {
                    self.bit = 0;
                    self.byte += 1;
                }
            }

            Some(code)
        }
    }

}

#[cfg(test)]
mod tests {
    use crate::filter::lzw_flate::{PredictorParams, apply_png_predictor, apply_tiff_predictor};
    use crate::filter::lzw_flate::{flate, lzw};
    use crate::object::{Atom, Dict, Object};
    use std::io::Write;

    fn params(pairs: &[(&[u8], f64)]) -> Dict {
        Dict::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (Atom::new(k), Object::Number(*v))),
        )
    }

    #[test]
    fn flate_round_trip() {
        let plain = b"stream data that deflates reasonably well well well well";
        let mut enc = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
        enc.write_all(plain).unwrap();
        let compressed = enc.finish().unwrap();

        let decoded = flate::decode(&compressed, None).unwrap().unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn flate_rejects_garbage() {
        assert!(flate::decode(b"not deflate data", None).unwrap().is_none());
    }

    #[test]
    fn lzw_with_predictor_dict_defaults() {
        let input = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        let dict = params(&[]);

        let decoded = lzw::decode(&input, Some(&dict)).unwrap().unwrap();
        assert_eq!(decoded, vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]);
    }

    #[test]
    fn png_up_predictor() {
        // Two rows of four bytes, both filtered with "Up".
        let data = vec![2, 1, 2, 3, 4, 2, 1, 1, 1, 1];
        let p = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            early_change: true,
        };

        let out = apply_png_predictor(data, &p).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 2, 3, 4, 5]);
    }

    #[test]
    fn png_sub_predictor() {
        let data = vec![1, 10, 1, 1, 1];
        let p = PredictorParams {
            predictor: 11,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            early_change: true,
        };

        let out = apply_png_predictor(data, &p).unwrap();
        assert_eq!(out, vec![10, 11, 12, 13]);
    }

    #[test]
    fn png_predictor_row_mismatch() {
        let p = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            early_change: true,
        };

        assert!(apply_png_predictor(vec![2, 1, 2], &p).is_none());
    }

    #[test]
    fn tiff_predictor() {
        let data = vec![10, 1, 1, 1];
        let p = PredictorParams {
            predictor: 2,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            early_change: true,
        };

        let out = apply_tiff_predictor(data, &p).unwrap();
        assert_eq!(out, vec![10, 11, 12, 13]);
    }
}
