//! A decoder for DCT (JPEG) encoded streams, delegating to `zune-jpeg`.

use crate::Result;
use crate::object::Dict;
use crate::object::dict::keys::COLOR_TRANSFORM;
use std::io::Cursor;
use zune_jpeg::JpegDecoder;
use zune_jpeg::zune_core::colorspace::ColorSpace;
use zune_jpeg::zune_core::options::DecoderOptions;

pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Result<Option<Vec<u8>>> {
    let color_transform = match params {
        Some(dict) => dict.get_int(COLOR_TRANSFORM)?,
        None => None,
    };

    Ok(decode_impl(data, color_transform))
}

fn decode_impl(data: &[u8], color_transform: Option<i64>) -> Option<Vec<u8>> {
    let options = DecoderOptions::default()
        .set_max_width(u16::MAX as usize)
        .set_max_height(u16::MAX as usize);
    let mut decoder = JpegDecoder::new_with_options(Cursor::new(data), options);
    decoder.decode_headers().ok()?;

    let out_colorspace = match decoder.input_colorspace()? {
        // Unless the transform is explicitly disabled, YCbCr data is meant
        // to be shown as RGB.
        ColorSpace::YCbCr => {
            if color_transform.is_none_or(|c| c != 0) {
                ColorSpace::RGB
            } else {
                ColorSpace::YCbCr
            }
        }
        ColorSpace::RGB | ColorSpace::RGBA => ColorSpace::RGB,
        ColorSpace::Luma | ColorSpace::LumaA => ColorSpace::Luma,
        ColorSpace::CMYK => ColorSpace::CMYK,
        ColorSpace::YCCK => ColorSpace::YCCK,
        _ => ColorSpace::RGB,
    };

    decoder.set_options(DecoderOptions::default().jpeg_set_out_colorspace(out_colorspace));

    decoder.decode().ok()
}
