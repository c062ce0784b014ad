//! A decoder for JPX (JPEG 2000) encoded streams, delegating to
//! `hayro-jpeg2000`.

use crate::OptionLog;

pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let bitmap = hayro_jpeg2000::read(data)
        .ok()
        .warn_none("failed to read JPX codestream")?;

    let channels: Vec<Vec<u8>> = bitmap
        .channels
        .into_iter()
        .filter(|c| !c.is_alpha)
        .map(|c| c.into_8bit())
        .collect();

    let num_channels = channels.len();

    if num_channels == 0 {
        return None;
    }

    let samples = channels[0].len();

    if channels.iter().any(|c| c.len() != samples) {
        return None;
    }

    // Interleave the per-component planes into packed pixels.
    let mut out = Vec::with_capacity(samples * num_channels);

    for i in 0..samples {
        for channel in &channels {
            out.push(channel[i]);
        }
    }

    Some(out)
}
