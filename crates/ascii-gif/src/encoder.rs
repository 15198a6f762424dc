use ascii_quant::NeuQuant;
use ascii_types::AsciiFrameError;
use tracing::{debug, info, span, Level};

use crate::assembler::{delay_cs_from_ms, Disposal, GifAssembler, GifFrame};

const COMPONENT: &str = "GifEncoder";

/// One raw RGBA frame plus its display time, ready for quantization.
pub struct RgbaFrame {
    pub pixels: Vec<u8>,
    pub delay_ms: u32,
}

/// Quantizes each frame independently (fresh NeuQuant per frame, per
/// quantization step) and assembles the result into a GIF89a byte stream.
/// `sample_fac` is the NeuQuant sample factor (`1..=30`, lower = denser
/// sampling); `transparency_color`, if set, is resolved to the nearest
/// *used* palette entry in each frame independently.
#[tracing::instrument(level = "info", skip(frames))]
pub fn encode_frames_to_gif(
    frames: &[RgbaFrame],
    width: u16,
    height: u16,
    sample_fac: i32,
    loop_count: Option<u16>,
    transparency_color: Option<[u8; 3]>,
) -> Result<Vec<u8>, AsciiFrameError> {
    let span = span!(Level::INFO, "gif_encode", frames = frames.len());
    let _guard = span.enter();

    if frames.is_empty() {
        return Err(AsciiFrameError::encode(COMPONENT, "no frames to encode"));
    }

    info!(stage = "C8", frames = frames.len(), width, height, "Starting GIF encode");

    let mut quantized: Vec<(Vec<u8>, Vec<[u8; 3]>, Option<u8>)> = Vec::with_capacity(frames.len());

    for (idx, frame) in frames.iter().enumerate() {
        let mut nq = NeuQuant::new(sample_fac, &frame.pixels)?;

        let mut indices = Vec::with_capacity(frame.pixels.len() / 4);
        for rgba in frame.pixels.chunks_exact(4) {
            indices.push(nq.index_of(rgba) as u8);
        }

        let transparent_index = transparency_color.and_then(|[r, g, b]| nq.nearest_used(r, g, b).map(|i| i as u8));

        let palette = rgb_triples(&nq.color_map_rgb());
        debug!(stage = "C8", frame_idx = idx, "Frame quantized");

        quantized.push((indices, palette, transparent_index));
    }

    let global_palette = quantized[0].1.clone();
    let assembler = GifAssembler::new(width, height, global_palette.clone(), loop_count)?;

    let gif_frames: Vec<GifFrame> = quantized
        .iter()
        .zip(frames.iter())
        .enumerate()
        .map(|(idx, ((indices, palette, transparent_index), frame))| {
            let local_palette = if idx == 0 || *palette == global_palette { None } else { Some(palette.clone()) };
            GifFrame {
                indices,
                delay_cs: delay_cs_from_ms(frame.delay_ms),
                disposal: if transparent_index.is_some() { Disposal::RestoreBackground } else { Disposal::Unspecified },
                transparent_index: *transparent_index,
                local_palette,
            }
        })
        .collect();

    let bytes = assembler.assemble(&gif_frames)?;
    info!(stage = "C8", bytes = bytes.len(), "GIF encode complete");
    Ok(bytes)
}

fn rgb_triples(rgb: &[u8]) -> Vec<[u8; 3]> {
    rgb.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(rgba: [u8; 4], w: usize, h: usize, delay_ms: u32) -> RgbaFrame {
        let mut pixels = Vec::with_capacity(w * h * 4);
        for _ in 0..(w * h) {
            pixels.extend_from_slice(&rgba);
        }
        RgbaFrame { pixels, delay_ms }
    }

    #[test]
    fn single_solid_frame_encodes_to_valid_gif() {
        let frame = solid_frame([10, 20, 30, 255], 64, 64, 40);
        let bytes = encode_frames_to_gif(&[frame], 64, 64, 10, Some(0), None).unwrap();
        assert_eq!(&bytes[0..6], b"GIF89a");
        assert_eq!(*bytes.last().unwrap(), 0x3B);
    }

    #[test]
    fn multi_frame_animation_has_matching_frame_count() {
        let frames = vec![
            solid_frame([255, 0, 0, 255], 64, 64, 40),
            solid_frame([0, 255, 0, 255], 64, 64, 40),
            solid_frame([0, 0, 255, 255], 64, 64, 40),
        ];
        let bytes = encode_frames_to_gif(&frames, 64, 64, 10, Some(0), None).unwrap();
        let descriptor_count = bytes.iter().filter(|&&b| b == 0x2C).count();
        assert_eq!(descriptor_count, 3);
    }

    #[test]
    fn empty_frame_list_is_rejected() {
        assert!(encode_frames_to_gif(&[], 10, 10, 10, None, None).is_err());
    }
}
