use ascii_core::ByteSink;
use ascii_types::AsciiFrameError;

use crate::lzw;

const COMPONENT: &str = "GifAssembler";
const PAL_SIZE_FIELD: u8 = 7; // fixed: NeuQuant always trains a full 256-entry network
const PALETTE_ENTRIES: usize = 256;
const MIN_CODE_SIZE: u8 = PAL_SIZE_FIELD + 1; // 8

/// Disposal method for the Graphic Control Extension. `0` ("unspecified")
/// is used when a frame carries no transparency; `2` ("restore to
/// background") is used when one does, matching how most encoders avoid
/// ghosting on transparent animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    Unspecified,
    RestoreBackground,
}

impl Disposal {
    fn as_u8(self) -> u8 {
        match self {
            Disposal::Unspecified => 0,
            Disposal::RestoreBackground => 2,
        }
    }
}

/// One encoded frame handed to the assembler: palette indices plus
/// per-frame GIF metadata. `local_palette` is set whenever a frame's
/// own NeuQuant run produced colors that differ from the first frame's
/// (which seeds the global color table) — only the
/// first frame rides on the global palette alone.
pub struct GifFrame<'a> {
    pub indices: &'a [u8],
    pub delay_cs: u16,
    pub disposal: Disposal,
    pub transparent_index: Option<u8>,
    pub local_palette: Option<Vec<[u8; 3]>>,
}

/// Builds a complete GIF89a byte stream: header, global color table,
/// optional NETSCAPE2.0 loop extension, then one GCE + image descriptor
/// (+ optional local color table) + LZW data block per frame, closed by
/// the trailer byte.
pub struct GifAssembler {
    width: u16,
    height: u16,
    global_palette: Vec<[u8; 3]>,
    loop_count: Option<u16>,
}

impl GifAssembler {
    /// `loop_count`: `None` omits the NETSCAPE2.0 extension entirely;
    /// `Some(0)` loops forever; `Some(n)` repeats `n` times.
    pub fn new(
        width: u16,
        height: u16,
        global_palette: Vec<[u8; 3]>,
        loop_count: Option<u16>,
    ) -> Result<Self, AsciiFrameError> {
        if global_palette.is_empty() || global_palette.len() > PALETTE_ENTRIES {
            return Err(AsciiFrameError::encode(
                COMPONENT,
                format!("global palette must have 1..={} colors, got {}", PALETTE_ENTRIES, global_palette.len()),
            ));
        }
        Ok(GifAssembler { width, height, global_palette, loop_count })
    }

    pub fn assemble(&self, frames: &[GifFrame]) -> Result<Vec<u8>, AsciiFrameError> {
        if frames.is_empty() {
            return Err(AsciiFrameError::encode(COMPONENT, "no frames to encode"));
        }

        let mut sink = ByteSink::new();
        self.write_header(&mut sink);
        if let Some(loop_count) = self.loop_count {
            self.write_netscape_loop(&mut sink, loop_count);
        }
        for (idx, frame) in frames.iter().enumerate() {
            self.write_frame(&mut sink, frame, idx > 0)?;
        }
        sink.write_u8(0x3B);
        Ok(sink.into_vec())
    }

    fn write_palette(sink: &mut ByteSink, palette: &[[u8; 3]]) {
        for &[r, g, b] in palette {
            sink.write_bytes(&[r, g, b]);
        }
        for _ in palette.len()..PALETTE_ENTRIES {
            sink.write_bytes(&[0, 0, 0]);
        }
    }

    fn write_header(&self, sink: &mut ByteSink) {
        sink.write_ascii("GIF89a");
        sink.write_le_u16(self.width);
        sink.write_le_u16(self.height);

        // 0x80 (global color table) | 0x70 (color resolution = 7) | 0x00 (unsorted) | 7 (palSize)
        sink.write_u8(0x80 | 0x70 | PAL_SIZE_FIELD);
        sink.write_u8(0); // background color index
        sink.write_u8(0); // pixel aspect ratio

        Self::write_palette(sink, &self.global_palette);
    }

    fn write_netscape_loop(&self, sink: &mut ByteSink, loop_count: u16) {
        sink.write_bytes(&[0x21, 0xFF, 0x0B]);
        sink.write_ascii("NETSCAPE2.0");
        sink.write_u8(0x03);
        sink.write_u8(0x01);
        sink.write_le_u16(loop_count);
        sink.write_u8(0);
    }

    fn write_frame(&self, sink: &mut ByteSink, frame: &GifFrame, allow_local_palette: bool) -> Result<(), AsciiFrameError> {
        let expected = self.width as usize * self.height as usize;
        if frame.indices.len() != expected {
            return Err(AsciiFrameError::encode(
                COMPONENT,
                format!("frame has {} indices, expected {}", frame.indices.len(), expected),
            ));
        }

        sink.write_bytes(&[0x21, 0xF9, 0x04]);
        let transparency_flag = if frame.transparent_index.is_some() { 0x01 } else { 0x00 };
        let packed = (frame.disposal.as_u8() << 2) | transparency_flag;
        sink.write_u8(packed);
        sink.write_le_u16(frame.delay_cs);
        sink.write_u8(frame.transparent_index.unwrap_or(0));
        sink.write_u8(0);

        let local_palette = if allow_local_palette { frame.local_palette.as_ref() } else { None };

        sink.write_u8(0x2C);
        sink.write_le_u16(0);
        sink.write_le_u16(0);
        sink.write_le_u16(self.width);
        sink.write_le_u16(self.height);

        match local_palette {
            Some(palette) => {
                sink.write_u8(0x80 | PAL_SIZE_FIELD);
                Self::write_palette(sink, palette);
            }
            None => sink.write_u8(0),
        }

        let lzw_data = lzw::encode(frame.indices, MIN_CODE_SIZE)?;
        sink.write_bytes(&lzw_data);

        Ok(())
    }
}

/// Converts milliseconds to GIF centiseconds, matching the pipeline's
/// frame timing.
pub fn delay_cs_from_ms(delay_ms: u32) -> u16 {
    ((delay_ms + 5) / 10).min(u16::MAX as u32) as u16
}
