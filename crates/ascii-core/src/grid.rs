use ascii_types::{AsciiFrameError, ColorMode, ConverterConfig};

use crate::charset;
use crate::transform::PixelTransform;

const COMPONENT: &str = "GlyphGrid";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphCell {
    pub glyph: char,
    pub color: [u8; 3],
}

/// In-memory glyph+color grid. Exclusively owned by its producer until
/// handed to a serializer (`to_text` / `to_colored_markup` / `to_raster`),
/// which borrow it read-only.
#[derive(Debug, Clone)]
pub struct GlyphGrid {
    width: u32,
    height: u32,
    cells: Vec<GlyphCell>,
}

impl GlyphGrid {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[GlyphCell] {
        &self.cells
    }

    pub fn cell(&self, col: u32, row: u32) -> &GlyphCell {
        &self.cells[(row * self.width + col) as usize]
    }

    /// Derives `H = floor(W * (h_src/w_src) * 0.5)`, then fills each of
    /// the `W*H` cells by averaging the block of source pixels it
    /// covers and running that average through [`PixelTransform`].
    /// Block-averaging (rather than single-sample nearest-neighbor) is
    /// what keeps thin high-contrast source detail from aliasing away
    /// at typical terminal column counts.
    pub fn from_rgba(
        pixels: &[u8],
        w_src: u32,
        h_src: u32,
        config: &ConverterConfig,
    ) -> Result<GlyphGrid, AsciiFrameError> {
        config.validate()?;

        if w_src == 0 || h_src == 0 {
            return Err(AsciiFrameError::invalid_config(
                COMPONENT,
                "source image must have non-zero width and height",
            ));
        }
        let expected = (w_src as usize) * (h_src as usize) * 4;
        if pixels.len() != expected {
            return Err(AsciiFrameError::invalid_config(
                COMPONENT,
                format!("expected {} RGBA bytes, got {}", expected, pixels.len()),
            ));
        }

        let glyphs = charset::resolve(config.charset, &config.custom_charset)?;

        let width = config.width;
        let height = ((width as f32) * (h_src as f32 / w_src as f32) * 0.5).floor() as u32;

        let mut cells = Vec::with_capacity((width * height) as usize);
        for row in 0..height {
            let y0 = (row as u64 * h_src as u64 / height as u64) as u32;
            let y1 = (((row + 1) as u64 * h_src as u64) / height as u64).max(y0 as u64 + 1) as u32;
            let y1 = y1.min(h_src);
            for col in 0..width {
                let x0 = (col as u64 * w_src as u64 / width as u64) as u32;
                let x1 = (((col + 1) as u64 * w_src as u64) / width as u64).max(x0 as u64 + 1) as u32;
                let x1 = x1.min(w_src);

                let avg = average_block(pixels, w_src, x0, x1, y0, y1);
                let transformed =
                    PixelTransform::apply(avg, config.brightness_percent, config.contrast);
                let idx = PixelTransform::glyph_index(transformed.luminance, glyphs.len(), config.invert);
                let glyph = glyphs[idx];

                let color = match config.color_mode {
                    ColorMode::Color => transformed.rgb,
                    ColorMode::Grayscale => {
                        let g = transformed.luminance.round().clamp(0.0, 255.0) as u8;
                        [g, g, g]
                    }
                };

                cells.push(GlyphCell { glyph, color });
            }
        }

        Ok(GlyphGrid { width, height, cells })
    }

    /// LF-separated rows; blank glyphs normalized to ASCII space.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for row in 0..self.height {
            if row > 0 {
                out.push('\n');
            }
            for col in 0..self.width {
                out.push(charset::normalize_blank(self.cell(col, row).glyph));
            }
        }
        out
    }
}

fn average_block(pixels: &[u8], w_src: u32, x0: u32, x1: u32, y0: u32, y1: u32) -> ascii_types::Rgba8 {
    let (mut r, mut g, mut b, mut a) = (0u64, 0u64, 0u64, 0u64);
    let mut count = 0u64;
    for y in y0..y1 {
        let row_start = (y as usize) * (w_src as usize) * 4;
        for x in x0..x1 {
            let i = row_start + (x as usize) * 4;
            r += pixels[i] as u64;
            g += pixels[i + 1] as u64;
            b += pixels[i + 2] as u64;
            a += pixels[i + 3] as u64;
            count += 1;
        }
    }
    if count == 0 {
        return ascii_types::Rgba8::TRANSPARENT;
    }
    ascii_types::Rgba8::new(
        (r / count) as u8,
        (g / count) as u8,
        (b / count) as u8,
        (a / count) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascii_types::CharsetName;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut v = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..(w * h) {
            v.extend_from_slice(&rgba);
        }
        v
    }

    #[test]
    fn s1_all_black_renders_dense_glyph() {
        let pixels = solid(4, 4, [0, 0, 0, 255]);
        let config = ConverterConfig::builder().width(4).charset(CharsetName::Standard).build().unwrap();
        let grid = GlyphGrid::from_rgba(&pixels, 4, 4, &config).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.to_text(), "@@@@\n@@@@");
    }

    #[test]
    fn s2_all_white_renders_blank_glyph() {
        let pixels = solid(4, 4, [255, 255, 255, 255]);
        let config = ConverterConfig::builder().width(4).charset(CharsetName::Standard).build().unwrap();
        let grid = GlyphGrid::from_rgba(&pixels, 4, 4, &config).unwrap();
        assert_eq!(grid.to_text(), "    \n    ");
    }

    #[test]
    fn s3_one_by_one_collapses_to_zero_rows() {
        let pixels = solid(1, 1, [128, 128, 128, 255]);
        let config = ConverterConfig::builder()
            .width(1)
            .charset(CharsetName::Simple)
            .color_mode(ascii_types::ColorMode::Grayscale)
            .build()
            .unwrap();
        let grid = GlyphGrid::from_rgba(&pixels, 1, 1, &config).unwrap();
        assert_eq!(grid.height(), 0);
        assert_eq!(grid.to_text(), "");
    }

    #[test]
    fn grid_dimensions_match_invariant_3() {
        let (w_src, h_src) = (37u32, 91u32);
        let pixels = solid(w_src, h_src, [10, 20, 30, 255]);
        let config = ConverterConfig::builder().width(16).build().unwrap();
        let grid = GlyphGrid::from_rgba(&pixels, w_src, h_src, &config).unwrap();
        let expected_h = ((16f32) * (h_src as f32 / w_src as f32) * 0.5).floor() as u32;
        assert_eq!(grid.width(), 16);
        assert_eq!(grid.height(), expected_h);
    }
}
