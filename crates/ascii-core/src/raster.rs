use ab_glyph::{Font, FontRef, PxScale};
use ascii_types::{AsciiFrameError, ConverterConfig};
use image::{ImageBuffer, Rgba};

use crate::charset;
use crate::grid::GlyphGrid;

const COMPONENT: &str = "GlyphGrid::to_raster";

impl GlyphGrid {
    /// Rasterizes the grid to PNG bytes at `png_scale * font_size`
    /// using the supplied monospace font (font loading itself is an
    /// external collaborator — callers hand in the bytes of whatever
    /// typeface they've resolved).
    ///
    /// Advance width is `max(widest configured glyph, 0.6 * font_size)`;
    /// line height is `png_scale * font_size * line_height_multiplier`.
    /// Background honors alpha; only non-blank glyphs are drawn.
    pub fn to_raster(
        &self,
        config: &ConverterConfig,
        font_data: &[u8],
        png_scale: u32,
    ) -> Result<Vec<u8>, AsciiFrameError> {
        let (width, height, pixels) = self.to_raster_rgba(config, font_data, png_scale)?;

        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_vec(width, height, pixels)
            .ok_or_else(|| AsciiFrameError::encode(COMPONENT, "rasterized buffer size mismatch"))?;

        let mut png_bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| AsciiFrameError::encode(COMPONENT, format!("png encode failed: {e}")))?;
        Ok(png_bytes)
    }

    /// Same rasterization as [`Self::to_raster`], but returns the raw
    /// `(width, height, RGBA8 pixels)` triple instead of PNG-encoding
    /// it — used by the animation pipeline's video path, which feeds
    /// an encoder raw frames rather than still images.
    pub fn to_raster_rgba(
        &self,
        config: &ConverterConfig,
        font_data: &[u8],
        scale_factor: u32,
    ) -> Result<(u32, u32, Vec<u8>), AsciiFrameError> {
        let font = FontRef::try_from_slice(font_data)
            .map_err(|e| AsciiFrameError::invalid_config(COMPONENT, format!("invalid font data: {e}")))?;

        let px = (scale_factor.max(1) * config.font_size) as f32;
        let scale = PxScale::from(px);

        let glyphs = charset::resolve(config.charset, &config.custom_charset)?;
        let advance_width = widest_advance(&font, &glyphs, scale).max(0.6 * px);
        let line_height = px * config.line_height;

        let img_width = (advance_width * self.width() as f32).ceil().max(1.0) as u32;
        let img_height = (line_height * self.height() as f32).ceil().max(1.0) as u32;

        let bg = config.background;
        let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(img_width, img_height, Rgba([bg.r, bg.g, bg.b, bg.a]));

        let ascent_px = font.ascent_unscaled() * scale.y / font.height_unscaled();

        for row in 0..self.height() {
            let top = row as f32 * line_height;
            for col in 0..self.width() {
                let cell = self.cell(col, row);
                let glyph = charset::normalize_blank(cell.glyph);
                if charset::is_blank(glyph) {
                    continue;
                }

                let left = col as f32 * advance_width;
                let gid = font.glyph_id(glyph);
                let positioned = gid.with_scale_and_position(
                    scale,
                    ab_glyph::point(left, top + ascent_px),
                );

                if let Some(outline) = font.outline_glyph(positioned) {
                    let bounds = outline.px_bounds();
                    outline.draw(|x, y, coverage| {
                        let px_x = bounds.min.x as i32 + x as i32;
                        let px_y = bounds.min.y as i32 + y as i32;
                        if px_x < 0 || px_y < 0 || px_x as u32 >= img_width || px_y as u32 >= img_height {
                            return;
                        }
                        let dst = img.get_pixel_mut(px_x as u32, px_y as u32);
                        blend(dst, cell.color, coverage);
                    });
                }
            }
        }

        Ok((img_width, img_height, img.into_raw()))
    }
}

fn widest_advance(font: &FontRef, glyphs: &[char], scale: PxScale) -> f32 {
    glyphs
        .iter()
        .map(|&c| font.h_advance_unscaled(font.glyph_id(c)) * scale.x / font.height_unscaled())
        .fold(0.0f32, f32::max)
}

fn blend(dst: &mut Rgba<u8>, fg: [u8; 3], coverage: f32) {
    let a = coverage.clamp(0.0, 1.0);
    for i in 0..3 {
        let src = fg[i] as f32;
        let bg = dst.0[i] as f32;
        dst.0[i] = (src * a + bg * (1.0 - a)).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    // `to_raster` needs real font bytes to exercise `ab_glyph`; the
    // pipeline-level integration tests (see ascii-pipeline) supply a
    // bundled test font. Unit tests here stick to the pure geometry
    // helper, which doesn't need a font at all.
    use super::*;

    #[test]
    fn blend_at_zero_coverage_keeps_background() {
        let mut px = Rgba([10, 20, 30, 255]);
        blend(&mut px, [255, 0, 0], 0.0);
        assert_eq!(px.0, [10, 20, 30, 255]);
    }

    #[test]
    fn blend_at_full_coverage_uses_foreground() {
        let mut px = Rgba([10, 20, 30, 255]);
        blend(&mut px, [255, 0, 0], 1.0);
        assert_eq!(px.0[0..3], [255, 0, 0]);
    }
}
