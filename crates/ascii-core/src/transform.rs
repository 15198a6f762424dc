use ascii_types::Rgba8;

/// Result of the per-pixel brightness/contrast/luminance pipeline: the
/// adjusted, clamped RGB triplet plus the luminance it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedPixel {
    pub rgb: [u8; 3],
    pub luminance: f32,
}

/// Stateless per-pixel math: brightness scale, contrast curve, clamp,
/// luminance, and brightness-to-glyph-index mapping.
pub struct PixelTransform;

impl PixelTransform {
    /// Brightness scale, contrast curve, then luminance:
    /// curve (clamped to [0, 255] per channel), then luminance.
    ///
    /// `contrast` must not be 259 — callers validate this via
    /// `ConverterConfig::validate` before ever calling this function.
    pub fn apply(pixel: Rgba8, brightness_percent: u16, contrast: u16) -> TransformedPixel {
        debug_assert_ne!(contrast, 259, "contrast=259 must be rejected before this point");

        let brightness = brightness_percent as f32 / 100.0;
        let r1 = pixel.r as f32 * brightness;
        let g1 = pixel.g as f32 * brightness;
        let b1 = pixel.b as f32 * brightness;

        let factor = 259.0 * (contrast as f32 + 255.0) / (255.0 * (259.0 - contrast as f32));
        let curve = |v: f32| (factor * (v - 128.0) + 128.0).clamp(0.0, 255.0);

        let r2 = curve(r1);
        let g2 = curve(g1);
        let b2 = curve(b1);

        let luminance = 0.299 * r2 + 0.587 * g2 + 0.114 * b2;

        TransformedPixel { rgb: [r2 as u8, g2 as u8, b2 as u8], luminance }
    }

    /// Step 4: brightness -> glyph index, clamped to `[0, glyph_count-1]`.
    ///
    /// Glyph sets are written dense-glyph-first (e.g. `"@%#*+=-:. "`), so
    /// the non-inverted default maps dark pixels (low luminance) to low
    /// indices (dense glyphs) and bright pixels to high indices (blank
    /// glyphs); `invert` flips that mapping.
    pub fn glyph_index(luminance: f32, glyph_count: usize, invert: bool) -> usize {
        debug_assert!(glyph_count >= 1);
        let ratio = luminance / 255.0;
        let ratio = if invert { 1.0 - ratio } else { ratio };
        let idx = (ratio * (glyph_count - 1) as f32).floor() as i64;
        idx.clamp(0, glyph_count as i64 - 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_preserves_rgb() {
        let pixel = Rgba8::new(37, 200, 5, 255);
        let out = PixelTransform::apply(pixel, 100, 128);
        assert_eq!(out.rgb, [37, 200, 5]);
    }

    #[test]
    fn glyph_index_stays_in_bounds() {
        for lum in [0.0, 1.0, 127.5, 254.0, 255.0, -10.0, 300.0] {
            let idx = PixelTransform::glyph_index(lum, 10, false);
            assert!(idx < 10);
            let idx_inv = PixelTransform::glyph_index(lum, 10, true);
            assert!(idx_inv < 10);
        }
    }

    #[test]
    fn invert_flips_bright_and_dark_ends() {
        // default: dark -> index 0 (dense glyph), bright -> last index (blank glyph)
        assert_eq!(PixelTransform::glyph_index(0.0, 4, false), 0);
        assert_eq!(PixelTransform::glyph_index(255.0, 4, false), 3);
        // inverted: flipped
        assert_eq!(PixelTransform::glyph_index(0.0, 4, true), 3);
        assert_eq!(PixelTransform::glyph_index(255.0, 4, true), 0);
    }

    proptest::proptest! {
        #[test]
        fn glyph_index_always_in_range(lum in -1000.0f32..1000.0, count in 2usize..64, invert: bool) {
            let idx = PixelTransform::glyph_index(lum, count, invert);
            proptest::prop_assert!(idx < count);
        }

        #[test]
        fn identity_config_roundtrips(r: u8, g: u8, b: u8) {
            let out = PixelTransform::apply(Rgba8::new(r, g, b, 255), 100, 128);
            proptest::prop_assert_eq!(out.rgb, [r, g, b]);
        }
    }
}
