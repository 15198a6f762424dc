use serde::{Deserialize, Serialize};

use crate::error::AsciiFrameError;
use crate::pixel::Rgba8;

const COMPONENT: &str = "ConverterConfig";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Color,
    Grayscale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaletteMode {
    Full,
    Ansi256,
    Ansi16,
    Cga,
    Gameboy,
}

/// Named glyph-ramp presets. `Custom` defers to `ConverterConfig::custom_charset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharsetName {
    Standard,
    Detailed,
    Blocks,
    Simple,
    Binary,
    Braille,
    Dots,
    Custom,
}

/// Immutable, validated conversion request. Build via
/// [`ConverterConfigBuilder`] — there is no late mutation, every
/// operation in the pipeline takes a `&ConverterConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub width: u32,
    pub charset: CharsetName,
    pub custom_charset: String,
    pub color_mode: ColorMode,
    pub palette_mode: PaletteMode,
    pub contrast: u16,
    pub brightness_percent: u16,
    pub invert: bool,
    pub background: Rgba8,
    pub font_size: u32,
    pub line_height: f32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            width: 80,
            charset: CharsetName::Standard,
            custom_charset: String::new(),
            color_mode: ColorMode::Color,
            palette_mode: PaletteMode::Full,
            contrast: 100,
            brightness_percent: 100,
            invert: false,
            background: Rgba8::BLACK,
            font_size: 14,
            line_height: 1.0,
        }
    }
}

impl ConverterConfig {
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder::default()
    }

    /// Cross-field invariants that can't be checked field-by-field at
    /// builder time: the contrast-curve singularity (`invalid_config`
    /// at `contrast == 259`, see DESIGN.md) and a non-empty effective
    /// glyph set.
    pub fn validate(&self) -> Result<(), AsciiFrameError> {
        if self.width == 0 {
            return Err(AsciiFrameError::invalid_config(COMPONENT, "width must be >= 1"));
        }
        if self.contrast == 259 {
            return Err(AsciiFrameError::invalid_config(
                COMPONENT,
                "contrast = 259 makes the contrast curve divide by zero",
            ));
        }
        if !(1..=400).contains(&self.brightness_percent) {
            return Err(AsciiFrameError::invalid_config(
                COMPONENT,
                format!("brightness must be in [1, 400], got {}", self.brightness_percent),
            ));
        }
        if self.line_height < 0.5 {
            return Err(AsciiFrameError::invalid_config(
                COMPONENT,
                format!("line_height must be >= 0.5, got {}", self.line_height),
            ));
        }
        if self.font_size == 0 {
            return Err(AsciiFrameError::invalid_config(COMPONENT, "font_size must be >= 1"));
        }
        if matches!(self.charset, CharsetName::Custom) && self.custom_charset.is_empty() {
            return Err(AsciiFrameError::invalid_config(
                COMPONENT,
                "custom_charset must be non-empty when charset = custom",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConverterConfigBuilder {
    inner: ConverterConfigOpt,
}

#[derive(Debug, Clone, Default)]
struct ConverterConfigOpt {
    width: Option<u32>,
    charset: Option<CharsetName>,
    custom_charset: Option<String>,
    color_mode: Option<ColorMode>,
    palette_mode: Option<PaletteMode>,
    contrast: Option<u16>,
    brightness_percent: Option<u16>,
    invert: Option<bool>,
    background: Option<Rgba8>,
    font_size: Option<u32>,
    line_height: Option<f32>,
}

impl ConverterConfigBuilder {
    pub fn width(mut self, width: u32) -> Self {
        self.inner.width = Some(width);
        self
    }

    pub fn charset(mut self, charset: CharsetName) -> Self {
        self.inner.charset = Some(charset);
        self
    }

    pub fn custom_charset(mut self, custom: impl Into<String>) -> Self {
        self.inner.custom_charset = Some(custom.into());
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.inner.color_mode = Some(mode);
        self
    }

    pub fn palette_mode(mut self, mode: PaletteMode) -> Self {
        self.inner.palette_mode = Some(mode);
        self
    }

    pub fn contrast(mut self, contrast: u16) -> Self {
        self.inner.contrast = Some(contrast);
        self
    }

    pub fn brightness_percent(mut self, brightness: u16) -> Self {
        self.inner.brightness_percent = Some(brightness);
        self
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.inner.invert = Some(invert);
        self
    }

    pub fn background(mut self, background: Rgba8) -> Self {
        self.inner.background = Some(background);
        self
    }

    pub fn font_size(mut self, font_size: u32) -> Self {
        self.inner.font_size = Some(font_size);
        self
    }

    pub fn line_height(mut self, line_height: f32) -> Self {
        self.inner.line_height = Some(line_height);
        self
    }

    /// Fill defaults, then run cross-field validation.
    pub fn build(self) -> Result<ConverterConfig, AsciiFrameError> {
        let defaults = ConverterConfig::default();
        let config = ConverterConfig {
            width: self.inner.width.unwrap_or(defaults.width),
            charset: self.inner.charset.unwrap_or(defaults.charset),
            custom_charset: self.inner.custom_charset.unwrap_or(defaults.custom_charset),
            color_mode: self.inner.color_mode.unwrap_or(defaults.color_mode),
            palette_mode: self.inner.palette_mode.unwrap_or(defaults.palette_mode),
            contrast: self.inner.contrast.unwrap_or(defaults.contrast),
            brightness_percent: self.inner.brightness_percent.unwrap_or(defaults.brightness_percent),
            invert: self.inner.invert.unwrap_or(defaults.invert),
            background: self.inner.background.unwrap_or(defaults.background),
            font_size: self.inner.font_size.unwrap_or(defaults.font_size),
            line_height: self.inner.line_height.unwrap_or(defaults.line_height),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConverterConfig::default().validate().is_ok());
    }

    #[test]
    fn contrast_259_is_rejected() {
        let err = ConverterConfig::builder().contrast(259).build().unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn zero_width_is_rejected() {
        assert!(ConverterConfig::builder().width(0).build().is_err());
    }

    #[test]
    fn custom_charset_required_when_selected() {
        let err = ConverterConfig::builder()
            .charset(CharsetName::Custom)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_config");

        let ok = ConverterConfig::builder()
            .charset(CharsetName::Custom)
            .custom_charset("ab")
            .build();
        assert!(ok.is_ok());
    }
}
