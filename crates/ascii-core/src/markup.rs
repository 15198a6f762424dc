use ascii_types::{ConverterConfig, PaletteMode};

use crate::charset;
use crate::grid::GlyphGrid;
use crate::palette::PaletteTables;

/// Controls whether `to_colored_markup` wraps its `<pre>` in a full
/// `<html><body>` document or returns just the fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupOptions {
    pub standalone_document: bool,
}

fn quantized_color(rgb: [u8; 3], palette_mode: PaletteMode) -> [u8; 3] {
    let [r, g, b] = rgb;
    match palette_mode {
        PaletteMode::Full => rgb,
        PaletteMode::Ansi256 => {
            let table = PaletteTables::ansi256();
            table[PaletteTables::nearest_in_palette(r, g, b, table)]
        }
        PaletteMode::Ansi16 => {
            let table = PaletteTables::ansi16();
            table[PaletteTables::nearest_in_palette(r, g, b, table)]
        }
        PaletteMode::Cga => {
            let table = PaletteTables::cga();
            table[PaletteTables::nearest_in_palette(r, g, b, table)]
        }
        PaletteMode::Gameboy => {
            let table = PaletteTables::gameboy();
            table[PaletteTables::nearest_in_palette(r, g, b, table)]
        }
    }
}

fn escape_html(c: char, out: &mut String) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        other => out.push(other),
    }
}

impl GlyphGrid {
    /// Monospace HTML markup: runs of cells sharing a quantized color
    /// are coalesced into one `<span style="color:#rrggbb">`; blank
    /// cells emit bare (unstyled) spaces.
    pub fn to_colored_markup(&self, config: &ConverterConfig, options: MarkupOptions) -> String {
        let mut body = String::new();
        body.push_str("<pre>");

        for row in 0..self.height() {
            if row > 0 {
                body.push('\n');
            }

            let mut run_color: Option<[u8; 3]> = None;
            let mut run_text = String::new();

            let flush = |run_color: &mut Option<[u8; 3]>, run_text: &mut String, body: &mut String| {
                if run_text.is_empty() {
                    return;
                }
                match run_color.take() {
                    Some([r, g, b]) => {
                        body.push_str(&format!(
                            "<span style=\"color:#{:02x}{:02x}{:02x}\">{}</span>",
                            r, g, b, run_text
                        ));
                    }
                    None => body.push_str(run_text),
                }
                run_text.clear();
            };

            for col in 0..self.width() {
                let cell = self.cell(col, row);
                let glyph = charset::normalize_blank(cell.glyph);

                if charset::is_blank(glyph) {
                    flush(&mut run_color, &mut run_text, &mut body);
                    body.push(' ');
                    continue;
                }

                let color = quantized_color(cell.color, config.palette_mode);
                if run_color != Some(color) {
                    flush(&mut run_color, &mut run_text, &mut body);
                    run_color = Some(color);
                }
                escape_html(glyph, &mut run_text);
            }
            flush(&mut run_color, &mut run_text, &mut body);
        }

        body.push_str("</pre>");

        if options.standalone_document {
            format!("<html><body>{}</body></html>", body)
        } else {
            body
        }
    }
}
