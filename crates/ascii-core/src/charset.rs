use ascii_types::{AsciiFrameError, CharsetName};

const COMPONENT: &str = "Charset";

/// ASCII space and the braille-pattern-blank (U+2800) are both
/// semantically empty in every serializer.
pub const BRAILLE_BLANK: char = '\u{2800}';

const STANDARD: &str = "@%#*+=-:. ";
const DETAILED: &str = "$@B%8&WM#*oahkbdpqwmZO0QLCJUYXzcvunxrjft/\\|()1{}[]?-_+~<>i!lI;:,\"^`'. ";
const BLOCKS: &str = "█▓▒░ ";
const SIMPLE: &str = "#. ";
const BINARY: &str = "10";
const BRAILLE: &str = "⠀⠄⠆⠇⠋⠛⠟⠿";
const DOTS: &str = "⣿⣷⣯⣟⡿⢿⣻⣽⣾ ";

/// Resolves a named preset (or the literal `custom` string) to an
/// ordered, non-empty glyph ramp.
pub fn resolve(charset: CharsetName, custom: &str) -> Result<Vec<char>, AsciiFrameError> {
    let ramp: &str = match charset {
        CharsetName::Standard => STANDARD,
        CharsetName::Detailed => DETAILED,
        CharsetName::Blocks => BLOCKS,
        CharsetName::Simple => SIMPLE,
        CharsetName::Binary => BINARY,
        CharsetName::Braille => BRAILLE,
        CharsetName::Dots => DOTS,
        CharsetName::Custom => custom,
    };

    let glyphs: Vec<char> = ramp.chars().collect();
    if glyphs.len() < 2 {
        return Err(AsciiFrameError::invalid_config(
            COMPONENT,
            "glyph set must contain at least 2 characters",
        ));
    }
    Ok(glyphs)
}

/// Normalizes a glyph to ASCII space when it's semantically blank
/// (ASCII space itself, or the braille-pattern-blank).
pub fn normalize_blank(glyph: char) -> char {
    if glyph == BRAILLE_BLANK || glyph == ' ' {
        ' '
    } else {
        glyph
    }
}

pub fn is_blank(glyph: char) -> bool {
    normalize_blank(glyph) == ' '
}
