mod byte_sink;
mod charset;
mod grid;
mod markup;
mod palette;
mod raster;
mod transform;

pub use byte_sink::ByteSink;
pub use grid::{GlyphCell, GlyphGrid};
pub use markup::MarkupOptions;
pub use palette::PaletteTables;
pub use transform::{PixelTransform, TransformedPixel};
