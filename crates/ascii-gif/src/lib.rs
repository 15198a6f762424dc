mod assembler;
mod encoder;
mod lzw;

pub use assembler::{delay_cs_from_ms, Disposal, GifAssembler, GifFrame};
pub use encoder::{encode_frames_to_gif, RgbaFrame};
pub use lzw::encode as lzw_encode;
