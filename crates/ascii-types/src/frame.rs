use serde::{Deserialize, Serialize};

/// One decoded RGBA frame pulled from a [`FrameSource`](crate) (defined in
/// `ascii-pipeline`, which depends on this crate for the data shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub pixels: Vec<u8>, // RGBA8, row-major, stride = width * 4
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    /// Authoritative for animated stills; derived from the declared
    /// frame rate for video.
    pub delay_ms: u32,
}

impl Frame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }
}

/// Capability-set summary a [`FrameSource`] reports before iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceDescription {
    pub width: u32,
    pub height: u32,
    pub frame_count: Option<u32>,
    pub nominal_fps: Option<f32>,
}
