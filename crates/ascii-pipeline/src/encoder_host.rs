//! C10: a uniform lifecycle over GIF and (externally backed) MP4
//! encoders — create, add_frames, finalize, cancel — with one state
//! machine shared by every backend.

use ascii_gif::{encode_frames_to_gif, RgbaFrame};
use ascii_types::AsciiFrameError;
use tracing::{info, instrument};

const COMPONENT: &str = "EncoderHost";

/// One frame handed to an [`EncoderBackend`]: raw RGBA pixels plus the
/// timing and keyframe metadata a video muxer needs.
#[derive(Debug, Clone)]
pub struct EncoderFrame {
    pub pixels_rgba: Vec<u8>,
    pub timestamp_us: u64,
    pub duration_us: u64,
    pub is_key: bool,
}

/// The four-op capability set every concrete encoder implements.
/// Adding a new backend means
/// implementing this trait plus a byte-stream validator.
pub trait EncoderBackend: Send {
    fn add_frames(&mut self, frames: &[EncoderFrame]) -> Result<(), AsciiFrameError>;
    fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError>;
    fn cancel(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Writing,
    Finalized,
    Cancelled,
}

/// Wraps any [`EncoderBackend`] in the shared lifecycle state machine:
/// `Created -> Writing -> Finalized`, with `Cancelled` reachable from
/// either of the first two states. `add_frames` is the only op that
/// implicitly promotes `Created -> Writing`, matching "create(...) ->
/// handle" followed immediately by frame submission.
pub struct EncoderHost {
    backend: Box<dyn EncoderBackend>,
    state: State,
}

impl EncoderHost {
    pub fn new(backend: Box<dyn EncoderBackend>) -> Self {
        EncoderHost { backend, state: State::Created }
    }

    #[instrument(level = "info", skip(self, frames))]
    pub fn add_frames(&mut self, frames: &[EncoderFrame]) -> Result<(), AsciiFrameError> {
        match self.state {
            State::Created | State::Writing => {
                self.state = State::Writing;
                self.backend.add_frames(frames)
            }
            State::Finalized => Err(AsciiFrameError::invalid_state(COMPONENT, "add_frames after finalize")),
            State::Cancelled => Err(AsciiFrameError::invalid_state(COMPONENT, "add_frames after cancel")),
        }
    }

    #[instrument(level = "info", skip(self))]
    pub fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError> {
        match self.state {
            State::Created | State::Writing => {
                let bytes = self.backend.finalize()?;
                self.state = State::Finalized;
                info!(stage = "C10", bytes = bytes.len(), "Encoder finalized");
                Ok(bytes)
            }
            State::Finalized => Err(AsciiFrameError::invalid_state(COMPONENT, "double finalize")),
            State::Cancelled => Err(AsciiFrameError::invalid_state(COMPONENT, "finalize after cancel")),
        }
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, State::Created | State::Writing) {
            self.backend.cancel();
            self.state = State::Cancelled;
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == State::Cancelled
    }
}

/// GIF backend: accumulates raw RGBA frames, then runs the full
/// NeuQuant+LZW+GIFAssembler pipeline (C6-C8) at finalize time. Output
/// is validated to start with `GIF89a` before being handed back.
pub struct GifEncoderBackend {
    width: u16,
    height: u16,
    sample_fac: i32,
    loop_count: Option<u16>,
    transparency_color: Option<[u8; 3]>,
    frames: Vec<RgbaFrame>,
    cancelled: bool,
}

impl GifEncoderBackend {
    pub fn new(width: u16, height: u16, sample_fac: i32, loop_count: Option<u16>, transparency_color: Option<[u8; 3]>) -> Self {
        GifEncoderBackend { width, height, sample_fac, loop_count, transparency_color, frames: Vec::new(), cancelled: false }
    }
}

impl EncoderBackend for GifEncoderBackend {
    fn add_frames(&mut self, frames: &[EncoderFrame]) -> Result<(), AsciiFrameError> {
        for frame in frames {
            let delay_ms = (frame.duration_us / 1000) as u32;
            self.frames.push(RgbaFrame { pixels: frame.pixels_rgba.clone(), delay_ms });
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError> {
        if self.cancelled {
            return Err(AsciiFrameError::invalid_state(COMPONENT, "finalize after cancel"));
        }
        let bytes = encode_frames_to_gif(
            &self.frames,
            self.width,
            self.height,
            self.sample_fac,
            self.loop_count,
            self.transparency_color,
        )?;
        validate_gif(&bytes)?;
        Ok(bytes)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.frames.clear();
    }
}

fn validate_gif(bytes: &[u8]) -> Result<(), AsciiFrameError> {
    let starts_ok = bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a");
    if !starts_ok {
        return Err(AsciiFrameError::encode(COMPONENT, "encoder produced a stream without a GIF87a/GIF89a header"));
    }
    Ok(())
}

/// H.264-into-MP4 is an external collaborator: this trait is
/// the entire boundary the host application implements to supply a
/// real encoder + muxer.
pub trait ExternalVideoEncoder: Send {
    fn add_frame(&mut self, pixels_rgba: &[u8], timestamp_us: u64, duration_us: u64, is_key: bool) -> Result<(), AsciiFrameError>;
    fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError>;
    fn cancel(&mut self);
}

/// Selects the H.264 profile/level codec string by output resolution,
/// by output resolution.
pub fn mp4_codec_for_resolution(width: u32, height: u32) -> &'static str {
    let pixels = width as u64 * height as u64;
    if pixels <= 720 * 1280 {
        "avc1.42001f"
    } else if pixels <= 1080 * 1920 {
        "avc1.640028"
    } else {
        "avc1.640033"
    }
}

/// Validates the state machine and delegates actual encoding to an
/// injected [`ExternalVideoEncoder`] — MP4 muxing internals are out of
/// scope; we validate only the contract boundary.
pub struct Mp4EncoderBackend {
    encoder: Box<dyn ExternalVideoEncoder>,
    cancelled: bool,
}

impl Mp4EncoderBackend {
    pub fn new(encoder: Box<dyn ExternalVideoEncoder>) -> Self {
        Mp4EncoderBackend { encoder, cancelled: false }
    }
}

impl EncoderBackend for Mp4EncoderBackend {
    fn add_frames(&mut self, frames: &[EncoderFrame]) -> Result<(), AsciiFrameError> {
        for frame in frames {
            self.encoder.add_frame(&frame.pixels_rgba, frame.timestamp_us, frame.duration_us, frame.is_key)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError> {
        if self.cancelled {
            return Err(AsciiFrameError::invalid_state(COMPONENT, "finalize after cancel"));
        }
        let bytes = self.encoder.finalize()?;
        if bytes.is_empty() {
            return Err(AsciiFrameError::encode(COMPONENT, "MP4 encoder produced an empty byte stream"));
        }
        Ok(bytes)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.encoder.cancel();
    }
}
