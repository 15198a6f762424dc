//! Orchestration layer: frame sources (C5), the staged animation
//! pipeline (C9), and the uniform encoder contract (C10) that sits in
//! front of `ascii-gif` and any externally supplied video backend.

mod encoder_host;
mod frame_source;
mod pipeline;
mod timeout;

pub use encoder_host::{
    mp4_codec_for_resolution, EncoderBackend, EncoderFrame, EncoderHost, GifEncoderBackend,
    Mp4EncoderBackend, ExternalVideoEncoder,
};
pub use frame_source::{
    AnimatedImageSource, ExternalVideoDecoder, FrameSource, StillImageSource, VideoFrameSource,
};
pub use pipeline::{AnimationJob, AnimationPipeline, PipelineOutcome};
pub use timeout::with_deadline;
