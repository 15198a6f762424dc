//! C5: an abstraction producing an ordered sequence of decoded RGBA
//! frames for a still image, an animated image, or a video, with
//! per-frame delay.

use std::collections::VecDeque;
use std::io::Cursor;
use std::time::Duration;

use ascii_types::{AsciiFrameError, Frame, SourceDescription};
use tracing::{debug, warn};

use crate::timeout::with_deadline;

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(9);

/// Capability set every frame source implements: describe the source
/// up front, then pull frames one at a time in order. `next_frame`
/// returning `Ok(None)` signals a clean end of sequence; `Err` aborts
/// the sequence — callers must not treat frames already returned as a
/// "complete" result when an error follows.
pub trait FrameSource: Send {
    fn describe(&self) -> SourceDescription;

    /// `target_fps`, when set, asks the source to (re)sample at that
    /// rate; `None` means "native"/"declared" rate. Implementations
    /// that need to resample decide on the first call and keep
    /// resampling consistently for the lifetime of the source.
    fn next_frame(&mut self, target_fps: Option<f32>) -> Result<Option<Frame>, AsciiFrameError>;
}

/// A single still bitmap, already decoded to RGBA by the host
/// application (still-image decoding is an external collaborator).
/// Yields exactly one frame with `delay_ms = 0`.
pub struct StillImageSource {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    emitted: bool,
}

impl StillImageSource {
    const COMPONENT: &'static str = "StillImageSource";

    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AsciiFrameError> {
        let expected = Frame::expected_len(width, height);
        if pixels.len() != expected {
            return Err(AsciiFrameError::source_open(
                Self::COMPONENT,
                format!("expected {} RGBA bytes, got {}", expected, pixels.len()),
            ));
        }
        Ok(StillImageSource { width, height, pixels, emitted: false })
    }

    /// Opens with the standard 20s source-open timeout, matching every
    /// other source variant.
    pub fn open(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AsciiFrameError> {
        with_deadline(Self::COMPONENT, DEFAULT_OPEN_TIMEOUT, move || Self::new(width, height, pixels))
    }
}

impl FrameSource for StillImageSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription { width: self.width, height: self.height, frame_count: Some(1), nominal_fps: None }
    }

    fn next_frame(&mut self, _target_fps: Option<f32>) -> Result<Option<Frame>, AsciiFrameError> {
        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;
        Ok(Some(Frame {
            pixels: self.pixels.clone(),
            width: self.width,
            height: self.height,
            timestamp_us: 0,
            delay_ms: 0,
        }))
    }
}

struct NativeFrame {
    pixels: Vec<u8>,
    delay_ms: u32,
}

/// An animated-GIF container, decoded with the `gif` crate (already in
/// the workspace dependency stack for writing; reused here for
/// reading). Frames are fully decoded and canvas-composited at
/// construction time so `next_frame` is a cheap, infallible-after-open
/// pull.
pub struct AnimatedImageSource {
    width: u32,
    height: u32,
    native: Vec<NativeFrame>,
    cursor: usize,
    resampled: Option<(f32, VecDeque<Frame>)>,
}

impl AnimatedImageSource {
    const COMPONENT: &'static str = "AnimatedImageSource";

    /// Decodes the full GIF up front, compositing each frame onto a
    /// persistent canvas according to its disposal method. A decode
    /// failure partway through is a `decode` error; no partial frame
    /// list is exposed.
    pub fn new(gif_bytes: &[u8]) -> Result<Self, AsciiFrameError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);

        let mut reader = options.read_info(Cursor::new(gif_bytes.to_vec())).map_err(|e| {
            AsciiFrameError::source_open(Self::COMPONENT, format!("not a readable GIF: {e}"))
        })?;

        let width = reader.width() as u32;
        let height = reader.height() as u32;
        let mut canvas = vec![0u8; (width * height * 4) as usize];
        let mut native = Vec::new();
        let mut prev_dispose: Option<(gif::DisposalMethod, u32, u32, u32, u32)> = None;

        loop {
            let frame = match reader.read_next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    return Err(AsciiFrameError::decode(Self::COMPONENT, format!("GIF decode failed mid-stream: {e}")));
                }
            };

            if let Some((gif::DisposalMethod::Background, left, top, w, h)) = prev_dispose {
                clear_rect(&mut canvas, width, left, top, w, h);
            }

            blit(&mut canvas, width, height, frame);
            native.push(NativeFrame { pixels: canvas.clone(), delay_ms: frame.delay as u32 * 10 });
            prev_dispose =
                Some((frame.dispose, frame.left as u32, frame.top as u32, frame.width as u32, frame.height as u32));
        }

        if native.is_empty() {
            return Err(AsciiFrameError::decode(Self::COMPONENT, "GIF contains no frames"));
        }

        debug!(stage = "C5", frames = native.len(), width, height, "Decoded animated GIF source");

        Ok(AnimatedImageSource { width, height, native, cursor: 0, resampled: None })
    }

    pub fn open(gif_bytes: &[u8]) -> Result<Self, AsciiFrameError> {
        let owned = gif_bytes.to_vec();
        with_deadline(Self::COMPONENT, DEFAULT_OPEN_TIMEOUT, move || Self::new(&owned))
    }

    fn nominal_fps(&self) -> Option<f32> {
        if self.native.len() < 2 {
            return None;
        }
        let first = self.native[0].delay_ms;
        if first == 0 || self.native.iter().any(|f| f.delay_ms != first) {
            return None;
        }
        Some(1000.0 / first as f32)
    }

    /// Builds a uniformly spaced resampling of the native timeline at
    /// `target_fps`: "when `target_fps` is provided,
    /// the source produces uniformly spaced frames."
    fn resample(&self, target_fps: f32) -> VecDeque<Frame> {
        let mut cumulative_ms: Vec<u64> = Vec::with_capacity(self.native.len() + 1);
        let mut total = 0u64;
        cumulative_ms.push(0);
        for f in &self.native {
            total += f.delay_ms.max(1) as u64;
            cumulative_ms.push(total);
        }

        let frame_duration_ms = 1000.0 / target_fps as f64;
        let frame_count = ((total as f64) / frame_duration_ms).round().max(1.0) as u64;

        let mut out = VecDeque::with_capacity(frame_count as usize);
        for i in 0..frame_count {
            let t_ms = (i as f64 * frame_duration_ms) as u64;
            let native_idx = cumulative_ms
                .windows(2)
                .position(|w| t_ms >= w[0] && t_ms < w[1])
                .unwrap_or(self.native.len() - 1)
                .min(self.native.len() - 1);

            out.push_back(Frame {
                pixels: self.native[native_idx].pixels.clone(),
                width: self.width,
                height: self.height,
                timestamp_us: (i as f64 * 1_000_000.0 / target_fps.max(0.001) as f64) as u64,
                delay_ms: frame_duration_ms.round() as u32,
            });
        }
        out
    }
}

impl FrameSource for AnimatedImageSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription {
            width: self.width,
            height: self.height,
            frame_count: Some(self.native.len() as u32),
            nominal_fps: self.nominal_fps(),
        }
    }

    fn next_frame(&mut self, target_fps: Option<f32>) -> Result<Option<Frame>, AsciiFrameError> {
        match target_fps {
            None => {
                if self.cursor >= self.native.len() {
                    return Ok(None);
                }
                let native = &self.native[self.cursor];
                let timestamp_us = self.native[..self.cursor].iter().map(|f| f.delay_ms as u64 * 1000).sum();
                self.cursor += 1;
                Ok(Some(Frame {
                    pixels: native.pixels.clone(),
                    width: self.width,
                    height: self.height,
                    timestamp_us,
                    delay_ms: native.delay_ms,
                }))
            }
            Some(fps) => {
                if self.resampled.as_ref().map(|(f, _)| *f) != Some(fps) {
                    self.resampled = Some((fps, self.resample(fps)));
                }
                let queue = &mut self.resampled.as_mut().unwrap().1;
                Ok(queue.pop_front())
            }
        }
    }
}

fn clear_rect(canvas: &mut [u8], canvas_w: u32, left: u32, top: u32, w: u32, h: u32) {
    for y in top..(top + h) {
        for x in left..(left + w) {
            let i = ((y * canvas_w + x) * 4) as usize;
            if i + 4 <= canvas.len() {
                canvas[i..i + 4].copy_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
}

fn blit(canvas: &mut [u8], canvas_w: u32, canvas_h: u32, frame: &gif::Frame) {
    for y in 0..frame.height as u32 {
        let cy = frame.top as u32 + y;
        if cy >= canvas_h {
            continue;
        }
        for x in 0..frame.width as u32 {
            let cx = frame.left as u32 + x;
            if cx >= canvas_w {
                continue;
            }
            let src = ((y * frame.width as u32 + x) * 4) as usize;
            let dst = ((cy * canvas_w + cx) * 4) as usize;
            if src + 4 <= frame.buffer.len() && dst + 4 <= canvas.len() {
                if frame.buffer[src + 3] > 0 {
                    canvas[dst..dst + 4].copy_from_slice(&frame.buffer[src..src + 4]);
                }
            }
        }
    }
}

/// Thin adapter over an externally supplied video demuxer/decoder —
/// video decoding itself is explicitly out of scope; this
/// trait is the entire contract the core depends on.
pub trait ExternalVideoDecoder: Send {
    fn probe(&mut self) -> Result<SourceDescription, AsciiFrameError>;

    /// Returns the RGBA frame nearest `timestamp_us`, or `None` once
    /// the stream is exhausted.
    fn decode_at(&mut self, timestamp_us: u64) -> Result<Option<Vec<u8>>, AsciiFrameError>;
}

/// Produces frames at `target_fps`, or the source's declared rate if
/// none is given (resolved per Open Question 1 in DESIGN.md: declared
/// rate wins over a measured one when both are available).
pub struct VideoFrameSource {
    decoder: Box<dyn ExternalVideoDecoder>,
    description: SourceDescription,
    index: u64,
}

impl VideoFrameSource {
    const COMPONENT: &'static str = "VideoFrameSource";

    pub fn open(mut decoder: Box<dyn ExternalVideoDecoder>) -> Result<Self, AsciiFrameError> {
        let (decoder, description) = with_deadline(Self::COMPONENT, DEFAULT_PROBE_TIMEOUT, move || {
            let desc = decoder.probe()?;
            Ok((decoder, desc))
        })?;

        if description.nominal_fps.is_none() {
            warn!(stage = "C5", "video source declared no frame rate; target_fps must be supplied explicitly");
        }
        Ok(VideoFrameSource { decoder, description, index: 0 })
    }

    fn effective_fps(&self, target_fps: Option<f32>) -> f32 {
        target_fps.or(self.description.nominal_fps).unwrap_or(30.0)
    }
}

impl FrameSource for VideoFrameSource {
    fn describe(&self) -> SourceDescription {
        self.description
    }

    fn next_frame(&mut self, target_fps: Option<f32>) -> Result<Option<Frame>, AsciiFrameError> {
        let fps = self.effective_fps(target_fps);
        let timestamp_us = (self.index as f64 * 1_000_000.0 / fps.max(0.001) as f64) as u64;
        let delay_ms = (1000.0 / fps as f64).round() as u32;

        match self.decoder.decode_at(timestamp_us)? {
            None => Ok(None),
            Some(pixels) => {
                self.index += 1;
                Ok(Some(Frame {
                    pixels,
                    width: self.description.width,
                    height: self.description.height,
                    timestamp_us,
                    delay_ms,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut v = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..(w * h) {
            v.extend_from_slice(&rgba);
        }
        v
    }

    #[test]
    fn still_image_yields_exactly_one_frame() {
        let mut src = StillImageSource::new(2, 2, solid_rgba(2, 2, [1, 2, 3, 255])).unwrap();
        let first = src.next_frame(None).unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().delay_ms, 0);
        assert!(src.next_frame(None).unwrap().is_none());
    }

    #[test]
    fn still_image_rejects_mismatched_buffer() {
        assert!(StillImageSource::new(2, 2, vec![0u8; 3]).is_err());
    }

    fn encode_test_gif(frames: &[[u8; 4]], delay_cs: u16) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut out, 2, 2, &[]).unwrap();
            encoder.set_repeat(gif::Repeat::Infinite).unwrap();
            for &color in frames {
                let mut rgba = solid_rgba(2, 2, color);
                let mut frame = gif::Frame::from_rgba(2, 2, &mut rgba);
                frame.delay = delay_cs;
                encoder.write_frame(&frame).unwrap();
            }
        }
        out
    }

    #[test]
    fn animated_source_reports_native_frame_count_and_fps() {
        let bytes = encode_test_gif(&[[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]], 10);
        let source = AnimatedImageSource::new(&bytes).unwrap();
        let desc = source.describe();
        assert_eq!(desc.frame_count, Some(3));
        assert_eq!(desc.nominal_fps, Some(10.0));
    }

    #[test]
    fn animated_source_native_pull_has_matching_delays() {
        let bytes = encode_test_gif(&[[255, 0, 0, 255], [0, 255, 0, 255]], 10);
        let mut source = AnimatedImageSource::new(&bytes).unwrap();
        let f0 = source.next_frame(None).unwrap().unwrap();
        let f1 = source.next_frame(None).unwrap().unwrap();
        assert_eq!(f0.delay_ms, 100);
        assert_eq!(f1.delay_ms, 100);
        assert_eq!(f1.timestamp_us, 100_000);
        assert!(source.next_frame(None).unwrap().is_none());
    }

    #[test]
    fn animated_source_resamples_to_target_fps() {
        let bytes = encode_test_gif(&[[255, 0, 0, 255], [0, 255, 0, 255]], 10);
        let mut source = AnimatedImageSource::new(&bytes).unwrap();
        let mut count = 0;
        while source.next_frame(Some(5.0)).unwrap().is_some() {
            count += 1;
        }
        assert!(count > 0);
    }

    #[test]
    fn malformed_gif_bytes_fail_source_open() {
        let err = AnimatedImageSource::new(b"not a gif").unwrap_err();
        assert_eq!(err.kind(), "source_open");
    }

    struct FakeVideoDecoder {
        fps: f32,
        total_frames: u64,
    }

    impl ExternalVideoDecoder for FakeVideoDecoder {
        fn probe(&mut self) -> Result<SourceDescription, AsciiFrameError> {
            Ok(SourceDescription { width: 4, height: 4, frame_count: Some(self.total_frames as u32), nominal_fps: Some(self.fps) })
        }

        fn decode_at(&mut self, timestamp_us: u64) -> Result<Option<Vec<u8>>, AsciiFrameError> {
            let idx = (timestamp_us as f64 / 1_000_000.0 * self.fps as f64).round() as u64;
            if idx >= self.total_frames {
                return Ok(None);
            }
            Ok(Some(vec![idx as u8; 4 * 4 * 4]))
        }
    }

    #[test]
    fn video_source_produces_monotonic_timestamps_at_declared_rate() {
        let decoder = Box::new(FakeVideoDecoder { fps: 30.0, total_frames: 5 });
        let mut source = VideoFrameSource::open(decoder).unwrap();
        let mut last_ts = None;
        let mut count = 0;
        while let Some(frame) = source.next_frame(None).unwrap() {
            if let Some(prev) = last_ts {
                assert!(frame.timestamp_us > prev);
            }
            last_ts = Some(frame.timestamp_us);
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
