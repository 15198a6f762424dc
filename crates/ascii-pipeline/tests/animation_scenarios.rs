//! End-to-end scenarios mirroring scenario S5 (animated GIF in -> GIF out)
//! and S6 (video in -> MP4 out), exercising the full
//! extract/convert/encode/finalize pipeline against real encoders
//! rather than unit-level pieces.

use std::sync::mpsc;

use ascii_pipeline::{
    AnimatedImageSource, AnimationPipeline, EncoderHost, ExternalVideoDecoder, ExternalVideoEncoder,
    FrameSource, GifEncoderBackend, Mp4EncoderBackend,
};
use ascii_types::{AsciiFrameError, CharsetName, ConverterConfig, Phase, SourceDescription, TargetFormat};

fn solid_rgba(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut v = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..(w * h) {
        v.extend_from_slice(&rgba);
    }
    v
}

fn encode_gif(frames: &[[u8; 4]], delay_cs: u16, w: u16, h: u16) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, w, h, &[]).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for &color in frames {
            let mut rgba = solid_rgba(w as u32, h as u32, color);
            let mut frame = gif::Frame::from_rgba(w, h, &mut rgba);
            frame.delay = delay_cs;
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

/// S5: a 10-frame, 2x2, uniformly-100ms-delayed animated GIF, converted
/// at `width = 2` to another GIF. Expect 10 frames decoded back out,
/// each a 100ms delay, total duration 1000ms, infinite loop.
#[test]
fn s5_animated_gif_round_trips_to_ten_frame_output_gif() {
    let palette: [[u8; 4]; 10] = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [255, 255, 0, 255],
        [255, 0, 255, 255],
        [0, 255, 255, 255],
        [128, 0, 0, 255],
        [0, 128, 0, 255],
        [0, 0, 128, 255],
        [255, 255, 255, 255],
    ];
    let input_gif = encode_gif(&palette, 10, 2, 2);

    let mut source = AnimatedImageSource::new(&input_gif).unwrap();
    assert_eq!(source.describe().frame_count, Some(10));

    let config = ConverterConfig::builder().width(2).charset(CharsetName::Standard).build().unwrap();

    let pipeline = AnimationPipeline::new();
    let job = pipeline.new_job(config, TargetFormat::Gif, None, 1);

    // width=2 source, h_src/w_src = 1 -> grid height = floor(2 * 1 * 0.5) = 1.
    let mut host = EncoderHost::new(Box::new(GifEncoderBackend::new(2, 1, 10, Some(0), None)));

    let (tx, rx) = mpsc::channel();
    let outcome = pipeline.run(&job, &mut source, 42, &mut host, None, Some(&tx)).unwrap();

    let bytes = match outcome {
        ascii_pipeline::PipelineOutcome::Completed(bytes) => bytes,
        ascii_pipeline::PipelineOutcome::Cancelled => panic!("expected completion"),
    };

    assert_eq!(&bytes[0..6], b"GIF89a");
    assert_eq!(*bytes.last().unwrap(), 0x3B);

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut reader = options.read_info(std::io::Cursor::new(bytes)).unwrap();

    let mut decoded_frames = 0u32;
    let mut total_delay_ms = 0u32;
    while let Some(frame) = reader.read_next_frame().unwrap() {
        assert_eq!(frame.delay, 10);
        total_delay_ms += frame.delay as u32 * 10;
        decoded_frames += 1;
    }
    assert_eq!(decoded_frames, 10);
    assert_eq!(total_delay_ms, 1000);

    let events: Vec<_> = rx.try_iter().collect();
    assert!(events.iter().any(|e| matches!(e.phase, Phase::Extracting) && e.fraction == 1.0));
    assert!(events.iter().any(|e| matches!(e.phase, Phase::Converting) && e.fraction == 1.0));
    assert!(events.iter().any(|e| matches!(e.phase, Phase::Encoding) && e.fraction == 1.0));
    assert!(events.iter().any(|e| matches!(e.phase, Phase::Finalizing) && e.fraction == 1.0));
}

struct ThirtyFrameDecoder {
    fps: f32,
    total_frames: u64,
    width: u32,
    height: u32,
}

impl ExternalVideoDecoder for ThirtyFrameDecoder {
    fn probe(&mut self) -> Result<SourceDescription, AsciiFrameError> {
        Ok(SourceDescription {
            width: self.width,
            height: self.height,
            frame_count: Some(self.total_frames as u32),
            nominal_fps: Some(self.fps),
        })
    }

    fn decode_at(&mut self, timestamp_us: u64) -> Result<Option<Vec<u8>>, AsciiFrameError> {
        let idx = (timestamp_us as f64 / 1_000_000.0 * self.fps as f64).round() as u64;
        if idx >= self.total_frames {
            return Ok(None);
        }
        Ok(Some(solid_rgba(self.width, self.height, [idx as u8, 0, 0, 255])))
    }
}

struct RecordingEncoder {
    timestamps: Vec<u64>,
    key_flags: Vec<bool>,
}

impl ExternalVideoEncoder for RecordingEncoder {
    fn add_frame(&mut self, _pixels: &[u8], timestamp_us: u64, _duration_us: u64, is_key: bool) -> Result<(), AsciiFrameError> {
        self.timestamps.push(timestamp_us);
        self.key_flags.push(is_key);
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError> {
        Ok(vec![0u8; 128])
    }

    fn cancel(&mut self) {}
}

/// S6: a 30-frame, 30fps video. The rasterization step (`GlyphGrid ->
/// bitmap`) needs a real monospace font, which is always supplied by
/// the host application, never bundled. So this exercises the two
/// halves of the MP4 path that don't need one: `VideoFrameSource` pulling 30 samples
/// at the declared 30fps rate with timestamps 0, 33333, 66666, ... us,
/// and `EncoderHost`/`Mp4EncoderBackend` forwarding those timestamps
/// and keyframe flags through to the external encoder unchanged. The
/// font requirement itself is covered by
/// `mp4_job_without_font_data_is_invalid_config` in `pipeline.rs`.
#[test]
fn s6_thirty_frame_video_yields_thirty_declared_rate_samples() {
    let decoder = Box::new(ThirtyFrameDecoder { fps: 30.0, total_frames: 30, width: 8, height: 8 });
    let mut source = ascii_pipeline::VideoFrameSource::open(decoder).unwrap();

    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame(None).unwrap() {
        frames.push(frame);
    }
    assert_eq!(frames.len(), 30);
    for (i, frame) in frames.iter().enumerate() {
        let expected = (i as f64 * 1_000_000.0 / 30.0).round() as u64;
        assert!(
            frame.timestamp_us.abs_diff(expected) <= 1,
            "frame {i}: expected ~{expected}us, got {}us",
            frame.timestamp_us
        );
    }

    let recorder = RecordingEncoder { timestamps: Vec::new(), key_flags: Vec::new() };
    let mut host = EncoderHost::new(Box::new(Mp4EncoderBackend::new(Box::new(recorder))));

    let duration_us = (1_000_000.0 / 30.0).round() as u64;
    let keyframe_interval = (30.0f32 * 2.0).round().max(1.0) as usize;
    let encoder_frames: Vec<_> = frames
        .iter()
        .enumerate()
        .map(|(i, f)| ascii_pipeline::EncoderFrame {
            pixels_rgba: vec![0u8; 64 * 64 * 4],
            timestamp_us: f.timestamp_us,
            duration_us,
            is_key: i % keyframe_interval == 0,
        })
        .collect();

    host.add_frames(&encoder_frames).unwrap();
    let bytes = host.finalize().unwrap();
    assert!(!bytes.is_empty());

    assert_eq!(ascii_pipeline::mp4_codec_for_resolution(8 * 80, 8), "avc1.42001f");
    assert_eq!(ascii_pipeline::mp4_codec_for_resolution(1920, 1080), "avc1.640028");
}
