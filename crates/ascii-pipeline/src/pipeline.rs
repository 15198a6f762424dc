//! C9: orchestrates FrameSource -> PixelTransform -> GlyphGrid ->
//! rasterize -> EncoderHost, with progress reporting, cooperative
//! cancellation, batching, and a one-entry frame cache per source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use ascii_core::GlyphGrid;
use ascii_types::{AsciiFrameError, CancelToken, ConverterConfig, Phase, ProgressEvent, TargetFormat};
use tracing::{debug, info, span, Level};

use crate::encoder_host::{EncoderFrame, EncoderHost};
use crate::frame_source::FrameSource;

const COMPONENT: &str = "AnimationPipeline";

/// Invariant: exactly one job active per source at a time.
/// Destroyed (dropped) after encoder finalize or cancel.
pub struct AnimationJob {
    pub job_id: u64,
    pub config: ConverterConfig,
    pub format: TargetFormat,
    pub target_fps: Option<f32>,
    /// `png_scale`-equivalent used only when `format == Mp4`: the
    /// raster multiplier applied on top of `config.font_size`.
    pub raster_scale: u32,
    pub cancel: CancelToken,
}

pub enum PipelineOutcome {
    Completed(Vec<u8>),
    Cancelled,
}

struct CachedFrames {
    source_key: u64,
    fps: f32,
    frames: Vec<ascii_types::Frame>,
}

/// A converted grid paired with the timing of the frame it came from,
/// so the encode phase can submit each frame's own delay instead of a
/// `target_fps`-derived uniform duration (there may be no target_fps at
/// all, for native-rate playback).
struct TimedGrid {
    grid: GlyphGrid,
    timestamp_us: u64,
    delay_ms: u32,
}

/// Everything the public contract asks for: `start`-style
/// entry (`run`), progress in fixed phase order, best-effort
/// cancellation, and one reusable frame cache (invalidated wholesale
/// on source change or cancel).
pub struct AnimationPipeline {
    next_job_id: AtomicU64,
    cache: Mutex<Option<CachedFrames>>,
}

impl Default for AnimationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationPipeline {
    pub fn new() -> Self {
        AnimationPipeline { next_job_id: AtomicU64::new(1), cache: Mutex::new(None) }
    }

    pub fn new_job(
        &self,
        config: ConverterConfig,
        format: TargetFormat,
        target_fps: Option<f32>,
        raster_scale: u32,
    ) -> AnimationJob {
        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        AnimationJob { job_id, config, format, target_fps, raster_scale: raster_scale.max(1), cancel: CancelToken::new() }
    }

    /// Runs the full extract/convert/encode/finalize pipeline for one
    /// job against `source` (identified by `source_key`, an opaque
    /// handle the caller assigns per distinct source so the cache
    /// knows when to invalidate). `font_data` is required only when
    /// `job.format == Mp4` (video output rasterizes glyph grids;
    /// `Gif` output encodes each grid's cell colors directly).
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        job: &AnimationJob,
        source: &mut dyn FrameSource,
        source_key: u64,
        encoder_host: &mut EncoderHost,
        font_data: Option<&[u8]>,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<PipelineOutcome, AsciiFrameError> {
        let span = span!(Level::INFO, "animation_job", job_id = job.job_id);
        let _guard = span.enter();

        if matches!(job.format, TargetFormat::Mp4) && font_data.is_none() {
            return Err(AsciiFrameError::invalid_config(COMPONENT, "MP4 output requires a rasterization font"));
        }

        let raw_frames = match self.extract(job, source, source_key, progress)? {
            Some(frames) => frames,
            None => return self.finish_cancelled(job, encoder_host),
        };

        let timed_grids = match self.convert(job, &raw_frames, progress)? {
            Some(grids) => grids,
            None => return self.finish_cancelled(job, encoder_host),
        };

        if self.encode(job, &timed_grids, font_data, encoder_host, progress)?.is_none() {
            return self.finish_cancelled(job, encoder_host);
        }

        self.report(progress, job, Phase::Finalizing, 0.0);
        if job.cancel.is_cancelled() {
            return self.finish_cancelled(job, encoder_host);
        }
        let bytes = encoder_host.finalize()?;
        self.report(progress, job, Phase::Finalizing, 1.0);

        info!(stage = "C9", job_id = job.job_id, bytes = bytes.len(), "Animation job finalized");
        Ok(PipelineOutcome::Completed(bytes))
    }

    fn finish_cancelled(&self, job: &AnimationJob, encoder_host: &mut EncoderHost) -> Result<PipelineOutcome, AsciiFrameError> {
        encoder_host.cancel();
        *self.cache.lock().unwrap() = None;
        info!(stage = "C9", job_id = job.job_id, "Animation job cancelled");
        Ok(PipelineOutcome::Cancelled)
    }

    /// Phase 1: pull frames from `source`, reusing a cached extraction
    /// at `f_cached >= f_out` by downsampling with index
    /// `floor(i * f_cached / f_out)` instead of
    /// re-decoding. Returns `None` on observed cancellation.
    fn extract(
        &self,
        job: &AnimationJob,
        source: &mut dyn FrameSource,
        source_key: u64,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<Option<Vec<ascii_types::Frame>>, AsciiFrameError> {
        let f_out = job.target_fps.unwrap_or(0.0);

        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.source_key == source_key && f_out > 0.0 && cached.fps >= f_out {
                    let n = cached.frames.len();
                    let out_count = ((n as f32) * f_out / cached.fps).round().max(1.0) as usize;
                    let frames = (0..out_count)
                        .map(|i| {
                            let idx = ((i as f32 * cached.fps / f_out).floor() as usize).min(n - 1);
                            cached.frames[idx].clone()
                        })
                        .collect();
                    debug!(stage = "C9", job_id = job.job_id, "Extract phase reused cached frames");
                    return Ok(Some(frames));
                }
            }
        }

        let mut frames = Vec::new();
        let description = source.describe();
        let total_hint = description.frame_count.map(|c| c.max(1) as f32);

        let mut idx = 0usize;
        loop {
            if job.cancel.is_cancelled() {
                return Ok(None);
            }
            match source.next_frame(job.target_fps)? {
                None => break,
                Some(frame) => {
                    frames.push(frame);
                    idx += 1;
                    if let Some(total) = total_hint {
                        self.report(progress, job, Phase::Extracting, (idx as f32 / total).min(1.0));
                    }
                    if idx % 10 == 0 {
                        std::thread::yield_now();
                    }
                }
            }
        }
        self.report(progress, job, Phase::Extracting, 1.0);

        info!(stage = "C9", job_id = job.job_id, frames = frames.len(), "Extract phase complete");

        *self.cache.lock().unwrap() = Some(CachedFrames {
            source_key,
            fps: job.target_fps.or(description.nominal_fps).unwrap_or(frames.len() as f32),
            frames: frames.clone(),
        });

        Ok(Some(frames))
    }

    /// Phase 2: run PixelTransform + build a GlyphGrid per frame,
    /// carrying each source frame's own timestamp/delay forward (the
    /// encode phase must not re-derive timing from `target_fps` alone,
    /// since native-rate playback has no target_fps at all).
    fn convert(
        &self,
        job: &AnimationJob,
        frames: &[ascii_types::Frame],
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<Option<Vec<TimedGrid>>, AsciiFrameError> {
        let mut grids = Vec::with_capacity(frames.len());
        let total = frames.len().max(1) as f32;

        for (idx, frame) in frames.iter().enumerate() {
            if job.cancel.is_cancelled() {
                return Ok(None);
            }
            let grid = GlyphGrid::from_rgba(&frame.pixels, frame.width, frame.height, &job.config)?;
            grids.push(TimedGrid { grid, timestamp_us: frame.timestamp_us, delay_ms: frame.delay_ms });
            self.report(progress, job, Phase::Converting, ((idx + 1) as f32 / total).min(1.0));
            if (idx + 1) % 10 == 0 {
                std::thread::yield_now();
            }
        }

        info!(stage = "C9", job_id = job.job_id, frames = grids.len(), "Convert phase complete");
        Ok(Some(grids))
    }

    /// Phase 3: submit to the `EncoderHost` in order. GIF output
    /// submits the grid's raw cell-color array (the character art
    /// itself, at grid resolution); MP4 output rasterizes each grid to
    /// a bitmap first. Batched for GIF (>= max(12, 2*hw_threads)
    /// frames per submission); one-at-a-time for video. Timing comes
    /// from each frame's own timestamp/delay (set by `FrameSource`),
    /// not a uniform `target_fps`-derived duration — native-rate
    /// playback has no `target_fps` at all.
    fn encode(
        &self,
        job: &AnimationJob,
        grids: &[TimedGrid],
        font_data: Option<&[u8]>,
        encoder_host: &mut EncoderHost,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<Option<()>, AsciiFrameError> {
        let total = grids.len().max(1) as f32;
        let effective_fps = job.target_fps.unwrap_or_else(|| {
            grids.first().map(|g| 1000.0 / g.delay_ms.max(1) as f32).unwrap_or(30.0)
        });
        let keyframe_interval = (effective_fps * 2.0).round().max(1.0) as usize;

        let batch_size = match job.format {
            TargetFormat::Gif => hw_thread_batch_size(),
            TargetFormat::Mp4 => 1,
        };

        let mut submitted = 0usize;
        for chunk in grids.chunks(batch_size) {
            if job.cancel.is_cancelled() {
                return Ok(None);
            }

            let mut batch = Vec::with_capacity(chunk.len());
            for (offset, timed) in chunk.iter().enumerate() {
                let global_idx = submitted + offset;
                let is_key = global_idx % keyframe_interval == 0;

                let pixels_rgba = match job.format {
                    TargetFormat::Gif => grid_cells_to_rgba(&timed.grid),
                    TargetFormat::Mp4 => {
                        let font = font_data.expect("checked by caller");
                        let (_, _, pixels) = timed.grid.to_raster_rgba(&job.config, font, job.raster_scale)?;
                        pixels
                    }
                };

                batch.push(EncoderFrame {
                    pixels_rgba,
                    timestamp_us: timed.timestamp_us,
                    duration_us: timed.delay_ms as u64 * 1000,
                    is_key,
                });
            }

            if job.cancel.is_cancelled() {
                return Ok(None);
            }
            encoder_host.add_frames(&batch)?;
            submitted += chunk.len();
            self.report(progress, job, Phase::Encoding, (submitted as f32 / total).min(1.0));
        }

        info!(stage = "C9", job_id = job.job_id, frames = submitted, "Encode phase complete");
        Ok(Some(()))
    }

    fn report(&self, progress: Option<&Sender<ProgressEvent>>, job: &AnimationJob, phase: Phase, fraction: f32) {
        if let Some(sender) = progress {
            let _ = sender.send(ProgressEvent { job_id: job.job_id, phase, fraction: fraction.clamp(0.0, 1.0) });
        }
    }
}

fn hw_thread_batch_size() -> usize {
    let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    12.max(2 * hw)
}

fn grid_cells_to_rgba(grid: &GlyphGrid) -> Vec<u8> {
    let mut out = Vec::with_capacity(grid.cells().len() * 4);
    for cell in grid.cells() {
        out.extend_from_slice(&[cell.color[0], cell.color[1], cell.color[2], 255]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder_host::GifEncoderBackend;
    use crate::frame_source::StillImageSource;
    use ascii_types::CharsetName;
    use std::sync::mpsc;

    fn solid_rgba(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut v = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..(w * h) {
            v.extend_from_slice(&rgba);
        }
        v
    }

    #[test]
    fn still_image_gif_job_runs_to_completion() {
        let pipeline = AnimationPipeline::new();
        let config = ConverterConfig::builder().width(4).charset(CharsetName::Standard).build().unwrap();
        let job = pipeline.new_job(config, TargetFormat::Gif, None, 1);

        let mut source = StillImageSource::new(4, 4, solid_rgba(4, 4, [0, 0, 0, 255])).unwrap();
        let mut host = EncoderHost::new(Box::new(GifEncoderBackend::new(4, 2, 10, Some(0), None)));

        let (tx, rx) = mpsc::channel();
        let outcome = pipeline.run(&job, &mut source, 1, &mut host, None, Some(&tx)).unwrap();
        match outcome {
            PipelineOutcome::Completed(bytes) => {
                assert_eq!(&bytes[0..6], b"GIF89a");
            }
            PipelineOutcome::Cancelled => panic!("expected completion"),
        }

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e.phase, Phase::Extracting) && e.fraction == 1.0));
        assert!(events.iter().any(|e| matches!(e.phase, Phase::Finalizing) && e.fraction == 1.0));
    }

    #[test]
    fn mp4_job_without_font_data_is_invalid_config() {
        let pipeline = AnimationPipeline::new();
        let config = ConverterConfig::builder().width(4).build().unwrap();
        let job = pipeline.new_job(config, TargetFormat::Mp4, Some(30.0), 1);
        let mut source = StillImageSource::new(2, 2, solid_rgba(2, 2, [0, 0, 0, 255])).unwrap();

        struct NoopEncoder;
        impl crate::encoder_host::ExternalVideoEncoder for NoopEncoder {
            fn add_frame(&mut self, _: &[u8], _: u64, _: u64, _: bool) -> Result<(), AsciiFrameError> {
                Ok(())
            }
            fn finalize(&mut self) -> Result<Vec<u8>, AsciiFrameError> {
                Ok(vec![0u8; 16])
            }
            fn cancel(&mut self) {}
        }
        let mut host = EncoderHost::new(Box::new(crate::encoder_host::Mp4EncoderBackend::new(Box::new(NoopEncoder))));

        let err = pipeline.run(&job, &mut source, 2, &mut host, None, None).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn cancelling_before_run_yields_cancelled_outcome() {
        let pipeline = AnimationPipeline::new();
        let config = ConverterConfig::builder().width(4).build().unwrap();
        let job = pipeline.new_job(config, TargetFormat::Gif, None, 1);
        job.cancel.cancel();

        let mut source = StillImageSource::new(4, 4, solid_rgba(4, 4, [0, 0, 0, 255])).unwrap();
        let mut host = EncoderHost::new(Box::new(GifEncoderBackend::new(4, 2, 10, Some(0), None)));

        let outcome = pipeline.run(&job, &mut source, 3, &mut host, None, None).unwrap();
        assert!(matches!(outcome, PipelineOutcome::Cancelled));
        assert!(host.is_cancelled());
    }
}
