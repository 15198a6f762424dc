use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use ascii_core::{GlyphGrid, MarkupOptions};
use ascii_pipeline::{
    AnimatedImageSource, AnimationPipeline, EncoderHost, FrameSource, GifEncoderBackend,
    PipelineOutcome,
};
use ascii_types::{CharsetName, ColorMode, ConverterConfig, PaletteMode, Rgba8, TargetFormat};

/// Drives the character-art/animation core end-to-end: decode an input
/// image (or animated GIF), run it through the conversion/encoding
/// pipeline, and write the result to stdout or `--out`.
#[derive(Parser, Debug)]
#[command(name = "ascii-cli")]
#[command(about = "Convert images and GIFs to ASCII/character art, text, HTML markup, or GIF")]
struct Args {
    /// Input image or animated GIF path.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Output file path; defaults to stdout for text/markup output.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Output surface.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Column count of the character grid.
    #[arg(long, default_value = "80")]
    width: u32,

    /// Named glyph ramp, or `custom` paired with --custom-charset.
    #[arg(long, value_enum, default_value = "standard")]
    charset: CharsetArg,

    /// Glyph ramp used when --charset=custom, darkest first.
    #[arg(long, default_value = "")]
    custom_charset: String,

    #[arg(long, value_enum, default_value = "color")]
    color_mode: ColorModeArg,

    #[arg(long, value_enum, default_value = "full")]
    palette_mode: PaletteModeArg,

    /// Contrast percent; 259 is rejected (divide-by-zero in the curve).
    #[arg(long, default_value = "100")]
    contrast: u16,

    /// Brightness percent, 1..=400.
    #[arg(long, default_value = "100")]
    brightness: u16,

    #[arg(long)]
    invert: bool,

    /// Background RGB for --format=png, "r,g,b".
    #[arg(long, default_value = "0,0,0")]
    background: String,

    /// Monospace font file, required for --format=png/mp4.
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    #[arg(long, default_value = "14")]
    font_size: u32,

    #[arg(long, default_value = "1.0")]
    line_height: f32,

    /// Raster scale multiplier on top of --font-size, for --format=png/mp4.
    #[arg(long, default_value = "1")]
    raster_scale: u32,

    /// Target frame rate for --format=gif/mp4; native rate if omitted.
    #[arg(long)]
    fps: Option<f32>,

    /// GIF loop count; 0 = infinite. Omit for a non-looping GIF.
    #[arg(long)]
    loop_count: Option<u16>,

    /// NeuQuant sample factor, 1 (best) to 30 (fastest).
    #[arg(long, default_value = "10")]
    sample_fac: i32,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Markup,
    Png,
    Gif,
    Mp4,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CharsetArg {
    Standard,
    Detailed,
    Blocks,
    Simple,
    Binary,
    Braille,
    Dots,
    Custom,
}

impl From<CharsetArg> for CharsetName {
    fn from(v: CharsetArg) -> Self {
        match v {
            CharsetArg::Standard => CharsetName::Standard,
            CharsetArg::Detailed => CharsetName::Detailed,
            CharsetArg::Blocks => CharsetName::Blocks,
            CharsetArg::Simple => CharsetName::Simple,
            CharsetArg::Binary => CharsetName::Binary,
            CharsetArg::Braille => CharsetName::Braille,
            CharsetArg::Dots => CharsetName::Dots,
            CharsetArg::Custom => CharsetName::Custom,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorModeArg {
    Color,
    Grayscale,
}

impl From<ColorModeArg> for ColorMode {
    fn from(v: ColorModeArg) -> Self {
        match v {
            ColorModeArg::Color => ColorMode::Color,
            ColorModeArg::Grayscale => ColorMode::Grayscale,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PaletteModeArg {
    Full,
    Ansi256,
    Ansi16,
    Cga,
    Gameboy,
}

impl From<PaletteModeArg> for PaletteMode {
    fn from(v: PaletteModeArg) -> Self {
        match v {
            PaletteModeArg::Full => PaletteMode::Full,
            PaletteModeArg::Ansi256 => PaletteMode::Ansi256,
            PaletteModeArg::Ansi16 => PaletteMode::Ansi16,
            PaletteModeArg::Cga => PaletteMode::Cga,
            PaletteModeArg::Gameboy => PaletteMode::Gameboy,
        }
    }
}

fn parse_background(s: &str) -> Result<Rgba8> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        bail!("--background must be \"r,g,b\", got {s:?}");
    }
    let r: u8 = parts[0].trim().parse().context("background red component")?;
    let g: u8 = parts[1].trim().parse().context("background green component")?;
    let b: u8 = parts[2].trim().parse().context("background blue component")?;
    Ok(Rgba8::new(r, g, b, 255))
}

fn build_config(args: &Args) -> Result<ConverterConfig> {
    let background = parse_background(&args.background)?;
    let config = ConverterConfig::builder()
        .width(args.width)
        .charset(args.charset.into())
        .custom_charset(args.custom_charset.clone())
        .color_mode(args.color_mode.into())
        .palette_mode(args.palette_mode.into())
        .contrast(args.contrast)
        .brightness_percent(args.brightness)
        .invert(args.invert)
        .background(background)
        .font_size(args.font_size)
        .line_height(args.line_height)
        .build()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn write_output(out: &Option<PathBuf>, bytes: &[u8]) -> Result<()> {
    match out {
        Some(path) => fs::write(path, bytes).with_context(|| format!("writing {path:?}")),
        None => std::io::stdout().write_all(bytes).context("writing to stdout"),
    }
}

fn run_still(args: &Args, config: &ConverterConfig) -> Result<()> {
    let img = image::open(&args.input)
        .with_context(|| format!("opening {:?}", args.input))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    let grid = GlyphGrid::from_rgba(img.as_raw(), w, h, config)
        .map_err(|e| anyhow::anyhow!("conversion failed: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            let text = grid.to_text();
            write_output(&args.out, text.as_bytes())
        }
        OutputFormat::Markup => {
            let html = grid.to_colored_markup(config, MarkupOptions { standalone_document: true });
            write_output(&args.out, html.as_bytes())
        }
        OutputFormat::Png => {
            let font_path = args.font.as_ref().context("--font is required for --format=png")?;
            let font_data = fs::read(font_path).with_context(|| format!("reading {font_path:?}"))?;
            let png_bytes = grid
                .to_raster(config, &font_data, args.raster_scale.max(1))
                .map_err(|e| anyhow::anyhow!("rasterization failed: {e}"))?;
            write_output(&args.out, &png_bytes)
        }
        OutputFormat::Gif | OutputFormat::Mp4 => {
            bail!("--format=gif/mp4 requires an animated GIF input; use a still-image format or pass an animated --input")
        }
    }
}

fn run_animation(args: &Args, config: ConverterConfig) -> Result<()> {
    let gif_bytes = fs::read(&args.input).with_context(|| format!("reading {:?}", args.input))?;
    let mut source = AnimatedImageSource::open(&gif_bytes)
        .map_err(|e| anyhow::anyhow!("opening animated source: {e}"))?;
    let description = source.describe();

    let grid_width = config.width;
    let grid_height =
        ((grid_width as f32) * (description.height as f32 / description.width as f32) * 0.5).floor() as u32;

    let target_format = match args.format {
        OutputFormat::Gif => TargetFormat::Gif,
        OutputFormat::Mp4 => TargetFormat::Mp4,
        _ => unreachable!("checked by caller"),
    };

    let pipeline = AnimationPipeline::new();
    let job = pipeline.new_job(config, target_format, args.fps, args.raster_scale.max(1));

    let bytes = match args.format {
        OutputFormat::Gif => {
            let mut host = EncoderHost::new(Box::new(GifEncoderBackend::new(
                grid_width.min(u16::MAX as u32) as u16,
                grid_height.max(1).min(u16::MAX as u32) as u16,
                args.sample_fac,
                args.loop_count,
                None,
            )));
            match pipeline.run(&job, &mut source, 0, &mut host, None, None)? {
                PipelineOutcome::Completed(bytes) => bytes,
                PipelineOutcome::Cancelled => bail!("animation job was cancelled"),
            }
        }
        OutputFormat::Mp4 => {
            bail!(
                "MP4 encoding requires an external H.264 encoder/muxer (see ascii_pipeline::ExternalVideoEncoder); \
                 ascii-cli does not bundle one"
            )
        }
        _ => unreachable!("checked by caller"),
    };

    write_output(&args.out, &bytes)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    tracing::info!(input = ?args.input, format = ?args.format, "ascii-cli starting");

    let config = build_config(&args)?;

    match args.format {
        OutputFormat::Text | OutputFormat::Markup | OutputFormat::Png => run_still(&args, &config),
        OutputFormat::Gif | OutputFormat::Mp4 => run_animation(&args, config),
    }
}
