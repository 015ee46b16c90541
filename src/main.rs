//! frameresize CLI
//!
//! Command-line interface for trying out and benchmarking frameresize.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use frameresize::{
    CropRequest, Frame, FrameResizer, MediaTime, Orientation, PixelBuffer, PixelFormat,
    ResizeConfig, SampleTiming, StrategyKind, TimingPolicy,
};

/// Resize strategy for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Area resampling straight from the source
    Direct,
    /// Crop through the renderer, then scale
    Rendered,
}

impl From<Strategy> for StrategyKind {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Direct => StrategyKind::DirectResample,
            Strategy::Rendered => StrategyKind::RenderedCrop,
        }
    }
}

#[derive(Parser)]
#[command(name = "frameresize")]
#[command(about = "Crop and scale video frames")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crop and scale a PNG image
    Resize {
        /// Input image
        input: PathBuf,

        /// Output image
        output: PathBuf,

        /// Crop window as X,Y,WIDTHxHEIGHT (e.g., 0,0,640x480); whole image if omitted
        #[arg(long)]
        crop: Option<String>,

        /// Output size (e.g., 320x240); crop size if omitted
        #[arg(short, long)]
        scale: Option<String>,

        /// Override the configured strategy
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
    },

    /// Benchmark resizing synthetic frames
    Bench {
        /// Number of frames to resize
        #[arg(short, long, default_value = "300")]
        frames: u32,

        /// Source resolution
        #[arg(long, default_value = "1920x1080")]
        source: String,

        /// Output resolution
        #[arg(short, long, default_value = "1280x720")]
        scale: String,

        /// Override the configured strategy
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
    },

    /// List pixel formats
    Formats,

    /// Show the effective configuration
    Info,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frameresize=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Resize {
            input,
            output,
            crop,
            scale,
            strategy,
        } => cmd_resize(config, &input, &output, crop, scale, strategy),
        Commands::Bench {
            frames,
            source,
            scale,
            strategy,
        } => cmd_bench(config, frames, &source, &scale, strategy),
        Commands::Formats => cmd_formats(),
        Commands::Info => cmd_info(config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResizeConfig> {
    match path {
        Some(path) => ResizeConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ResizeConfig::default()),
    }
}

fn parse_size(s: &str) -> anyhow::Result<(i64, i64)> {
    let (w, h) = s
        .split_once('x')
        .with_context(|| format!("Invalid size '{}', expected WIDTHxHEIGHT", s))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

fn parse_crop(s: &str) -> anyhow::Result<CropRequest> {
    let mut parts = s.splitn(3, ',');
    let (Some(x), Some(y), Some(size)) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("Invalid crop '{}', expected X,Y,WIDTHxHEIGHT", s);
    };
    let (w, h) = parse_size(size)?;
    Ok(CropRequest::new(x.trim().parse()?, y.trim().parse()?, w, h))
}

fn cmd_resize(
    mut config: ResizeConfig,
    input: &Path,
    output: &Path,
    crop: Option<String>,
    scale: Option<String>,
    strategy: Option<Strategy>,
) -> anyhow::Result<()> {
    if let Some(strategy) = strategy {
        config = config.with_strategy(strategy.into());
    }

    let image = image::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let buffer = PixelBuffer::from_packed(image.into_raw(), width, height, PixelFormat::Rgba8888)?;
    let frame = Frame::new(buffer, SampleTiming::default(), Orientation::Up)?;

    let mut request = match crop {
        Some(crop) => parse_crop(&crop)?,
        None => CropRequest::new(0, 0, width as i64, height as i64),
    };
    if let Some(scale) = scale {
        let (w, h) = parse_size(&scale)?;
        request = request.with_scale(w, h);
    }

    let resizer = FrameResizer::new(config)?;
    let resized = resizer.resize_with_report(&frame, request)?;
    let out = resized.frame;

    let desc = out.buffer().lock_read()?;
    let mut pixels = Vec::with_capacity(out.width() as usize * out.height() as usize * 4);
    for y in 0..out.height() {
        let row = desc
            .row(y)
            .context("Output buffer is shorter than its height")?;
        pixels.extend_from_slice(row);
    }
    drop(desc);

    let image = image::RgbaImage::from_raw(out.width(), out.height(), pixels)
        .context("Output buffer does not match its dimensions")?;
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{}x{} -> {}x{} ({}) written to {}",
        width,
        height,
        out.width(),
        out.height(),
        resizer.strategy_kind(),
        output.display()
    );
    if resized.geometry.was_adjusted() {
        println!(
            "Crop origin moved from x={} to x={}",
            resized.geometry.requested.x, resized.geometry.crop.x
        );
    }

    Ok(())
}

fn synthetic_frame(width: u32, height: u32, index: u32) -> anyhow::Result<Frame> {
    let mut data = vec![0u8; width as usize * height as usize * 4];
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        px[0] = (x + index) as u8;
        px[1] = (y + index) as u8;
        px[2] = (x ^ y) as u8;
        px[3] = 255;
    }
    let buffer = PixelBuffer::from_packed(data, width, height, PixelFormat::Bgra8888)?;
    let timing = SampleTiming {
        presentation: MediaTime::new(index as i64, 60),
        decode: MediaTime::INVALID,
        duration: MediaTime::new(1, 60),
    };
    Ok(Frame::new(buffer, timing, Orientation::Up)?)
}

fn cmd_bench(
    mut config: ResizeConfig,
    frames: u32,
    source: &str,
    scale: &str,
    strategy: Option<Strategy>,
) -> anyhow::Result<()> {
    println!("frameresize Benchmark");
    println!("=====================\n");

    if let Some(strategy) = strategy {
        config = config.with_strategy(strategy.into());
    }
    let (src_w, src_h) = parse_size(source)?;
    let (dst_w, dst_h) = parse_size(scale)?;
    let src_w = u32::try_from(src_w).context("Source width out of range")?;
    let src_h = u32::try_from(src_h).context("Source height out of range")?;

    println!("Strategy: {}", config.strategy);
    println!("Frames: {}", frames);
    println!("Source: {}x{} BGRA", src_w, src_h);
    println!("Output: {}x{}", dst_w, dst_h);
    println!();

    // A handful of distinct frames, cycled like a capture pool
    let pool = (0..4)
        .map(|i| synthetic_frame(src_w, src_h, i))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let resizer = FrameResizer::new(config)?;
    let request = CropRequest::new(0, 0, src_w as i64, src_h as i64).with_scale(dst_w, dst_h);

    println!("Running benchmark...\n");

    let start = std::time::Instant::now();
    for i in 0..frames {
        let frame = &pool[i as usize % pool.len()];
        let _ = resizer.resize(frame, request)?;
    }
    let elapsed = start.elapsed();

    let fps = frames as f64 / elapsed.as_secs_f64();
    let ms_per_frame = elapsed.as_secs_f64() * 1000.0 / frames.max(1) as f64;

    println!("Results:");
    println!("  Total time: {:.2}s", elapsed.as_secs_f64());
    println!("  Frames/s: {:.1}", fps);
    println!("  ms/frame: {:.2}", ms_per_frame);
    println!(
        "  Realtime capable (30fps): {}",
        if fps >= 30.0 { "Yes" } else { "No" }
    );
    println!(
        "  Realtime capable (60fps): {}",
        if fps >= 60.0 { "Yes" } else { "No" }
    );

    let stats = resizer.stats();
    println!("\nResizer Stats:");
    println!("  Frames resized: {}", stats.frames_resized);
    println!("  Frames failed: {}", stats.frames_failed);
    println!("  Avg resize time: {:.2} ms", stats.avg_resize_time_ms());

    Ok(())
}

fn cmd_formats() -> anyhow::Result<()> {
    println!("Pixel Formats");
    println!("=============\n");

    for format in PixelFormat::ALL {
        let fourcc = format.fourcc().to_le_bytes();
        let support = if format.is_planar() {
            "not supported"
        } else if format.requires_even_x() {
            "crop only (rendered)"
        } else {
            "crop + scale"
        };
        println!(
            "  {}  {:<24} {} B/px  {}",
            String::from_utf8_lossy(&fourcc),
            format.display_name(),
            format.bytes_per_pixel(),
            support
        );
    }

    Ok(())
}

fn cmd_info(config: ResizeConfig) -> anyhow::Result<()> {
    println!("frameresize v{}", frameresize::VERSION);
    println!("==================\n");

    println!("Strategy: {}", config.strategy);
    println!(
        "Timing: {}",
        match config.timing {
            TimingPolicy::Preserve => "preserve source timing",
            TimingPolicy::Reset => "reset (presentation zero, rest invalid)",
        }
    );
    println!("Max dimension: {}", config.limits.max_dimension);
    println!(
        "Max allocation: {:.1} MiB",
        config.limits.max_allocation_bytes as f64 / (1024.0 * 1024.0)
    );

    println!("\n=== Config (TOML) ===");
    print!("{}", config.to_toml_string()?);

    Ok(())
}
