//! lumascale CLI
//!
//! Command-line interface for resizing raw planar video.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lumascale::{
    io::frame_size, DenoiseConfig, DenoisePipeline, Frame, FilterKind, PipelineBuilder,
    PixelFormat, RawFrameReader, RawFrameWriter, ResizeConfig, ResizePlan, Resolution,
    SampleRange, VideoInfo,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lumascale")]
#[command(about = "Resize-and-upscale compositor for planar video")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resize raw planar 8-bit video
    Resize {
        /// Input file ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file ("-" for stdout)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        resize: ResizeArgs,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
    },

    /// Denoise raw planar 8-bit video at its own resolution
    Denoise {
        /// Input file ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file ("-" for stdout)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        /// Noise level, 1 or 2
        #[arg(long)]
        mode: Option<u32>,

        /// Directory with noise1_model.json and noise2_model.json
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Samples use the full 0-255 range (default: limited for YUV)
        #[arg(long)]
        full: Option<bool>,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
    },

    /// Show the resize plan for a source geometry
    Info {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        resize: ResizeArgs,
    },

    /// Time synthetic frames through the pipeline
    Bench {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        resize: ResizeArgs,

        /// Number of frames to process
        #[arg(long, default_value = "30")]
        frames: u64,
    },

    /// List pixel formats and filter kernels
    Formats,
}

/// Source clip geometry
#[derive(Args)]
struct SourceArgs {
    /// Source resolution (e.g., 640x480)
    #[arg(short, long, default_value = "640x480")]
    size: Resolution,

    /// Source pixel format
    #[arg(short, long, default_value = "yuv420p")]
    format: PixelFormat,
}

impl SourceArgs {
    fn info(&self) -> VideoInfo {
        VideoInfo::new(self.size, self.format)
    }
}

/// Resize options; flags override the config file
#[derive(Args)]
struct ResizeArgs {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target width (default: twice the source)
    #[arg(long)]
    width: Option<u32>,

    /// Target height (default: twice the source)
    #[arg(long)]
    height: Option<u32>,

    /// Luma kernel
    #[arg(long)]
    filter: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    filter_param_a: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    filter_param_b: Option<f64>,

    /// Chroma kernel
    #[arg(long)]
    filter_uv: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    filter_param_a_uv: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    filter_param_b_uv: Option<f64>,

    /// Chroma siting, mpeg1 or mpeg2
    #[arg(long)]
    chroma_loc: Option<String>,

    /// Output chroma siting (default: same as --chroma-loc)
    #[arg(long)]
    chroma_loc_out: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    shift_w: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    shift_h: Option<f64>,

    /// Source window width; zero or negative insets from the full width
    #[arg(long, allow_hyphen_values = true)]
    subwidth: Option<f64>,

    /// Source window height; zero or negative insets from the full height
    #[arg(long, allow_hyphen_values = true)]
    subheight: Option<f64>,

    /// Run the enhancement this many times
    #[arg(long)]
    refine_passes: Option<u32>,

    /// waifu2x JSON model (default: identity)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Samples use the full 0-255 range (default: limited for YUV)
    #[arg(long)]
    full: Option<bool>,
}

impl ResizeArgs {
    fn load(self) -> anyhow::Result<ResizeConfig> {
        let base = match &self.config {
            Some(path) => ResizeConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ResizeConfig::default(),
        };
        let flags = ResizeConfig {
            width: self.width,
            height: self.height,
            filter: self.filter,
            filter_param_a: self.filter_param_a,
            filter_param_b: self.filter_param_b,
            filter_uv: self.filter_uv,
            filter_param_a_uv: self.filter_param_a_uv,
            filter_param_b_uv: self.filter_param_b_uv,
            chroma_loc: self.chroma_loc,
            chroma_loc_out: self.chroma_loc_out,
            shift_w: self.shift_w,
            shift_h: self.shift_h,
            subwidth: self.subwidth,
            subheight: self.subheight,
            refine_passes: self.refine_passes,
            model: self.model,
            threads: self.threads,
            full: self.full,
        };
        Ok(base.merge(flags))
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lumascale=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resize {
            input,
            output,
            source,
            resize,
            frames,
        } => cmd_resize(input, output, source.info(), resize.load()?, frames),
        Commands::Denoise {
            input,
            output,
            source,
            mode,
            model_dir,
            full,
            threads,
            frames,
        } => {
            let config = DenoiseConfig {
                mode,
                model_dir,
                full,
                threads,
            };
            cmd_denoise(input, output, source.info(), config, frames)
        }
        Commands::Info { source, resize } => cmd_info(source.info(), resize.load()?),
        Commands::Bench {
            source,
            resize,
            frames,
        } => cmd_bench(source.info(), resize.load()?, frames),
        Commands::Formats => cmd_formats(),
    }
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin().lock())));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(std::io::stdout().lock())));
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn cmd_resize(
    input: PathBuf,
    output: PathBuf,
    source: VideoInfo,
    config: ResizeConfig,
    limit: Option<u64>,
) -> anyhow::Result<()> {
    let pipeline = PipelineBuilder::new().source(source).config(config).build()?;
    let threads = pipeline.threads();

    tracing::info!(
        "Resizing {} -> {} ({} bytes per input frame, {} range)",
        input.display(),
        output.display(),
        frame_size(&source),
        pipeline.range().name()
    );

    let written = stream_frames(
        &input,
        &output,
        source,
        pipeline.range(),
        limit,
        threads * 2,
        |batch| pipeline.process_batch(batch, threads),
    )?;

    tracing::info!(
        "Wrote {} frames ({:.2} ms/frame)",
        written,
        pipeline.stats().avg_frame_ms()
    );
    Ok(())
}

fn cmd_denoise(
    input: PathBuf,
    output: PathBuf,
    source: VideoInfo,
    config: DenoiseConfig,
    limit: Option<u64>,
) -> anyhow::Result<()> {
    let pipeline = DenoisePipeline::from_config(&config, source)?;
    let threads = pipeline.threads();

    tracing::info!(
        "Denoising {} -> {} ({} range)",
        input.display(),
        output.display(),
        pipeline.range().name()
    );

    let written = stream_frames(
        &input,
        &output,
        source,
        pipeline.range(),
        limit,
        threads * 2,
        |batch| pipeline.process_batch(batch, threads),
    )?;

    tracing::info!(
        "Wrote {} frames ({:.2} ms/frame)",
        written,
        pipeline.stats().avg_frame_ms()
    );
    Ok(())
}

/// Read raw frames in batches, run `process` on each batch and write the
/// results; returns the number of frames written
fn stream_frames(
    input: &Path,
    output: &Path,
    source: VideoInfo,
    range: SampleRange,
    limit: Option<u64>,
    batch_size: usize,
    process: impl Fn(Vec<Frame>) -> lumascale::Result<Vec<Frame>>,
) -> anyhow::Result<u64> {
    let reader = RawFrameReader::new(open_input(input)?, source).with_range(range);
    let mut writer = RawFrameWriter::new(open_output(output)?).with_range(range);
    let mut frames = reader.take(limit.map_or(usize::MAX, |n| n as usize));

    loop {
        let batch = frames
            .by_ref()
            .take(batch_size)
            .collect::<lumascale::Result<Vec<Frame>>>()?;
        if batch.is_empty() {
            break;
        }
        for frame in process(batch)? {
            writer.write_frame(&frame)?;
        }
    }
    writer.flush()?;
    Ok(writer.frames_written())
}

fn cmd_info(source: VideoInfo, config: ResizeConfig) -> anyhow::Result<()> {
    let resolved = config.resolve(&source)?;
    let plan = ResizePlan::new(&resolved);

    println!("lumascale {}", lumascale::VERSION);
    println!("==============\n");
    println!("{}", plan);
    println!(
        "model:   {}",
        resolved
            .model
            .as_ref()
            .map_or_else(|| "identity".to_string(), |p| p.display().to_string())
    );
    println!("threads: {}", resolved.threads);
    println!("range:   {}", resolved.range.name());
    Ok(())
}

/// Deterministic test pattern
fn synthetic_frame(info: VideoInfo, index: u64) -> Frame {
    let mut frame = Frame::new(info.resolution, info.format).with_index(index);
    for (p, plane) in frame.planes.iter_mut().enumerate() {
        let width = plane.width();
        for (i, v) in plane.data_mut().iter_mut().enumerate() {
            let (x, y) = (i % width, i / width);
            *v = ((x * 7 + y * 13 + p * 31 + index as usize) % 256) as f32 / 255.0;
        }
    }
    frame
}

fn cmd_bench(source: VideoInfo, config: ResizeConfig, frames: u64) -> anyhow::Result<()> {
    println!("lumascale benchmark");
    println!("===================\n");

    let pipeline = PipelineBuilder::new().source(source).config(config).build()?;
    let threads = pipeline.threads();
    let target = pipeline.output_info();

    println!("Source: {} {}", source.resolution, source.format);
    println!("Target: {}", target.resolution);
    println!("Frames: {}", frames);
    println!("Threads: {}", threads);
    println!();

    let batch: Vec<Frame> = (0..frames).map(|i| synthetic_frame(source, i)).collect();

    let start = std::time::Instant::now();
    let out = pipeline.process_batch(batch, threads)?;
    let elapsed = start.elapsed();

    let fps = out.len() as f64 / elapsed.as_secs_f64();
    let stats = pipeline.stats();

    println!("Results:");
    println!("  Total time: {:.2}s", elapsed.as_secs_f64());
    println!("  Throughput: {:.1} fps", fps);
    println!("  Worker ms/frame: {:.2}", stats.avg_frame_ms());
    println!("  Frames failed: {}", stats.frames_failed);

    Ok(())
}

fn cmd_formats() -> anyhow::Result<()> {
    println!("Pixel formats");
    println!("=============\n");
    for format in PixelFormat::ALL {
        let sub = format.subsampling();
        println!(
            "  {:<8} planes: {}  chroma ratio: {}x{}",
            format.name(),
            format.plane_count(),
            sub.ratio_w(),
            sub.ratio_h()
        );
    }

    println!("\nFilter kernels");
    println!("==============\n");
    for kind in FilterKind::ALL {
        println!("  {}", kind);
    }

    println!("\nUsage: lumascale resize -i in.yuv -o out.yuv --size 640x480 --width 1280 --height 960");
    println!("       lumascale denoise -i in.yuv -o out.yuv --size 640x480 --mode 2 --model-dir models");
    Ok(())
}
