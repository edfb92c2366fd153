//! # Mediaflow - Main Entry Point
//!
//! CLI front end over the in-memory optimization library. Reads input files
//! into memory, runs the requested operation and writes the produced bytes
//! next to the input (or to `--output`).
//!
//! ## Esempio di utilizzo:
//! ```bash
//! mediaflow optimize photo.jpg --quality 85 --max-width 1920
//! mediaflow smart photo.png --target-use web
//! mediaflow batch ./media --workers 8 --verbose
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

use mediaflow::{
    BatchOrchestrator, BoundedJobRunner, MediaKind, MediaPipeline, OptimizationOutcome,
    OptimizationProfile, OutputFormat, SheetLayout, TargetUse, ThumbnailComposer,
    ThumbnailOptions, TranscodeOptions,
};
use mediaflow::progress::{format_size, BatchStats, ProgressManager};
use mediaflow::transcoder::FfmpegTranscoder;

#[derive(Parser)]
#[command(name = "mediaflow")]
#[command(about = "Optimize images and videos, in memory, byte-for-byte")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect a file and report what it is
    Analyze {
        input: PathBuf,
    },

    /// Optimize one file with explicit settings
    Optimize {
        input: PathBuf,

        /// Encoder quality (1-100)
        #[arg(short, long, default_value = "85")]
        quality: u8,

        /// Cap width in pixels (0 = no cap)
        #[arg(long, default_value = "0")]
        max_width: u32,

        /// Cap height in pixels (0 = no cap)
        #[arg(long, default_value = "0")]
        max_height: u32,

        /// Size budget in KB (0 = unbounded)
        #[arg(long, default_value = "0")]
        max_size_kb: u64,

        /// Prefer WebP output for images without alpha
        #[arg(long)]
        webp: bool,

        /// Treat a missed size budget as failure
        #[arg(long)]
        strict: bool,

        /// JSON profile file; other flags are ignored when given
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Destination path (defaults next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze the file and optimize with an automatically chosen profile
    Smart {
        input: PathBuf,

        /// Intended use: web, mobile, print or generic
        #[arg(short, long, default_value = "web")]
        target_use: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Emit one output per quality level, progressive encoding on
    Progressive {
        input: PathBuf,

        /// Comma separated quality levels
        #[arg(short, long, default_value = "30,60,90")]
        levels: String,

        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Optimize every media file under a directory
    Batch {
        directory: PathBuf,

        /// Encoder quality (1-100)
        #[arg(short, long, default_value = "85")]
        quality: u8,

        /// Number of parallel workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Output directory (defaults to in-place siblings)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a thumbnail for an image, video or document
    Thumbnail {
        input: PathBuf,

        #[arg(long, default_value = "200")]
        width: u32,

        #[arg(long, default_value = "200")]
        height: u32,

        /// Output format: jpeg, png or webp
        #[arg(short, long, default_value = "jpeg")]
        format: String,

        /// Override the detected media kind: image, video or document
        #[arg(short, long)]
        kind: Option<String>,

        /// For videos: frame offset in seconds
        #[arg(long, default_value = "0")]
        time_offset: u32,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compose a grid of frames sampled across a video
    ContactSheet {
        input: PathBuf,

        #[arg(long, default_value = "900")]
        width: u32,

        #[arg(long, default_value = "900")]
        height: u32,

        /// Grid columns
        #[arg(long, default_value = "3")]
        grid_width: u32,

        /// Grid rows
        #[arg(long, default_value = "3")]
        grid_height: u32,

        /// Seconds between sampled frames
        #[arg(long, default_value = "10")]
        interval: u32,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transcode a video with a deadline
    Transcode {
        input: PathBuf,

        /// Video bitrate in kbps
        #[arg(short, long, default_value = "2000")]
        bitrate: u32,

        /// Video codec: h264, h265 or vp9
        #[arg(short, long, default_value = "h264")]
        codec: String,

        /// Deadline in seconds; the job is killed past it
        #[arg(long, default_value = "300")]
        deadline_secs: u64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Analyze { input } => analyze(&input),
        Command::Optimize {
            input,
            quality,
            max_width,
            max_height,
            max_size_kb,
            webp,
            strict,
            profile,
            output,
        } => {
            let profile = match profile {
                Some(path) => OptimizationProfile::from_file(&path).await?,
                None => OptimizationProfile {
                    target_quality: quality,
                    max_width,
                    max_height,
                    max_file_size_kb: max_size_kb,
                    prefer_web_format: webp,
                    strict_size_budget: strict,
                    ..Default::default()
                },
            };
            optimize_one(&input, &profile, output).await
        }
        Command::Smart {
            input,
            target_use,
            output,
        } => smart(&input, &target_use, output).await,
        Command::Progressive {
            input,
            levels,
            output_dir,
        } => progressive(&input, &levels, output_dir).await,
        Command::Batch {
            directory,
            quality,
            workers,
            output,
        } => batch(&directory, quality, workers, output).await,
        Command::Thumbnail {
            input,
            width,
            height,
            format,
            kind,
            time_offset,
            output,
        } => thumbnail(&input, width, height, &format, kind.as_deref(), time_offset, output),
        Command::ContactSheet {
            input,
            width,
            height,
            grid_width,
            grid_height,
            interval,
            output,
        } => contact_sheet(&input, width, height, grid_width, grid_height, interval, output),
        Command::Transcode {
            input,
            bitrate,
            codec,
            deadline_secs,
            output,
        } => transcode(&input, bitrate, codec, deadline_secs, output).await,
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn derived_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.{}", stem, suffix, extension))
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} ({})", path.display(), format_size(data.len() as u64));
    Ok(())
}

fn report(outcome: &OptimizationOutcome) {
    if outcome.success {
        info!(
            "✅ {} -> {} ({:.1}% saved, {:.2}x, {} pass(es), {} ms)",
            format_size(outcome.original_size),
            format_size(outcome.optimized_size),
            outcome.savings_percent(),
            outcome.compression_ratio,
            outcome.iterations,
            outcome.elapsed_ms
        );
    }
}

fn analyze(input: &Path) -> Result<()> {
    let bytes = read_input(input)?;
    let asset = MediaPipeline::new().analyze(&bytes);

    println!("kind:       {}", asset.kind);
    println!("format:     {}", asset.format.unwrap_or("unknown"));
    if asset.width > 0 && asset.height > 0 {
        println!("dimensions: {}x{}", asset.width, asset.height);
        println!("aspect:     {:.3}", asset.aspect_ratio);
    }
    println!("alpha:      {}", asset.has_alpha);
    println!("size:       {}", format_size(asset.file_size));
    Ok(())
}

async fn optimize_one(
    input: &Path,
    profile: &OptimizationProfile,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = read_input(input)?;
    let pipeline = MediaPipeline::new();
    let kind = pipeline.analyze(&bytes).kind;
    let outcome = pipeline.optimize(&bytes, kind, profile).await;

    if !outcome.success {
        anyhow::bail!(
            "Optimization failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let extension = outcome
        .format
        .map(|f| f.extension())
        .unwrap_or("mp4");
    let destination = output.unwrap_or_else(|| derived_path(input, ".optimized", extension));
    write_output(&destination, &outcome.data)?;
    report(&outcome);
    Ok(())
}

async fn smart(input: &Path, target_use: &str, output: Option<PathBuf>) -> Result<()> {
    let bytes = read_input(input)?;
    let outcome = MediaPipeline::new()
        .smart_optimize(&bytes, TargetUse::parse(target_use))
        .await;

    if !outcome.success {
        anyhow::bail!(
            "Optimization failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let extension = outcome.format.map(|f| f.extension()).unwrap_or("mp4");
    let destination = output.unwrap_or_else(|| derived_path(input, ".optimized", extension));
    write_output(&destination, &outcome.data)?;
    report(&outcome);
    Ok(())
}

async fn progressive(input: &Path, levels: &str, output_dir: Option<PathBuf>) -> Result<()> {
    let bytes = read_input(input)?;
    let levels: Vec<u8> = levels
        .split(',')
        .filter_map(|l| l.trim().parse().ok())
        .collect();
    if levels.is_empty() {
        anyhow::bail!("No valid quality levels given");
    }

    let outcomes = MediaPipeline::new()
        .generate_progressive(&bytes, &levels, &OptimizationProfile::default())
        .await;

    let directory = output_dir.unwrap_or_else(|| {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    });
    std::fs::create_dir_all(&directory)?;

    for (outcome, level) in outcomes.iter().zip(&levels) {
        if !outcome.success {
            anyhow::bail!(
                "Level {} failed: {}",
                level,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        let extension = outcome.format.map(|f| f.extension()).unwrap_or("jpg");
        let name = derived_path(input, &format!(".q{}", level), extension);
        let destination = directory.join(name.file_name().unwrap_or_default());
        write_output(&destination, &outcome.data)?;
    }
    Ok(())
}

const MEDIA_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "mp4", "mov", "avi", "mkv"];

async fn batch(
    directory: &Path,
    quality: u8,
    workers: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    if !directory.is_dir() {
        anyhow::bail!("Not a directory: {}", directory.display());
    }
    if let Some(ref output_dir) = output {
        std::fs::create_dir_all(output_dir)?;
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(directory).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_media = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_media {
            paths.push(entry.into_path());
        }
    }

    if paths.is_empty() {
        info!("No media files found under {}", directory.display());
        return Ok(());
    }
    info!("Found {} media files", paths.len());

    let pipeline = Arc::new(MediaPipeline::new());
    let mut items = Vec::with_capacity(paths.len());
    let mut kinds = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = read_input(path)?;
        kinds.push(pipeline.analyze(&bytes).kind);
        items.push(bytes);
    }

    let profile = OptimizationProfile {
        target_quality: quality,
        ..Default::default()
    };
    let orchestrator = BatchOrchestrator::new(pipeline, workers);
    let outcomes = orchestrator.run(items, kinds, &profile).await;

    let progress = ProgressManager::new(paths.len() as u64);
    let mut stats = BatchStats::new();

    for (path, outcome) in paths.iter().zip(&outcomes) {
        if outcome.success {
            stats.add_optimized(outcome.original_size, outcome.optimized_size);
            let extension = outcome.format.map(|f| f.extension()).unwrap_or("mp4");
            let destination = match &output {
                Some(dir) => dir.join(
                    derived_path(path, ".optimized", extension)
                        .file_name()
                        .unwrap_or_default(),
                ),
                None => derived_path(path, ".optimized", extension),
            };
            write_output(&destination, &outcome.data)?;
            progress.update(&format!(
                "✅ {}: {:.1}% saved",
                path.display(),
                outcome.savings_percent()
            ));
        } else {
            stats.add_error(outcome.original_size);
            progress.update(&format!(
                "❌ {}: {}",
                path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    progress.finish(&stats.format_summary());
    Ok(())
}

fn thumbnail(
    input: &Path,
    width: u32,
    height: u32,
    format: &str,
    kind_override: Option<&str>,
    time_offset: u32,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = read_input(input)?;
    let kind = match kind_override {
        Some(label) => MediaKind::parse(label),
        None => {
            let detected = MediaPipeline::new().analyze(&bytes).kind;
            // Extension is the only hint for documents; they decode as
            // nothing else.
            if detected == MediaKind::Unknown
                && input
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
            {
                MediaKind::Document
            } else {
                detected
            }
        }
    };

    let format = OutputFormat::parse(format);
    let options = ThumbnailOptions {
        width,
        height,
        format,
        time_offset_secs: time_offset,
        ..Default::default()
    };
    let outcome = ThumbnailComposer::new().single(&bytes, kind, &options);
    if !outcome.success {
        anyhow::bail!(
            "Thumbnail failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let destination = output.unwrap_or_else(|| derived_path(input, ".thumb", format.extension()));
    write_output(&destination, &outcome.data)
}

fn contact_sheet(
    input: &Path,
    width: u32,
    height: u32,
    grid_width: u32,
    grid_height: u32,
    interval: u32,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = read_input(input)?;
    let options = ThumbnailOptions {
        width,
        height,
        ..Default::default()
    };
    let layout = SheetLayout {
        grid_width,
        grid_height,
        frame_interval_secs: interval,
    };

    let outcome = ThumbnailComposer::new().contact_sheet(&bytes, &options, &layout);
    if !outcome.success {
        anyhow::bail!(
            "Contact sheet failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let destination = output.unwrap_or_else(|| derived_path(input, ".sheet", "jpg"));
    write_output(&destination, &outcome.data)
}

async fn transcode(
    input: &Path,
    bitrate: u32,
    codec: String,
    deadline_secs: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    FfmpegTranscoder::check_dependencies().await?;

    let bytes = read_input(input)?;
    let options = TranscodeOptions {
        bitrate_kbps: bitrate,
        codec,
        ..Default::default()
    };

    let spinner = ProgressManager::spinner("Transcoding...");
    let runner = BoundedJobRunner::new();
    let job = runner
        .run_video_job(
            Arc::new(MediaPipeline::new()),
            bytes,
            options,
            std::time::Duration::from_secs(deadline_secs),
        )
        .await;
    spinner.finish_and_clear();

    match job.output {
        Some(data) => {
            let destination = output.unwrap_or_else(|| derived_path(input, ".transcoded", "mp4"));
            write_output(&destination, &data)
        }
        None => anyhow::bail!(
            "Transcode job {} {:?}: {}",
            job.id,
            job.state,
            job.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}
