use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tubepack_core::{
    DirectorySource, OutputStyle, OutputType, ProcessRequest, Processor, ProcessorConfig,
    StrategyConfig, TaskRegistry, VideoMeta,
    config::{DEFAULT_LIMIT_VALUE, DEFAULT_MAX_WORKERS},
    default_output_dir,
};

mod summary;

/// CLI wrapper for OutputType (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliOutputType {
    #[default]
    TokenLimit,
    FileLimit,
    Both,
}

impl From<CliOutputType> for OutputType {
    fn from(cli: CliOutputType) -> Self {
        match cli {
            CliOutputType::TokenLimit => OutputType::TokenLimit,
            CliOutputType::FileLimit => OutputType::FileLimit,
            CliOutputType::Both => OutputType::Both,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliOutputStyle {
    Individual,
    Combined,
    #[default]
    Both,
}

impl From<CliOutputStyle> for OutputStyle {
    fn from(cli: CliOutputStyle) -> Self {
        match cli {
            CliOutputStyle::Individual => OutputStyle::Individual,
            CliOutputStyle::Combined => OutputStyle::Combined,
            CliOutputStyle::Both => OutputStyle::Both,
        }
    }
}

#[derive(Parser)]
#[command(name = "tubepack")]
#[command(about = "Pack a channel's video transcripts into token- and file-limited text files")]
struct Cli {
    /// JSON array of videos (id, title, channelTitle, ...)
    #[arg(long)]
    videos: PathBuf,

    /// Transcript cache laid out as <dir>/<video_id>/<lang>.txt or <lang>.auto.txt
    #[arg(long)]
    transcripts: PathBuf,

    /// Preferred transcript language; falls back to the first one available
    #[arg(short, long, default_value = "en")]
    lang: String,

    /// How combined files are packed
    #[arg(long, value_enum, default_value = "token-limit")]
    output_type: CliOutputType,

    /// Tokens per file for token-limit, number of files for file-limit
    #[arg(long, default_value_t = DEFAULT_LIMIT_VALUE)]
    limit: u64,

    /// Token limit for --output-type both
    #[arg(long)]
    token_limit: Option<u64>,

    /// File limit for --output-type both
    #[arg(long)]
    file_limit: Option<usize>,

    /// Which files to write besides the all_transcripts.txt rollup
    #[arg(short, long, value_enum, default_value = "both")]
    style: CliOutputStyle,

    /// Skip videos without a transcript in --lang before fetching
    #[arg(long)]
    filter: bool,

    /// Write a single transcript file for the first video
    #[arg(long)]
    single: bool,

    /// Output directory. Defaults to the Downloads folder
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Extra directory below the output directory
    #[arg(long)]
    subdir: Option<String>,

    /// Transcripts fetched and files written concurrently
    #[arg(short, long, default_value_t = DEFAULT_MAX_WORKERS)]
    workers: usize,

    /// Print the processing report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Log more (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn strategy(&self) -> StrategyConfig {
        StrategyConfig {
            output_type: self.output_type.into(),
            limit_value: self.limit,
            token_limit: self.token_limit,
            file_limit: self.file_limit,
            output_style: self.style.into(),
        }
    }

    fn request(&self) -> ProcessRequest {
        ProcessRequest {
            language_code: self.lang.clone(),
            strategy: self.strategy(),
            filter_has_transcript: self.filter,
            is_single_video: self.single,
            output_subdir: self.subdir.clone(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn create_progress_bar(hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {wide_msg}")?
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

async fn load_videos(path: &Path) -> Result<Vec<VideoMeta>> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let videos: Vec<VideoMeta> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse video list {}", path.display()))?;
    Ok(videos)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let request = cli.request();
    // Reject bad limits before touching anything
    if let Err(e) = request.strategy.validate() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(2);
    }

    let videos = load_videos(&cli.videos).await?;
    info!(videos = videos.len(), path = %cli.videos.display(), "loaded video list");

    let config = ProcessorConfig::new(cli.output_dir.clone().unwrap_or_else(default_output_dir))
        .with_max_workers(cli.workers);
    let processor = Arc::new(Processor::new(
        Arc::new(DirectorySource::new(&cli.transcripts)),
        config,
    ));
    let output_folder = processor.output_folder(&videos, &request);

    if !cli.json {
        println!(
            "\n{}  {}\n",
            style("tubepack").cyan().bold(),
            style("Transcript Packer").dim()
        );
        println!(
            "{} {} videos from {}",
            style("✓").green().bold(),
            videos.len(),
            style(cli.videos.display()).dim()
        );
        println!("{}", style("─".repeat(60)).dim());
    }

    let start = Instant::now();
    let registry = TaskRegistry::new();
    let task = registry.spawn(move |task| async move {
        processor
            .process(&videos, &request, task.as_ref(), task.cancel_signal())
            .await
    });

    let pb = create_progress_bar(cli.json)?;
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = task.wait() => break,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                registry.cancel(task.id());
            }
            _ = ticker.tick() => {
                let info = task.info();
                pb.set_length(info.total as u64);
                pb.set_position(info.progress as u64);
                pb.set_message(info.status);
            }
        }
    }
    pb.finish_and_clear();

    let info = task.info();
    let Some(report) = info.results else {
        eprintln!(
            "{} {}",
            style("Error:").red().bold(),
            info.status.trim_start_matches("Error: ")
        );
        std::process::exit(1);
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        summary::print(&report, &output_folder, start.elapsed());
    }

    Ok(())
}
