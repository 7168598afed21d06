//! catalog-dl command line

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use catalog_dl::config::{AacType, MvAudioType};
use catalog_dl::{
    Config, Error, Issues, Orchestrator, QualityRequest, Result, RetryPrompt, RunOptions,
    RunStats, RunSummary, Selector, Services, parse_selection, run_until_shutdown,
};

#[derive(Parser, Debug)]
#[command(name = "catalog-dl", version)]
#[command(about = "Download albums, playlists, stations and music videos from catalog URLs")]
struct Cli {
    /// Configuration file
    #[arg(long, short, env = "CATALOG_DL_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Download Dolby Atmos; tracks without it are reported unavailable
    #[arg(long, global = true, conflicts_with = "aac")]
    atmos: bool,

    /// Download AAC
    #[arg(long, global = true)]
    aac: bool,

    /// AAC flavour: aac, aac-binaural, aac-downmix or aac-lc
    #[arg(long, global = true, value_name = "TYPE")]
    aac_type: Option<AacType>,

    /// For album URLs carrying `?i=`, download only that song
    #[arg(long, global = true)]
    song: bool,

    /// Choose tracks interactively
    #[arg(long, global = true)]
    select: bool,

    /// Take every release of an artist without asking
    #[arg(long = "all-album", global = true)]
    all_album: bool,

    /// Concurrent track jobs per entity
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Codec priority, comma separated (e.g. alac,ec-3,mp4a.40.2)
    #[arg(long, global = true, value_delimiter = ',')]
    codec_priority: Option<Vec<String>>,

    /// Highest ALAC sample rate
    #[arg(long, global = true)]
    alac_max: Option<u32>,

    /// Highest Atmos bitrate in kbps
    #[arg(long, global = true)]
    atmos_max: Option<u32>,

    /// Highest music video height
    #[arg(long, global = true)]
    mv_max: Option<u32>,

    /// Music video audio: atmos, ac3 or aac
    #[arg(long, global = true, value_name = "TYPE")]
    mv_audio_type: Option<MvAudioType>,

    /// Output root directory
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Log level: debug, info, warn or error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long, global = true)]
    debug: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the given catalog URLs
    Rip {
        /// Album, song, playlist, station, artist or music video URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Show the codec priority, or store a new comma separated one
    CodecPriority {
        /// `show`, or a list such as `alac,ec-3,mp4a.40.2`
        #[arg(default_value = "show")]
        value: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("catalog-dl: {e}");
        return ExitCode::FAILURE;
    }

    let outcome = match &cli.command {
        Command::Rip { urls } => rip(&cli, urls).await,
        Command::CodecPriority { value } => codec_priority(&cli, value),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, error_code = e.error_code(), "run failed");
            eprintln!("catalog-dl: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.debug { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("catalog_dl={level},warn")))
        .map_err(|e| Error::Config {
            message: format!("invalid log level: {e}"),
            key: None,
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let initialized = match (&cli.log_file, cli.log_format) {
        (Some(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::Config {
                    message: format!("cannot open log file {}: {e}", path.display()),
                    key: None,
                })?;
            let writer = std::sync::Mutex::new(file);
            match format {
                LogFormat::Json => builder.json().with_writer(writer).try_init(),
                LogFormat::Text => builder.with_ansi(false).with_writer(writer).try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Text) => builder.with_writer(std::io::stderr).try_init(),
    };
    initialized.map_err(|e| Error::Other(format!("Failed to initialize logging: {}", e)))
}

/// Configuration file plus command line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "configuration file not found, using defaults");
        Config::default()
    };

    let download = &mut config.download;
    if let Some(priority) = &cli.codec_priority {
        download.codec_priority = priority.clone();
    }
    if let Some(aac_type) = cli.aac_type {
        download.aac_type = aac_type;
    }
    if let Some(concurrency) = cli.concurrency {
        download.concurrency = concurrency;
    }
    if let Some(alac_max) = cli.alac_max {
        download.alac_max = alac_max;
    }
    if let Some(atmos_max) = cli.atmos_max {
        download.atmos_max = atmos_max;
    }
    if let Some(mv_max) = cli.mv_max {
        download.mv_max = mv_max;
    }
    if let Some(mv_audio_type) = cli.mv_audio_type {
        download.mv_audio_type = mv_audio_type;
    }
    if let Some(output) = &cli.output {
        download.output_folder = output.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run_options(cli: &Cli) -> RunOptions {
    let quality = if cli.atmos {
        QualityRequest::Atmos
    } else if cli.aac {
        QualityRequest::Aac
    } else {
        QualityRequest::Best
    };
    RunOptions {
        quality,
        song_only: cli.song,
        select: cli.select,
        artist_all: cli.all_album,
    }
}

async fn rip(cli: &Cli, urls: &[String]) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let console = Arc::new(Console::new());
    let services = Services::from_config(&config, console.clone())?;
    let (stats, progress) = RunStats::with_progress();
    let orchestrator = Arc::new(Orchestrator::with_stats(
        config,
        services,
        run_options(cli),
        stats,
    ));

    let stop = CancellationToken::new();
    let renderer = tokio::spawn(render_progress(
        Arc::clone(&orchestrator),
        progress,
        stop.clone(),
    ));

    let outcome = run_until_shutdown(orchestrator.run_urls(urls, console.as_ref())).await;
    stop.cancel();
    if let Err(e) = renderer.await {
        tracing::debug!(error = %e, "progress renderer ended abnormally");
    }
    eprintln!();

    let issues = orchestrator.stats().issues();
    match outcome {
        None => {
            eprintln!("Interrupted. {}", orchestrator.stats().summary());
            Ok(ExitCode::from(130))
        }
        Some(Err(e)) => {
            print!("{issues}");
            Err(e)
        }
        Some(Ok(summary)) => {
            print!("{issues}");
            println!("{summary}");
            Ok(if summary.counters.error > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// Redraw the summary line whenever the counters change
async fn render_progress(
    orchestrator: Arc<Orchestrator>,
    mut progress: tokio::sync::mpsc::Receiver<()>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            signal = progress.recv() => {
                if signal.is_none() {
                    break;
                }
                eprint!("\r{}", orchestrator.stats().summary());
            }
        }
    }
}

fn codec_priority(cli: &Cli, value: &str) -> Result<ExitCode> {
    let mut config = load_config(cli)?;
    if value == "show" {
        println!("{}", config.download.codec_priority.join(","));
        return Ok(ExitCode::SUCCESS);
    }

    let priority: Vec<String> = value
        .split(',')
        .map(|codec| codec.trim().to_string())
        .filter(|codec| !codec.is_empty())
        .collect();
    if priority.is_empty() {
        return Err(Error::Config {
            message: "codec priority must name at least one codec".into(),
            key: Some("download.codec_priority".into()),
        });
    }
    config.download.codec_priority = priority;
    config.validate()?;
    save_config(&config, &cli.config)?;
    println!("{}", config.download.codec_priority.join(","));
    Ok(ExitCode::SUCCESS)
}

fn save_config(config: &Config, path: &Path) -> Result<()> {
    let text = toml::to_string_pretty(config).map_err(|e| Error::Config {
        message: format!("cannot serialize configuration: {e}"),
        key: None,
    })?;
    std::fs::write(path, text)?;
    tracing::info!(path = %path.display(), "codec priority saved");
    Ok(())
}

/// Terminal-backed selection and retry questions
struct Console {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print `question` and read one answer; None at end of input
    async fn ask(&self, question: &str) -> Result<Option<String>> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(question.as_bytes()).await?;
        stderr.flush().await?;
        Ok(self.lines.lock().await.next_line().await?)
    }
}

#[async_trait]
impl Selector for Console {
    async fn select(&self, title: &str, items: &[String]) -> Result<Vec<usize>> {
        let mut listing = format!("\n{title}\n");
        for (index, item) in items.iter().enumerate() {
            listing.push_str(&format!("{:>4}) {item}\n", index + 1));
        }
        eprint!("{listing}");

        loop {
            let Some(answer) = self.ask("Select (e.g. 1,3-5; empty for all): ").await? else {
                return Ok(Vec::new());
            };
            match parse_selection(&answer, items.len()) {
                Ok(positions) => return Ok(positions),
                Err(e) => eprintln!("{e}"),
            }
        }
    }
}

#[async_trait]
impl RetryPrompt for Console {
    async fn confirm_retry(&self, summary: &RunSummary, issues: &Issues) -> bool {
        eprintln!();
        eprint!("{issues}");
        eprintln!("{summary}");
        match self.ask("Retry failed items? [y/N] ").await {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "could not read answer");
                false
            }
        }
    }
}
