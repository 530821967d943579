// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::app_config::Config;
use crate::errors::ErrorKind;
use crate::file_utils::FileManager;
use crate::pipeline::{FileOutcome, SubtitlePipeline};
use crate::provider_manager::ProviderManager;

mod app_config;
mod block_codec;
mod errors;
mod file_utils;
mod language_utils;
mod pipeline;
mod provider_manager;
mod providers;
mod rate_limiter;
mod subtitle_processor;

/// Any translation or probe failure
const EXIT_FAILED: u8 = 1;
/// Configuration rejected before any work started
const EXIT_CONFIG: u8 = 2;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate subtitles using the configured providers
    Translate(TranslateArgs),

    /// Generate shell completions for sublate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["file", "dir", "test"]),
))]
struct TranslateArgs {
    /// Translate a single .srt file
    #[arg(long, value_name = "PATH")]
    file: Option<std::path::PathBuf>,

    /// Translate every .srt file under a directory, sequentially
    #[arg(long, value_name = "PATH")]
    dir: Option<std::path::PathBuf>,

    /// Validate the configuration and probe provider connectivity
    #[arg(long)]
    test: bool,

    /// Re-translate files whose output already exists
    #[arg(short, long)]
    force: bool,
}

/// Sublate - SRT subtitle translation over hosted LLM APIs
#[derive(Parser, Debug)]
#[command(name = "sublate")]
#[command(version = "0.1.0")]
#[command(about = "Translate SubRip subtitles with hosted LLM providers")]
#[command(long_about = "Sublate translates SubRip (.srt) subtitle files through OpenAI-compatible
chat completion APIs, falling back across providers by priority and keeping
request and token quotas on the client side.

EXAMPLES:
    sublate translate --file movie.srt          # Translate one subtitle file
    sublate translate --dir /media/series       # Translate a directory tree
    sublate translate --dir /media/series -f    # Re-translate existing outputs
    sublate translate --test                    # Validate config, probe providers
    sublate -v translate --file movie.srt       # Same, with debug logging
    sublate completions bash > sublate.bash     # Generate bash completions

CONFIGURATION:
    Everything comes from environment variables. Set GROQ_API_KEY and/or
    OPENROUTER_API_KEY to enable a provider; SOURCE_LANG, TARGET_LANG and
    OUTPUT_SUFFIX control languages and output naming.

SUPPORTED PROVIDERS:
    groq       - Groq API (GROQ_API_KEY)
    openrouter - OpenRouter API (OPENROUTER_API_KEY)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug level logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {}\x1B[0m", color, now, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    if CustomLogger::init(level).is_err() {
        eprintln!("failed to initialize logging");
    }

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "sublate", &mut std::io::stdout());
            ExitCode::SUCCESS
        }
        Commands::Translate(args) => run_translate(args).await,
    }
}

async fn run_translate(args: TranslateArgs) -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // Validates the config and resolves language names before any request
    let manager = match ProviderManager::from_config(&config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if args.test {
        return run_probe(&config, manager).await;
    }

    let pipeline = SubtitlePipeline::new(manager, &config).with_force(args.force);

    if let Some(file) = &args.file {
        run_file(&pipeline, file).await
    } else if let Some(dir) = &args.dir {
        run_directory(pipeline, dir).await
    } else {
        // clap's argument group guarantees one mode was picked
        error!("Nothing to do");
        ExitCode::from(EXIT_CONFIG)
    }
}

/// Print the masked config, then probe every enabled provider concurrently.
async fn run_probe(config: &Config, manager: ProviderManager) -> ExitCode {
    info!("Effective configuration:\n{}", config.masked_summary());
    debug!("Initial rate-limit ledger:\n{}", manager.snapshot());

    let results = manager.test_connections().await;
    let mut any_failed = false;
    for (name, result) in &results {
        match result {
            Ok(()) => info!("{}: ok", name),
            Err(e) => {
                any_failed = true;
                error!("{}: failed ({}): {}", name, e.kind(), e);
            }
        }
    }

    if any_failed {
        ExitCode::from(EXIT_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_file(pipeline: &SubtitlePipeline, path: &Path) -> ExitCode {
    if !FileManager::file_exists(path) {
        error!("Input file does not exist: {}", path.display());
        return ExitCode::from(EXIT_FAILED);
    }

    match pipeline.translate_file(path).await {
        Ok(FileOutcome::Translated { .. }) | Ok(FileOutcome::Skipped) => ExitCode::SUCCESS,
        Ok(FileOutcome::Failed { .. }) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            error!("{}", e);
            exit_code_for(&e)
        }
    }
}

async fn run_directory(pipeline: SubtitlePipeline, root: &Path) -> ExitCode {
    if !FileManager::dir_exists(root) {
        error!("Input directory does not exist: {}", root.display());
        return ExitCode::from(EXIT_FAILED);
    }

    let total = match pipeline.discover_inputs(root) {
        Ok(inputs) => inputs.len(),
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_FAILED);
        }
    };

    // Hidden automatically when stderr is not a terminal
    let progress_bar = build_progress_bar(total as u64);
    let pb = progress_bar.clone();
    let pipeline = pipeline.with_progress(move |done, _total| {
        pb.set_position(done as u64);
    });

    // Ctrl-C lets the in-flight file finish, remaining files are not started
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current file");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let summary = match pipeline.translate_directory(root).await {
        Ok(summary) => summary,
        Err(e) => {
            progress_bar.finish_and_clear();
            error!("{}", e);
            return exit_code_for(&e);
        }
    };
    progress_bar.finish_with_message("Directory processing complete");

    if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    }
}

fn exit_code_for(e: &errors::TranslationError) -> ExitCode {
    match e.kind() {
        ErrorKind::Configuration => ExitCode::from(EXIT_CONFIG),
        _ => ExitCode::from(EXIT_FAILED),
    }
}

fn build_progress_bar(total: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(total);
    let template_result = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(template_result.progress_chars("█▓▒░"));
    progress_bar.set_message("Translating");
    progress_bar
}
