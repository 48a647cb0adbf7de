mod cli;
mod progress;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediapress_core::report::summary_text;
use mediapress_core::{
    load_config, validate_config, BatchRunner, Config, CopyEncoder, Encoder, FfmpegEncoder,
};

use cli::{Cli, Commands, RunArgs};

/// Buffer size for the batch event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// Exit code when at least one file failed or was skipped
const EXIT_JOB_FAILURES: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,mediapress_core=debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load config from environment".to_string(),
    })?;

    match cli.command {
        Commands::Compress(args) => {
            args.apply(&mut config);
            validate_config(&config).context("Configuration validation failed")?;

            let encoder = FfmpegEncoder::new(config.encoder.clone());
            encoder
                .validate()
                .await
                .context("FFmpeg is not available")?;
            run_batch(Arc::new(encoder), &config, &args.run).await
        }
        Commands::Copy(args) => {
            args.apply(&mut config);
            validate_config(&config).context("Configuration validation failed")?;
            run_batch(Arc::new(CopyEncoder::new()), &config, &args).await
        }
        Commands::CheckTools => check_tools(&config).await,
        Commands::ShowConfig => {
            let text = toml::to_string_pretty(&config).context("Failed to render config")?;
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_batch(
    encoder: Arc<dyn Encoder>,
    config: &Config,
    args: &RunArgs,
) -> Result<ExitCode> {
    let options = config.batch_options();
    info!(
        encoder = encoder.name(),
        source = %options.source_dir.display(),
        output = %options.output_dir.display(),
        concurrency = options.concurrency,
        "Starting batch"
    );

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let mut runner = BatchRunner::new(encoder, options).with_cancellation(cancel);
    let printer = if args.json {
        None
    } else {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        runner = runner.with_events(tx);
        Some(tokio::spawn(progress::render(rx)))
    };

    let result = runner.run().await;
    // Closes the event channel so the printer drains and exits
    drop(runner);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    interrupt.abort();

    let summary = result.context("Batch aborted")?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to render summary")?;
        println!("{}", json);
    } else {
        println!("{}", summary_text(&summary));
    }

    if summary.has_failures() || !summary.is_complete() {
        Ok(ExitCode::from(EXIT_JOB_FAILURES))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn check_tools(config: &Config) -> Result<ExitCode> {
    let encoder = FfmpegEncoder::new(config.encoder.clone());
    match encoder.validate().await {
        Ok(()) => {
            println!("ffmpeg: {}", config.encoder.ffmpeg_path.display());
            println!("ffprobe: {}", config.encoder.ffprobe_path.display());
            println!("All tools available");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("Missing tools: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Stops new jobs from starting on Ctrl+C. Running jobs finish normally.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    warn!("Interrupt received, finishing running jobs");
    cancel.cancel();
}
