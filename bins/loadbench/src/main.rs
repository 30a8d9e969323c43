use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use loadbench_benchmark::{BenchmarkConfig, BenchmarkSession, BenchmarkSummary};
use loadbench_common::BenchError;
use loadbench_process::OutputMode;

/// Benchmark model-server cold starts: standard loading vs. the streaming loader
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model location, e.g. s3://bucket/models/llama-3-8b
    model_source: String,

    /// Streamer concurrency [default: 32]
    #[arg(long)]
    concurrency: Option<u64>,

    /// Only benchmark the streaming loader
    #[arg(long, alias = "skip-standard")]
    skip_baseline: bool,

    /// Readiness timeout per run in seconds [default: 600]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Port for the standard-loading server [default: 8001]
    #[arg(long)]
    baseline_port: Option<u16>,

    /// Port for the streaming-loader server [default: 8002]
    #[arg(long)]
    candidate_port: Option<u16>,

    /// Daily model loads used to extrapolate savings [default: 100]
    #[arg(long)]
    launches_per_day: Option<u32>,

    /// Only count a server ready once /v1/models lists the model
    #[arg(long)]
    verify_model: bool,

    /// Show the model servers' own stdout/stderr
    #[arg(long)]
    server_logs: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.debug)?;

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {}", path.display());
            BenchmarkConfig::load_from_file(path)?
        }
        None => BenchmarkConfig::default(),
    };
    apply_overrides(&args, &mut config);
    config.validate()?;

    // The running server is stopped gracefully before the session returns
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let signal = shutdown_signal().await;
        warn!("Received {}, stopping benchmark", signal);
        let _ = shutdown_tx.send(true);
    });

    let session = BenchmarkSession::from_config(&config, &args.model_source).with_shutdown(shutdown_rx);

    let summary = match session.run().await {
        Ok(summary) => summary,
        Err(BenchError::Interrupted) => {
            warn!("Benchmark abandoned, no report produced");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    print_summary(&summary, args.output)?;

    if summary.accepted(config.acceptance_threshold) {
        info!(
            "Candidate ready in under {}s",
            config.acceptance_threshold.as_secs()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            "Candidate did not become ready in under {}s",
            config.acceptance_threshold.as_secs()
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(args: &Args, config: &mut BenchmarkConfig) {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.skip_baseline {
        config.skip_baseline = true;
    }
    if let Some(secs) = args.timeout {
        config.runner.ready_timeout = Duration::from_secs(secs);
    }
    if let Some(port) = args.baseline_port {
        config.baseline.port = Some(port);
    }
    if let Some(port) = args.candidate_port {
        config.candidate.port = Some(port);
    }
    if let Some(launches) = args.launches_per_day {
        config.launches_per_day = launches;
    }
    if args.verify_model {
        config.runner.verify_model = true;
    }
    if args.server_logs {
        config.runner.server_output = OutputMode::Inherit;
    }
}

fn print_summary(summary: &BenchmarkSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", summary.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    // stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

async fn shutdown_signal() -> &'static str {
    use tokio::signal;

    #[cfg(unix)]
    {
        use signal::unix::SignalKind;

        match (
            signal::unix::signal(SignalKind::terminate()),
            signal::unix::signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => return "SIGTERM",
                    _ = sigint.recv() => return "SIGINT",
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {}", e);
            }
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => "Ctrl+C",
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending().await
        }
    }
}
