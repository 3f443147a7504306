//! s3-sftp-relay CLI - Bulk S3 to SFTP object relay.

use clap::{Parser, Subcommand};
use s3_sftp_relay::{Config, Relay, RelayError, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "s3-sftp-relay")]
#[command(about = "Bulk S3 to SFTP object relay")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to the resumption ledger file (in-memory ledger when omitted)
    #[arg(long)]
    ledger_file: Option<PathBuf>,

    /// Output JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer all objects under the configured prefix
    Run {
        /// Override the configured key prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Override number of concurrent workers
        #[arg(long)]
        concurrency: Option<usize>,

        /// Re-transfer objects already recorded in the ledger
        #[arg(long)]
        force_retry: bool,
    },

    /// Verify the secret resolves and the SFTP endpoint accepts a session
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, RelayError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            prefix,
            concurrency,
            force_retry,
        } => {
            let mut relay = Relay::new(config);
            if let Some(prefix) = prefix {
                relay = relay.with_prefix(prefix);
            }
            if let Some(concurrency) = concurrency {
                relay = relay.with_concurrency(concurrency);
            }
            if force_retry {
                relay = relay.with_force_retry();
            }
            if let Some(path) = cli.ledger_file {
                relay = relay.with_ledger_file(path);
            }

            let cancel_token = setup_signal_handler();
            let report = relay.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                let status_msg = match report.status {
                    RunStatus::Completed => "Transfer completed!",
                    RunStatus::CompletedWithFailures => "Transfer completed with failures",
                    RunStatus::Cancelled => "Transfer cancelled",
                };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", report.run_id);
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!("  Succeeded: {}", report.succeeded);
                println!("  Skipped: {}", report.skipped);
                println!("  Bytes: {}", report.bytes_transferred);
                if !report.failed.is_empty() {
                    println!("  Failed: {}", report.failed.len());
                    for failure in &report.failed {
                        println!(
                            "    {} ({} attempts): {}",
                            failure.key, failure.attempts, failure.reason
                        );
                    }
                }
            }

            // An incomplete run still exits nonzero so schedulers re-run it.
            if report.status == RunStatus::Completed {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }

        Commands::HealthCheck => {
            let relay = Relay::new(config);
            relay.health_check().await?;
            println!("Health check passed");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (container shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    tokio::spawn(async move {
        if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
            sigint.recv().await;
            eprintln!("\nReceived SIGINT. Finishing in-flight transfers...");
            token_int.cancel();
        }
    });

    tokio::spawn(async move {
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            sigterm.recv().await;
            eprintln!("\nReceived SIGTERM. Finishing in-flight transfers...");
            token_term.cancel();
        }
    });

    cancel_token
}

/// Signal handler for non-unix targets (only Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing in-flight transfers...");
            token.cancel();
        }
    });

    cancel_token
}
