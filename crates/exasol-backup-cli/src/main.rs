//! exasol-backup CLI - Exasol metadata backup into SQL/CSV file trees.

use clap::{Parser, Subcommand};
use exasol_backup::{BackupError, Config, ObjectType, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "exasol-backup")]
#[command(about = "Back up Exasol metadata and small tables into SQL/CSV files")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Seconds to wait for a cancelled run to wind down (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backup
    Run {
        /// Override backup destination directory
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Override match patterns (comma-separated SCHEMA.OBJECT globs)
        #[arg(long = "match")]
        match_patterns: Option<String>,

        /// Override skip patterns
        #[arg(long = "skip")]
        skip_patterns: Option<String>,

        /// Override object types (comma-separated, e.g. tables,views)
        #[arg(long, value_delimiter = ',')]
        objects: Option<Vec<String>>,

        /// Override maximum rows for table data export (0 = never)
        #[arg(long)]
        max_table_rows: Option<u64>,

        /// Override maximum rows for view data export (0 = never)
        #[arg(long)]
        max_view_rows: Option<u64>,

        /// Remove artifacts of objects that no longer exist
        #[arg(long)]
        drop_extras: bool,
    },

    /// Validate the configuration without connecting
    Validate,

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), BackupError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::read(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            destination,
            match_patterns,
            skip_patterns,
            objects,
            max_table_rows,
            max_view_rows,
            drop_extras,
        } => {
            // Apply overrides
            if let Some(destination) = destination {
                config.backup.destination = destination;
            }
            if let Some(patterns) = match_patterns {
                config.backup.match_patterns = patterns;
            }
            if let Some(patterns) = skip_patterns {
                config.backup.skip_patterns = patterns;
            }
            if let Some(names) = objects {
                config.backup.objects = parse_object_types(&names)?;
            }
            if let Some(max) = max_table_rows {
                config.backup.max_table_rows = max;
            }
            if let Some(max) = max_view_rows {
                config.backup.max_view_rows = max;
            }
            if drop_extras {
                config.backup.drop_extras = true;
            }
            config.validate()?;

            let cancel_token = setup_signal_handler()?;
            let orchestrator = Orchestrator::connect(config).await?;
            let result = run_until_shutdown(
                orchestrator.run(cancel_token.clone()),
                &cancel_token,
                Duration::from_secs(cli.shutdown_timeout),
            )
            .await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nBackup completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Objects written: {}", result.objects_written);
                println!(
                    "  Data files: {} ({} bytes)",
                    result.data_files_written, result.bytes_exported
                );
                println!("  Files removed: {}", result.files_removed);
                for step in &result.steps {
                    println!(
                        "    {:<16} {:>6} objects {:>6} data files {:>6} removed",
                        step.object_type,
                        step.objects_written,
                        step.data_files_written,
                        step.files_removed
                    );
                }
            }
        }

        Commands::Validate => {
            config.validate()?;
            let criteria = config.backup.criteria()?;
            let objects: Vec<&str> = config
                .backup
                .selected_objects()
                .iter()
                .map(ObjectType::as_str)
                .collect();

            if cli.output_json {
                let summary = serde_json::json!({
                    "valid": true,
                    "source": config.source.display_target(),
                    "destination": config.backup.destination,
                    "objects": objects,
                    "predicate": criteria.sql_predicate(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Configuration is valid");
                println!("  Source: {}", config.source.display_target());
                println!("  Destination: {}", config.backup.destination.display());
                println!("  Objects: {}", objects.join(", "));
                println!("  Predicate: {}", criteria.sql_predicate());
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::connect(config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (Exasol): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(version) = result.database_major_version {
                    println!("    Major version: {}", version);
                }
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(BackupError::Source(
                    result.source_error.unwrap_or_else(|| "health check failed".into()),
                ));
            }
        }
    }

    Ok(())
}

fn parse_object_types(names: &[String]) -> Result<Vec<ObjectType>, BackupError> {
    names
        .iter()
        .map(|name| {
            ObjectType::parse(name)
                .ok_or_else(|| BackupError::Config(format!("unknown object type '{}'", name)))
        })
        .collect()
}

/// Await `work`, but give up `timeout` after cancellation was requested.
async fn run_until_shutdown<T>(
    work: impl std::future::Future<Output = Result<T, BackupError>>,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<T, BackupError> {
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        _ = cancel.cancelled() => {
            match tokio::time::timeout(timeout, &mut work).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Backup did not stop within {}s", timeout.as_secs());
                    Err(BackupError::Cancelled)
                }
            }
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

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, BackupError> {
    let cancel_token = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Shutting down...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, BackupError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_types() {
        let types = parse_object_types(&["tables".into(), "Views".into()]).unwrap();
        assert_eq!(types, vec![ObjectType::Tables, ObjectType::Views]);
        assert!(parse_object_types(&["indexes".into()]).is_err());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_times_out() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), BackupError> = run_until_shutdown(
            std::future::pending(),
            &cancel,
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(BackupError::Cancelled)));
    }
}
