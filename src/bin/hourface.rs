//! Command-line entry point: one update cycle per invocation.
//!
//! Owns the process-wide concerns the library deliberately does not:
//! argument and environment handling, config-path resolution, the single
//! tracing initialization point (stderr plus a file log), and mapping
//! the cycle outcome to a per-failure-class exit code.

use anyhow::Context;
use hourface::{AppConfig, RotationError, RotationPipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "HOURFACE_CONFIG";

/// Environment variable naming the log directory (default: current dir).
const LOG_DIR_ENV: &str = "HOURFACE_LOG_DIR";

const USAGE: &str = "\
Usage: hourface [OPTIONS] [CONFIG]

Runs one profile rotation cycle and exits. Recurrence is expected to
come from an external scheduler (cron or a systemd timer).

Arguments:
  [CONFIG]  Path to the TOML configuration file
            (default: $HOURFACE_CONFIG, then the user config directory)

Options:
      --check  Validate config and schedule and probe the endpoint,
               without logging in or writing anything
  -h, --help   Print this help

Exit codes:
  0 success (including \"no schedule entry this hour\")
  1 configuration, 2 liveness, 3 auth, 4 blob fetch,
  5 write conflict, 6 transport
";

#[tokio::main]
async fn main() -> ExitCode {
    let mut check = false;
    let mut config_arg: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" => check = true,
            "-h" | "--help" => {
                print!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            flag if flag.starts_with('-') => {
                eprintln!("hourface: unknown option {flag}\n");
                eprint!("{USAGE}");
                return ExitCode::from(1);
            }
            path => config_arg = Some(PathBuf::from(path)),
        }
    }

    // Keep the guard alive for the whole run so the file log is flushed
    // on the way out.
    let _guard = match init_tracing() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("hourface: {e:#}");
            return ExitCode::from(1);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "hourface starting");

    let config_path = resolve_config_path(config_arg);
    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "cannot load configuration");
            return exit_code(&e);
        }
    };

    let pipeline = RotationPipeline::new(config);
    if check {
        return match pipeline.preflight().await {
            Ok(report) => {
                info!(
                    hours = ?report.entry_hours,
                    endpoint = %report.endpoint,
                    latency_ms = report.latency_ms,
                    "preflight passed"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "preflight failed");
                exit_code(&e)
            }
        };
    }

    match pipeline.run().await {
        Ok(outcome) => {
            info!(%outcome, "run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Handled failure: report through the log and the exit
            // status, never a crash.
            error!(error = %e, "run failed");
            exit_code(&e)
        }
    }
}

/// Initialise tracing once for the whole process: human-readable output
/// on stderr plus a plain-text file log for unattended runs.
fn init_tracing() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(&log_dir, "hourface.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hourface=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    Ok(guard)
}

/// Resolve the config file path: CLI argument, then `$HOURFACE_CONFIG`,
/// then the platform config directory.
fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("hourface").join("hourface.toml"))
        .unwrap_or_else(|| PathBuf::from("hourface.toml"))
}

fn exit_code(e: &RotationError) -> ExitCode {
    ExitCode::from(e.exit_code() as u8)
}
