use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use taskhub::{
    config::HubConfig, feed, feed::event::EventBroadcaster, registry::TaskRegistry, rest,
    AppContext,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "taskhub",
    about = "TaskHub — real-time task progress reporting hub",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Observer feed (WebSocket) port
    #[arg(long, env = "TASKHUB_PORT")]
    port: Option<u16>,

    /// Producer update API (HTTP) port
    #[arg(long, env = "TASKHUB_API_PORT")]
    api_port: Option<u16>,

    /// Bind address for both servers (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TASKHUB_BIND")]
    bind_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKHUB_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TASKHUB_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Path to a TOML config file. Optional.
    #[arg(long, env = "TASKHUB_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the hub server (default when no subcommand given).
    ///
    /// Runs taskhub in the foreground: the observer feed on --port and the
    /// producer update API on --api-port.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once, before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = std::env::var("TASKHUB_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    match args.command {
        None | Some(Command::Serve) => {
            run_server(
                args.port,
                args.api_port,
                args.bind_address,
                args.log,
                args.config,
            )
            .await
        }
    }
}

async fn run_server(
    port: Option<u16>,
    api_port: Option<u16>,
    bind_address: Option<String>,
    log: Option<String>,
    config_path: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = Arc::new(HubConfig::new(
        port,
        api_port,
        bind_address,
        log,
        config_path.as_deref(),
    ));
    info!(version = env!("CARGO_PKG_VERSION"), "starting taskhub");

    let broadcaster = Arc::new(EventBroadcaster::new());
    let registry = Arc::new(TaskRegistry::new(broadcaster.clone()));

    let ctx = Arc::new(AppContext {
        config,
        registry,
        broadcaster,
        started_at: std::time::Instant::now(),
    });

    // The update API runs in the background; the observer feed accept loop
    // is the foreground loop and owns graceful shutdown.
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = rest::start_api_server(ctx).await {
                tracing::error!(err = %e, "update API server exited");
            }
        });
    }

    feed::run(ctx).await
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning; never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("taskhub.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only; don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e}, falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
