//! precache - command-line host for the offline cache interceptor.
//!
//! Runs the install step against the configured origin, answers single fetch
//! events cache-first, and lists what is stored.

mod format;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use precache_core::{
    CacheStorage, Config, HttpFetcher, Method, OfflineInterceptor, Request, Source, Worker,
    WorkerHandle,
};

use format::{format_size, truncate_string};

/// Width of the URL column in `list` output
const URL_COLUMN_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "precache", version, about = "Precache static assets and serve them cache-first")]
struct Cli {
    /// Origin that root-relative paths resolve against (overrides config)
    #[arg(long, global = true)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and store every precache asset
    Install,
    /// Dispatch one fetch event and write the response body to stdout
    Fetch {
        /// Root-relative path or absolute URL
        target: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
    },
    /// List caches and their entries
    List,
}

/// Initialize the tracing subscriber for logging.
/// The returned guard must stay alive for the file writer to flush.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "precache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(origin) = cli.origin {
        config.origin = origin;
    }

    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(origin = %config.origin, "precache starting");

    let storage = CacheStorage::disk(config.cache_dir()?)
        .context("Failed to open cache storage")?;

    match cli.command {
        Command::Install => {
            let worker = spawn_worker(&config, storage)?;
            install(&worker).await
        }
        Command::Fetch { target, method } => {
            let worker = spawn_worker(&config, storage)?;
            fetch(&worker, &config, &target, &method).await
        }
        Command::List => list(&storage),
    }
}

fn spawn_worker(config: &Config, storage: CacheStorage) -> Result<WorkerHandle> {
    let fetcher = HttpFetcher::new(config.request_timeout())?;
    let interceptor = OfflineInterceptor::new(storage, fetcher, config.origin_url()?);
    Ok(Worker::spawn(interceptor, config.install_policy()))
}

async fn install(worker: &WorkerHandle) -> Result<()> {
    let report = worker.install().await.context("Precache install failed")?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Installed cache '{}':", report.cache_name)?;
    for key in &report.keys {
        writeln!(stdout, "  {}", key)?;
    }
    Ok(())
}

async fn fetch(worker: &WorkerHandle, config: &Config, target: &str, method: &str) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))?;
    let request = Request::resolve(method, &config.origin_url()?, target)?;
    let url = request.url.clone();

    let served = worker
        .fetch(request)
        .await
        .with_context(|| format!("Fetch failed: {}", url))?;

    let source = match served.source {
        Source::Cache => "cache",
        Source::Network => "network",
    };
    eprintln!(
        "{} {} ({}, {})",
        served.response.status,
        url,
        source,
        format_size(served.response.body.len())
    );

    let mut stdout = io::stdout().lock();
    stdout.write_all(&served.response.body)?;
    stdout.flush()?;
    Ok(())
}

fn list(storage: &CacheStorage) -> Result<()> {
    let names = storage.names()?;
    let mut stdout = io::stdout().lock();

    if names.is_empty() {
        writeln!(stdout, "No caches. Run `precache install` first.")?;
        return Ok(());
    }

    for name in names {
        let cache = storage.open(&name)?;
        let entries = cache.entries()?;
        writeln!(stdout, "{} ({} entries)", name, entries.len())?;
        for entry in entries {
            writeln!(
                stdout,
                "  {:<width$} {:>3} {:>9}  {}",
                truncate_string(&entry.key.url, URL_COLUMN_WIDTH),
                entry.response.data.status,
                format_size(entry.response.data.body.len()),
                entry.response.age_display(),
                width = URL_COLUMN_WIDTH,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_method() {
        let cli = Cli::parse_from(["precache", "fetch", "/elm.js", "-X", "post"]);
        match cli.command {
            Command::Fetch { target, method } => {
                assert_eq!(target, "/elm.js");
                assert_eq!(method, "post");
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_global_origin_flag() {
        let cli = Cli::parse_from(["precache", "install", "--origin", "https://elm.example"]);
        assert_eq!(cli.origin.as_deref(), Some("https://elm.example"));
        assert!(matches!(cli.command, Command::Install));
    }
}
