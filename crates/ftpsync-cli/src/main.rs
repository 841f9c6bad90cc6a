//! ftpsync - keep a local directory mirrored on an FTP server
//!
//! Performs a two-way reconciliation at startup, then watches the local tree
//! and pushes every change until interrupted.

mod display;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use ftpsync_config::{Config, ConfigBuilder, ConfigLoader, LoggingConfig};
use ftpsync_remote::{FtpClient, RemoteClient};
use ftpsync_sync::{
    EventDebouncer, FsWatcher, IncrementalSync, PathMapper, SyncEngine, SyncReport,
};
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// ftpsync - keep a local directory mirrored on an FTP server
#[derive(Parser, Debug)]
#[command(
    name = "ftpsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep a local directory mirrored on an FTP server",
    long_about = "ftpsync reconciles a local directory with a remote one, then watches\n\
                  the local tree and uploads, updates and deletes remote files as they\n\
                  change. Press Ctrl-C to stop."
)]
struct Cli {
    /// Local directory to mirror
    local_directory: PathBuf,

    /// Remote directory to mirror into
    remote_directory: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// FTP server host
    #[arg(long)]
    host: Option<String>,

    /// FTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// FTP user name
    #[arg(short, long)]
    user: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging(&cli, &config.logging)?;
    info!("ftpsync v{} starting", env!("CARGO_PKG_VERSION"));

    run(cli, config).await
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };

    if let Some(host) = &cli.host {
        config.remote.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.remote.port = port;
    }
    if let Some(user) = &cli.user {
        config.remote.username.clone_from(user);
    }

    ConfigBuilder::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

fn log_level<'a>(cli: &Cli, logging: &'a LoggingConfig) -> &'a str {
    if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level(cli, logging)))
        .context("Invalid log filter")?;

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if logging.json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let local = std::fs::canonicalize(&cli.local_directory).with_context(|| {
        format!(
            "Local directory {} is not accessible",
            cli.local_directory.display()
        )
    })?;
    if !local.is_dir() {
        bail!("{} is not a directory", local.display());
    }

    if !cli.quiet {
        display::print_banner(&local, &config.remote.address(), &cli.remote_directory);
    }

    let mapper = PathMapper::new(local.clone(), cli.remote_directory);
    let client = FtpClient::new(config.remote.clone());
    let mut engine = SyncEngine::new(client, mapper, &config.sync);

    // Started before the initial pass; edits made meanwhile reach the loop
    let debouncer = EventDebouncer::new();
    let watcher = FsWatcher::start(&local, debouncer.clone())?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let Some(report) = start_or_cancel(&mut engine, &shutdown).await? else {
        drop(watcher);
        engine.shutdown().await?;
        info!("ftpsync stopped during the initial sync");
        return Ok(());
    };
    if !cli.quiet {
        display::print_sync_stats("Initial sync", &report.stats, report.duration);
        println!();
        println!(
            "{} Watching for changes, press Ctrl-C to stop",
            style("→").green().bold()
        );
    }

    let started = Instant::now();
    let mut sync = IncrementalSync::from_config(&config.sync);
    let outcome = sync.run(&mut engine, &debouncer, shutdown).await;

    drop(watcher);
    let closed = engine.shutdown().await;

    let stats = outcome?;
    closed?;

    if !cli.quiet {
        display::print_sync_stats("Session", &stats, started.elapsed());
    }
    info!("ftpsync stopped");
    Ok(())
}

/// Run the initial pass unless `shutdown` fires first
async fn start_or_cancel<C: RemoteClient>(
    engine: &mut SyncEngine<C>,
    shutdown: &CancellationToken,
) -> Result<Option<SyncReport>> {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => Ok(None),
        report = engine.start() => Ok(Some(report?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpsync_remote::MemoryRemote;
    use rstest::rstest;

    #[test]
    fn test_parse_positional_arguments() {
        let cli = Cli::try_parse_from(["ftpsync", "/home/me/notes", "/backup/notes"]).unwrap();
        assert_eq!(cli.local_directory, PathBuf::from("/home/me/notes"));
        assert_eq!(cli.remote_directory, "/backup/notes");
        assert!(cli.host.is_none());
        assert!(!cli.debug);
    }

    #[rstest]
    #[case(&["ftpsync"])]
    #[case(&["ftpsync", "/home/me/notes"])]
    fn test_missing_arguments_are_rejected(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_connection_overrides() {
        let cli = Cli::try_parse_from([
            "ftpsync", "--host", "ftp.example.com", "-p", "21", "-u", "alice", "l", "/r",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("ftp.example.com"));
        assert_eq!(cli.port, Some(21));
        assert_eq!(cli.user.as_deref(), Some("alice"));
    }

    #[rstest]
    #[case(&["ftpsync", "-d", "l", "/r"], "debug")]
    #[case(&["ftpsync", "-v", "l", "/r"], "info")]
    #[case(&["ftpsync", "-q", "l", "/r"], "error")]
    #[case(&["ftpsync", "l", "/r"], "warn")]
    fn test_log_level_precedence(#[case] args: &[&str], #[case] expected: &str) {
        let cli = Cli::try_parse_from(args).unwrap();
        let logging = LoggingConfig {
            level: "warn".to_string(),
            json_format: false,
        };
        assert_eq!(log_level(&cli, &logging), expected);
    }

    fn memory_engine(local: &std::path::Path, remote: &MemoryRemote) -> SyncEngine<MemoryRemote> {
        SyncEngine::new(
            remote.clone(),
            PathMapper::new(local, "/r"),
            &ftpsync_config::SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_interrupt_before_initial_sync_skips_it() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"hi").unwrap();
        let remote = MemoryRemote::new();
        remote.put_dir("/r");

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut engine = memory_engine(temp_dir.path(), &remote);

        assert!(start_or_cancel(&mut engine, &shutdown).await.unwrap().is_none());
        engine.shutdown().await.unwrap();
        assert!(remote.file("/r/a.txt").is_none());
    }

    #[tokio::test]
    async fn test_initial_sync_runs_without_interrupt() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"hi").unwrap();
        let remote = MemoryRemote::new();
        remote.put_dir("/r");

        let shutdown = CancellationToken::new();
        let mut engine = memory_engine(temp_dir.path(), &remote);

        let report = start_or_cancel(&mut engine, &shutdown).await.unwrap().unwrap();
        assert_eq!(report.stats.files_uploaded, 1);
        assert_eq!(remote.file("/r/a.txt").unwrap(), b"hi");
    }
}
