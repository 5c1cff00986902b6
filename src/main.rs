use anyhow::Context;
use clap::Parser;
use midiwatch::config::DEFAULT_CONFIG_FILE;
use midiwatch::{Config, Controller, Orchestrator, watch_root};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Watches a folder of MIDI files and rewrites them according to filename rules
#[derive(Parser)]
#[command(name = "midiwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Folder to watch recursively
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Rule file (defaults to midiwatch.ron in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Process existing files once and exit without watching
    #[arg(long)]
    once: bool,

    /// Log unchanged and suppressed files too
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path.display())),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if path.exists() {
                Ok(Config::load(&path)?)
            } else {
                tracing::info!("no {} found, using default rules", DEFAULT_CONFIG_FILE);
                Ok(Config::default())
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("cannot watch {}", cli.root.display()))?;
    let config = load_config(cli.config)?;
    let rules = config.rule_set()?;
    let filter = config.scan_filter();
    let settings = config.watch.settings();

    let orchestrator =
        Orchestrator::new(rules).with_retries(settings.read_retries, settings.retry_delay);
    let mut controller = Controller::new(orchestrator, settings);

    let files = filter.scan(&root)?;
    tracing::info!("found {} MIDI file(s) under {}", files.len(), root.display());
    let summary = controller.sweep(&files);
    if cli.once {
        if summary.failed > 0 {
            anyhow::bail!("{} file(s) could not be processed", summary.failed);
        }
        return Ok(());
    }

    let handle = controller.spawn(None);
    let _watcher = watch_root(&root, filter, handle.notifier())
        .with_context(|| format!("failed to watch {}", root.display()))?;

    handle
        .run_until(shutdown_signal())
        .context("failed to install signal handlers")?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM where available.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("received Ctrl+C, shutting down");
            }
            _ = terminate.recv() => {
                tracing::info!("received terminate signal, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl+C, shutting down");
    }
    Ok(())
}
