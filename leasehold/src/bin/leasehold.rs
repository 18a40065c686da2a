use anyhow::Context;
use clap::{ArgAction, Parser};
use leasehold::{redis::RedisStore, ElectionConfig, Elector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Joins an election and reports promotions and demotions until Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "leasehold", version, about, long_about = None)]
struct Cli {
    /// Redis-compatible server holding the lease
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    url: String,

    /// Election name shared by every participant
    #[arg(long)]
    name: String,

    /// Lease lifetime in milliseconds
    #[arg(long, default_value_t = 10_000)]
    ttl_ms: u64,

    /// Delay between election attempts in milliseconds
    #[arg(long, default_value_t = 5_000)]
    wait_ms: u64,

    /// Upper bound of the random renewal delay in milliseconds
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    /// Verbose mode (-v, -vv)
    #[arg(short, action = ArgAction::Count)]
    verbosity: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);

    let store = RedisStore::connect(&cli.url)
        .await
        .with_context(|| format!("connecting to {}", cli.url))?;

    let config = ElectionConfig::new(cli.name)
        .with_ttl(Duration::from_millis(cli.ttl_ms))
        .with_wait(Duration::from_millis(cli.wait_ms))
        .with_jitter(Duration::from_millis(cli.jitter_ms));
    let (elector, mut events) = Elector::new(config, Arc::new(store))?;

    info!(key = %elector.key(), id = %elector.identity(), "starting");
    elector.start();

    loop {
        tokio::select! {
            Some(at) = events.promoted.recv() => info!(%at, "now leading"),
            Some(at) = events.demoted.recv() => warn!(%at, "no longer leading"),
            Some(err) = events.errors.recv() => error!(error = %err, "election error"),
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    // Stop may send a final demotion; keep draining while it resigns.
    let stop = elector.stop();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            result = &mut stop => {
                result.context("resigning")?;
                break;
            }
            Some(at) = events.demoted.recv() => warn!(%at, "no longer leading"),
        }
    }

    info!("resigned");
    Ok(())
}
