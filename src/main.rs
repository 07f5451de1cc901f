//! TTU Cache demo
//!
//! Drives a concurrent add/get/remove workload against a cache built from the
//! environment, with the periodic purger running alongside, then logs the
//! resulting statistics.
//!
//! Cache options come from `CACHE_*` variables (see `CacheConfig::from_env`);
//! the workload reads `DEMO_THREADS`, `DEMO_OPS`, `DEMO_KEYSPACE` and
//! `DEMO_PURGE_MS`.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttu_cache::{spawn_purger, Cache, CacheConfig};

// == Demo Settings ==
#[derive(Debug)]
struct Workload {
    threads: usize,
    ops: usize,
    keyspace: u64,
    purge_every: Duration,
}

impl Workload {
    fn from_env() -> Self {
        Self {
            threads: env_or("DEMO_THREADS", 4),
            ops: env_or("DEMO_OPS", 100_000),
            keyspace: env_or("DEMO_KEYSPACE", 10_000).max(1),
            purge_every: Duration::from_millis(env_or("DEMO_PURGE_MS", 1_000)),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Runs one worker's share of the workload: mostly reads, some writes, a few
/// removals.
fn run_worker(
    cache: &Cache<u64, String>,
    worker: usize,
    workload: &Workload,
) -> anyhow::Result<()> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64 ^ worker as u64;
    for _ in 0..workload.ops {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let key = state % workload.keyspace;
        match state % 10 {
            0..=5 => {
                cache.get(&key)?;
            }
            6..=8 => cache.add(key, format!("value-{}", key))?,
            _ => {
                cache.remove(&key)?;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttu_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    let workload = Workload::from_env();
    info!(?config, ?workload, "Configuration loaded");

    let cache = Arc::new(Cache::new(config).context("failed to build cache")?);
    let purger = spawn_purger(Arc::clone(&cache), workload.purge_every);

    let workload = Arc::new(workload);
    let started = Instant::now();
    let workers: Vec<_> = (0..workload.threads)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            let workload = Arc::clone(&workload);
            tokio::task::spawn_blocking(move || run_worker(&cache, worker, &workload))
        })
        .collect();

    for worker in workers {
        worker.await.context("worker panicked")??;
    }
    let elapsed = started.elapsed();

    purger.shutdown().await;
    cache.sync().context("coordinator stopped early")?;

    let stats = cache.stats();
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        expirations = stats.expirations,
        len = stats.len,
        hit_rate = stats.hit_rate(),
        "Workload complete"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    cache.stop();
    Ok(())
}
