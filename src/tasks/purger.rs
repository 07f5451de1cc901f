//! Periodic Purge Task
//!
//! Background task that runs [`Cache::purge`] on a fixed interval until it
//! is stopped.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::{Cache, RouteKey};

// == Purger Handle ==
/// Controls a running purge task.
///
/// Stopping is idempotent and dropping the handle stops the task.
#[derive(Debug)]
pub struct PurgerHandle {
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Option<JoinHandle<()>>,
}

impl PurgerHandle {
    /// A handle with no task behind it.
    fn inert() -> Self {
        Self {
            stop_tx: Mutex::new(None),
            task: None,
        }
    }

    /// Signals the task to exit after its current sweep.
    pub fn stop(&self) {
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(());
        }
    }

    /// Whether a task is still running behind this handle.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Purge task ended abnormally");
            }
        }
    }
}

impl Drop for PurgerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns a task that purges expired entries from `cache` every `every`.
///
/// Each sweep runs on the blocking pool, since it waits on the recency
/// coordinator. The task keeps ticking whatever a sweep removes.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `every` - Interval between sweeps
///
/// # Returns
/// A [`PurgerHandle`] for stopping the task. The handle is inert when the
/// cache has no time-to-use or `every` is zero.
///
/// # Panics
/// Panics if called outside a tokio runtime.
pub fn spawn_purger<K, V>(cache: Arc<Cache<K, V>>, every: Duration) -> PurgerHandle
where
    K: RouteKey + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if cache.ttu().is_zero() {
        debug!("Time-to-use disabled, purger not started");
        return PurgerHandle::inert();
    }
    if every.is_zero() {
        warn!("Purge interval is zero, purger not started");
        return PurgerHandle::inert();
    }

    let (stop_tx, mut stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        info!(every_ms = every.as_millis() as u64, "Starting purge task");

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let cache = Arc::clone(&cache);
                    match tokio::task::spawn_blocking(move || cache.purge()).await {
                        Ok(0) => debug!("Purge: no expired entries found"),
                        Ok(removed) => info!(removed, "Purge: removed expired entries"),
                        Err(err) => warn!(error = %err, "Purge sweep failed"),
                    }
                }
            }
        }

        info!("Purge task stopped");
    });

    PurgerHandle {
        stop_tx: Mutex::new(Some(stop_tx)),
        task: Some(task),
    }
}
