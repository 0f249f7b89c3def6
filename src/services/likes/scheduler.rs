//! Periodic like-ledger flush.
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::repos::like_repo::LikeStore;
use crate::services::cache::CacheClient;
use crate::services::likes::LikeQueue;

async fn run_once<C: CacheClient, S: LikeStore>(queue: &LikeQueue<C, S>, trigger: &'static str) {
    if let Err(e) = queue.flush().await {
        tracing::error!(trigger, error = %e, "like flush failed; pending actions kept for next cycle");
    }
}

/// Flush every `every` until `shutdown` changes (or its sender is dropped), then flush once more.
///
/// The first tick fires immediately so a ledger left behind by a previous process is drained
/// at startup.
pub fn spawn_flush_task<C: CacheClient, S: LikeStore>(
    queue: LikeQueue<C, S>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(every_secs = every.as_secs(), "like flush task started");

        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(&queue, "schedule").await,
                _ = shutdown.changed() => break,
            }
        }

        run_once(&queue, "shutdown").await;
        tracing::info!("like flush task stopped");
    })
}
