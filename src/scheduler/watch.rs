//! Periodic alert passes.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::{AlertChecks, RunSummary};

/// Runs a pass on every tick until Ctrl-C.
///
/// Each pass runs on the blocking pool and is awaited before the next tick,
/// so passes never overlap within a process. Ticks missed by a slow pass are
/// skipped rather than replayed.
pub struct Watcher {
    checks: Arc<AlertChecks>,
    interval: Duration,
}

impl Watcher {
    pub fn new(checks: Arc<AlertChecks>, interval: Duration) -> Self {
        Self { checks, interval }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Watching every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Watcher: stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = run_pass(self.checks.clone()).await {
                        tracing::error!("Watcher: alert pass aborted: {}", e);
                    }
                }
            }
        }
    }
}

/// Run one pass off the async executor.
pub async fn run_pass(checks: Arc<AlertChecks>) -> Result<RunSummary, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || checks.run_now()).await
}
