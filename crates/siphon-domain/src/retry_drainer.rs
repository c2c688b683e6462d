use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::ReadingStore;
use crate::write_buffer::WriteBuffer;

/// Periodic task that re-attempts every buffered point.
///
/// A point leaves the buffer only on confirmed success; failures stay for
/// the next cycle and keep aging toward their expiry. No ordering is
/// guaranteed between retried points and newly arriving live writes.
pub struct RetryDrainer {
    store: Arc<dyn ReadingStore>,
    buffer: Arc<WriteBuffer>,
    interval: Duration,
}

impl RetryDrainer {
    pub fn new(store: Arc<dyn ReadingStore>, buffer: Arc<WriteBuffer>, interval: Duration) -> Self {
        Self {
            store,
            buffer,
            interval,
        }
    }

    /// Run drain cycles on the configured interval until cancelled.
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), anyhow::Error> {
        info!(interval_secs = self.interval.as_secs(), "starting retry drainer");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh buffer is not
        // drained before anything could have been buffered.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("retry drainer stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.drain_once().await;
                }
            }
        }

        Ok(())
    }

    /// One drain cycle: snapshot the buffer, retry each point, remove only
    /// confirmed successes.
    pub async fn drain_once(&self) {
        let pending = self.buffer.snapshot();
        if pending.is_empty() {
            return;
        }

        debug!(pending = pending.len(), "retrying buffered points");

        let mut drained = 0usize;
        for (key, point) in pending {
            match self.store.write_point(&point).await {
                Ok(()) => {
                    self.buffer.remove(&key);
                    drained += 1;
                }
                Err(e) => {
                    warn!(error = %e, key = %key, "retry failed, point stays buffered");
                }
            }
        }

        if drained > 0 {
            info!(drained, remaining = self.buffer.len(), "drained buffered points");
        }
    }
}
