use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::token_manager::TokenManager;

/// Periodically renews the credential regardless of whether it is stale.
///
/// A failed tick is logged and the loop simply waits for the next one.
#[derive(Debug)]
pub struct BackgroundRefresher {
    interval: Duration,
    cancel: CancellationToken,
}

impl BackgroundRefresher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the loop to an externally owned token, e.g. the server's shutdown signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawns the loop. The first refresh happens one full interval after start.
    pub fn start(&self, manager: Arc<TokenManager>) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        let period = self.interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            tracing::info!(
                interval_secs = period.as_secs(),
                "background GigaChat token refresh started"
            );
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("background GigaChat token refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::info!("background GigaChat token refresh");
                        if let Err(err) = manager.refresh().await {
                            tracing::warn!(
                                error = %err,
                                "background token refresh failed; retrying at next tick"
                            );
                        }
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
