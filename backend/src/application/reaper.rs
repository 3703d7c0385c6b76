use futures_util::future::join_all;
use futures_util::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::connections::CloseReason;
use crate::application::services::Services;

/// Periodically retires expired sessions.
pub struct ExpiryReaper {
    services: Arc<Services>,
    period: Duration,
}

impl ExpiryReaper {
    pub fn new(services: Arc<Services>, period: Duration) -> Self {
        Self { services, period }
    }

    /// One pass over the registry. Returns how many sessions were retired.
    ///
    /// Every expired session is detached before any room is released, and
    /// the releases run concurrently, so a slow room service delays neither
    /// the other sessions nor their connection teardown.
    pub async fn sweep(&self) -> usize {
        let now = self.services.now();
        let mut rooms = Vec::new();
        for session in self.services.registry.enumerate().await {
            if !session.is_expired(now) {
                continue;
            }
            if let Some(session) = self
                .services
                .detach_session(&session.id, CloseReason::SessionExpired)
                .await
            {
                rooms.push(session.room_name());
            }
        }
        let retired = rooms.len();
        join_all(rooms.iter().map(|name| self.services.release_room(name))).await;

        if retired > 0 {
            info!("reaper retired {} expired session(s)", retired);
        } else {
            debug!("reaper sweep found nothing to retire");
        }
        retired
    }

    /// Sweeps once per tick until `ticks` ends or `shutdown` fires.
    pub async fn run<S>(self, mut ticks: S, shutdown: CancellationToken)
    where
        S: Stream<Item = ()> + Unpin,
    {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                tick = ticks.next() => match tick {
                    Some(()) => {
                        self.sweep().await;
                    }
                    None => break,
                },
            }
        }
        debug!("reaper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        let ticks = interval_ticks(self.period);
        tokio::spawn(self.run(ticks, shutdown))
    }
}

/// Fixed-period ticks. The first tick fires one period after start.
pub fn interval_ticks(period: Duration) -> impl Stream<Item = ()> + Unpin {
    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Box::pin(stream::unfold(interval, |mut interval| async move {
        interval.tick().await;
        Some(((), interval))
    }))
}
