//! Deadline enforcement for timed questionnaires.
//!
//! [`DeadlineController`] runs a per-session countdown, publishing the
//! remaining seconds on a watch channel and firing exactly one expiry
//! signal (a `session.deadline_expired` event plus the
//! [`expired`](DeadlineController::expired) future resolving). The
//! driver awaits expiry and calls the engine's forced submission; the
//! controller itself never touches session state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use fieldwork_core::deadline::remaining_secs;
use fieldwork_core::types::EpochMillis;
use fieldwork_events::bus::{names, EventBus, SessionEvent};

/// Handle on a running session countdown.
pub struct DeadlineController {
    remaining: watch::Receiver<u64>,
    expired: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl DeadlineController {
    /// Start the countdown for a session that began at `started_at_ms`
    /// with `limit_secs` on the clock.
    ///
    /// The wall clock is read once, here; after that the countdown
    /// follows the tokio timer tick by tick. A session restored past its
    /// deadline expires on the first tick.
    pub fn start(
        limit_secs: u64,
        started_at_ms: EpochMillis,
        bus: Arc<EventBus>,
        questionnaire_id: impl Into<String>,
    ) -> Self {
        let initial = remaining_secs(limit_secs, started_at_ms, Utc::now().timestamp_millis());
        let (remaining_tx, remaining_rx) = watch::channel(initial);
        let (expired_tx, expired_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let questionnaire_id = questionnaire_id.into();

        tracing::debug!(
            %questionnaire_id,
            remaining_secs = initial,
            "Starting deadline countdown"
        );
        let task_cancel = cancel.clone();
        tokio::spawn(countdown(
            initial,
            remaining_tx,
            expired_tx,
            bus,
            questionnaire_id,
            task_cancel,
        ));

        Self {
            remaining: remaining_rx,
            expired: expired_rx,
            cancel,
        }
    }

    /// Seconds currently left on the clock.
    pub fn remaining_secs(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Receiver for the live countdown, one update per second.
    pub fn remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    /// Resolves when the deadline expires. Never resolves on a stopped
    /// countdown.
    pub async fn expired(&self) {
        let mut rx = self.expired.clone();
        // Err means the countdown task is gone without expiring; park
        // instead of reporting a false expiry.
        if rx.wait_for(|expired| *expired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Stop the countdown without expiring (the session submitted, or is
    /// shutting down).
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DeadlineController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn countdown(
    initial: u64,
    remaining_tx: watch::Sender<u64>,
    expired_tx: watch::Sender<bool>,
    bus: Arc<EventBus>,
    questionnaire_id: String,
    cancel: CancellationToken,
) {
    let mut remaining = initial;
    // The first tick fires immediately: it reports the initial value and
    // expires a session that was already out of time.
    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(%questionnaire_id, "Deadline countdown stopped");
                return;
            }
            _ = ticks.tick() => {
                let _ = remaining_tx.send(remaining);
                if remaining == 0 {
                    tracing::info!(%questionnaire_id, "Session deadline expired");
                    bus.publish(
                        SessionEvent::new(names::DEADLINE_EXPIRED)
                            .with_questionnaire(questionnaire_id.clone()),
                    );
                    let _ = expired_tx.send(true);
                    return;
                }
                remaining -= 1;
            }
        }
    }
}
