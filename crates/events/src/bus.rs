//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`SessionEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names published by the session engine.
pub mod names {
    pub const RESOLVED: &str = "session.resolved";
    pub const PHASE_CHANGED: &str = "session.phase_changed";
    pub const ANSWER_COMMITTED: &str = "session.answer_committed";
    pub const AUTOSAVE_FAILED: &str = "session.autosave_failed";
    pub const DEADLINE_EXPIRED: &str = "session.deadline_expired";
    pub const SUBMITTED: &str = "session.submitted";
    pub const POLL_LOCKED: &str = "session.poll_locked";
}

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred during a participant session.
///
/// Constructed via [`SessionEvent::new`] and enriched with the builder
/// methods [`with_questionnaire`](SessionEvent::with_questionnaire),
/// [`with_participant`](SessionEvent::with_participant), and
/// [`with_payload`](SessionEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Dot-separated event name, e.g. `"session.answer_committed"`.
    pub event_type: String,

    /// Questionnaire the session belongs to.
    pub questionnaire_id: Option<String>,

    /// Participant reference, once the session has one (backend id or
    /// local guest id).
    pub participant_ref: Option<String>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    /// Create a new event with only the required `event_type`.
    ///
    /// All optional fields default to `None` / empty object.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            questionnaire_id: None,
            participant_ref: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the questionnaire id to the event.
    pub fn with_questionnaire(mut self, questionnaire_id: impl Into<String>) -> Self {
        self.questionnaire_id = Some(questionnaire_id.into());
        self
    }

    /// Attach the participant reference to the event.
    pub fn with_participant(mut self, participant_ref: impl Into<String>) -> Self {
        self.participant_ref = Some(participant_ref.into());
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`SessionEvent`].
///
/// # Usage
///
/// ```rust
/// use fieldwork_events::bus::{names, EventBus, SessionEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(SessionEvent::new(names::RESOLVED));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: SessionEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = SessionEvent::new(names::ANSWER_COMMITTED)
            .with_questionnaire("42")
            .with_participant("participant-7")
            .with_payload(serde_json::json!({"question_id": "q1"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "session.answer_committed");
        assert_eq!(received.questionnaire_id.as_deref(), Some("42"));
        assert_eq!(received.participant_ref.as_deref(), Some("participant-7"));
        assert_eq!(received.payload["question_id"], "q1");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SessionEvent::new(names::SUBMITTED));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "session.submitted");
        assert_eq!(e2.event_type, "session.submitted");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers — this must not panic.
        bus.publish(SessionEvent::new("orphan.event"));
    }

    #[test]
    fn default_event_has_empty_optional_fields() {
        let event = SessionEvent::new("bare.event");
        assert_eq!(event.event_type, "bare.event");
        assert!(event.questionnaire_id.is_none());
        assert!(event.participant_ref.is_none());
        assert!(event.payload.is_object());
    }
}
