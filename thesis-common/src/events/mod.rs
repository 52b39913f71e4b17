//! Event types for the workflow event system
//!
//! Provides the shared event definitions and the EventBus. Events are emitted
//! after a workflow transaction commits, so subscribers never observe work
//! that was rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Workflow event types
///
/// Broadcast via EventBus and serialized for SSE transmission.
/// Status and kind fields carry the stable snake_case codes used in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    /// A notification row was delivered to a user
    Notification {
        notification_id: Uuid,
        user_id: Uuid,
        title: String,
        link: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A submission's cached status changed
    SubmissionStatusChanged {
        submission_id: Uuid,
        kind: String,
        old_status: String,
        new_status: String,
        timestamp: DateTime<Utc>,
    },

    /// A committee request left the pending state
    CommitteeRequestDecided {
        request_id: Uuid,
        student_id: Uuid,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// Every committee member has signed a route slip
    RouteSlipFullySigned {
        route_slip_id: Uuid,
        adviser_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A Notice to Commence was generated
    NoticeToCommenceCreated {
        notice_id: Uuid,
        submission_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::Notification { .. } => "Notification",
            WorkflowEvent::SubmissionStatusChanged { .. } => "SubmissionStatusChanged",
            WorkflowEvent::CommitteeRequestDecided { .. } => "CommitteeRequestDecided",
            WorkflowEvent::RouteSlipFullySigned { .. } => "RouteSlipFullySigned",
            WorkflowEvent::NoticeToCommenceCreated { .. } => "NoticeToCommenceCreated",
        }
    }

    /// User the event is addressed to, when it targets a single user
    pub fn recipient(&self) -> Option<Uuid> {
        match self {
            WorkflowEvent::Notification { user_id, .. } => Some(*user_id),
            WorkflowEvent::RouteSlipFullySigned { adviser_id, .. } => Some(*adviser_id),
            _ => None,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest events; emitters never block.
pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use thesis_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WorkflowEvent,
    ) -> Result<usize, broadcast::error::SendError<WorkflowEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WorkflowEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event() -> WorkflowEvent {
        WorkflowEvent::SubmissionStatusChanged {
            submission_id: Uuid::new_v4(),
            kind: "hardbound".to_string(),
            old_status: "under_review".to_string(),
            new_status: "passed".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(10);
        assert!(bus.emit(status_event()).is_err());
        // lossy variant must not panic
        bus.emit_lossy(status_event());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let event = status_event();
        bus.emit(event.clone()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(status_event()).unwrap();
        assert_eq!(json["type"], "SubmissionStatusChanged");
        assert_eq!(json["new_status"], "passed");
    }

    #[test]
    fn test_recipient() {
        let user_id = Uuid::new_v4();
        let event = WorkflowEvent::Notification {
            notification_id: Uuid::new_v4(),
            user_id,
            title: "Route slip signed".to_string(),
            link: None,
            timestamp: Utc::now(),
        };
        assert_eq!(event.recipient(), Some(user_id));
        assert_eq!(status_event().recipient(), None);
    }
}
