//! Session event types and EventBus
//!
//! Every session state change is published on the bus; SSE subscribers
//! filter the stream down to the session they are watching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{LearningPlan, TaskContent};

/// Session events, serialized with a `type` tag for SSE transmission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Subscriber attached to a session stream
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Plan delivered for a session (replaces any previous plan)
    PlanUpdate {
        #[serde(rename = "sessionId")]
        session_id: String,
        plan: LearningPlan,
        timestamp: DateTime<Utc>,
    },

    /// Task content delivered for a session
    TaskUpdate {
        #[serde(rename = "sessionId")]
        session_id: String,
        task: TaskContent,
        timestamp: DateTime<Utc>,
    },

    /// Session failed (callback error, upstream failure or timeout)
    Error {
        #[serde(rename = "sessionId")]
        session_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Get event type as string for SSE `event:` lines
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::PlanUpdate { .. } => "plan_update",
            SessionEvent::TaskUpdate { .. } => "task_update",
            SessionEvent::Error { .. } => "error",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Connected { session_id, .. }
            | SessionEvent::PlanUpdate { session_id, .. }
            | SessionEvent::TaskUpdate { session_id, .. }
            | SessionEvent::Error { session_id, .. } => session_id,
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`: publishing never blocks on slow
/// subscribers, and a subscriber that falls more than `capacity` events
/// behind sees a `Lagged` error instead of stalling the publisher.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit_lossy(&self, event: SessionEvent) -> usize {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::debug!("No subscribers for {} event", event_type);
                0
            }
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
