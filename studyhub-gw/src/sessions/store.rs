//! In-memory session store
//!
//! The outer map lock is only held to insert, remove or fetch a session
//! slot; each session has its own lock, so writers for different sessions
//! never wait on each other.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use studyhub_common::events::{EventBus, SessionEvent};
use studyhub_common::models::{LearningPlan, TaskContent};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result delivered for a session; replaced wholesale on every update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPayload {
    Plan(LearningPlan),
    Task(TaskContent),
}

/// Snapshot of one session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Serialized as `plan` or `task`
    #[serde(flatten)]
    pub payload: Option<SessionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Session {
    fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            status: SessionStatus::Pending,
            created_at: now,
            updated_at: now,
            payload: None,
            error: None,
        }
    }

    fn transition_to(&mut self, status: SessionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Time since the last state change, zero if the clock went backwards
    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Outcome of a state-changing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `pending` moved to a terminal state
    Applied,
    /// Same payload or same failure delivered again
    Unchanged,
    /// Completed session replaced by a different payload
    Overwritten,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Session id must not be blank")]
    InvalidId,

    #[error("Session already in progress: {0}")]
    Conflict(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {id} is {from}, cannot become {to}")]
    InvalidTransition {
        id: String,
        from: SessionStatus,
        to: SessionStatus,
    },
}

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: usize,
    pub removed: usize,
}

type Slot = Arc<RwLock<Session>>;

const TIMEOUT_REASON: &str = "generation timed out";

/// Session correlator and plan/task state store
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Slot>>>,
    event_bus: EventBus,
}

impl SessionStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
        }
    }

    /// Create a pending session
    ///
    /// Without a hint a UUID v4 is issued. A client hint is used as given,
    /// unless it is blank or names a session that is still pending; a hint
    /// naming a finished session starts it over.
    pub async fn create(&self, hint: Option<&str>) -> Result<Session, SessionError> {
        let session_id = match hint {
            Some(h) if h.trim().is_empty() => return Err(SessionError::InvalidId),
            Some(h) => h.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session_id) {
            let existing = existing.read().await;
            if existing.status == SessionStatus::Pending {
                warn!(session_id = %session_id, "Rejected duplicate session id");
                return Err(SessionError::Conflict(session_id));
            }
            info!(
                session_id = %session_id,
                previous = %existing.status,
                "Replacing finished session with a new one"
            );
        }

        let session = Session::new(session_id.clone());
        sessions.insert(session_id, Arc::new(RwLock::new(session.clone())));
        info!(session_id = %session.session_id, "Session created");
        Ok(session)
    }

    pub async fn lookup(&self, session_id: &str) -> Option<Session> {
        let slot = self.slot(session_id).await?;
        let session = slot.read().await;
        Some(session.clone())
    }

    /// Store a result and move the session to `completed`
    pub async fn mark_completed(
        &self,
        session_id: &str,
        payload: SessionPayload,
    ) -> Result<Transition, SessionError> {
        let slot = self
            .slot(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let transition = {
            let mut session = slot.write().await;
            let transition = match session.status {
                SessionStatus::Failed => {
                    return Err(SessionError::InvalidTransition {
                        id: session_id.to_string(),
                        from: SessionStatus::Failed,
                        to: SessionStatus::Completed,
                    })
                }
                SessionStatus::Completed if session.payload.as_ref() == Some(&payload) => {
                    debug!(session_id = %session_id, "Identical result delivered again");
                    return Ok(Transition::Unchanged);
                }
                SessionStatus::Completed => Transition::Overwritten,
                SessionStatus::Pending => Transition::Applied,
            };
            session.payload = Some(payload.clone());
            session.transition_to(SessionStatus::Completed);
            transition
        };

        info!(session_id = %session_id, ?transition, "Session completed");

        let timestamp = Utc::now();
        let session_id = session_id.to_string();
        self.event_bus.emit_lossy(match payload {
            SessionPayload::Plan(plan) => SessionEvent::PlanUpdate {
                session_id,
                plan,
                timestamp,
            },
            SessionPayload::Task(task) => SessionEvent::TaskUpdate {
                session_id,
                task,
                timestamp,
            },
        });

        Ok(transition)
    }

    /// Move a pending session to `failed`
    ///
    /// A second failure keeps the first reason.
    pub async fn mark_failed(
        &self,
        session_id: &str,
        reason: &str,
    ) -> Result<Transition, SessionError> {
        let slot = self
            .slot(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let transition = fail_pending(&mut *slot.write().await, reason)?;
        if transition == Transition::Applied {
            self.publish_failure(session_id, reason);
        }
        Ok(transition)
    }

    fn publish_failure(&self, session_id: &str, reason: &str) {
        warn!(session_id = %session_id, reason = %reason, "Session failed");
        self.event_bus.emit_lossy(SessionEvent::Error {
            session_id: session_id.to_string(),
            message: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        let slot = self.sessions.write().await.remove(session_id)?;
        let session = slot.read().await;
        Some(session.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Fail stale pending sessions and drop expired finished ones
    ///
    /// A session is stale when it has been pending longer than
    /// `pending_timeout`; a finished session expires when it has not changed
    /// for `retention`.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        pending_timeout: Duration,
        retention: Duration,
    ) -> SweepReport {
        let slots = self.snapshot().await;
        self.sweep_slots(slots, now, pending_timeout, retention).await
    }

    /// Sweep a snapshot of the map
    ///
    /// Every change is applied to the inspected slot only, and only while the
    /// map still holds it; a session re-created under the same id in the
    /// meantime is left alone.
    async fn sweep_slots(
        &self,
        slots: Vec<(String, Slot)>,
        now: DateTime<Utc>,
        pending_timeout: Duration,
        retention: Duration,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        let mut expired = Vec::new();
        for (session_id, slot) in slots {
            let (status, idle) = {
                let session = slot.read().await;
                (session.status, session.idle_for(now))
            };

            if status == SessionStatus::Pending && idle > pending_timeout {
                let transition = {
                    let sessions = self.sessions.read().await;
                    let still_mapped = sessions
                        .get(&session_id)
                        .is_some_and(|current| Arc::ptr_eq(current, &slot));
                    if !still_mapped {
                        continue;
                    }
                    let mut session = slot.write().await;
                    fail_pending(&mut session, TIMEOUT_REASON)
                };
                // Lost the race against a callback: nothing to do
                if let Ok(Transition::Applied) = transition {
                    self.publish_failure(&session_id, TIMEOUT_REASON);
                    report.timed_out += 1;
                }
            } else if status.is_terminal() && idle > retention {
                expired.push((session_id, slot));
            }
        }

        if !expired.is_empty() {
            let mut sessions = self.sessions.write().await;
            for (session_id, slot) in expired {
                // Only drop the slot we inspected; a re-created session stays
                if sessions
                    .get(&session_id)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot))
                {
                    sessions.remove(&session_id);
                    report.removed += 1;
                }
            }
        }

        if report != SweepReport::default() {
            info!(
                timed_out = report.timed_out,
                removed = report.removed,
                "Session sweep finished"
            );
        }

        report
    }

    async fn slot(&self, session_id: &str) -> Option<Slot> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn snapshot(&self) -> Vec<(String, Slot)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }
}

/// Move a pending session to `failed`; a failed one keeps its first reason
fn fail_pending(session: &mut Session, reason: &str) -> Result<Transition, SessionError> {
    match session.status {
        SessionStatus::Completed => Err(SessionError::InvalidTransition {
            id: session.session_id.clone(),
            from: SessionStatus::Completed,
            to: SessionStatus::Failed,
        }),
        SessionStatus::Failed => Ok(Transition::Unchanged),
        SessionStatus::Pending => {
            session.error = Some(reason.to_string());
            session.transition_to(SessionStatus::Failed);
            Ok(Transition::Applied)
        }
    }
}
