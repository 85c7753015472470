//! Server-Sent Events (SSE) utilities
//!
//! Per-session event streams for StudyHub services.

use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::events::SessionEvent;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize a session event into an SSE frame
///
/// The JSON payload carries the same `type` tag as the `event:` line so
/// clients that only read `data:` still see the event kind.
pub fn to_sse_event(event: &SessionEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
            None
        }
    }
}

/// Create an SSE stream of the events for one session
///
/// Starts with a `connected` event, then forwards every bus event whose
/// session id matches, with a heartbeat comment every 15 seconds. The
/// stream ends when the bus is dropped.
///
/// # Example
/// ```rust,ignore
/// pub async fn plan_events(
///     State(state): State<AppState>,
///     Query(query): Query<SessionQuery>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     studyhub_common::sse::session_event_stream(query.session_id, state.event_bus.subscribe())
/// }
/// ```
pub fn session_event_stream(
    session_id: String,
    mut rx: broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(session_id = %session_id, "New SSE client connected to session events");

    let stream = async_stream::stream! {
        let connected = SessionEvent::Connected {
            session_id: session_id.clone(),
            timestamp: Utc::now(),
        };
        if let Some(event) = to_sse_event(&connected) {
            yield Ok(event);
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) if event.session_id() == session_id => {
                            debug!(session_id = %session_id, "SSE: Forwarding {}", event.event_type());
                            if let Some(frame) = to_sse_event(&event) {
                                yield Ok(frame);
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(session_id = %session_id, "SSE: Subscriber lagged, {} events skipped", skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!(session_id = %session_id, "SSE: Event bus closed, ending stream");
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
