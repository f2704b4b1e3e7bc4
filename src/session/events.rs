//! Session-state events delivered to the caller

use crate::session::error::ErrorKind;
use crate::session::types::{ScanResultHandle, ScanSession, SessionState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Error attached to a `Failed` event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventError {
    pub kind: ErrorKind,
    pub detail: String,
}

/// Snapshot emitted on every transition and progress tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub session_id: String,
    pub state: SessionState,
    pub progress_percent: f64,
    pub remaining_seconds: u64,
    pub error: Option<EventError>,
    /// Set on `Completed` only
    pub result: Option<ScanResultHandle>,
    /// Set on `Stopped` and `Failed`
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub(crate) fn snapshot(session: &ScanSession, timestamp: DateTime<Utc>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            state: session.state,
            progress_percent: session.progress_percent,
            remaining_seconds: session.remaining_seconds,
            error: None,
            result: None,
            reason: session.termination_reason.clone(),
            timestamp,
        }
    }

    pub(crate) fn with_error(mut self, kind: ErrorKind, detail: impl Into<String>) -> Self {
        self.error = Some(EventError {
            kind,
            detail: detail.into(),
        });
        self
    }

    pub(crate) fn with_result(mut self, result: Option<ScanResultHandle>) -> Self {
        self.result = result;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Ordered stream of events for one session
///
/// The stream ends after the terminal event has been delivered.
#[derive(Debug)]
pub struct SessionEvents {
    session_id: String,
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new(session_id: String, receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self {
            session_id,
            receiver,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event, or `None` once the session is over
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Drain the stream and return the terminal event
    pub async fn wait_for_terminal(mut self) -> Option<SessionEvent> {
        let mut last = None;
        while let Some(event) = self.next().await {
            let terminal = event.is_terminal();
            last = Some(event);
            if terminal {
                break;
            }
        }
        last.filter(SessionEvent::is_terminal)
    }
}
