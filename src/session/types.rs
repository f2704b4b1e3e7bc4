//! Session data model

use crate::catalog::ScanProfile;
use crate::engine::EngineSessionHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Stopped | SessionState::Failed
        )
    }
}

/// One start intent, immutable once submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRequest {
    pub target_url: String,
    pub profile_id: String,
    pub authorization_granted: bool,
    pub excluded_url_patterns: Vec<String>,
}

impl ScanRequest {
    pub fn new(target_url: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            profile_id: profile_id.into(),
            authorization_granted: false,
            excluded_url_patterns: Vec::new(),
        }
    }

    pub fn with_authorization(mut self, granted: bool) -> Self {
        self.authorization_granted = granted;
        self
    }

    pub fn with_excluded_patterns(mut self, patterns: Vec<String>) -> Self {
        self.excluded_url_patterns = patterns;
        self
    }
}

/// Reference to a completed session's findings, resolved by the reporting side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResultHandle {
    pub session_id: String,
    pub engine_id: String,
    pub target: String,
}

/// State of the session owned by a controller
#[derive(Debug, Clone, Serialize)]
pub struct ScanSession {
    pub session_id: String,
    pub request: ScanRequest,
    pub profile: ScanProfile,
    /// Built-in and request exclusions, in the order sent to the engine
    pub effective_exclusions: Vec<String>,
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    /// 0-100, never decreases while the session is live
    pub progress_percent: f64,
    pub remaining_seconds: u64,
    pub termination_reason: Option<String>,
    #[serde(skip)]
    pub engine_handle: Option<EngineSessionHandle>,
}

impl ScanSession {
    pub(crate) fn new(
        session_id: String,
        request: ScanRequest,
        profile: ScanProfile,
        effective_exclusions: Vec<String>,
    ) -> Self {
        let remaining_seconds = profile.expected_duration_secs();
        Self {
            session_id,
            request,
            profile,
            effective_exclusions,
            state: SessionState::Starting,
            started_at: None,
            progress_percent: 0.0,
            remaining_seconds,
            termination_reason: None,
            engine_handle: None,
        }
    }

    pub fn result_handle(&self) -> Option<ScanResultHandle> {
        self.engine_handle.as_ref().map(|handle| ScanResultHandle {
            session_id: self.session_id.clone(),
            engine_id: handle.engine_id.clone(),
            target: handle.target.clone(),
        })
    }
}
