//! Scan engine client seam
//!
//! The session controller only talks to engines through `ScanEngineClient`.
//! Adapters translate their wire protocol into the handle/status vocabulary
//! defined here and keep no per-session state of their own.

use crate::catalog::ScanProfile;
use crate::engine::alerts::AlertSummary;
use crate::engine::error::EngineResult;
use async_trait::async_trait;
use serde::Serialize;
use url::Url;

/// Which engine-side operation a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum EnginePhase {
    Passive,
    Active,
    Spider,
    /// Active scan launched after a completed spider run
    ActiveAfterSpider,
}

/// Opaque reference to a session running inside the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSessionHandle {
    pub engine_id: String,
    pub phase: EnginePhase,
    pub target: String,
}

impl EngineSessionHandle {
    pub fn new(engine_id: impl Into<String>, phase: EnginePhase, target: &Url) -> Self {
        Self {
            engine_id: engine_id.into(),
            phase,
            target: target.to_string(),
        }
    }
}

/// Engine-side lifecycle as reported by a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum EngineState {
    Running,
    Succeeded,
    Failed,
}

/// Result of one poll; consumed immediately by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    /// Engine-reported progress 0-100, if the engine provides one
    pub raw_progress: Option<f64>,
    pub state: EngineState,
    pub fault_detail: Option<String>,
    /// Follow-up handle when the engine moved the session into its next phase
    pub continuation: Option<EngineSessionHandle>,
}

impl EngineStatus {
    pub fn running(raw_progress: Option<f64>) -> Self {
        Self {
            raw_progress,
            state: EngineState::Running,
            fault_detail: None,
            continuation: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            raw_progress: Some(100.0),
            state: EngineState::Succeeded,
            fault_detail: None,
            continuation: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            raw_progress: None,
            state: EngineState::Failed,
            fault_detail: Some(detail.into()),
            continuation: None,
        }
    }

    pub fn with_continuation(mut self, handle: EngineSessionHandle) -> Self {
        self.continuation = Some(handle);
        self
    }
}

/// Control surface of an external scanning engine
#[async_trait]
pub trait ScanEngineClient: Send + Sync {
    /// Base endpoint, for diagnostics
    fn endpoint(&self) -> &str;

    /// Launch a scan of `target` for `profile`, excluding URLs matching `excluded_url_patterns`
    async fn start(
        &self,
        target: &Url,
        profile: &ScanProfile,
        excluded_url_patterns: &[String],
    ) -> EngineResult<EngineSessionHandle>;

    /// Report the current status of a running engine session
    async fn poll(&self, handle: &EngineSessionHandle) -> EngineResult<EngineStatus>;

    /// Ask the engine to stop a session
    async fn stop(&self, handle: &EngineSessionHandle) -> EngineResult<()>;

    /// Alert counts per risk level recorded for `target`
    async fn alert_summary(&self, target: &Url) -> EngineResult<AlertSummary>;
}
