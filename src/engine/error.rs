//! Engine adapter error types

use thiserror::Error;

/// Faults surfaced by a scan engine adapter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Network or connection fault; eligible for bounded retry
    #[error("Scan engine at {endpoint} is unreachable: {detail}")]
    Unreachable { endpoint: String, detail: String },

    /// The engine refused the request
    #[error("Scan engine rejected the request: {detail}")]
    Rejected { detail: String },

    /// The engine no longer knows the session
    #[error("Scan engine has no session '{engine_id}'")]
    SessionNotFound { engine_id: String },
}

impl EngineError {
    /// Transient faults may succeed when the same call is repeated
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Unreachable { .. })
    }
}

impl crate::core::error_handling::ContextualError for EngineError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
