//! Session controller errors

use crate::catalog::CatalogError;
use crate::core::error_handling::ContextualError;
use crate::engine::EngineError;
use crate::session::types::SessionState;
use serde::Serialize;
use thiserror::Error;

/// Classification carried on `Failed` events and returned errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum ErrorKind {
    InvalidTarget,
    InvalidExclusionPattern,
    UnknownProfile,
    AuthorizationRequired,
    SessionAlreadyActive,
    EngineUnreachable,
    EngineRejected,
    SessionNotFound,
    InternalFault,
}

impl ErrorKind {
    /// Raised before any engine call, returned synchronously from `start`
    pub fn is_precondition(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidTarget
                | ErrorKind::InvalidExclusionPattern
                | ErrorKind::UnknownProfile
                | ErrorKind::AuthorizationRequired
                | ErrorKind::SessionAlreadyActive
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    InvalidExclusionPattern { pattern: String, reason: String },

    #[error("Unknown scan profile '{profile_id}': {reason}")]
    UnknownProfile { profile_id: String, reason: String },

    #[error("Authorization required for profile '{profile_id}': {reason}")]
    AuthorizationRequired { profile_id: String, reason: String },

    #[error("A scan session is already active (state: {state})")]
    SessionAlreadyActive { state: SessionState },

    #[error("Scan engine unreachable: {detail}")]
    EngineUnreachable { detail: String },

    #[error("Scan engine rejected the request: {detail}")]
    EngineRejected { detail: String },

    #[error("Scan engine lost the session: {detail}")]
    SessionNotFound { detail: String },

    #[error("Internal fault: {detail}")]
    InternalFault { detail: String },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            SessionError::InvalidExclusionPattern { .. } => ErrorKind::InvalidExclusionPattern,
            SessionError::UnknownProfile { .. } => ErrorKind::UnknownProfile,
            SessionError::AuthorizationRequired { .. } => ErrorKind::AuthorizationRequired,
            SessionError::SessionAlreadyActive { .. } => ErrorKind::SessionAlreadyActive,
            SessionError::EngineUnreachable { .. } => ErrorKind::EngineUnreachable,
            SessionError::EngineRejected { .. } => ErrorKind::EngineRejected,
            SessionError::SessionNotFound { .. } => ErrorKind::SessionNotFound,
            SessionError::InternalFault { .. } => ErrorKind::InternalFault,
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(error: EngineError) -> Self {
        let detail = error.to_string();
        match error {
            EngineError::Unreachable { .. } => SessionError::EngineUnreachable { detail },
            EngineError::Rejected { .. } => SessionError::EngineRejected { detail },
            EngineError::SessionNotFound { .. } => SessionError::SessionNotFound { detail },
        }
    }
}

impl From<CatalogError> for SessionError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::UnknownProfile {
                profile_id,
                available,
            } => SessionError::UnknownProfile {
                profile_id,
                reason: format!("available profiles: {}", available),
            },
            CatalogError::InvalidOverride { .. } => SessionError::InternalFault {
                detail: error.to_string(),
            },
        }
    }
}

impl ContextualError for SessionError {
    fn is_user_actionable(&self) -> bool {
        self.kind().is_precondition()
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            SessionError::InvalidTarget { reason, .. }
            | SessionError::InvalidExclusionPattern { reason, .. }
            | SessionError::UnknownProfile { reason, .. }
            | SessionError::AuthorizationRequired { reason, .. } => Some(reason.as_str()),
            SessionError::SessionAlreadyActive { .. } => {
                Some("A scan session is already in progress; stop it or wait for it to finish")
            }
            _ => None,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_kinds() {
        let unreachable: SessionError = EngineError::Unreachable {
            endpoint: "http://localhost:8080".to_string(),
            detail: "connection refused".to_string(),
        }
        .into();
        assert_eq!(unreachable.kind(), ErrorKind::EngineUnreachable);
        assert!(unreachable.to_string().contains("connection refused"));

        let rejected: SessionError = EngineError::Rejected {
            detail: "bad url".to_string(),
        }
        .into();
        assert_eq!(rejected.kind(), ErrorKind::EngineRejected);

        let lost: SessionError = EngineError::SessionNotFound {
            engine_id: "7".to_string(),
        }
        .into();
        assert_eq!(lost.kind(), ErrorKind::SessionNotFound);
    }

    #[test]
    fn test_unknown_profile_lists_alternatives() {
        let err: SessionError = CatalogError::UnknownProfile {
            profile_id: "deep".to_string(),
            available: "passive, active, spider".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::UnknownProfile);
        assert!(err.is_user_actionable());
        assert_eq!(
            err.user_message(),
            Some("available profiles: passive, active, spider")
        );
    }

    #[test]
    fn test_precondition_kinds_are_user_actionable() {
        let err = SessionError::SessionAlreadyActive {
            state: SessionState::Running,
        };
        assert!(err.is_user_actionable());
        assert!(err.user_message().is_some());

        let fault = SessionError::InternalFault {
            detail: "lock poisoned".to_string(),
        };
        assert!(!fault.is_user_actionable());
        assert_eq!(fault.user_message(), None);
    }
}
