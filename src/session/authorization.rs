//! Operator consent gate for intrusive profiles

use crate::catalog::ScanProfile;
use crate::session::error::{SessionError, SessionResult};
use crate::session::types::ScanRequest;

pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Intrusive profiles require `authorization_granted`; others always pass
    pub fn check(request: &ScanRequest, profile: &ScanProfile) -> SessionResult<()> {
        if profile.intrusive && !request.authorization_granted {
            return Err(SessionError::AuthorizationRequired {
                profile_id: profile.id.clone(),
                reason: format!(
                    "Profile '{}' sends intrusive traffic to the target; confirm you are authorized to test it (--authorized)",
                    profile.id
                ),
            });
        }
        Ok(())
    }
}
