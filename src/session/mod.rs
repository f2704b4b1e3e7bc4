//! Scan session control
//!
//! Turns a single start intent into a supervised, cancellable session against
//! a remote engine: consent check, engine start, polling with progress
//! estimation, and exactly one terminal outcome.

pub mod authorization;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod events;
pub mod types;


pub use authorization::AuthorizationGate;
pub use controller::{
    ScanSessionController, SessionConfig, DEFAULT_EXCLUSIONS, DEFAULT_MAX_TRANSIENT_FAILURES,
    DEFAULT_POLL_INTERVAL,
};
pub use error::{ErrorKind, SessionError, SessionResult};
pub use estimator::{format_remaining, ProgressEstimate, ProgressEstimator};
pub use events::{EventError, SessionEvent, SessionEvents};
pub use types::{ScanRequest, ScanResultHandle, ScanSession, SessionState};
