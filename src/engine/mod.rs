//! External scan engine boundary
//!
//! `ScanEngineClient` is the seam the session controller drives; the ZAP
//! adapter is the production implementation.

pub mod alerts;
pub mod client;
pub mod error;
pub mod zap;

pub use alerts::{AlertSummary, RiskLevel};
pub use client::{EnginePhase, EngineSessionHandle, EngineState, EngineStatus, ScanEngineClient};
pub use error::{EngineError, EngineResult};
pub use zap::{ZapConfig, ZapEngineClient};
