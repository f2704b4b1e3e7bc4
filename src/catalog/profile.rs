//! Scan profile definitions

use serde::Serialize;
use std::time::Duration;

/// Which engine operations a profile drives
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum EngineScanKind {
    /// Observe traffic only
    Passive,
    /// Send crafted requests against the target
    Active,
    /// Crawl the site, then run an active scan on what was found
    SpiderThenActive,
}

/// A named scan configuration
///
/// Profiles are defined once when the catalog is built and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanProfile {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub expected_duration: Duration,
    pub intrusive: bool,
    pub engine_kind: EngineScanKind,
}

impl ScanProfile {
    pub fn new(
        id: &str,
        display_name: &str,
        description: &str,
        expected_duration_secs: u64,
        intrusive: bool,
        engine_kind: EngineScanKind,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            expected_duration: Duration::from_secs(expected_duration_secs),
            intrusive,
            engine_kind,
        }
    }

    pub fn expected_duration_secs(&self) -> u64 {
        self.expected_duration.as_secs()
    }
}
