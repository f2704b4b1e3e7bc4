//! Scan Type Catalog
//!
//! Static registry of the scan profiles an operator can choose from. The
//! catalog is assembled once at startup (built-ins plus optional duration
//! overrides from configuration) and is read-only afterwards.

pub mod profile;

pub use profile::{EngineScanKind, ScanProfile};

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Catalog lookup and construction errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Unknown scan profile '{profile_id}' (available: {available})")]
    UnknownProfile {
        profile_id: String,
        available: String,
    },

    #[error("Invalid override for profile '{profile_id}': {reason}")]
    InvalidOverride { profile_id: String, reason: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Ordered, immutable set of scan profiles
#[derive(Debug, Clone)]
pub struct ScanTypeCatalog {
    profiles: Vec<ScanProfile>,
}

impl ScanTypeCatalog {
    /// The built-in profiles: passive, active, spider
    ///
    /// Expected durations are the lower bound of each profile's typical
    /// run time against a small site.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                ScanProfile::new(
                    "passive",
                    "Passive Scan",
                    "Analyses traffic without sending malicious requests",
                    120,
                    false,
                    EngineScanKind::Passive,
                ),
                ScanProfile::new(
                    "active",
                    "Active Scan",
                    "Actively tests for vulnerabilities by sending crafted requests",
                    600,
                    true,
                    EngineScanKind::Active,
                ),
                ScanProfile::new(
                    "spider",
                    "Spider + Active Scan",
                    "Crawls the site first, then runs a full active scan",
                    900,
                    true,
                    EngineScanKind::SpiderThenActive,
                ),
            ],
        }
    }

    /// Build a catalog from an explicit profile list
    pub fn from_profiles(profiles: Vec<ScanProfile>) -> Self {
        Self { profiles }
    }

    /// Built-in profiles with expected durations replaced by configured values (seconds)
    pub fn with_overrides(overrides: &BTreeMap<String, u64>) -> CatalogResult<Self> {
        let mut catalog = Self::builtin();
        for (profile_id, seconds) in overrides {
            if *seconds == 0 {
                return Err(CatalogError::InvalidOverride {
                    profile_id: profile_id.clone(),
                    reason: "expected-duration must be greater than 0".to_string(),
                });
            }
            let available = catalog.available_ids();
            let profile = catalog
                .profiles
                .iter_mut()
                .find(|p| p.id.eq_ignore_ascii_case(profile_id))
                .ok_or_else(|| CatalogError::UnknownProfile {
                    profile_id: profile_id.clone(),
                    available,
                })?;
            log::debug!(
                "Profile '{}' expected duration overridden: {}s -> {}s",
                profile.id,
                profile.expected_duration_secs(),
                seconds
            );
            profile.expected_duration = Duration::from_secs(*seconds);
        }
        Ok(catalog)
    }

    /// Resolve a profile by id (case-insensitive)
    pub fn lookup(&self, profile_id: &str) -> CatalogResult<&ScanProfile> {
        let wanted = profile_id.trim();
        self.profiles
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CatalogError::UnknownProfile {
                profile_id: profile_id.to_string(),
                available: self.available_ids(),
            })
    }

    /// All profiles in presentation order
    pub fn all(&self) -> &[ScanProfile] {
        &self.profiles
    }

    fn available_ids(&self) -> String {
        self.profiles
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ScanTypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
