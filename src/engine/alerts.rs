//! Alert categorisation by risk level

use serde::Serialize;
use serde_json::Value;

/// Engine risk levels, most severe first
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Informational,
}

impl RiskLevel {
    /// Operator-facing meaning of the level
    pub fn description(self) -> &'static str {
        match self {
            RiskLevel::High => "Critical - immediate exploitation possible",
            RiskLevel::Medium => "High - confirmed vulnerability",
            RiskLevel::Low => "Medium - configuration problem",
            RiskLevel::Informational => "Information - improvement recommended",
        }
    }
}

/// Number of alerts per risk level for one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub informational: u32,
}

impl AlertSummary {
    pub fn count(&self, level: RiskLevel) -> u32 {
        match level {
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
            RiskLevel::Informational => self.informational,
        }
    }

    pub fn total(&self) -> u32 {
        self.high + self.medium + self.low + self.informational
    }

    /// Parse a ZAP `alertsSummary` object; counts may be numbers or numeric strings
    pub fn from_zap_summary(summary: &Value) -> Option<Self> {
        let object = summary.as_object()?;
        let count = |key: &str| -> u32 {
            match object.get(key) {
                Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as u32,
                Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
                _ => 0,
            }
        };
        Some(Self {
            high: count("High"),
            medium: count("Medium"),
            low: count("Low"),
            informational: count("Informational"),
        })
    }
}
