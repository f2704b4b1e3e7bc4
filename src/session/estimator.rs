//! Progress and remaining-time estimation
//!
//! Engine-reported progress is preferred. Without it, progress is derived from
//! elapsed time against the profile's expected duration and held below 100:
//! only an engine-confirmed completion may report a finished scan.

use std::time::Duration;

/// Highest percentage the time-based model may report
pub const SYNTHETIC_CEILING: f64 = 99.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    pub progress_percent: f64,
    pub remaining_seconds: u64,
}

pub struct ProgressEstimator;

impl ProgressEstimator {
    /// Estimate progress for one tick
    ///
    /// `last_percent` is the highest value already reported for the session;
    /// the result never goes below it.
    pub fn estimate(
        expected: Duration,
        elapsed: Duration,
        engine_progress: Option<f64>,
        last_percent: f64,
    ) -> ProgressEstimate {
        let floor = last_percent.clamp(0.0, 100.0);

        let progress_percent = match engine_progress.filter(|p| Self::is_usable(*p)) {
            Some(raw) => {
                if raw < floor {
                    log::debug!(
                        "Engine progress regressed from {:.1}% to {:.1}%, holding",
                        floor,
                        raw
                    );
                }
                raw.clamp(floor, 100.0)
            }
            None => Self::synthetic(expected, elapsed).max(floor),
        };

        ProgressEstimate {
            progress_percent,
            remaining_seconds: Self::remaining_seconds(expected, progress_percent),
        }
    }

    /// Time-based progress, capped at `SYNTHETIC_CEILING`
    pub fn synthetic(expected: Duration, elapsed: Duration) -> f64 {
        let ratio = if expected.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / expected.as_secs_f64()
        };
        (ratio * 100.0).clamp(0.0, SYNTHETIC_CEILING)
    }

    /// Seconds left at `progress_percent`, rounded up
    pub fn remaining_seconds(expected: Duration, progress_percent: f64) -> u64 {
        let fraction_left = 1.0 - progress_percent.clamp(0.0, 100.0) / 100.0;
        let remaining = expected.as_secs_f64() * fraction_left;
        remaining.max(0.0).ceil() as u64
    }

    fn is_usable(raw: f64) -> bool {
        raw.is_finite() && (0.0..=100.0).contains(&raw)
    }
}

/// Render a remaining-time estimate as `"5 min 32s"` or `"45s"`
pub fn format_remaining(seconds: u64) -> String {
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes > 0 {
        format!("{} min {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
