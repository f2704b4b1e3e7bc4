//! Validation utilities for scan targets, engine endpoints and settings
//!
//! Validators return `Result<_, String>` so they can back clap value parsers,
//! configuration loading and the session controller alike.

use regex::Regex;
use url::Url;

/// Validate a scan target: an absolute http(s) URL with a host
pub fn validate_target_url(value: &str) -> Result<Url, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Target URL cannot be empty".to_string());
    }

    let url = Url::parse(trimmed)
        .map_err(|e| format!("'{}' is not a valid absolute URL: {}", trimmed, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(format!(
                "Unsupported URL scheme '{}' in '{}'. Only http and https targets can be scanned",
                other, trimmed
            ))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(format!("Target URL '{}' has no host", trimmed));
    }

    Ok(url)
}

/// Validate the engine API base URL
pub fn validate_engine_url(value: &str) -> Result<Url, String> {
    validate_target_url(value).map_err(|e| format!("Invalid engine URL: {}", e))
}

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid positive integer", value)),
    }
}

/// Validate URL exclusion pattern syntax (regular expression)
pub fn validate_exclusion_pattern(pattern: &str) -> Result<String, String> {
    if pattern.trim().is_empty() {
        return Err("Exclusion pattern cannot be empty".to_string());
    }
    match Regex::new(pattern) {
        Ok(_) => Ok(pattern.to_string()),
        Err(e) => Err(format!("Invalid exclusion pattern '{}': {}", pattern, e)),
    }
}

/// Merge exclusion pattern lists, keeping first occurrence order and dropping duplicates
pub fn merge_exclusion_patterns(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(base.len() + extra.len());
    for pattern in base.iter().chain(extra.iter()) {
        if !merged.iter().any(|existing| existing == pattern) {
            merged.push(pattern.clone());
        }
    }
    merged
}
