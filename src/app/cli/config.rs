//! TOML configuration loading
//!
//! Settings come from built-in defaults, then the configuration file, then
//! the command line. The default file lives at
//! `<config dir>/WebSecScan/websecscan.toml` and is optional; a file named
//! with `--config-file` must exist.

use super::args::{Args, ScanArgs};
use crate::core::error_handling::ContextualError;
use crate::core::validation::{validate_engine_url, validate_exclusion_pattern};
use crate::engine::zap::{DEFAULT_ENGINE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::engine::ZapConfig;
use crate::session::{SessionConfig, DEFAULT_EXCLUSIONS, DEFAULT_MAX_TRANSIENT_FAILURES};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_DIR_NAME: &str = "WebSecScan";
const CONFIG_FILE_NAME: &str = "websecscan.toml";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

const KNOWN_KEYS: &[&str] = &[
    "engine-url",
    "api-key",
    "request-timeout",
    "user-agent",
    "poll-interval",
    "max-transient-failures",
    "exclude-url",
    "log-level",
    "log-format",
    "log-file",
    "color",
    "profiles",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{message}")]
    FileNotFound { path: PathBuf, message: String },

    #[error("{message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("{message}")]
    Malformed { path: PathBuf, message: String },

    #[error("{message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("Invalid value for '{}': {}", key, reason),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::FileNotFound { message, .. }
            | ConfigError::Unreadable { message, .. }
            | ConfigError::Malformed { message, .. }
            | ConfigError::InvalidValue { message, .. } => Some(message.as_str()),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Effective application settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub engine_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub poll_interval: Duration,
    pub max_transient_failures: usize,
    /// Operator exclusions added to every scan
    pub exclude_urls: Vec<String>,
    pub use_default_exclusions: bool,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    /// Expected-duration overrides in seconds, by profile id
    pub profile_durations: BTreeMap<String, u64>,
    /// File that was loaded, if any
    pub source: Option<PathBuf>,
    pub unknown_keys: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_transient_failures: DEFAULT_MAX_TRANSIENT_FAILURES,
            exclude_urls: Vec::new(),
            use_default_exclusions: true,
            log_level: None,
            log_format: None,
            log_file: None,
            color: None,
            profile_durations: BTreeMap::new(),
            source: None,
            unknown_keys: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Default configuration file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Defaults overlaid with the configuration file
    pub async fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        let path = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.to_path_buf(),
                        message: format!(
                            "The specified configuration file does not exist: {}",
                            path.display()
                        ),
                    });
                }
                Some(path.to_path_buf())
            }
            None => Self::default_path().filter(|path| path.exists()),
        };

        let mut config = Self::default();
        let Some(path) = path else {
            return Ok(config);
        };

        let contents =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ConfigError::Unreadable {
                    path: path.clone(),
                    message: format!("Error reading configuration file {}: {}", path.display(), e),
                })?;
        let table = toml::from_str::<toml::Table>(&contents).map_err(|e| ConfigError::Malformed {
            path: path.clone(),
            message: format!("Error parsing configuration file {}: {}", path.display(), e),
        })?;

        config.apply_toml_values(&table)?;
        config.source = Some(path);
        Ok(config)
    }

    /// Apply the keys of a parsed configuration file
    pub fn apply_toml_values(&mut self, table: &toml::Table) -> ConfigResult<()> {
        if let Some(value) = Self::string_field(table, "engine-url")? {
            validate_engine_url(&value).map_err(|e| ConfigError::invalid("engine-url", e))?;
            self.engine_url = value;
        }
        if let Some(value) = Self::string_field(table, "api-key")? {
            self.api_key = Some(value).filter(|key| !key.is_empty());
        }
        if let Some(seconds) = Self::positive_int_field(table, "request-timeout")? {
            self.request_timeout = Duration::from_secs(seconds);
        }
        if let Some(value) = Self::string_field(table, "user-agent")? {
            self.user_agent = value;
        }
        if let Some(millis) = Self::positive_int_field(table, "poll-interval")? {
            self.poll_interval = Duration::from_millis(millis);
        }
        if let Some(value) = table.get("max-transient-failures") {
            let count = value
                .as_integer()
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "max-transient-failures",
                        "expected a non-negative integer",
                    )
                })?;
            self.max_transient_failures = count as usize;
        }
        self.apply_exclusions(table)?;
        if let Some(value) = Self::string_field(table, "log-level")? {
            self.log_level = Some(value);
        }
        if let Some(value) = Self::string_field(table, "log-format")? {
            if !["text", "ext", "json"].contains(&value.as_str()) {
                return Err(ConfigError::invalid("log-format", "expected text, ext or json"));
            }
            self.log_format = Some(value);
        }
        if let Some(value) = Self::string_field(table, "log-file")? {
            self.log_file = Some(PathBuf::from(value));
        }
        if let Some(value) = table.get("color") {
            let color = value
                .as_bool()
                .ok_or_else(|| ConfigError::invalid("color", "expected true or false"))?;
            self.color = Some(color);
        }
        self.apply_profile_overrides(table)?;

        self.unknown_keys = table
            .keys()
            .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        Ok(())
    }

    /// `exclude-url` accepts a single string or an array of strings
    fn apply_exclusions(&mut self, table: &toml::Table) -> ConfigResult<()> {
        let Some(value) = table.get("exclude-url") else {
            return Ok(());
        };
        let patterns: Vec<&str> = if let Some(single) = value.as_str() {
            vec![single]
        } else if let Some(array) = value.as_array() {
            array
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        ConfigError::invalid("exclude-url", "array entries must be strings")
                    })
                })
                .collect::<ConfigResult<_>>()?
        } else {
            return Err(ConfigError::invalid(
                "exclude-url",
                "expected a string or an array of strings",
            ));
        };

        for pattern in patterns {
            let pattern = validate_exclusion_pattern(pattern)
                .map_err(|e| ConfigError::invalid("exclude-url", e))?;
            if !self.exclude_urls.contains(&pattern) {
                self.exclude_urls.push(pattern);
            }
        }
        Ok(())
    }

    /// `[profiles.<id>] expected-duration = <seconds>`
    fn apply_profile_overrides(&mut self, table: &toml::Table) -> ConfigResult<()> {
        let Some(value) = table.get("profiles") else {
            return Ok(());
        };
        let profiles = value
            .as_table()
            .ok_or_else(|| ConfigError::invalid("profiles", "expected a table of profiles"))?;

        for (profile_id, settings) in profiles {
            let key = format!("profiles.{}.expected-duration", profile_id);
            let Some(duration) = settings.as_table().and_then(|t| t.get("expected-duration")) else {
                continue;
            };
            let seconds = duration
                .as_integer()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::invalid(&key, "expected a positive number of seconds")
                })?;
            self.profile_durations.insert(profile_id.clone(), seconds as u64);
        }
        Ok(())
    }

    fn string_field(table: &toml::Table, key: &str) -> ConfigResult<Option<String>> {
        match table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| ConfigError::invalid(key, "expected a string")),
        }
    }

    fn positive_int_field(table: &toml::Table, key: &str) -> ConfigResult<Option<u64>> {
        match table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .filter(|n| *n > 0)
                .map(|n| Some(n as u64))
                .ok_or_else(|| ConfigError::invalid(key, "expected a positive integer")),
        }
    }

    /// Overlay global command-line options
    pub fn apply_args(&mut self, args: &Args) -> ConfigResult<()> {
        if let Some(url) = &args.engine_url {
            validate_engine_url(url).map_err(|e| ConfigError::invalid("--engine-url", e))?;
            self.engine_url = url.clone();
        }
        if let Some(key) = &args.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(seconds) = args.request_timeout {
            self.request_timeout = Duration::from_secs(seconds);
        }
        if let Some(agent) = &args.user_agent {
            self.user_agent = agent.clone();
        }
        if let Some(level) = &args.log_level {
            self.log_level = Some(level.clone());
        }
        if let Some(format) = &args.log_format {
            self.log_format = Some(format.clone());
        }
        if let Some(file) = &args.log_file {
            self.log_file = Some(file.clone());
        }
        if let Some(color) = args.color_choice() {
            self.color = Some(color);
        }
        Ok(())
    }

    /// Overlay `scan` subcommand options
    pub fn apply_scan_args(&mut self, scan: &ScanArgs) {
        if let Some(millis) = scan.poll_interval {
            self.poll_interval = Duration::from_millis(millis);
        }
        if let Some(count) = scan.max_transient_failures {
            self.max_transient_failures = count;
        }
        if scan.no_default_exclusions {
            self.use_default_exclusions = false;
        }
    }

    /// Log file destination; `none` and `-` disable file logging
    pub fn log_file_path(&self) -> Option<String> {
        let path = self.log_file.as_ref()?.to_string_lossy().to_string();
        match path.as_str() {
            "" | "none" | "-" => None,
            _ => Some(path),
        }
    }

    pub fn zap_config(&self) -> ZapConfig {
        ZapConfig {
            base_url: self.engine_url.clone(),
            api_key: self.api_key.clone(),
            request_timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
        }
    }

    /// Controller settings; configured exclusions ride along with the built-ins
    pub fn session_config(&self) -> SessionConfig {
        let mut default_exclusions: Vec<String> = if self.use_default_exclusions {
            DEFAULT_EXCLUSIONS.iter().map(|p| p.to_string()).collect()
        } else {
            Vec::new()
        };
        for pattern in &self.exclude_urls {
            if !default_exclusions.contains(pattern) {
                default_exclusions.push(pattern.clone());
            }
        }
        SessionConfig {
            poll_interval: self.poll_interval,
            max_transient_failures: self.max_transient_failures,
            default_exclusions,
        }
    }
}
