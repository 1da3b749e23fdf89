//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::error::ConfigError;

/// Message shown when a submission fails for a reason the backend did not explain.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Flow controller configuration.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Base URL of the signup/profile backend.
    pub api_base_url: String,
    /// Per-request timeout for submission calls.
    pub submit_timeout: Duration,
    /// Whether `FlowEvent::DevSkip` is honored.
    pub dev_skip_enabled: bool,
    /// Where the file-backed handoff store keeps its slots.
    pub handoff_path: PathBuf,
    /// User-facing fallback for unexpected submission failures.
    pub generic_failure_message: String,
    /// Pinned "today" for date rules. `None` follows the system clock.
    pub today: Option<NaiveDate>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            submit_timeout: Duration::from_secs(15),
            dev_skip_enabled: false,
            handoff_path: PathBuf::from("./data/handoff.json"),
            generic_failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            today: None,
        }
    }
}

impl FlowConfig {
    /// Build configuration from `JOBFLOW_*` environment variables, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = std::env::var("JOBFLOW_API_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "JOBFLOW_API_BASE_URL".to_string(),
                message: format!("expected an http(s) URL, got {api_base_url}"),
            });
        }

        let submit_timeout = std::env::var("JOBFLOW_SUBMIT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.submit_timeout);

        let dev_skip_enabled = std::env::var("JOBFLOW_DEV_SKIP")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let handoff_path = std::env::var("JOBFLOW_HANDOFF_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.handoff_path);

        let today = match std::env::var("JOBFLOW_TODAY") {
            Ok(s) => Some(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                ConfigError::InvalidValue {
                    key: "JOBFLOW_TODAY".to_string(),
                    message: format!("expected YYYY-MM-DD: {e}"),
                }
            })?),
            Err(_) => None,
        };

        Ok(Self {
            api_base_url,
            submit_timeout,
            dev_skip_enabled,
            handoff_path,
            generic_failure_message: defaults.generic_failure_message,
            today,
        })
    }

    /// The date the validation gate treats as today.
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Same configuration with "today" pinned to `date`.
    pub fn with_today(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    /// Same configuration with the developer skip turned on.
    pub fn with_dev_skip(mut self) -> Self {
        self.dev_skip_enabled = true;
        self
    }
}
