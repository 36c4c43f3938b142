//! Runtime configuration.

use crate::error::{CalcError, CalcResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable holding the recognition backend base URL.
pub const ENV_API_URL: &str = "INKCALC_API_URL";
/// Environment variable for the request timeout in seconds (0 disables it).
pub const ENV_REQUEST_TIMEOUT: &str = "INKCALC_REQUEST_TIMEOUT_SECS";
/// Environment variable toggling annotations for assignment results.
pub const ENV_ANNOTATE_ASSIGNMENTS: &str = "INKCALC_ANNOTATE_ASSIGNMENTS";
/// Environment variable toggling cancellation of pending insertions on reset.
pub const ENV_CANCEL_ON_RESET: &str = "INKCALC_CANCEL_ON_RESET";

/// Backend used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8900";
/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// What happens to staged work when the board is reset or a new request starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CancelPolicy {
    /// Stale insertions and responses are dropped.
    #[default]
    DropStale,
    /// Stale insertions still land after a reset.
    Preserve,
}

/// Calculation workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcConfig {
    /// Base URL of the recognition backend (`{base_url}/calculate` is called).
    pub base_url: String,
    /// Request timeout; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Whether `assign` results also become visible annotations.
    pub annotate_assignments: bool,
    /// Handling of staged work across resets.
    pub cancel_policy: CancelPolicy,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            annotate_assignments: true,
            cancel_policy: CancelPolicy::DropStale,
        }
    }
}

impl CalcConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> CalcResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> CalcResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                CalcError::Config(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    ENV_REQUEST_TIMEOUT, raw
                ))
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup(ENV_ANNOTATE_ASSIGNMENTS) {
            config.annotate_assignments = parse_flag(ENV_ANNOTATE_ASSIGNMENTS, &raw)?;
        }

        if let Some(raw) = lookup(ENV_CANCEL_ON_RESET) {
            config.cancel_policy = if parse_flag(ENV_CANCEL_ON_RESET, &raw)? {
                CancelPolicy::DropStale
            } else {
                CancelPolicy::Preserve
            };
        }

        config.calculate_url()?;
        Ok(config)
    }

    /// The full `…/calculate` endpoint.
    pub fn calculate_url(&self) -> CalcResult<Url> {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let invalid = |e: url::ParseError| {
            CalcError::Config(format!("invalid backend URL {:?}: {}", self.base_url, e))
        };
        let base = Url::parse(&base).map_err(invalid)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(CalcError::Config(format!(
                "unsupported backend URL scheme {:?}",
                base.scheme()
            )));
        }
        base.join("calculate").map_err(invalid)
    }
}

fn parse_flag(key: &str, raw: &str) -> CalcResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CalcError::Config(format!("{} must be a boolean, got {:?}", key, raw))),
    }
}

/// Viewport the surface is created for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
    /// Device pixel ratio.
    pub device_pixel_ratio: f64,
    /// Left edge of the surface in client coordinates.
    #[serde(default)]
    pub origin_x: f64,
    /// Top edge of the surface in client coordinates.
    #[serde(default)]
    pub origin_y: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            device_pixel_ratio: 1.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}
