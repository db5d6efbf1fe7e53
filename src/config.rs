//! Transport settings. The stop/route pair is passed separately to the
//! facade; this only covers where and how long to ask.

use std::time::Duration;

use tracing::warn;

use crate::fetch::{DEFAULT_TIMEOUT, RESOURCE_URL};

pub const ENDPOINT_ENV: &str = "BIZKAIBUS_ENDPOINT";
pub const TIMEOUT_ENV: &str = "BIZKAIBUS_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: RESOURCE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Settings {
    /// Defaults, overridden by `BIZKAIBUS_ENDPOINT` and
    /// `BIZKAIBUS_TIMEOUT_SECS` when set. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.is_empty()) {
            settings.endpoint = endpoint;
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "Ignoring invalid {}", TIMEOUT_ENV),
            }
        }

        settings
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
