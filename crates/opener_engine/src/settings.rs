use std::path::Path;
use std::time::Duration;

use opener_core::{HostPattern, DEFAULT_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Tunables for the controller, bridge and panel.
///
/// Every field has a default, so a config file only needs the fields it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenerSettings {
    pub target_host: String,
    /// Download URLs with these prefixes belong to the page-level handler.
    pub excluded_url_prefixes: Vec<String>,
    pub dedupe_window_ms: u64,
    pub max_delivery_attempts: u32,
    pub retry_delay_ms: u64,
    pub reconnect_backoff_ms: u64,
    /// Content script injected into pages whose bridge is missing.
    pub bridge_script: String,
    /// Script the bridge injects into the page itself.
    pub page_script: String,
}

impl Default for OpenerSettings {
    fn default() -> Self {
        Self {
            target_host: "connect.bracu.ac.bd".to_string(),
            excluded_url_prefixes: vec!["blob:".to_string()],
            dedupe_window_ms: 10_000,
            max_delivery_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: 1_000,
            reconnect_backoff_ms: 1_000,
            bridge_script: "content.js".to_string(),
            page_script: "inject.js".to_string(),
        }
    }
}

impl OpenerSettings {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            ron::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_host.trim().is_empty() {
            return Err(ConfigError::Invalid("target_host is empty".into()));
        }
        if self.max_delivery_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_delivery_attempts must be at least 1".into(),
            ));
        }
        if self.excluded_url_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Invalid(
                "excluded_url_prefixes contains an empty prefix".into(),
            ));
        }
        Ok(())
    }

    pub fn host_pattern(&self) -> HostPattern {
        HostPattern::new(self.target_host.as_str())
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}
