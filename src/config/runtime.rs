use serde::{Deserialize, Serialize};

use crate::analytics::SpikeFilterConfig;
use crate::engine::ReconcilerSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api: ApiSettings,
    pub reconciler: ReconcilerSettings,
    pub spike_filter: SpikeFilterConfig,
}

impl ConsoleConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // API validation
        if self.api.base_url.trim().is_empty() {
            errors.push("api.base_url must not be empty".to_string());
        }
        if self.api.timeout_secs == 0 {
            errors.push("api.timeout_secs must be > 0".to_string());
        }

        // Reconciler validation
        if self.reconciler.max_attempts == 0 {
            errors.push("reconciler.max_attempts must be > 0".to_string());
        }
        if self.reconciler.interval_ms == 0 {
            errors.push("reconciler.interval_ms must be > 0".to_string());
        }

        if let Err(filter_errors) = self.spike_filter.validate() {
            errors.extend(filter_errors.into_iter().map(|e| format!("spike_filter.{}", e)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Bearer token sent with every request, if the bot has auth enabled.
    pub token: Option<String>,
    /// Exchange id for the balance history; the bot's active one when unset.
    pub exchange: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 10,
            token: None,
            exchange: None,
        }
    }
}
