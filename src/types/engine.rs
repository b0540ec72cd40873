use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Engine state as reported by the bot's status endpoint. Strings outside the
/// known set are carried verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngineState {
    Running,
    Paused,
    Stopped,
    Offline,
    Unknown(String),
}

impl EngineState {
    pub fn as_str(&self) -> &str {
        match self {
            EngineState::Running => "Running",
            EngineState::Paused => "Paused",
            EngineState::Stopped => "Stopped",
            EngineState::Offline => "Offline",
            EngineState::Unknown(s) => s,
        }
    }
}

impl From<String> for EngineState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Running" => EngineState::Running,
            "Paused" => EngineState::Paused,
            "Stopped" => EngineState::Stopped,
            "Offline" => EngineState::Offline,
            _ => EngineState::Unknown(s),
        }
    }
}

impl From<EngineState> for String {
    fn from(state: EngineState) -> Self {
        match state {
            EngineState::Unknown(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of `GET /api/status`. Only `status` matters here; the rest of the
/// telemetry is kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: EngineState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusSnapshot {
    pub fn new(status: EngineState) -> Self {
        Self {
            status,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Warning,
    Error,
    /// Any other indicator; only an explicit `error` rejects a command.
    #[serde(other)]
    Other,
}

/// Body returned by the command endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAck {
    #[serde(default = "default_ack_status")]
    pub status: AckStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

fn default_ack_status() -> AckStatus {
    AckStatus::Success
}

impl CommandAck {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            message: Some(message.into()),
            detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: None,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != AckStatus::Error
    }

    /// Best available human-readable explanation.
    pub fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Request failed".to_string())
    }
}
