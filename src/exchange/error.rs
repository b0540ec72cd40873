use thiserror::Error;

/// Errors raised while talking to the bot's HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport or timeout error from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Unexpected status {code}: {detail}")]
    Status { code: u16, detail: String },

    /// Body could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialize(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// FastAPI-style error body: `{"detail": "..."}`, sometimes `{"message": "..."}`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn get_message(&self) -> Option<String> {
        self.detail.clone().or_else(|| self.message.clone())
    }
}
