use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::error::{ApiError, ApiResult, ErrorBody};
use super::EngineApi;
use crate::config::ApiSettings;
use crate::types::{BalanceHistory, CommandAck, StatusSnapshot};

const STATUS_PATH: &str = "/api/status";
const BALANCE_HISTORY_PATH: &str = "/api/history/balance";

/// HTTP client for the bot's dashboard API.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl DashboardClient {
    pub fn new(settings: &ApiSettings) -> ApiResult<Self> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> ApiResult<String> {
        if !path.starts_with('/') {
            return Err(ApiError::InvalidUrl(path.to_string()));
        }
        Ok(format!("{}{}", self.base_url, path))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let resp = self.authorize(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        parse_response(status, &body)
    }
}

/// Decodes a response body, turning non-2xx codes into [`ApiError::Status`]
/// with whatever detail the server sent.
pub(crate) fn parse_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> ApiResult<T> {
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.get_message())
            .unwrap_or_else(|| body.trim().to_string());
        return Err(ApiError::Status {
            code: status.as_u16(),
            detail,
        });
    }

    serde_json::from_str(body).map_err(|e| ApiError::Deserialize(e.to_string()))
}

#[async_trait]
impl EngineApi for DashboardClient {
    async fn submit_command(&self, endpoint: &str) -> ApiResult<CommandAck> {
        let url = self.url(endpoint)?;
        debug!("POST {}", url);
        self.read(self.client.post(&url).json(&serde_json::json!({}))).await
    }

    async fn fetch_status(&self) -> ApiResult<StatusSnapshot> {
        let url = self.url(STATUS_PATH)?;
        self.read(self.client.get(&url)).await
    }

    async fn fetch_balance_history(&self, exchange: Option<String>) -> ApiResult<BalanceHistory> {
        let url = self.url(BALANCE_HISTORY_PATH)?;
        let mut request = self.client.get(&url);
        if let Some(exchange) = exchange {
            request = request.query(&[("exchange", exchange)]);
        }
        self.read(request).await
    }
}
