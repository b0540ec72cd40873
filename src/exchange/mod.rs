#![allow(dead_code)]
pub mod dashboard;
pub mod error;

pub use dashboard::*;
pub use error::*;

use async_trait::async_trait;
use crate::types::{BalanceHistory, CommandAck, StatusSnapshot};

/// Remote trading engine as seen from the console.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Fires a state-changing command at `endpoint` (e.g. `/api/engine/on`).
    async fn submit_command(&self, endpoint: &str) -> ApiResult<CommandAck>;
    async fn fetch_status(&self) -> ApiResult<StatusSnapshot>;
    async fn fetch_balance_history(&self, exchange: Option<String>) -> ApiResult<BalanceHistory>;
}
