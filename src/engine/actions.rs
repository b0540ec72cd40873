use serde::{Deserialize, Serialize};

use crate::types::EngineState;

/// State-changing commands the bot accepts, each with the state it should
/// settle in once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineAction {
    Start,
    Stop,
    Pause,
    Resume,
}

impl EngineAction {
    pub fn endpoint(&self) -> &'static str {
        match self {
            EngineAction::Start => "/api/engine/on",
            EngineAction::Stop => "/api/engine/off",
            EngineAction::Pause => "/api/panic/stop",
            EngineAction::Resume => "/api/panic/start",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EngineAction::Start => "Starting engine",
            EngineAction::Stop => "Stopping engine",
            EngineAction::Pause => "Pausing",
            EngineAction::Resume => "Resuming",
        }
    }

    pub fn target(&self) -> EngineState {
        match self {
            EngineAction::Start | EngineAction::Resume => EngineState::Running,
            EngineAction::Stop => EngineState::Stopped,
            EngineAction::Pause => EngineState::Paused,
        }
    }
}

impl std::fmt::Display for EngineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineAction::Start => write!(f, "start"),
            EngineAction::Stop => write!(f, "stop"),
            EngineAction::Pause => write!(f, "pause"),
            EngineAction::Resume => write!(f, "resume"),
        }
    }
}

/// Fire-and-forget emergency commands; the bot reports no state change for
/// these, so they are sent once without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanicCommand {
    CancelAll,
    SellAll,
}

impl PanicCommand {
    pub fn endpoint(&self) -> &'static str {
        match self {
            PanicCommand::CancelAll => "/api/panic/cancel_all",
            PanicCommand::SellAll => "/api/panic/sell_all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PanicCommand::CancelAll => "Cancelling all open orders",
            PanicCommand::SellAll => "Selling all positions at market",
        }
    }
}
