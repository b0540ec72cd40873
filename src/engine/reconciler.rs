use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::actions::{EngineAction, PanicCommand};
use crate::exchange::EngineApi;
use crate::types::{CommandAck, EngineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval_ms: 2_500,
        }
    }
}

impl ReconcilerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Longest time a reconciliation can poll before timing out.
    pub fn worst_case(&self) -> Duration {
        self.interval() * self.max_attempts
    }
}

/// Terminal result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconcileOutcome {
    Converged(EngineState),
    RequestFailed(String),
    TimedOut { attempts: u32 },
    Aborted { attempts: u32 },
}

impl ReconcileOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, ReconcileOutcome::Converged(_))
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileOutcome::Converged(state) => write!(f, "Engine is now {}", state),
            ReconcileOutcome::RequestFailed(detail) => write!(f, "Request failed: {}", detail),
            ReconcileOutcome::TimedOut { attempts } => write!(
                f,
                "State did not update after {} checks; the engine may still be changing state, check the bot logs",
                attempts
            ),
            ReconcileOutcome::Aborted { attempts } => {
                write!(f, "Aborted after {} checks; the command was already sent", attempts)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Polling,
    Converged,
    TimedOut,
    Aborted,
}

/// Polling state machine. Each [`tick`](Self::tick) applies one status
/// observation; once a terminal phase is reached further ticks are ignored.
#[derive(Debug, Clone)]
pub struct ConvergencePoll {
    target: EngineState,
    max_attempts: u32,
    attempts: u32,
    phase: PollPhase,
}

impl ConvergencePoll {
    pub fn new(target: EngineState, max_attempts: u32) -> Self {
        Self {
            target,
            max_attempts,
            attempts: 0,
            phase: PollPhase::Polling,
        }
    }

    /// A failed read counts as an attempt but never terminates the poll on its
    /// own; the attempt budget still applies.
    pub fn tick<E: Display>(&mut self, observation: Result<&EngineState, E>) -> PollPhase {
        if self.is_terminal() {
            debug!("Ignoring status tick after {:?}", self.phase);
            return self.phase;
        }

        self.attempts += 1;
        match observation {
            Ok(state) if *state == self.target => {
                self.phase = PollPhase::Converged;
                return self.phase;
            }
            Ok(state) => {
                debug!(
                    "Poll {}/{}: engine is {}, waiting for {}",
                    self.attempts, self.max_attempts, state, self.target
                );
            }
            Err(e) => {
                warn!("Poll {}/{}: status check failed: {}", self.attempts, self.max_attempts, e);
            }
        }

        if self.attempts >= self.max_attempts {
            self.phase = PollPhase::TimedOut;
        }
        self.phase
    }

    pub fn abort(&mut self) {
        if !self.is_terminal() {
            self.phase = PollPhase::Aborted;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase != PollPhase::Polling
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn outcome(&self) -> Option<ReconcileOutcome> {
        match self.phase {
            PollPhase::Polling => None,
            PollPhase::Converged => Some(ReconcileOutcome::Converged(self.target.clone())),
            PollPhase::TimedOut => Some(ReconcileOutcome::TimedOut { attempts: self.attempts }),
            PollPhase::Aborted => Some(ReconcileOutcome::Aborted { attempts: self.attempts }),
        }
    }
}

/// Cloneable abort flag for a running reconciliation.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Resolves once [`abort`](Self::abort) has been called.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

/// Sends a command to the engine and polls its status until it reports the
/// expected state.
pub struct ActionReconciler<A> {
    api: A,
    settings: ReconcilerSettings,
}

impl<A: EngineApi> ActionReconciler<A> {
    pub fn new(api: A, settings: ReconcilerSettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub async fn reconcile(&self, action: EngineAction) -> ReconcileOutcome {
        self.reconcile_with_abort(action, &AbortSignal::new()).await
    }

    pub async fn reconcile_with_abort(&self, action: EngineAction, abort: &AbortSignal) -> ReconcileOutcome {
        self.run(action.endpoint(), action.label(), action.target(), abort).await
    }

    /// Sends a one-shot command with no state to wait for.
    pub async fn send_once(&self, command: PanicCommand) -> Result<CommandAck, String> {
        self.submit(command.endpoint(), command.label()).await
    }

    async fn submit(&self, endpoint: &str, label: &str) -> Result<CommandAck, String> {
        info!("{}: sending {}", label, endpoint);

        match self.api.submit_command(endpoint).await {
            Ok(ack) if ack.is_success() => {
                if let Some(message) = &ack.message {
                    info!("{}: {}", label, message);
                }
                Ok(ack)
            }
            Ok(ack) => {
                let detail = ack.describe();
                warn!("{}: command rejected: {}", label, detail);
                Err(detail)
            }
            Err(e) => {
                warn!("{}: command request failed: {}", label, e);
                Err(e.to_string())
            }
        }
    }

    /// Submits `endpoint` once, then polls until the engine reports `target`,
    /// the attempt budget runs out, or `abort` fires.
    pub async fn run(
        &self,
        endpoint: &str,
        label: &str,
        target: EngineState,
        abort: &AbortSignal,
    ) -> ReconcileOutcome {
        if let Err(detail) = self.submit(endpoint, label).await {
            return ReconcileOutcome::RequestFailed(detail);
        }

        let mut poll = ConvergencePoll::new(target, self.settings.max_attempts);
        let interval = self.settings.interval();

        while !poll.is_terminal() {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = abort.aborted() => {}
            }
            if abort.is_aborted() {
                poll.abort();
                break;
            }

            let observation = self.api.fetch_status().await.map(|s| s.status);
            poll.tick(observation.as_ref());
        }

        let outcome = poll.outcome().unwrap_or(ReconcileOutcome::TimedOut {
            attempts: poll.attempts(),
        });
        match &outcome {
            ReconcileOutcome::Converged(state) => {
                info!("{}: engine reached {} after {} checks", label, state, poll.attempts())
            }
            other => warn!("{}: {}", label, other),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ApiError, MockEngineApi};
    use crate::types::{CommandAck, StatusSnapshot};
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    fn accepting_api() -> MockEngineApi {
        let mut api = MockEngineApi::new();
        api.expect_submit_command()
            .times(1)
            .returning(|_| Ok(CommandAck::success("ok")));
        api
    }

    fn status(state: EngineState) -> Result<StatusSnapshot, ApiError> {
        Ok(StatusSnapshot::new(state))
    }

    #[test]
    fn test_poll_converges_on_target() {
        let mut poll = ConvergencePoll::new(EngineState::Paused, 15);
        assert_eq!(poll.tick::<ApiError>(Ok(&EngineState::Running)), PollPhase::Polling);
        assert_eq!(poll.tick::<ApiError>(Ok(&EngineState::Paused)), PollPhase::Converged);
        assert!(poll.is_terminal());
        assert_eq!(poll.attempts(), 2);
        assert_eq!(poll.outcome(), Some(ReconcileOutcome::Converged(EngineState::Paused)));
    }

    #[test]
    fn test_poll_termination_is_idempotent() {
        let mut poll = ConvergencePoll::new(EngineState::Running, 3);
        poll.tick::<ApiError>(Ok(&EngineState::Running));

        // A late response from an overlapping tick must not change anything.
        assert_eq!(poll.tick::<ApiError>(Ok(&EngineState::Stopped)), PollPhase::Converged);
        poll.abort();
        assert_eq!(poll.phase(), PollPhase::Converged);
        assert_eq!(poll.attempts(), 1);
    }

    #[test]
    fn test_poll_times_out_at_budget() {
        let mut poll = ConvergencePoll::new(EngineState::Stopped, 3);
        assert_eq!(poll.tick::<ApiError>(Ok(&EngineState::Running)), PollPhase::Polling);
        assert_eq!(poll.tick(Err("connection reset")), PollPhase::Polling);
        assert_eq!(poll.tick::<ApiError>(Ok(&EngineState::Running)), PollPhase::TimedOut);
        assert_eq!(poll.outcome(), Some(ReconcileOutcome::TimedOut { attempts: 3 }));
    }

    #[test]
    fn test_failed_read_never_converges() {
        let mut poll = ConvergencePoll::new(EngineState::Running, 15);
        assert_eq!(poll.tick(Err("timeout")), PollPhase::Polling);
        assert!(!poll.is_terminal());
        assert_eq!(poll.outcome(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_third_poll() {
        let mut api = accepting_api();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        api.expect_fetch_status().times(3).returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= 3 {
                status(EngineState::Running)
            } else {
                status(EngineState::Stopped)
            }
        });

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let started = Instant::now();
        let outcome = reconciler.reconcile(EngineAction::Start).await;

        assert_eq!(outcome, ReconcileOutcome::Converged(EngineState::Running));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(7_500) && elapsed < Duration::from_millis(7_600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_attempts() {
        let mut api = accepting_api();
        api.expect_fetch_status()
            .times(15)
            .returning(|| status(EngineState::Stopped));

        let settings = ReconcilerSettings::default();
        let reconciler = ActionReconciler::new(api, settings);
        let started = Instant::now();
        let outcome = reconciler.reconcile(EngineAction::Pause).await;

        assert_eq!(outcome, ReconcileOutcome::TimedOut { attempts: 15 });
        let elapsed = started.elapsed();
        assert_eq!(settings.worst_case(), Duration::from_millis(37_500));
        assert!(elapsed >= Duration::from_millis(37_500) && elapsed < Duration::from_millis(37_600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_command_skips_polling() {
        let mut api = MockEngineApi::new();
        api.expect_submit_command()
            .withf(|endpoint: &str| endpoint == "/api/engine/off")
            .times(1)
            .returning(|_| Ok(CommandAck::error("Error interno")));
        api.expect_fetch_status().never();

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let outcome = reconciler.reconcile(EngineAction::Stop).await;

        assert_eq!(outcome, ReconcileOutcome::RequestFailed("Error interno".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_on_submit_skips_polling() {
        let mut api = MockEngineApi::new();
        api.expect_submit_command().times(1).returning(|_| {
            Err(ApiError::Status {
                code: 503,
                detail: "Bot no conectado".to_string(),
            })
        });
        api.expect_fetch_status().never();

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let outcome = reconciler.reconcile(EngineAction::Resume).await;

        match outcome {
            ReconcileOutcome::RequestFailed(detail) => assert!(detail.contains("Bot no conectado")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_ack_status_goes_on_to_polling() {
        let mut api = MockEngineApi::new();
        api.expect_submit_command().times(1).returning(|_| {
            serde_json::from_str(r#"{"status": "ok", "message": "done"}"#)
                .map_err(|e| ApiError::Deserialize(e.to_string()))
        });
        api.expect_fetch_status()
            .times(1)
            .returning(|| status(EngineState::Running));

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let outcome = reconciler.reconcile(EngineAction::Start).await;

        assert_eq!(outcome, ReconcileOutcome::Converged(EngineState::Running));
    }

    #[tokio::test]
    async fn test_panic_command_is_sent_once_without_polling() {
        let mut api = MockEngineApi::new();
        api.expect_submit_command()
            .withf(|endpoint: &str| endpoint == "/api/panic/cancel_all")
            .times(1)
            .returning(|_| Ok(CommandAck::success("Órdenes canceladas.")));
        api.expect_fetch_status().never();

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let ack = reconciler.send_once(PanicCommand::CancelAll).await.unwrap();

        assert_eq!(ack.message.as_deref(), Some("Órdenes canceladas."));
    }

    #[tokio::test]
    async fn test_rejected_panic_command_reports_detail() {
        let mut api = MockEngineApi::new();
        api.expect_submit_command()
            .times(1)
            .returning(|_| Ok(CommandAck::error("Bot no iniciado")));
        api.expect_fetch_status().never();

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let result = reconciler.send_once(PanicCommand::SellAll).await;

        assert_eq!(result.unwrap_err(), "Bot no iniciado");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_swallowed() {
        let mut api = accepting_api();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        api.expect_fetch_status().times(3).returning(move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(ApiError::Deserialize("expected value".to_string())),
                _ => status(EngineState::Paused),
            }
        });

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let outcome = reconciler.reconcile(EngineAction::Pause).await;

        assert_eq!(outcome, ReconcileOutcome::Converged(EngineState::Paused));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_status_still_times_out() {
        let mut api = accepting_api();
        api.expect_fetch_status()
            .times(4)
            .returning(|| Err(ApiError::Deserialize("connection refused".to_string())));

        let settings = ReconcilerSettings {
            max_attempts: 4,
            interval_ms: 1_000,
        };
        let reconciler = ActionReconciler::new(api, settings);
        let outcome = reconciler.reconcile(EngineAction::Start).await;

        assert_eq!(outcome, ReconcileOutcome::TimedOut { attempts: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_short_circuits_next_tick() {
        let mut api = accepting_api();
        api.expect_fetch_status()
            .times(2)
            .returning(|| status(EngineState::Running));

        let reconciler = ActionReconciler::new(api, ReconcilerSettings::default());
        let abort = AbortSignal::new();
        let trigger = abort.clone();

        let (outcome, _) = tokio::join!(
            reconciler.reconcile_with_abort(EngineAction::Stop, &abort),
            async move {
                tokio::time::sleep(Duration::from_millis(6_000)).await;
                trigger.abort();
            }
        );

        assert_eq!(outcome, ReconcileOutcome::Aborted { attempts: 2 });
    }

    #[tokio::test]
    async fn test_abort_before_start_is_observed() {
        let signal = AbortSignal::new();
        signal.abort();
        signal.aborted().await;
        assert!(signal.is_aborted());
    }

    #[test]
    fn test_outcome_messages() {
        let timeout = ReconcileOutcome::TimedOut { attempts: 15 }.to_string();
        assert!(timeout.contains("may still be changing state"));
        assert!(ReconcileOutcome::Converged(EngineState::Stopped).is_converged());
        assert!(!ReconcileOutcome::RequestFailed("x".into()).is_converged());
    }
}
