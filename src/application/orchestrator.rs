use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::error::ZiriError;

/// Lifecycle states of one orchestrator run (spec §4.O):
/// `Idle → Initializing → Running → (Paused ↔ Running) → Completed | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Initializing,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// Coordinates the lifecycle of one `index`/`update` run independently of
/// the streaming pipeline doing the actual work: the CLI and any future
/// watcher integration drive this state machine, while `StreamingProcessor`
/// cooperates with it through `cancellation_token()` and `wait_if_paused()`.
pub struct Orchestrator {
    state: Mutex<OrchestratorState>,
    paused: AtomicBool,
    cancellation: CancellationToken,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OrchestratorState::Idle),
            paused: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock().expect("orchestrator state lock poisoned")
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn begin(&self) {
        self.set_state(OrchestratorState::Initializing);
    }

    pub fn run(&self) {
        self.set_state(OrchestratorState::Running);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.set_state(OrchestratorState::Paused);
        info!("orchestrator paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.set_state(OrchestratorState::Running);
        info!("orchestrator resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Terminal: releases resources without deleting the checkpoint, so a
    /// later run can resume (spec §4.O).
    pub fn cancel(&self) {
        self.cancellation.cancel();
        self.set_state(OrchestratorState::Cancelled);
        info!("orchestrator cancelled");
    }

    pub fn complete(&self) {
        self.set_state(OrchestratorState::Completed);
    }

    pub fn fail(&self) {
        self.set_state(OrchestratorState::Failed);
    }

    /// Cooperative pause point for the streaming loop: sleeps while paused
    /// and not cancelled, returning `Cancelled` immediately if cancellation
    /// fires while waiting.
    pub async fn wait_if_paused(&self) -> Result<(), ZiriError> {
        while self.is_paused() {
            if self.cancellation.is_cancelled() {
                return Err(ZiriError::Cancelled);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }

    fn set_state(&self, state: OrchestratorState) {
        *self.state.lock().expect("orchestrator state lock poisoned") = state;
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_and_transitions_through_a_normal_run() {
        let orchestrator = Orchestrator::new();
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);

        orchestrator.begin();
        assert_eq!(orchestrator.state(), OrchestratorState::Initializing);

        orchestrator.run();
        assert_eq!(orchestrator.state(), OrchestratorState::Running);

        orchestrator.complete();
        assert_eq!(orchestrator.state(), OrchestratorState::Completed);
    }

    #[test]
    fn pause_and_resume_toggle_between_paused_and_running() {
        let orchestrator = Orchestrator::new();
        orchestrator.begin();
        orchestrator.run();

        orchestrator.pause();
        assert!(orchestrator.is_paused());
        assert_eq!(orchestrator.state(), OrchestratorState::Paused);

        orchestrator.resume();
        assert!(!orchestrator.is_paused());
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
    }

    #[test]
    fn cancel_is_terminal_and_flips_the_cancellation_token() {
        let orchestrator = Orchestrator::new();
        orchestrator.begin();
        orchestrator.run();
        orchestrator.cancel();

        assert_eq!(orchestrator.state(), OrchestratorState::Cancelled);
        assert!(orchestrator.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn wait_if_paused_returns_once_resumed() {
        let orchestrator = std::sync::Arc::new(Orchestrator::new());
        orchestrator.begin();
        orchestrator.run();
        orchestrator.pause();

        let waiter = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.wait_if_paused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.resume();

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn wait_if_paused_returns_cancelled_error_if_cancelled_while_waiting() {
        let orchestrator = std::sync::Arc::new(Orchestrator::new());
        orchestrator.begin();
        orchestrator.run();
        orchestrator.pause();

        let waiter = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.wait_if_paused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ZiriError::Cancelled)));
    }
}
