//! Job handles and operation states.

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EstafetaError;

/// How a finished operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Cancelled,
}

/// Where an operation is.
///
/// ```text
/// Idle -> Connecting -> Connected -> Writing -> Finalizing -> Closed(Success)
///             |                         |
///             v                         v
///       ConnectFailed             WriteFailed      (retry: back to Connecting)
///             |                         |
///             +-------> Closed(Failure) <+
/// ```
///
/// Any state can move to `Closed(Cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum OpState {
    /// Queued behind another operation on the same printer
    Idle,
    Connecting,
    Connected,
    Writing,
    Finalizing,
    ConnectFailed,
    WriteFailed,
    Closed(Outcome),
}

impl OpState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OpState::Closed(_))
    }
}

enum Completion {
    Running(JoinHandle<Result<(), EstafetaError>>),
    Rejected(EstafetaError),
}

/// # Job Handle
///
/// Returned by every device operation. Dropping it leaves the job running.
pub struct JobHandle {
    id: Uuid,
    cancel: CancellationToken,
    state: watch::Receiver<OpState>,
    completion: Completion,
}

impl JobHandle {
    pub(crate) fn running(
        id: Uuid,
        cancel: CancellationToken,
        state: watch::Receiver<OpState>,
        task: JoinHandle<Result<(), EstafetaError>>,
    ) -> Self {
        Self {
            id,
            cancel,
            state,
            completion: Completion::Running(task),
        }
    }

    /// A job refused before launch. It is already closed.
    pub(crate) fn rejected(id: Uuid, error: EstafetaError) -> Self {
        let (_, state) = watch::channel(OpState::Closed(Outcome::Failure));
        Self {
            id,
            cancel: CancellationToken::new(),
            state,
            completion: Completion::Rejected(error),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the job to stop. It stops before the next chunk, pause or
    /// connection attempt.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this job. Useful to tie it to a wider shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state.
    pub fn state(&self) -> OpState {
        *self.state.borrow()
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<OpState> {
        self.state.clone()
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.completion, Completion::Rejected(_))
    }

    /// Wait for the job and return its result.
    pub async fn wait(self) -> Result<(), EstafetaError> {
        match self.completion {
            Completion::Running(task) => task
                .await
                .map_err(|e| EstafetaError::Task(e.to_string()))?,
            Completion::Rejected(error) => Err(error),
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("rejected", &self.is_rejected())
            .finish()
    }
}
