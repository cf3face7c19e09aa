//! Pipeline lifecycle state machine.
//!
//! One [`Lifecycle`] per pipeline tracks
//! `NotStarted -> Running -> Draining -> Stopped` and broadcasts
//! transitions over a watch channel so waiters can suspend without
//! polling.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle state of a stream pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, not yet consuming.
    NotStarted,

    /// Consuming the input topic and accepting new streams.
    Running,

    /// No longer accepting new streams; open bindings are flushing.
    Draining,

    /// All bindings finished or were forcibly stopped. Terminal.
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NotStarted => write!(f, "NotStarted"),
            PipelineState::Running => write!(f, "Running"),
            PipelineState::Draining => write!(f, "Draining"),
            PipelineState::Stopped => write!(f, "Stopped"),
        }
    }
}

impl PipelineState {
    fn rank(self) -> u8 {
        match self {
            PipelineState::NotStarted => 0,
            PipelineState::Running => 1,
            PipelineState::Draining => 2,
            PipelineState::Stopped => 3,
        }
    }
}

/// Watchable pipeline lifecycle.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<PipelineState>,
}

impl Lifecycle {
    /// Creates a lifecycle in `NotStarted`.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PipelineState::NotStarted);
        Self { tx }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.tx.borrow()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<PipelineState> {
        self.tx.subscribe()
    }

    /// Advances to `next` if that is a forward transition.
    ///
    /// Returns `false` (and leaves the state unchanged) if `next` is not
    /// ahead of the current state; the machine never moves backwards and
    /// `Stopped` is terminal.
    pub fn advance(&self, next: PipelineState) -> bool {
        let mut advanced = false;
        self.tx.send_modify(|state| {
            if next.rank() > state.rank() {
                debug!(from = %state, to = %next, "pipeline state transition");
                *state = next;
                advanced = true;
            }
        });
        advanced
    }

    /// Waits until the lifecycle reaches `Stopped`, bounded by `timeout`.
    ///
    /// Returns `true` if the pipeline stopped within the bound, `false`
    /// if the timeout elapsed first.
    pub async fn wait_for_stopped(&self, timeout: Duration) -> bool {
        let mut rx = self.watch();
        let result = tokio::time::timeout(timeout, rx.wait_for(|s| *s == PipelineState::Stopped))
            .await
            .is_ok();
        result
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
