use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle of a [`BatchRenderDriver`](crate::driver::BatchRenderDriver).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// No run started yet.
    Idle,
    /// Stepping through a plan.
    Running,
    /// Every item was processed.
    Completed,
    /// Stopped between items on request.
    Cancelled,
    /// Stopped on a fatal error.
    Failed,
}

impl DriverState {
    /// `true` for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DriverState::Completed | DriverState::Cancelled | DriverState::Failed
        )
    }
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DriverState::Idle => "idle",
            DriverState::Running => "running",
            DriverState::Completed => "completed",
            DriverState::Cancelled => "cancelled",
            DriverState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Cooperative cancellation flag, polled by the driver between work items.
///
/// Clones share the flag, so one can be handed to a signal handler or UI thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A cleared token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next item boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn terminal_states() {
        assert!(!DriverState::Idle.is_terminal());
        assert!(!DriverState::Running.is_terminal());
        assert!(DriverState::Cancelled.is_terminal());
        assert_eq!(DriverState::Failed.to_string(), "failed");
    }
}
