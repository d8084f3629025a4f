//! Per-call cancellation for the reconciler's poll loops.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Stops the polls that are in flight without affecting later calls.
///
/// Every operation takes a child of the current token when it starts.
/// [`CancelHandle::cancel_in_flight`] cancels that token and installs a
/// fresh one, so calls started afterwards poll normally. Clones share
/// state, which lets a signal handler hold a handle while the driver is
/// borrowed elsewhere.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    /// Creates a handle with nothing cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every call started before this point.
    pub fn cancel_in_flight(&self) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
    }

    /// Token scoped to one operation.
    pub(crate) fn call_token(&self) -> CancellationToken {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_reaches_only_earlier_calls() {
        let handle = CancelHandle::new();
        let earlier = handle.call_token();
        handle.clone().cancel_in_flight();
        let later = handle.call_token();

        assert!(earlier.is_cancelled());
        assert!(!later.is_cancelled());
    }
}
