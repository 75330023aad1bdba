use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Arc<Inner>>,
}

impl Inner {
    fn is_done(&self, now: Instant) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            return true;
        }
        self.parent.as_ref().is_some_and(|parent| parent.is_done(now))
    }
}

/// Cancellation scope for long-running work.
///
/// Cancelling a context also cancels everything derived from it, never its
/// ancestors. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

impl ExecutionContext {
    /// Root context for the process lifetime. Nothing cancels it implicitly.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
                parent: None,
            }),
        }
    }

    pub fn with_cancel(&self) -> Self {
        self.derive(None)
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.derive(Some(Instant::now() + timeout))
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        // A child can only tighten the parent's deadline.
        let deadline = match (deadline, self.deadline()) {
            (Some(own), Some(inherited)) => Some(own.min(inherited)),
            (own, inherited) => own.or(inherited),
        };
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent: Some(Arc::clone(&self.inner)),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_done(Instant::now())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_live_and_unbounded() {
        let ctx = ExecutionContext::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn cancel_propagates_down_not_up() {
        let root = ExecutionContext::background();
        let child = root.with_cancel();
        let grandchild = child.with_cancel();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(!root.is_cancelled());

        let sibling = root.with_cancel();
        root.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn clones_share_cancellation() {
        let ctx = ExecutionContext::background();
        let shared = ctx.clone();
        shared.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn elapsed_timeout_counts_as_cancelled() {
        let root = ExecutionContext::background();
        let expired = root.with_timeout(Duration::ZERO);
        assert!(expired.is_cancelled());
        assert_eq!(expired.remaining(), Some(Duration::ZERO));
        assert!(!root.is_cancelled());

        let generous = root.with_timeout(Duration::from_secs(3600));
        assert!(!generous.is_cancelled());
        assert!(generous.remaining().expect("deadline set") > Duration::from_secs(3500));
    }

    #[test]
    fn child_never_outlives_parent_deadline() {
        let parent = ExecutionContext::background().with_timeout(Duration::from_secs(10));
        let child = parent.with_timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
