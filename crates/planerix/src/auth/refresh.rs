//! Single-flight coordination of access token refreshes.
//!
//! At most one refresh runs per client. The first caller that needs a new
//! token becomes the leader and performs the network call; every caller that
//! arrives while it is in flight is queued and receives the leader's result.
//!
//! ```text
//!   Idle --begin()--> Refreshing { waiters } --settle(result)--> Idle
//!                          ^          |
//!                          +-begin()--+  (queued as a follower)
//! ```

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::tokens::AccessToken;

/// Refresh protocol state.
#[derive(Debug, Default)]
enum AuthState {
    #[default]
    Idle,
    Refreshing {
        /// Callers waiting on the in-flight refresh, in arrival order.
        waiters: Vec<oneshot::Sender<Option<AccessToken>>>,
    },
}

/// Owns the refresh state of one client instance.
#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<AuthState>,
}

/// What a caller must do after asking for a refreshed token.
#[derive(Debug)]
pub(crate) enum RefreshTicket {
    /// Perform the refresh and report the outcome through the guard.
    Leader(LeaderGuard),
    /// Wait for the in-flight refresh.
    Follower(Waiter),
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join the refresh protocol.
    ///
    /// Moves `Idle -> Refreshing` and returns a leader ticket, or, if a
    /// refresh is already in flight, subscribes the caller to its result.
    ///
    /// The leader guard owns a handle to the coordinator so it can be moved
    /// into a spawned task.
    pub(crate) fn begin(self: &Arc<Self>) -> RefreshTicket {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let AuthState::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            trace!(queued = waiters.len(), "waiting on in-flight token refresh");
            return RefreshTicket::Follower(Waiter(rx));
        }

        *state = AuthState::Refreshing {
            waiters: Vec::new(),
        };
        debug!("starting token refresh");
        RefreshTicket::Leader(LeaderGuard {
            coordinator: Arc::clone(self),
            settled: false,
        })
    }

    /// Whether a refresh is currently in flight.
    pub(crate) fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            AuthState::Refreshing { .. }
        )
    }

    /// Reset to `Idle` and hand `result` to every waiter in FIFO order.
    fn settle(&self, result: Option<AccessToken>) -> usize {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match mem::take(&mut *state) {
                AuthState::Refreshing { waiters } => waiters,
                AuthState::Idle => Vec::new(),
            }
        };

        let count = waiters.len();
        for waiter in waiters {
            // A waiter whose request was dropped is simply skipped.
            let _ = waiter.send(result.clone());
        }
        count
    }
}

/// Held by the task performing the refresh.
///
/// Dropping the guard without calling [`LeaderGuard::settle`] (the refresh
/// task panicked or the runtime shut down) settles the refresh as failed, so
/// queued callers never hang.
#[derive(Debug)]
pub(crate) struct LeaderGuard {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl LeaderGuard {
    /// Publish the refresh outcome. Returns the number of notified waiters.
    pub(crate) fn settle(mut self, result: Option<AccessToken>) -> usize {
        self.settled = true;
        let notified = self.coordinator.settle(result);
        debug!(notified, "token refresh settled");
        notified
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if !self.settled {
            debug!("token refresh abandoned, releasing waiters");
            self.coordinator.settle(None);
        }
    }
}

/// Receives the outcome of a refresh started by another caller.
#[derive(Debug)]
pub(crate) struct Waiter(oneshot::Receiver<Option<AccessToken>>);

impl Waiter {
    /// Resolves once the in-flight refresh settles. `None` means it failed.
    pub(crate) async fn wait(self) -> Option<AccessToken> {
        self.0.await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(ticket: RefreshTicket) -> LeaderGuard {
        match ticket {
            RefreshTicket::Leader(guard) => guard,
            RefreshTicket::Follower(_) => panic!("expected leader ticket"),
        }
    }

    fn follower(ticket: RefreshTicket) -> Waiter {
        match ticket {
            RefreshTicket::Follower(waiter) => waiter,
            RefreshTicket::Leader(_) => panic!("expected follower ticket"),
        }
    }

    #[tokio::test]
    async fn first_caller_leads_and_later_callers_follow() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        assert!(!coordinator.is_refreshing());

        let guard = leader(coordinator.begin());
        assert!(coordinator.is_refreshing());

        let first = follower(coordinator.begin());
        let second = follower(coordinator.begin());

        assert_eq!(guard.settle(Some(AccessToken::new("tok2"))), 2);
        assert!(!coordinator.is_refreshing());

        assert_eq!(first.wait().await, Some(AccessToken::new("tok2")));
        assert_eq!(second.wait().await, Some(AccessToken::new("tok2")));
    }

    #[tokio::test]
    async fn failed_refresh_notifies_waiters_with_none() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = leader(coordinator.begin());
        let waiter = follower(coordinator.begin());

        guard.settle(None);

        assert_eq!(waiter.wait().await, None);
    }

    #[tokio::test]
    async fn waiters_are_notified_before_state_is_reused() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = leader(coordinator.begin());
        let waiters: Vec<Waiter> = (0..5).map(|_| follower(coordinator.begin())).collect();

        assert_eq!(guard.settle(Some(AccessToken::new("tok2"))), 5);

        // The list was drained: a new refresh starts with no inherited waiters.
        assert_eq!(leader(coordinator.begin()).settle(None), 0);

        for waiter in waiters {
            assert_eq!(waiter.wait().await, Some(AccessToken::new("tok2")));
        }
    }

    #[tokio::test]
    async fn state_returns_to_idle_after_settling() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        leader(coordinator.begin()).settle(None);

        // A new refresh may start once the previous one settled.
        let guard = leader(coordinator.begin());
        guard.settle(Some(AccessToken::new("tok3")));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn panicked_refresh_task_releases_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = leader(coordinator.begin());
        let waiter = follower(coordinator.begin());

        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("refresh task failed");
        });
        assert!(task.await.is_err());

        assert!(!coordinator.is_refreshing());
        assert_eq!(waiter.wait().await, None);
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_block_others() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = leader(coordinator.begin());
        let gone = follower(coordinator.begin());
        let kept = follower(coordinator.begin());
        drop(gone);

        assert_eq!(guard.settle(Some(AccessToken::new("tok2"))), 2);
        assert_eq!(kept.wait().await, Some(AccessToken::new("tok2")));
    }
}
