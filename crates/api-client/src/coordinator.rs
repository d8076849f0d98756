//! Single-flight refresh coordination.
//!
//! The first request that observes an expired token becomes the leader and
//! performs the refresh. Every request that observes an expired token while
//! the refresh is in flight becomes a waiter and is settled, in arrival order,
//! with the leader's outcome.
//!
//! The lock is only held for bookkeeping and is never held across `.await`.

use crate::error::ClientError;
use crate::refresh_fsm::{RefreshMachine, RefreshMachineInput, RefreshState};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error};

/// What a waiter receives: the new access token or the terminal error.
pub(crate) type RefreshOutcome = Result<String, ClientError>;

struct Inner {
    machine: RefreshMachine,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

pub(crate) struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

/// Role assigned to a request that needs a fresh token.
pub(crate) enum Ticket<'a> {
    /// This request must perform the refresh and settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is already in flight; await its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine: RefreshMachine::new(),
                waiters: Vec::new(),
            }),
        }
    }

    /// Join the current refresh cycle, starting one if none is in flight.
    pub(crate) fn join(&self) -> Ticket<'_> {
        let mut inner = self.inner.lock();
        if inner.machine.consume(&RefreshMachineInput::RefreshStarted).is_ok() {
            debug!("Starting token refresh");
            return Ticket::Leader(RefreshLease {
                coordinator: self,
                settled: false,
            });
        }

        let (tx, rx) = oneshot::channel();
        inner.waiters.push(tx);
        debug!(waiters = inner.waiters.len(), "Refresh in flight, queued request");
        Ticket::Waiter(rx)
    }

    pub(crate) fn state(&self) -> RefreshState {
        RefreshState::from(self.inner.lock().machine.state())
    }

    pub(crate) fn pending_waiters(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Leave `Refreshing` and drain the queue in FIFO order.
    ///
    /// Both happen under one lock acquisition, so a request arriving after
    /// this call starts a new cycle instead of joining a drained queue.
    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let mut inner = self.inner.lock();
        let input = if outcome.is_ok() {
            RefreshMachineInput::RefreshSucceeded
        } else {
            RefreshMachineInput::RefreshFailed
        };
        if inner.machine.consume(&input).is_err() {
            error!("Refresh settled while no refresh was in flight");
        }

        let waiters = std::mem::take(&mut inner.waiters);
        let count = waiters.len();
        for waiter in waiters {
            // A dropped receiver means the waiting request was cancelled.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Leader's obligation to settle the refresh cycle.
///
/// Dropping an unsettled lease fails the cycle so queued requests are never
/// left waiting on a refresh that will not finish.
pub(crate) struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Settle the cycle, returning how many waiters were released.
    pub(crate) fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Refresh abandoned before completion");
            self.coordinator
                .settle(Err(ClientError::AuthorizationExpired));
        }
    }
}
