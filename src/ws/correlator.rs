//! Request/response correlation over the broadcast message stream.
//!
//! Each wait registers a single-shot channel in a dispatch table keyed by [`ResponseId`].
//! Every decoded message is offered to the table; all waiters registered for its identifier
//! receive a copy and are removed. A wait that times out or is cancelled removes itself, so a
//! late match can never resolve it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::types::{Response, ResponseId};

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Response>,
}

/// Dispatch table of pending waits.
#[derive(Default)]
pub struct Correlator {
    waiters: DashMap<ResponseId, Vec<Waiter>>,
    next_id: AtomicU64,
    /// Set once the connection task has stopped; no message can match after that
    closed: AtomicBool,
}

impl Correlator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next message tagged `response_id`.
    ///
    /// Registration happens immediately, so a request sent after this call cannot race its
    /// own response.
    #[must_use]
    pub fn register(self: &Arc<Self>, response_id: ResponseId) -> PendingWait {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        if !self.closed.load(Ordering::Acquire) {
            self.waiters
                .entry(response_id)
                .or_default()
                .push(Waiter { id, tx });

            if self.closed.load(Ordering::Acquire) {
                self.waiters.clear();
            }
        }

        PendingWait {
            correlator: Arc::clone(self),
            response_id,
            waiter_id: id,
            rx,
        }
    }

    /// Resolve every wait registered for this message's identifier. Returns how many were
    /// resolved.
    pub fn dispatch(&self, message: &Response) -> usize {
        let Some((_, waiters)) = self.waiters.remove(&message.id()) else {
            return 0;
        };

        waiters
            .into_iter()
            .map(|waiter| waiter.tx.send(message.clone()).is_ok())
            .filter(|sent| *sent)
            .count()
    }

    /// Resolve every pending wait to `None` and refuse new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.waiters.clear();
    }

    /// Number of unresolved waits for an identifier.
    #[must_use]
    pub fn pending(&self, response_id: ResponseId) -> usize {
        self.waiters.get(&response_id).map_or(0, |w| w.len())
    }

    fn deregister(&self, response_id: ResponseId, waiter_id: u64) {
        if let Some(mut waiters) = self.waiters.get_mut(&response_id) {
            waiters.retain(|waiter| waiter.id != waiter_id);
        }
        self.waiters
            .remove_if(&response_id, |_, waiters| waiters.is_empty());
    }
}

/// A registered wait. Dropping it withdraws the registration.
#[must_use = "a wait does nothing unless awaited"]
pub struct PendingWait {
    correlator: Arc<Correlator>,
    response_id: ResponseId,
    waiter_id: u64,
    rx: oneshot::Receiver<Response>,
}

impl PendingWait {
    #[must_use]
    pub fn response_id(&self) -> ResponseId {
        self.response_id
    }

    /// Wait for the match, bounded by `timeout` and by `cancel`.
    ///
    /// Returns `None` when the timeout elapses, the token is cancelled, or the client shuts
    /// down before a match arrives.
    pub async fn wait(
        mut self,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Option<Response> {
        let cancel = cancel.unwrap_or_default();
        let deadline = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            matched = &mut self.rx => matched.ok(),
            () = cancel.cancelled() => None,
            () = deadline => None,
        }
    }
}

impl Drop for PendingWait {
    fn drop(&mut self) {
        self.correlator.deregister(self.response_id, self.waiter_id);
    }
}
