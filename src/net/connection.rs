//! Live connection accounting.
//!
//! `close` needs to know when every accepted connection has finished. Each
//! connection task holds a [`ConnectionGuard`]; the tracker wakes waiters
//! when the last guard drops.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide connection number used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly accepted connection until the returned guard drops.
    pub fn track(&self, peer_addr: SocketAddr) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let id = ConnectionId::next();
        tracing::trace!(connection_id = %id, peer_addr = %peer_addr, "Connection opened");
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
            id,
            peer_addr,
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Resolve once no connection is open. Callers bound this with a timeout.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a drop in between is not missed.
            notified.as_mut().enable();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held by a connection task for as long as the connection is served.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
    id: ConnectionId,
    peer_addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.inner.active.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::trace!(connection_id = %self.id, remaining, "Connection closed");
        if remaining == 0 {
            self.inner.idle.notify_waiters();
        }
    }
}
