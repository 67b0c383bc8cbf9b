//! Shutdown coordination for the server.

use std::net::SocketAddr;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that long-running tasks subscribe to. Dropping
/// the coordinator wakes subscribers as well.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a bound listener.
///
/// Closing it stops the accept loop; the serve task then drains in-flight
/// requests and reports completion. Dropping the handle does not close the
/// listener.
#[must_use = "the listener can only be closed through its handle"]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
}

impl ListenerHandle {
    pub(crate) fn new(local_addr: SocketAddr, shutdown: Shutdown) -> Self {
        Self { local_addr, shutdown }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the serve loop is still listening for a close.
    pub fn is_serving(&self) -> bool {
        self.shutdown.receiver_count() > 0
    }

    /// Stop accepting connections.
    pub fn close(&self) {
        self.shutdown.trigger();
    }
}
