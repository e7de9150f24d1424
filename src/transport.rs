//! Sync transport contract (spec §6.2).
//!
//! The core is agnostic to wire format: a transport only needs to deliver
//! opaque CRDT update bytes from `TableStore::encode_full_state`/`on_update`
//! and to merge deliveries back in via `TableStore::apply_update`. The real
//! WebSocket transport is explicitly out of scope (spec §1) — this module
//! ships the trait plus an in-process `LoopbackTransport` used by the test
//! harness (C10) and integration tests to exercise multi-actor merge
//! without standing up a network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub trait SyncTransport: Send + Sync {
    async fn connect(&self, room: &str) -> Result<(), crate::error::OrchestratorError>;
    fn broadcast(&self, update: Vec<u8>);
    fn subscribe_updates(&self) -> broadcast::Receiver<Vec<u8>>;
    fn subscribe_status(&self) -> broadcast::Receiver<TransportStatus>;
}

/// Two `LoopbackTransport` ends exchanging updates directly, in-process.
/// Used wherever spec.md §8's scenarios need two peers without a real
/// network (e.g. property test P2/P10 multi-actor reconciliation).
///
/// `outgoing` is the channel this end's `broadcast` writes to; `incoming`
/// is the peer's `outgoing` channel, which this end's `subscribe_updates`
/// reads from.
pub struct LoopbackTransport {
    outgoing: broadcast::Sender<Vec<u8>>,
    incoming: broadcast::Sender<Vec<u8>>,
    status_tx: broadcast::Sender<TransportStatus>,
    connected: Arc<AtomicBool>,
}

impl LoopbackTransport {
    /// Builds a connected pair: anything `a` broadcasts arrives on `b`'s
    /// update subscription and vice versa.
    pub fn pair() -> (Self, Self) {
        let (tx_a, _) = broadcast::channel(256);
        let (tx_b, _) = broadcast::channel(256);
        let (status_a, _) = broadcast::channel(16);
        let (status_b, _) = broadcast::channel(16);

        let a = LoopbackTransport {
            outgoing: tx_a.clone(),
            incoming: tx_b.clone(),
            status_tx: status_a,
            connected: Arc::new(AtomicBool::new(false)),
        };
        let b = LoopbackTransport {
            outgoing: tx_b,
            incoming: tx_a,
            status_tx: status_b,
            connected: Arc::new(AtomicBool::new(false)),
        };

        (a, b)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.status_tx.send(TransportStatus::Disconnected);
    }
}

impl SyncTransport for LoopbackTransport {
    async fn connect(&self, _room: &str) -> Result<(), crate::error::OrchestratorError> {
        let _ = self.status_tx.send(TransportStatus::Connecting);
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.status_tx.send(TransportStatus::Connected);
        Ok(())
    }

    fn broadcast(&self, update: Vec<u8>) {
        if self.connected.load(Ordering::SeqCst) {
            let _ = self.outgoing.send(update);
        }
    }

    fn subscribe_updates(&self) -> broadcast::Receiver<Vec<u8>> {
        self.incoming.subscribe()
    }

    fn subscribe_status(&self) -> broadcast::Receiver<TransportStatus> {
        self.status_tx.subscribe()
    }
}

/// Wires a `TableStore` to a `SyncTransport`: every local update is
/// broadcast, and every delivered remote update is merged back in. Spawns
/// one background task per direction; returns their handles so a caller
/// can keep them alive for the store's lifetime.
pub fn bridge_store_to_transport(
    store: &crate::store::TableStore,
    transport: Arc<dyn SyncTransportDyn>,
) -> (crate::store::UpdateUnsubscribe, tokio::task::JoinHandle<()>) {
    let broadcast_unsub = store.on_update({
        let transport = transport.clone();
        move |bytes| transport.broadcast(bytes.to_vec())
    });

    let mut incoming = transport.subscribe_updates();
    let store = store.clone();
    let task = tokio::spawn(async move {
        while let Ok(update) = incoming.recv().await {
            if let Err(err) = store.apply_update(&update) {
                crate::logger::error(&format!("dropping malformed remote update: {err}"));
            }
        }
    });

    (broadcast_unsub, task)
}

/// Object-safe subset of [`SyncTransport`] — `connect` is `async fn` and
/// not dyn-compatible, but `broadcast`/`subscribe_updates` are all
/// [`bridge_store_to_transport`] needs, so it takes this narrower,
/// dyn-friendly trait instead.
pub trait SyncTransportDyn: Send + Sync {
    fn broadcast(&self, update: Vec<u8>);
    fn subscribe_updates(&self) -> broadcast::Receiver<Vec<u8>>;
}

impl SyncTransportDyn for LoopbackTransport {
    fn broadcast(&self, update: Vec<u8>) {
        SyncTransport::broadcast(self, update)
    }

    fn subscribe_updates(&self) -> broadcast::Receiver<Vec<u8>> {
        SyncTransport::subscribe_updates(self)
    }
}
