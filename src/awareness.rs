//! Awareness Channel (spec §4.4, C4).
//!
//! Ephemeral per-actor presence, independent of the persisted CRDT state.
//! Modeled directly on the teacher's `CapabilitiesCache =
//! Arc<RwLock<Capabilities>>` pattern (`guards.rs`), generalized from one
//! shared value to a per-actor map, and on `PmState::Dragging`'s
//! `last_cursor_emit: Instant` throttle (`app.rs`) for the broadcast-rate
//! limiting.

use crate::model::{ActorId, ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub struct CursorPos {
    pub x: f64,
    pub y: f64,
}

/// Per-actor, non-persisted record (spec §3.4).
#[derive(Debug, Clone)]
pub struct AwarenessRecord {
    pub actor_id: ActorId,
    pub cursor_pos: Option<CursorPos>,
    pub dragging_ids: HashSet<ObjectId>,
    pub last_heartbeat: Instant,
}

impl AwarenessRecord {
    fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            cursor_pos: None,
            dragging_ids: HashSet::new(),
            last_heartbeat: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AwarenessEvent {
    Updated(ActorId),
    Disconnected(ActorId),
}

type Records = Arc<RwLock<HashMap<ActorId, AwarenessRecord>>>;

/// Bounded-rate broadcaster of ephemeral per-actor state. `broadcast_hz`
/// governs how often `update_cursor` is allowed to actually fan out a
/// change (default 20 Hz per spec §4.4); callers between ticks still see
/// their own local state updated immediately — only the broadcast to
/// peers is throttled.
pub struct AwarenessChannel {
    records: Records,
    tx: broadcast::Sender<AwarenessEvent>,
    min_emit_interval: Duration,
    last_emit: Arc<RwLock<HashMap<ActorId, Instant>>>,
}

impl AwarenessChannel {
    pub fn new(broadcast_hz: f64) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            tx,
            min_emit_interval: Duration::from_secs_f64(1.0 / broadcast_hz.max(0.001)),
            last_emit: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AwarenessEvent> {
        self.tx.subscribe()
    }

    pub async fn update_cursor(&self, actor: &ActorId, pos: CursorPos) {
        {
            let mut records = self.records.write().await;
            let rec = records.entry(actor.clone()).or_insert_with(|| AwarenessRecord::new(actor.clone()));
            rec.cursor_pos = Some(pos);
            rec.last_heartbeat = Instant::now();
        }
        self.maybe_emit(actor).await;
    }

    pub async fn set_dragging(&self, actor: &ActorId, ids: HashSet<ObjectId>) {
        {
            let mut records = self.records.write().await;
            let rec = records.entry(actor.clone()).or_insert_with(|| AwarenessRecord::new(actor.clone()));
            rec.dragging_ids = ids;
            rec.last_heartbeat = Instant::now();
        }
        // Drag-start/stop transitions are not rate-limited: hiding/revealing
        // ghost visuals (C6) must react immediately, not after up to 50ms.
        let _ = self.tx.send(AwarenessEvent::Updated(actor.clone()));
    }

    async fn maybe_emit(&self, actor: &ActorId) {
        let now = Instant::now();
        let should_emit = {
            let mut last = self.last_emit.write().await;
            match last.get(actor) {
                Some(t) if now.duration_since(*t) < self.min_emit_interval => false,
                _ => {
                    last.insert(actor.clone(), now);
                    true
                }
            }
        };
        if should_emit {
            let _ = self.tx.send(AwarenessEvent::Updated(actor.clone()));
        }
    }

    pub async fn get(&self, actor: &ActorId) -> Option<AwarenessRecord> {
        self.records.read().await.get(actor).cloned()
    }

    pub async fn all(&self) -> Vec<AwarenessRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Stops updating for an actor when their transport disconnects.
    pub async fn disconnect(&self, actor: &ActorId) {
        self.records.write().await.remove(actor);
        self.last_emit.write().await.remove(actor);
        let _ = self.tx.send(AwarenessEvent::Disconnected(actor.clone()));
    }

    /// Peers garbage-collect ghost visuals after a quiet interval: returns
    /// actors whose last heartbeat is older than `quiet`.
    pub async fn stale_actors(&self, quiet: Duration) -> Vec<ActorId> {
        let now = Instant::now();
        self.records
            .read()
            .await
            .values()
            .filter(|r| now.duration_since(r.last_heartbeat) > quiet)
            .map(|r| r.actor_id.clone())
            .collect()
    }
}
