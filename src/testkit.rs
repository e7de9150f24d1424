//! Test Harness API (spec §4.10, §6.5, C10).
//!
//! Exposed only behind the `test-harness` Cargo feature — the idiomatic
//! equivalent of the source's "build-time debug flag" (spec §4.10,
//! §9 "production builds omit it"). Gives deterministic tests a bridge
//! over an inherently asynchronous pipeline: polling on frame boundaries
//! rather than a fixed sleep, capped so a genuinely stuck pipeline fails
//! fast instead of hanging a test suite (spec §9 "Polling `flush`").

use crate::model::TableObject;
use crate::orchestrator::Orchestrator;
use crate::store::TableStore;
use std::time::Duration;

/// One frame, for polling purposes — matches the 16ms/60fps budget the
/// orchestrator's instrumentation middleware already warns against
/// exceeding (`orchestrator/middleware.rs`).
const FRAME: Duration = Duration::from_millis(16);

pub struct TestHarness {
    orchestrator: Orchestrator,
    poll_cap: u32,
}

impl TestHarness {
    pub fn new(orchestrator: Orchestrator, poll_cap: u32) -> Self {
        Self { orchestrator, poll_cap }
    }

    /// Resolves once the message queue is drained AND `pendingOperations
    /// == 0`, capped at `poll_cap` frames (default ~100; single-frame fast
    /// path when no work is pending, spec §4.10/§9).
    pub async fn wait_for_renderer(&self) {
        self.poll_until(|| self.orchestrator.pending_operations() == 0).await;
    }

    /// Resolves when the cached selection equals the store's selection —
    /// in this engine that is exactly what `pendingOperations == 0` means
    /// (spec §4.7 "the counter decrements after the caused CRDT change is
    /// observed back and the local selection cache is updated").
    pub async fn wait_for_selection_settled(&self) {
        self.poll_until(|| self.orchestrator.pending_operations() == 0).await;
    }

    /// Resolves when C5's active set is empty.
    pub async fn wait_for_animations_complete(&self) {
        self.poll_until(|| !self.orchestrator.animations_active()).await;
    }

    pub fn check_animation_state(&self) -> AnimationState {
        AnimationState { active: self.orchestrator.animations_active() }
    }

    pub fn get_all_objects(&self) -> Vec<TableObject> {
        self.orchestrator.store().get_all_objects()
    }

    pub fn get_object(&self, id: &str) -> Option<TableObject> {
        self.orchestrator.store().get_object(id)
    }

    pub fn set_object(&self, obj: &TableObject) {
        self.orchestrator.store().transact(Some("test"), |txn| {
            self.orchestrator.store().set_object(txn, obj);
        });
    }

    pub fn clear_all_objects(&self) {
        self.orchestrator.store().transact(Some("test"), |txn| {
            self.orchestrator.store().clear_all_objects(txn);
        });
    }

    pub fn store(&self) -> &TableStore {
        self.orchestrator.store()
    }

    async fn poll_until(&self, mut condition: impl FnMut() -> bool) {
        if condition() {
            return;
        }
        for _ in 0..self.poll_cap {
            tokio::time::sleep(FRAME).await;
            if condition() {
                return;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    pub active: bool,
}
