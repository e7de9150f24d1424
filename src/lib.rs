//! Collaborative virtual card-table engine (spec.md / SPEC_FULL.md).
//!
//! This crate is the hard core only: a CRDT-replicated object store, the
//! action layer that mutates it under invariants, an ephemeral awareness
//! channel, an animation scheduler, a scene-graph-mirroring visual
//! manager, a pointer/wheel interaction state machine, and a renderer
//! orchestrator tying all of it behind one typed message bus. It ships no
//! GUI — the asset-pack loaders, DOM overlay widgets, plugin UI, and wire
//! transport below the CRDT sync primitive are external collaborators
//! behind the trait contracts in [`persistence`] and [`transport`].

pub mod actions;
pub mod animation;
pub mod awareness;
pub mod config;
pub mod error;
pub mod interaction;
pub mod logger;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod store;
pub mod texture;
pub mod transport;
pub mod visual;

#[cfg(any(test, feature = "test-harness"))]
pub mod testkit;

use animation::AnimationScheduler;
use awareness::AwarenessChannel;
use config::EngineConfig;
use interaction::InteractionStateMachine;
use orchestrator::Orchestrator;
use std::sync::Arc;
use std::time::Duration;
use store::TableStore;
use visual::VisualManager;

/// Wires C1, C4, C5, C6, C7 and C8 together into one handle, the way a
/// renderer adapter would at startup. Cheap to clone — everything behind
/// it is `Arc`-shared.
#[derive(Clone)]
pub struct Table {
    store: TableStore,
    orchestrator: Orchestrator,
    config: EngineConfig,
    // Keeps the store -> orchestrator change routing alive for as long as
    // any clone of this `Table` exists.
    _change_routing: Arc<store::Unsubscribe>,
    // Keeps the awareness -> visual-manager hide/reveal routing and the
    // stale-actor GC loop running for as long as any clone of this `Table`
    // exists (spec §3.4/§4.4).
    _awareness_tasks: Arc<[tokio::task::JoinHandle<()>; 2]>,
}

impl Table {
    /// Builds a fresh, empty table. Schema migration (C2) is the caller's
    /// responsibility to run once after any persisted state is loaded
    /// into `store()` (spec §3.3 "C2 runs once per doc synchronization").
    pub fn new(config: EngineConfig) -> Self {
        let store = TableStore::new();
        let actor_id = store.get_actor_id();
        let awareness = Arc::new(AwarenessChannel::new(config.awareness_hz));
        let visuals = Arc::new(VisualManager::new());
        let scheduler = Arc::new(AnimationScheduler::new(visuals.clone(), Duration::from_millis(16)));
        let interaction = Arc::new(InteractionStateMachine::new(
            store.clone(),
            actor_id.clone(),
            awareness.clone(),
            config.clone(),
        ));

        let orchestrator = Orchestrator::new(store.clone(), actor_id, awareness, scheduler, visuals, interaction);

        // Store changes (local or CRDT-merged remote) always flow through
        // the orchestrator so the visual manager and selection
        // round-trip fencing observe them identically (spec §2 "remote
        // flow is identical from 'C1 observer fires' onward").
        let routed = orchestrator.clone();
        let change_routing = store.on_objects_change(move |report| routed.on_store_change(report));

        let awareness_routing = orchestrator.spawn_awareness_routing();
        let stale_gc = orchestrator.spawn_stale_awareness_gc(Duration::from_millis(config.awareness_gc_quiet_ms));

        Self {
            store,
            orchestrator,
            config,
            _change_routing: Arc::new(change_routing),
            _awareness_tasks: Arc::new([awareness_routing, stale_gc]),
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run_migrations(&self) -> usize {
        store::migrator::run_migrations(&self.store)
    }

    /// Clears every `_selectedBy` claim. Selection is a per-session claim,
    /// not state that should survive a reload (spec §8 property P3): the
    /// caller runs this once after loading persisted state, the same way
    /// `run_migrations` runs once after initial sync.
    pub fn evict_stale_selections(&self) -> Vec<model::ObjectId> {
        actions::clear_all_selections(&self.store, actions::ClearSelectionsOptions::default())
            .expect("clearAllSelections with excludeDragging=false never fails")
    }

    #[cfg(any(test, feature = "test-harness"))]
    pub fn test_harness(&self) -> testkit::TestHarness {
        testkit::TestHarness::new(self.orchestrator.clone(), self.config.flush_poll_cap)
    }
}
