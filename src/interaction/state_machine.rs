//! Interaction State Machine (spec §4.7, C7).
//!
//! Generalizes the teacher's `PmState::{Idle, Dragging, Editing}`
//! (`app.rs`) from one drag-only gesture into the full pointer/wheel mode
//! set the spec requires, keeping the same "plain enum + explicit
//! transition methods" shape.

use crate::actions::{selection, transform};
use crate::awareness::AwarenessChannel;
use crate::config::EngineConfig;
use crate::interaction::modes::{GestureMode, InteractionMode, Modifiers, PointerTarget};
use crate::model::{ActorId, ObjectId, Pos};
use crate::store::TableStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum PointerDownOutcome {
    StartedPan,
    StartedRectangleSelect { start: (f64, f64) },
    /// Selection claim succeeded; drag won't start until the pointer moves
    /// past the activation threshold.
    TentativeSelectTap { object_id: ObjectId },
    /// The object couldn't be claimed (locked, owned by another actor, or
    /// missing) — spec §7 class 1, silent.
    SelectionFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerMoveOutcome {
    None,
    PanDelta { dx: f64, dy: f64 },
    RectangleUpdated { start: (f64, f64), current: (f64, f64) },
    DragActivated { ids: Vec<ObjectId> },
    DragMoved { ids: Vec<ObjectId> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerUpOutcome {
    Idle,
    RectangleSelectCommitted { start: (f64, f64), end: (f64, f64) },
    DragCommitted { ids: Vec<ObjectId> },
}

pub struct InteractionStateMachine {
    store: TableStore,
    actor_id: ActorId,
    awareness: Arc<AwarenessChannel>,
    config: EngineConfig,

    persistent_mode: Mutex<InteractionMode>,
    space_held: AtomicBool,
    cmd_held: AtomicBool,

    gesture: Mutex<GestureMode>,
    hovered: Mutex<Option<ObjectId>>,
    /// Original positions captured when a drag starts, so `pointer-cancel`
    /// / `pointer-leave` can revert (spec §4.7).
    drag_origin: Mutex<HashMap<ObjectId, Pos>>,
    /// Last pointer position seen while panning, so `PanDelta` carries an
    /// incremental delta rather than an absolute position.
    last_pan_pos: Mutex<Option<(f64, f64)>>,

    pending_operations: Arc<AtomicU32>,
}

impl InteractionStateMachine {
    pub fn new(store: TableStore, actor_id: ActorId, awareness: Arc<AwarenessChannel>, config: EngineConfig) -> Self {
        Self {
            store,
            actor_id,
            awareness,
            config,
            persistent_mode: Mutex::new(InteractionMode::Select),
            space_held: AtomicBool::new(false),
            cmd_held: AtomicBool::new(false),
            gesture: Mutex::new(GestureMode::Idle),
            hovered: Mutex::new(None),
            drag_origin: Mutex::new(HashMap::new()),
            last_pan_pos: Mutex::new(None),
            pending_operations: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn set_interaction_mode(&self, mode: InteractionMode) {
        *self.persistent_mode.lock().unwrap() = mode;
    }

    pub fn set_space_held(&self, held: bool) {
        self.space_held.store(held, Ordering::SeqCst);
    }

    pub fn set_cmd_held(&self, held: bool) {
        self.cmd_held.store(held, Ordering::SeqCst);
    }

    pub fn effective_mode(&self) -> InteractionMode {
        if self.space_held.load(Ordering::SeqCst) {
            return InteractionMode::Pan;
        }
        let persistent = *self.persistent_mode.lock().unwrap();
        if self.cmd_held.load(Ordering::SeqCst) {
            persistent.inverted()
        } else {
            persistent
        }
    }

    pub fn gesture_mode(&self) -> GestureMode {
        self.gesture.lock().unwrap().clone()
    }

    pub fn pending_operations(&self) -> u32 {
        self.pending_operations.load(Ordering::SeqCst)
    }

    /// Called by the orchestrator once it observes, via the store's
    /// change handler, that a selection claim this actor made landed.
    pub fn note_selection_observed(&self) {
        let _ = self.pending_operations.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some(v.saturating_sub(1))
        });
    }

    /// Hover is ignored while a drag, pinch, pan or rectangle-select is in
    /// flight (spec §4.7). Returns whether the hovered id actually
    /// changed, so C6 can skip redundant redraw work.
    pub fn set_hover(&self, id: Option<ObjectId>) -> bool {
        let gesture = self.gesture.lock().unwrap();
        let gating = !matches!(*gesture, GestureMode::Idle | GestureMode::SelectTap { .. });
        drop(gesture);
        if gating {
            return false;
        }
        let mut hovered = self.hovered.lock().unwrap();
        if *hovered == id {
            false
        } else {
            *hovered = id;
            true
        }
    }

    pub fn hovered(&self) -> Option<ObjectId> {
        self.hovered.lock().unwrap().clone()
    }

    pub fn pointer_down(&self, pos: (f64, f64), target: PointerTarget, modifiers: Modifiers) -> PointerDownOutcome {
        match target {
            PointerTarget::EmptySpace => match self.effective_mode() {
                InteractionMode::Pan => {
                    *self.hovered.lock().unwrap() = None;
                    *self.gesture.lock().unwrap() = GestureMode::Panning;
                    *self.last_pan_pos.lock().unwrap() = Some(pos);
                    PointerDownOutcome::StartedPan
                }
                InteractionMode::Select => {
                    *self.hovered.lock().unwrap() = None;
                    *self.gesture.lock().unwrap() = GestureMode::RectangleSelecting { start: pos };
                    PointerDownOutcome::StartedRectangleSelect { start: pos }
                }
            },
            PointerTarget::Object(id) => {
                if self.effective_mode() != InteractionMode::Select {
                    *self.hovered.lock().unwrap() = None;
                    *self.gesture.lock().unwrap() = GestureMode::Panning;
                    *self.last_pan_pos.lock().unwrap() = Some(pos);
                    return PointerDownOutcome::StartedPan;
                }

                if !modifiers.additive_selection() {
                    let others: Vec<ObjectId> = self
                        .store
                        .get_all_objects()
                        .into_iter()
                        .filter(|o| o.id != id && o.selected_by.as_deref() == Some(self.actor_id.as_str()))
                        .map(|o| o.id)
                        .collect();
                    if !others.is_empty() {
                        selection::unselect_objects(&self.store, &others, &self.actor_id);
                    }
                }

                // Already self-owned claims are idempotent no-ops in
                // `select_objects` (no field write, so no change event, so
                // no observer decrement is coming). Note that up front so
                // we can balance the counter ourselves below.
                let already_self_owned = self
                    .store
                    .get_object(&id)
                    .is_some_and(|o| o.selected_by.as_deref() == Some(self.actor_id.as_str()));

                // Incremented before the transaction runs: the store's
                // change observer fires synchronously from inside the
                // commit and calls `note_selection_observed` (spec §4.7
                // "the counter decrements after the caused CRDT change is
                // observed back") before `select_objects` itself returns.
                self.pending_operations.fetch_add(1, Ordering::SeqCst);
                let result = selection::select_objects(&self.store, &[id.clone()], &self.actor_id);
                if result.selected.contains(&id) {
                    if already_self_owned {
                        self.note_selection_observed();
                    }
                    *self.gesture.lock().unwrap() = GestureMode::SelectTap { object_id: id.clone(), start: pos };
                    PointerDownOutcome::TentativeSelectTap { object_id: id }
                } else {
                    // Failed outright (missing/locked/owned by another actor):
                    // no write happens either, so nothing will observe this back.
                    self.note_selection_observed();
                    PointerDownOutcome::SelectionFailed
                }
            }
        }
    }

    pub fn pointer_move(&self, pos: (f64, f64)) -> PointerMoveOutcome {
        let mut gesture = self.gesture.lock().unwrap();
        match gesture.clone() {
            GestureMode::Panning => {
                let mut last = self.last_pan_pos.lock().unwrap();
                let (lx, ly) = last.unwrap_or(pos);
                *last = Some(pos);
                PointerMoveOutcome::PanDelta { dx: pos.0 - lx, dy: pos.1 - ly }
            }
            GestureMode::Pinching => PointerMoveOutcome::None,
            GestureMode::RectangleSelecting { start } => {
                PointerMoveOutcome::RectangleUpdated { start, current: pos }
            }
            GestureMode::SelectTap { object_id, start } => {
                let dx = pos.0 - start.0;
                let dy = pos.1 - start.1;
                if (dx * dx + dy * dy).sqrt() < self.config.drag_activation_threshold {
                    return PointerMoveOutcome::None;
                }

                let ids: Vec<ObjectId> = self
                    .store
                    .get_all_objects()
                    .into_iter()
                    .filter(|o| o.selected_by.as_deref() == Some(self.actor_id.as_str()))
                    .map(|o| o.id)
                    .collect();
                let ids = if ids.is_empty() { vec![object_id] } else { ids };

                let mut origins = self.drag_origin.lock().unwrap();
                origins.clear();
                for o in self.store.get_all_objects() {
                    if ids.contains(&o.id) {
                        origins.insert(o.id.clone(), o.pos);
                    }
                }
                drop(origins);

                *self.hovered.lock().unwrap() = None;
                *gesture = GestureMode::DraggingObject { ids: ids.clone(), start };
                drop(gesture);

                let dragging: HashSet<ObjectId> = ids.iter().cloned().collect();
                let actor = self.actor_id.clone();
                let awareness = self.awareness.clone();
                tokio::spawn(async move { awareness.set_dragging(&actor, dragging).await });

                self.apply_drag_delta(&ids, pos, start);
                PointerMoveOutcome::DragActivated { ids }
            }
            GestureMode::DraggingObject { ids, start } => {
                drop(gesture);
                self.apply_drag_delta(&ids, pos, start);
                PointerMoveOutcome::DragMoved { ids }
            }
            GestureMode::Idle => PointerMoveOutcome::None,
        }
    }

    fn apply_drag_delta(&self, ids: &[ObjectId], current: (f64, f64), start: (f64, f64)) {
        let dx = current.0 - start.0;
        let dy = current.1 - start.1;
        let origins = self.drag_origin.lock().unwrap();
        let moves: Vec<(ObjectId, Pos)> = ids
            .iter()
            .filter_map(|id| origins.get(id).map(|p| (id.clone(), Pos::new(p.x + dx, p.y + dy, p.r))))
            .collect();
        drop(origins);
        transform::move_objects(&self.store, &moves);
    }

    /// Commits the final position, clears the mode, and leaves selections
    /// untouched (spec §4.7 "pointer-up ... release no selections").
    pub fn pointer_up(&self, pos: (f64, f64)) -> PointerUpOutcome {
        let mut gesture = self.gesture.lock().unwrap();
        let outcome = match gesture.clone() {
            GestureMode::RectangleSelecting { start } => {
                PointerUpOutcome::RectangleSelectCommitted { start, end: pos }
            }
            GestureMode::DraggingObject { ids, .. } => {
                self.drag_origin.lock().unwrap().clear();
                let actor = self.actor_id.clone();
                let awareness = self.awareness.clone();
                tokio::spawn(async move { awareness.set_dragging(&actor, HashSet::new()).await });
                PointerUpOutcome::DragCommitted { ids }
            }
            GestureMode::SelectTap { .. } | GestureMode::Panning | GestureMode::Pinching | GestureMode::Idle => {
                PointerUpOutcome::Idle
            }
        };
        *gesture = GestureMode::Idle;
        *self.last_pan_pos.lock().unwrap() = None;
        outcome
    }

    /// Reverts any provisional mutation: an in-flight drag's objects are
    /// restored to their pre-drag positions (spec §4.7).
    pub fn pointer_cancel(&self) {
        self.revert_drag();
        *self.gesture.lock().unwrap() = GestureMode::Idle;
        *self.last_pan_pos.lock().unwrap() = None;
    }

    pub fn pointer_leave(&self) {
        self.revert_drag();
        *self.gesture.lock().unwrap() = GestureMode::Idle;
        *self.last_pan_pos.lock().unwrap() = None;
    }

    /// Starts a synthetic multitouch pinch (spec §4.7 "optional multitouch
    /// synthetic pinch"). Hover gating treats it like any other active
    /// gesture; the actual zoom transform stays on the wheel path in C8
    /// ("mode is set by a direct path to guarantee ordering"), so this is
    /// state-machine bookkeeping only — it does not itself move the camera.
    pub fn pinch_start(&self) {
        *self.hovered.lock().unwrap() = None;
        *self.gesture.lock().unwrap() = GestureMode::Pinching;
    }

    pub fn pinch_end(&self) {
        *self.gesture.lock().unwrap() = GestureMode::Idle;
    }

    fn revert_drag(&self) {
        let origins = self.drag_origin.lock().unwrap();
        if origins.is_empty() {
            return;
        }
        let moves: Vec<(ObjectId, Pos)> = origins.iter().map(|(id, pos)| (id.clone(), *pos)).collect();
        drop(origins);
        transform::move_objects(&self.store, &moves);
        self.drag_origin.lock().unwrap().clear();
    }
}
