//! Visual Manager (spec §4.6, C6).
//!
//! Mirrors the replicated store into one container per object, owning
//! that map exclusively (spec §5 "the visual map is owned exclusively by
//! C6"). Hidden state is tracked independently of the store so that
//! updates arriving mid-hide (e.g. during a remote drag) don't reveal the
//! object, matching the teacher's `PmState::Dragging` pattern of keeping
//! transient UI state outside the persisted model.

use crate::animation::{AnimationSink, GhostSpawner, PropertyKind, Value};
use crate::model::{ObjectId, TableObject};
use crate::store::{ChangeReport, TableStore};
use crate::visual::container::VisualContainer;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct VisualManager {
    visuals: RwLock<HashMap<ObjectId, VisualContainer>>,
    text_resolution_multiplier: RwLock<f64>,
    camera_scale: RwLock<f64>,
    /// Threshold past which a camera-scale change triggers text
    /// regeneration (spec §4.6 `setCameraScale`).
    regen_threshold: f64,
}

impl VisualManager {
    pub fn new() -> Self {
        Self {
            visuals: RwLock::new(HashMap::new()),
            text_resolution_multiplier: RwLock::new(1.0),
            camera_scale: RwLock::new(1.0),
            regen_threshold: 0.25,
        }
    }

    /// Applies a `ChangeReport` from C1 (spec §4.1), building, updating or
    /// tearing down visuals to match. Reads `report.snapshots` rather than
    /// the store directly: for a report fired from inside the store's own
    /// commit (spec §5 "observer callbacks run synchronously inside the
    /// CRDT transaction commit"), opening a fresh store transaction here
    /// would collide with the one still committing.
    pub fn apply_change_report(&self, report: &ChangeReport) {
        for id in &report.added {
            if let Some(obj) = report.snapshots.get(id) {
                self.build_visual(obj);
            }
        }
        for id in &report.updated {
            if let Some(obj) = report.snapshots.get(id) {
                self.update_visual(obj);
            }
        }
        for id in &report.removed {
            self.visuals.write().unwrap().remove(id);
        }
    }

    fn build_visual(&self, obj: &TableObject) {
        let mut container = VisualContainer::new(obj.kind(), obj.pos, obj.sort_key.clone());
        apply_object_fields(&mut container, obj);
        self.visuals.write().unwrap().insert(obj.id.clone(), container);
    }

    /// Diff-aware redraw: preserves `hidden` regardless of what the store
    /// update carries (spec §4.6).
    fn update_visual(&self, obj: &TableObject) {
        let mut visuals = self.visuals.write().unwrap();
        let Some(container) = visuals.get_mut(&obj.id) else {
            drop(visuals);
            self.build_visual(obj);
            return;
        };
        let was_hidden = container.hidden;
        container.pos = obj.pos;
        container.z_order = obj.sort_key.clone();
        apply_object_fields(container, obj);
        if was_hidden {
            container.hidden = true;
            container.alpha = 0.0;
        }
    }

    pub fn hide_object(&self, id: &ObjectId) {
        if let Some(c) = self.visuals.write().unwrap().get_mut(id) {
            c.hidden = true;
            c.alpha = 0.0;
        }
    }

    pub fn show_object(&self, id: &ObjectId) {
        if let Some(c) = self.visuals.write().unwrap().get_mut(id) {
            c.hidden = false;
            c.alpha = 1.0;
        }
    }

    pub fn is_hidden(&self, id: &ObjectId) -> bool {
        self.visuals.read().unwrap().get(id).map(|c| c.hidden).unwrap_or(false)
    }

    pub fn get(&self, id: &ObjectId) -> Option<VisualContainer> {
        self.visuals.read().unwrap().get(id).cloned()
    }

    pub fn all_ids(&self) -> Vec<ObjectId> {
        self.visuals.read().unwrap().keys().cloned().collect()
    }

    pub fn set_text_resolution_multiplier(&self, k: f64) {
        *self.text_resolution_multiplier.write().unwrap() = k;
    }

    pub fn text_resolution_multiplier(&self) -> f64 {
        *self.text_resolution_multiplier.read().unwrap()
    }

    /// Returns `true` if this scale change crossed the regeneration
    /// threshold and text objects should be re-baked at the new
    /// multiplier.
    pub fn set_camera_scale(&self, s: f64) -> bool {
        let mut scale = self.camera_scale.write().unwrap();
        let delta = (s - *scale).abs();
        *scale = s;
        delta >= self.regen_threshold
    }

    pub fn camera_scale(&self) -> f64 {
        *self.camera_scale.read().unwrap()
    }

    pub fn clear(&self) {
        self.visuals.write().unwrap().clear();
    }

    /// Full resync from the store (spec §4.8 `sync-objects`): drops every
    /// existing container and rebuilds from scratch.
    pub fn sync_all(&self, store: &TableStore) {
        self.clear();
        for obj in store.get_all_objects() {
            self.build_visual(&obj);
        }
    }
}

impl Default for VisualManager {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_object_fields(container: &mut VisualContainer, obj: &TableObject) {
    container.locked = obj.locked;
    container.selected_by = obj.selected_by.clone();
    container.card_count = obj.cards().map(|c| c.len());
    container.face_up = obj.face_up();
}

/// Ghost children are ordinary containers under a synthetic id, so the
/// Animation Scheduler needs no special case for them. Best-effort: a
/// missing source visual yields `None` rather than a panic (spec §4.5).
impl GhostSpawner for VisualManager {
    fn spawn_ghost(&self, source_visual_id: &str) -> Option<String> {
        let mut visuals = self.visuals.write().unwrap();
        let source = visuals.get(source_visual_id)?.clone();
        let ghost_id = format!("ghost:{}:{}", source_visual_id, uuid::Uuid::new_v4());
        visuals.insert(ghost_id.clone(), source);
        Some(ghost_id)
    }

    fn despawn_ghost(&self, ghost_visual_id: &str) {
        self.visuals.write().unwrap().remove(ghost_visual_id);
    }
}

/// Lets the Animation Scheduler (C5) write interpolated properties
/// straight into a container without knowing about the store.
impl AnimationSink for VisualManager {
    fn write_property(&self, visual_id: &str, property: PropertyKind, value: Value) {
        let mut visuals = self.visuals.write().unwrap();
        let Some(container) = visuals.get_mut(visual_id) else { return };
        match (property, value) {
            (PropertyKind::Rotation, Value::Scalar(r)) => container.pos.r = r,
            (PropertyKind::Scale, Value::Scalar(s)) => container.scale = s,
            (PropertyKind::ScaleX, Value::Scalar(s)) => container.scale_x = s,
            (PropertyKind::ScaleY, Value::Scalar(s)) => container.scale_y = s,
            (PropertyKind::Alpha, Value::Scalar(a)) => {
                if !container.hidden {
                    container.alpha = a;
                }
            }
            (PropertyKind::Position, Value::Vec2(x, y)) => {
                container.pos.x = x;
                container.pos.y = y;
            }
            _ => {}
        }
    }
}
