//! `selectObjects` / `unselectObjects` / `clearAllSelections` (spec §4.3).
//!
//! CRDTs cannot enforce exclusivity at commit time (spec §9): a claim is a
//! field write the caller must read back and reconcile. These functions
//! write the claim and return which ids actually ended up owned by the
//! caller after the write — not a guarantee, a best-effort request whose
//! outcome the caller observes via `onObjectsChange`.

use super::SkipReason;
use crate::model::{ActorId, ObjectId};
use crate::store::TableStore;

#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    pub selected: Vec<ObjectId>,
    pub failed: Vec<(ObjectId, SkipReason)>,
}

pub fn select_objects(store: &TableStore, ids: &[ObjectId], actor: &ActorId) -> SelectionResult {
    let mut result = SelectionResult::default();

    store.transact(Some("local"), |txn| {
        for id in ids {
            let Some(mut obj) = store.get_object_in(txn, id) else {
                result.failed.push((id.clone(), SkipReason::NotFound));
                continue;
            };

            if obj.locked {
                result.failed.push((id.clone(), SkipReason::Locked));
                continue;
            }

            match &obj.selected_by {
                Some(owner) if owner != actor => {
                    result.failed.push((id.clone(), SkipReason::OwnedByOther));
                    continue;
                }
                Some(_) => {
                    // Already self-owned: idempotent success, no write needed.
                    result.selected.push(id.clone());
                    continue;
                }
                None => {
                    obj.selected_by = Some(actor.clone());
                    store.set_object(txn, &obj);
                    result.selected.push(id.clone());
                }
            }
        }
    });

    result
}

/// Only clears claims owned by `actor`.
pub fn unselect_objects(store: &TableStore, ids: &[ObjectId], actor: &ActorId) -> Vec<ObjectId> {
    let mut released = Vec::new();

    store.transact(Some("local"), |txn| {
        for id in ids {
            let Some(mut obj) = store.get_object_in(txn, id) else { continue };
            if obj.selected_by.as_ref() == Some(actor) {
                obj.selected_by = None;
                store.set_object(txn, &obj);
                released.push(id.clone());
            }
        }
    });

    released
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClearSelectionsOptions {
    pub exclude_dragging: bool,
}

/// Clears every `_selectedBy`. Per spec §9, `excludeDragging` must fail
/// fast rather than silently ignore when no drag-state feed is wired — this
/// crate does not wire one at the action-layer boundary (drag state lives
/// in the interaction state machine, C7, a layer up), so requesting it is
/// always an error here.
pub fn clear_all_selections(
    store: &TableStore,
    opts: ClearSelectionsOptions,
) -> Result<Vec<ObjectId>, crate::error::ActionError> {
    if opts.exclude_dragging {
        return Err(crate::error::ActionError::NoDragFeed);
    }

    let mut cleared = Vec::new();
    store.transact(Some("local"), |txn| {
        for mut obj in store.get_all_objects_in(txn) {
            if obj.selected_by.is_some() {
                let id = obj.id.clone();
                obj.selected_by = None;
                store.set_object(txn, &obj);
                cleared.push(id);
            }
        }
    });

    Ok(cleared)
}
