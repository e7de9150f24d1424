//! `moveObjects` / `flipCards` / `exhaustCards` (spec §4.3).

use crate::model::{ObjectId, Pos, Variant};
use crate::store::TableStore;

/// Batch-updates `_pos` for each existing id; unknown ids are skipped with
/// a warning (spec §4.3).
pub fn move_objects(store: &TableStore, moves: &[(ObjectId, Pos)]) {
    store.transact(Some("local"), |txn| {
        for (id, pos) in moves {
            let Some(mut obj) = store.get_object_in(txn, id) else {
                crate::logger::warn(&format!("moveObjects: unknown id {id}, skipped"));
                continue;
            };
            obj.pos = *pos;
            store.set_object(txn, &obj);
        }
    });
}

/// Toggles `_faceUp` for Stacks and Tokens; silently skips other kinds.
pub fn flip_cards(store: &TableStore, ids: &[ObjectId]) -> Vec<ObjectId> {
    let mut flipped = Vec::new();

    store.transact(Some("local"), |txn| {
        for id in ids {
            let Some(mut obj) = store.get_object_in(txn, id) else { continue };

            let toggled = match &mut obj.variant {
                Variant::Stack { face_up, .. } => {
                    *face_up = !*face_up;
                    true
                }
                Variant::Token { face_up } => {
                    *face_up = !*face_up;
                    true
                }
                _ => false,
            };

            if toggled {
                store.set_object(txn, &obj);
                flipped.push(id.clone());
            }
        }
    });

    flipped
}

/// Toggles `_pos.r` between 0 and 90 degrees for Stacks only, using a
/// rotation-equality epsilon (±0.1°) to avoid floating-point drift, and
/// normalizes the stored rotation to one decimal place (spec §3.2
/// invariant 2, §4.3).
pub fn exhaust_cards(store: &TableStore, ids: &[ObjectId], epsilon: f64) -> Vec<ObjectId> {
    let mut toggled = Vec::new();

    store.transact(Some("local"), |txn| {
        for id in ids {
            let Some(mut obj) = store.get_object_in(txn, id) else { continue };

            if !matches!(obj.variant, Variant::Stack { .. }) {
                continue;
            }

            let is_rested = (obj.pos.r - 0.0).abs() <= epsilon;
            obj.pos.r = if is_rested { 90.0 } else { 0.0 };
            obj.pos.normalize_rotation();

            store.set_object(txn, &obj);
            toggled.push(id.clone());
        }
    });

    toggled
}
