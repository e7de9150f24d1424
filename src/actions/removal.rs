//! `removeObject` (spec §4.3, implied by "Destroyed by `removeObject` /
//! `clearAllObjects`" in §3.3).
//!
//! Resolves the Open Question in spec §9 on dangling `_containerId`
//! references: children of a removed container are **detached to root**
//! (`_containerId` set to `None`) rather than cascade-deleted, so removing
//! a zone or mat never silently destroys the cards sitting on it
//! (recorded in DESIGN.md).

use crate::model::ObjectId;
use crate::store::TableStore;

/// Removes `id` and detaches any object whose `_containerId` pointed at
/// it. Unknown ids are a no-op success (there is nothing left to skip).
pub fn remove_object(store: &TableStore, id: &ObjectId) -> bool {
    let mut removed = false;

    store.transact(Some("local"), |txn| {
        if store.remove_object(txn, id).is_none() {
            return;
        }
        removed = true;

        let children: Vec<_> = store
            .get_all_objects_in(txn)
            .into_iter()
            .filter(|o| o.container_id.as_ref() == Some(id))
            .collect();

        for mut child in children {
            child.container_id = None;
            store.set_object(txn, &child);
        }
    });

    removed
}
