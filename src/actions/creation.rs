//! `createObject` (spec §4.3).

use crate::model::{sort_key, CreateOptions, ObjectId, ObjectKind, Pos, TableObject, Variant};
use crate::store::TableStore;

/// Allocates a fresh id, computes a top `_sortKey`, applies kind defaults,
/// overlays caller-provided options. Runs inside its own transaction.
pub fn create_object(store: &TableStore, kind: ObjectKind, opts: CreateOptions) -> ObjectId {
    let id = uuid::Uuid::new_v4().to_string();

    // Computed before opening the write transaction: yrs transactions are
    // not reentrant, so the read pass that picks the next sort key must
    // finish before `transact`'s write transaction begins.
    let existing_keys: Vec<String> = store.get_all_objects().into_iter().map(|o| o.sort_key).collect();
    let sort_key = sort_key::next_top(&existing_keys);

    store.transact(Some("local"), |txn| {
        let obj = TableObject {
            id: id.clone(),
            container_id: opts.container_id.clone(),
            pos: opts.pos.unwrap_or(Pos::default()),
            sort_key,
            locked: opts.locked.unwrap_or(false),
            selected_by: None,
            meta: opts.meta.clone().unwrap_or_default(),
            variant: opts.variant_overrides.clone().unwrap_or_else(|| Variant::default_for(kind)),
        };

        store.set_object(txn, &obj);
    });

    id
}
