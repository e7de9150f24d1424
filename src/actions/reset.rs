//! `resetToTestScene` (spec §4.3).
//!
//! Clears the store then creates a fixed deterministic composition used by
//! the test harness (spec scenario 1: "Reset-to-test-scene (15 objects)").
//! Grounded directly in the teacher's `Database::reset_demo_data_scoped`
//! pattern: clear first, then reseed inside the same transactional unit of
//! work.

use crate::model::{sort_key, ObjectId, ObjectKind, Pos, TableObject, Variant};
use crate::store::TableStore;

/// Deterministic layout: 5 stacks, 3 tokens, 2 zones, 3 mats, 2 counters
/// (15 objects total, spec scenario 1).
const LAYOUT: &[(ObjectKind, f64, f64)] = &[
    (ObjectKind::Stack, -400.0, -200.0),
    (ObjectKind::Stack, -200.0, -200.0),
    (ObjectKind::Stack, 0.0, -200.0),
    (ObjectKind::Stack, 200.0, -200.0),
    (ObjectKind::Stack, 400.0, -200.0),
    (ObjectKind::Token, -200.0, 0.0),
    (ObjectKind::Token, 0.0, 0.0),
    (ObjectKind::Token, 200.0, 0.0),
    (ObjectKind::Zone, -300.0, 200.0),
    (ObjectKind::Zone, 300.0, 200.0),
    (ObjectKind::Mat, -400.0, 400.0),
    (ObjectKind::Mat, 0.0, 400.0),
    (ObjectKind::Mat, 400.0, 400.0),
    (ObjectKind::Counter, -200.0, -400.0),
    (ObjectKind::Counter, 200.0, -400.0),
];

/// Default deck for the first stack (the 5-card stack scenario 5 shuffles).
const DEFAULT_DECK: &[&str] = &["AS", "KS", "QS", "JS", "10S"];

pub fn reset_to_test_scene(store: &TableStore) -> Vec<ObjectId> {
    let mut created = Vec::new();

    store.transact(Some("local"), |txn| {
        store.clear_all_objects(txn);

        let mut next_prefix: i64 = 1;
        let mut is_first_stack = true;
        for (kind, x, y) in LAYOUT.iter().copied() {
            let id = uuid::Uuid::new_v4().to_string();
            let sort_key = format!("{next_prefix:010}|a");
            next_prefix += 1;

            let variant = if kind == ObjectKind::Stack && is_first_stack {
                is_first_stack = false;
                Variant::Stack {
                    cards: DEFAULT_DECK.iter().map(|c| c.to_string()).collect(),
                    face_up: true,
                }
            } else {
                Variant::default_for(kind)
            };

            let obj = TableObject {
                id: id.clone(),
                container_id: None,
                pos: Pos::new(x, y, 0.0),
                sort_key,
                locked: false,
                selected_by: None,
                meta: serde_json::Map::new(),
                variant,
            };

            store.set_object(txn, &obj);
            created.push(id);
        }
    });

    created
}

/// Sort key helper re-exported for callers that need to append more
/// objects to a scene created by `reset_to_test_scene` without
/// recomputing from scratch.
pub fn next_sort_key_after(store: &TableStore) -> String {
    let keys: Vec<String> = store.get_all_objects().into_iter().map(|o| o.sort_key).collect();
    sort_key::next_top(&keys)
}
