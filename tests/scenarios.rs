//! End-to-end scenarios driven straight at the orchestrator's message bus —
//! there is no real pointer device or DOM here, so each scenario constructs
//! and feeds the same messages a genuine input adapter would.

use tas_table::actions;
use tas_table::config::EngineConfig;
use tas_table::interaction::{InteractionMode, Modifiers, PointerTarget};
use tas_table::model::TableObject;
use tas_table::orchestrator::messages::{Message, Response};
use tas_table::persistence::{PersistenceAdapter, SqlitePersistence};
use tas_table::Table;

fn sorted_objects(table: &Table) -> Vec<TableObject> {
    let mut objs = table.store().get_all_objects();
    objs.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    objs
}

async fn click(table: &Table, obj: &TableObject) {
    table.orchestrator().dispatch(Message::PointerDown {
        pos: (obj.pos.x, obj.pos.y),
        target: PointerTarget::Object(obj.id.clone()),
        modifiers: Modifiers::default(),
    });
    table.orchestrator().dispatch(Message::PointerUp { pos: (obj.pos.x, obj.pos.y) });
}

#[tokio::test]
async fn single_select_shows_handle() {
    let table = Table::new(EngineConfig::default());
    let harness = table.test_harness();
    actions::reset_to_test_scene(table.store());
    harness.wait_for_renderer().await;

    let first = sorted_objects(&table).remove(0);
    click(&table, &first).await;
    harness.wait_for_renderer().await;

    let response = table
        .orchestrator()
        .dispatch(Message::RequestScreenCoords { ids: vec![first.id.clone()] });
    let Response::ScreenCoords(coords) = response else {
        panic!("expected screen coords, got {response:?}");
    };
    assert_eq!(coords.len(), 1);
    assert_eq!((coords[0].x, coords[0].y), (first.pos.x, first.pos.y));

    let stored = harness.get_object(&first.id).unwrap();
    assert_eq!(stored.selected_by.as_deref(), Some(table.orchestrator().actor_id().as_str()));
}

#[tokio::test]
async fn selection_change_moves_handle_without_duplicating() {
    let table = Table::new(EngineConfig::default());
    let harness = table.test_harness();
    actions::reset_to_test_scene(table.store());
    harness.wait_for_renderer().await;

    let objs = sorted_objects(&table);
    let first = objs[0].clone();
    let second = objs[1].clone();

    click(&table, &first).await;
    harness.wait_for_renderer().await;
    click(&table, &second).await;
    harness.wait_for_renderer().await;

    let still_selected: Vec<_> = harness
        .get_all_objects()
        .into_iter()
        .filter(|o| o.selected_by.is_some())
        .collect();
    assert_eq!(still_selected.len(), 1, "exactly one handle should remain after a plain click elsewhere");
    assert_eq!(still_selected[0].id, second.id);

    let response = table
        .orchestrator()
        .dispatch(Message::RequestScreenCoords { ids: vec![second.id.clone()] });
    let Response::ScreenCoords(coords) = response else {
        panic!("expected screen coords, got {response:?}");
    };
    assert_eq!(coords.len(), 1);
    assert_ne!((coords[0].x, coords[0].y), (first.pos.x, first.pos.y));
}

#[tokio::test]
async fn pan_hides_and_reveals_handle() {
    let table = Table::new(EngineConfig::default());
    let harness = table.test_harness();
    actions::reset_to_test_scene(table.store());
    harness.wait_for_renderer().await;

    let first = sorted_objects(&table).remove(0);
    click(&table, &first).await;
    harness.wait_for_renderer().await;

    // Pan mode set via the direct path, same as a real input adapter
    // switching tools, so ordering against the in-flight pointer gesture
    // is never in question.
    table.orchestrator().set_interaction_mode_now(InteractionMode::Pan);

    table.orchestrator().dispatch(Message::PointerDown {
        pos: (0.0, 0.0),
        target: PointerTarget::EmptySpace,
        modifiers: Modifiers::default(),
    });

    // Mid-pan, a screen-coords request is refused — the handle stays
    // hidden rather than reporting a stale position.
    let mid_pan = table
        .orchestrator()
        .dispatch(Message::RequestScreenCoords { ids: vec![first.id.clone()] });
    assert_eq!(mid_pan, Response::None);

    let moved = table.orchestrator().dispatch(Message::PointerMove { pos: (100.0, 100.0) });
    assert!(matches!(moved, Response::PointerMove(_)));

    table.orchestrator().dispatch(Message::PointerUp { pos: (100.0, 100.0) });

    let after_pan = table
        .orchestrator()
        .dispatch(Message::RequestScreenCoords { ids: vec![first.id.clone()] });
    let Response::ScreenCoords(coords) = after_pan else {
        panic!("expected screen coords once panning ends, got {after_pan:?}");
    };
    assert_eq!(coords.len(), 1);
}

#[tokio::test]
async fn wheel_zoom_keeps_handle_visible() {
    let table = Table::new(EngineConfig::default());
    let harness = table.test_harness();
    actions::reset_to_test_scene(table.store());
    harness.wait_for_renderer().await;

    let first = sorted_objects(&table).remove(0);
    click(&table, &first).await;
    harness.wait_for_renderer().await;

    table.orchestrator().dispatch(Message::Wheel { delta_y: -100.0, pos: (0.0, 0.0) });

    let response = table
        .orchestrator()
        .dispatch(Message::RequestScreenCoords { ids: vec![first.id.clone()] });
    let Response::ScreenCoords(coords) = response else {
        panic!("expected screen coords after wheel zoom, got {response:?}");
    };
    assert_eq!(coords.len(), 1);
    assert!(coords[0].w > 0.0 && coords[0].h > 0.0);
}

#[tokio::test]
async fn keyboard_shuffle_permutes_cards() {
    let table = Table::new(EngineConfig::default());
    let harness = table.test_harness();
    actions::reset_to_test_scene(table.store());
    harness.wait_for_renderer().await;

    let stack = sorted_objects(&table)
        .into_iter()
        .find(|o| o.cards().map(|c| c.len()) == Some(5))
        .expect("reset-to-test-scene always seeds a 5-card stack");
    let original = stack.cards().unwrap().to_vec();

    click(&table, &stack).await;
    harness.wait_for_renderer().await;

    // The keyboard binding that maps 's' to shuffleCards lives in the
    // input adapter, outside this core; the action layer call below is
    // exactly what that binding would invoke.
    let mut reordered = false;
    for _ in 0..5 {
        actions::shuffle_cards(table.store(), &[stack.id.clone()]);
        table.orchestrator().dispatch(Message::TestAnimation { visual_id: stack.id.clone() });
        harness.wait_for_animations_complete().await;

        let after = table.store().get_object(&stack.id).unwrap();
        let shuffled = after.cards().unwrap().to_vec();

        assert_eq!(shuffled.len(), 5);
        let mut sorted_before = original.clone();
        let mut sorted_after = shuffled.clone();
        sorted_before.sort();
        sorted_after.sort();
        assert_eq!(sorted_before, sorted_after, "shuffle must preserve the multiset of cards");

        if shuffled != original {
            reordered = true;
            break;
        }
    }
    assert!(reordered, "shuffle never produced a different order across 5 attempts");
}

#[tokio::test]
async fn exhaust_toggle_round_trips_rotation() {
    let table = Table::new(EngineConfig::default());
    actions::reset_to_test_scene(table.store());

    let stack = table
        .store()
        .get_all_objects()
        .into_iter()
        .find(|o| matches!(o.variant, tas_table::model::Variant::Stack { .. }) && o.pos.r == 0.0)
        .expect("reset-to-test-scene seeds stacks at rotation 0");

    let epsilon = table.config().rotation_epsilon;

    actions::exhaust_cards(table.store(), &[stack.id.clone()], epsilon);
    let rested = table.store().get_object(&stack.id).unwrap();
    assert!((rested.pos.r - 90.0).abs() <= 0.1);

    actions::exhaust_cards(table.store(), &[stack.id.clone()], epsilon);
    let unrested = table.store().get_object(&stack.id).unwrap();
    assert!((unrested.pos.r - 0.0).abs() <= 0.1);
}

#[tokio::test]
async fn shuffled_order_persists_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("table.sqlite");

    let table = Table::new(EngineConfig::default());
    actions::reset_to_test_scene(table.store());

    let stack = table
        .store()
        .get_all_objects()
        .into_iter()
        .find(|o| o.cards().map(|c| c.len()) == Some(5))
        .unwrap();
    actions::shuffle_cards(table.store(), &[stack.id.clone()]);
    let shuffled = table.store().get_object(&stack.id).unwrap().cards().unwrap().to_vec();

    let adapter = SqlitePersistence::connect(db_path, table.store().get_actor_id()).await.unwrap();
    adapter.on_ready().await.unwrap();
    adapter.persist(&table.store().encode_full_state()).await.unwrap();

    let reloaded_table = Table::new(EngineConfig::default());
    for update in adapter.load().await.unwrap() {
        reloaded_table.store().apply_update(&update).unwrap();
    }
    reloaded_table.evict_stale_selections();

    let reloaded = reloaded_table.store().get_object(&stack.id).unwrap();
    assert_eq!(reloaded.cards().unwrap(), shuffled.as_slice());
}

// Scenario 8 (migration end-to-end) needs crate-internal access to build a
// schema-incomplete object — nothing in the public API can produce one — so
// it lives as a unit test inside `store::migrator`, the one module with
// that access.
