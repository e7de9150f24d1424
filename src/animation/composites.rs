//! Predefined composite animations (spec §4.5), referenced by name from
//! tests and from the action layer so staging/timing stays consistent
//! across call sites.

use super::easing::Easing;
use super::scheduler::{AnimKey, AnimationScheduler, AnimationSpec, PropertyKind, Value};
use std::time::Duration;

/// Two-stage flip: compress `scaleX: 1 -> 0` (ease-in), call `on_midpoint`
/// to swap the face, then expand `scaleX: 0 -> 1` (ease-out).
pub fn flip<F>(scheduler: &AnimationScheduler, visual_id: &str, duration_ms: u64, on_midpoint: F)
where
    F: FnOnce() + Send + 'static,
{
    let half = Duration::from_millis(duration_ms / 2);
    let visual_id = visual_id.to_string();
    let expand_visual_id = visual_id.clone();
    let scheduler_for_complete = scheduler.clone();

    scheduler.register(AnimationSpec {
        key: AnimKey::staged(visual_id, PropertyKind::ScaleX, "compress"),
        from: Value::Scalar(1.0),
        to: Value::Scalar(0.0),
        duration: half,
        easing: Easing::CubicIn,
        on_complete: Some(Box::new(move |_sched| {
            on_midpoint();
            scheduler_for_complete.register(AnimationSpec {
                key: AnimKey::staged(expand_visual_id, PropertyKind::ScaleX, "expand"),
                from: Value::Scalar(0.0),
                to: Value::Scalar(1.0),
                duration: half,
                easing: Easing::CubicOut,
                on_complete: None,
            });
        })),
    });
}

/// Four-stage rotation wobble with a light scale pulse: rotate out, rock
/// back past center, rock forward again, settle at the original rotation.
pub fn shuffle_wobble(scheduler: &AnimationScheduler, visual_id: &str, base_rotation: f64, duration_ms: u64) {
    let stage = Duration::from_millis(duration_ms / 4);
    let wobble_rotations = [
        base_rotation + 0.12,
        base_rotation - 0.08,
        base_rotation + 0.04,
        base_rotation,
    ];
    let scale_pulse = [1.0, 1.06, 1.02, 1.0];

    chain_stages(
        scheduler,
        visual_id,
        "wobble",
        PropertyKind::Rotation,
        base_rotation,
        &wobble_rotations,
        stage,
        Easing::CubicInOut,
    );
    chain_stages(
        scheduler,
        visual_id,
        "wobble-scale",
        PropertyKind::Scale,
        1.0,
        &scale_pulse,
        stage,
        Easing::CubicInOut,
    );
}

/// Four-stage rotation summing to exactly five full turns (`5 * 2*PI`),
/// returning to the original rotation (mod 2*PI, 5 turns vanishes).
pub fn shuffle_spin(scheduler: &AnimationScheduler, visual_id: &str, base_rotation: f64, duration_ms: u64) {
    let stage = Duration::from_millis(duration_ms / 4);
    let per_stage = (5.0 * std::f64::consts::TAU) / 4.0;
    let targets = [
        base_rotation + per_stage,
        base_rotation + 2.0 * per_stage,
        base_rotation + 3.0 * per_stage,
        base_rotation + 4.0 * per_stage,
    ];

    chain_stages(
        scheduler,
        visual_id,
        "spin",
        PropertyKind::Rotation,
        base_rotation,
        &targets,
        stage,
        Easing::Linear,
    );
}

/// What a ghost-capable composite needs from the caller: attempt to spawn
/// a temporary ghost visual and hand back its id. Ghost creation is
/// best-effort (spec §4.5) — returning `None` falls back to the burst
/// without ghosts rather than failing the whole animation.
pub trait GhostSpawner: Send + Sync {
    fn spawn_ghost(&self, source_visual_id: &str) -> Option<String>;
    fn despawn_ghost(&self, ghost_visual_id: &str);
}

pub enum BurstVariant {
    Plain,
    Ghost,
    Background,
    BackgroundWobble,
}

/// Four-stage positional burst: jump out along a short arc, overshoot
/// slightly, settle back, with an optional temporary ghost riding the
/// outbound leg. `Background*` variants animate a ghost only (no change
/// to the source visual's own position) so the real object stays put
/// while a decoy appears to fly.
pub fn shuffle_burst(
    scheduler: &AnimationScheduler,
    visual_id: &str,
    from_pos: (f64, f64),
    to_pos: (f64, f64),
    duration_ms: u64,
    variant: BurstVariant,
    ghosts: Option<&dyn GhostSpawner>,
) {
    let stage = Duration::from_millis(duration_ms / 4);
    let (fx, fy) = from_pos;
    let (tx, ty) = to_pos;
    let overshoot = (tx + (tx - fx) * 0.08, ty + (ty - fy) * 0.08);
    let halfway = (fx + (tx - fx) * 0.5, fy + (ty - fy) * 0.5);

    let ghost_id = match variant {
        BurstVariant::Ghost | BurstVariant::Background | BurstVariant::BackgroundWobble => {
            ghosts.and_then(|g| g.spawn_ghost(visual_id))
        }
        BurstVariant::Plain => None,
    };

    let target_for_source = matches!(variant, BurstVariant::Plain | BurstVariant::Ghost);
    let source_target = if target_for_source { visual_id.to_string() } else { ghost_id.clone().unwrap_or_default() };

    if target_for_source || ghost_id.is_some() {
        // Four real stages: depart halfway, overshoot past the target,
        // arrive, hold — `from_pos` is the pre-stage starting point, never
        // itself a stage target (a target equal to `from` would register a
        // zero-motion stage).
        let targets = [halfway, overshoot, (tx, ty), (tx, ty)];
        chain_position_stages(scheduler, &source_target, "burst", (fx, fy), &targets, stage);

        if matches!(variant, BurstVariant::BackgroundWobble) {
            if let Some(ref g) = ghost_id {
                shuffle_wobble(scheduler, g, 0.0, duration_ms);
            }
        }
    }

    if let Some(g) = ghost_id {
        // Despawning the ghost container itself is the caller's
        // responsibility (it owns the `GhostSpawner`); fading it out here
        // just makes the handoff back to the real visual inconspicuous.
        scheduler.register(AnimationSpec {
            key: AnimKey::staged(g, PropertyKind::Alpha, "burst-ghost-fade"),
            from: Value::Scalar(1.0),
            to: Value::Scalar(0.0),
            duration: stage,
            easing: Easing::CubicIn,
            on_complete: None,
        });
    }
}

fn chain_stages(
    scheduler: &AnimationScheduler,
    visual_id: &str,
    label: &str,
    property: PropertyKind,
    start: f64,
    targets: &[f64],
    stage_duration: Duration,
    easing: Easing,
) {
    chain_scalar_recursive(scheduler.clone(), visual_id.to_string(), label.to_string(), property, start, targets.to_vec(), 0, stage_duration, easing);
}

fn chain_scalar_recursive(
    scheduler: AnimationScheduler,
    visual_id: String,
    label: String,
    property: PropertyKind,
    from: f64,
    targets: Vec<f64>,
    index: usize,
    stage_duration: Duration,
    easing: Easing,
) {
    if index >= targets.len() {
        return;
    }
    let to = targets[index];
    let stage_key = format!("{label}-{index}");
    let next_from = to;
    let next_targets = targets.clone();
    let next_visual_id = visual_id.clone();
    let next_label = label.clone();

    scheduler.register(AnimationSpec {
        key: AnimKey::staged(visual_id.clone(), property, stage_key),
        from: Value::Scalar(from),
        to: Value::Scalar(to),
        duration: stage_duration,
        easing,
        on_complete: if index + 1 < targets.len() {
            Some(Box::new(move |sched| {
                chain_scalar_recursive(sched.clone(), next_visual_id, next_label, property, next_from, next_targets, index + 1, stage_duration, easing);
            }))
        } else {
            None
        },
    });
}

fn chain_position_stages(
    scheduler: &AnimationScheduler,
    visual_id: &str,
    label: &str,
    start: (f64, f64),
    targets: &[(f64, f64)],
    stage_duration: Duration,
) {
    if targets.is_empty() {
        return;
    }
    chain_position_recursive(scheduler.clone(), visual_id.to_string(), label.to_string(), start, targets.to_vec(), 0, stage_duration);
}

fn chain_position_recursive(
    scheduler: AnimationScheduler,
    visual_id: String,
    label: String,
    from: (f64, f64),
    targets: Vec<(f64, f64)>,
    index: usize,
    stage_duration: Duration,
) {
    if index >= targets.len() {
        return;
    }
    let to = targets[index];
    let stage_key = format!("{label}-{index}");
    let next_visual_id = visual_id.clone();
    let next_label = label.clone();
    let next_targets = targets.clone();

    scheduler.register(AnimationSpec {
        key: AnimKey::staged(visual_id.clone(), PropertyKind::Position, stage_key),
        from: Value::Vec2(from.0, from.1),
        to: Value::Vec2(to.0, to.1),
        duration: stage_duration,
        easing: Easing::CubicInOut,
        on_complete: if index + 1 < targets.len() {
            Some(Box::new(move |sched| {
                chain_position_recursive(sched.clone(), next_visual_id, next_label, to, next_targets, index + 1, stage_duration);
            }))
        } else {
            None
        },
    });
}
