//! Animation Scheduler (spec §4.5, C5).
//!
//! Time-indexed, per-(visual, property, stage) animations with easing and
//! ticker lifecycle. Keyed for dedup by `visualId:type[:stage]`;
//! registering a new animation with the same key replaces the previous
//! one. A single ticker is owned by the scheduler, started on first
//! registration and stopped automatically once the active set empties.

use super::easing::Easing;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub type VisualId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Rotation,
    Scale,
    ScaleX,
    ScaleY,
    Position,
    Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vec2(f64, f64),
}

impl Value {
    fn lerp(from: Value, to: Value, t: f64) -> Value {
        match (from, to) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a + (b - a) * t),
            (Value::Vec2(ax, ay), Value::Vec2(bx, by)) => {
                Value::Vec2(ax + (bx - ax) * t, ay + (by - ay) * t)
            }
            // Mismatched shapes are a programmer error (spec §7 class 2);
            // fall back to `to` rather than panic mid-tick.
            (_, to) => to,
        }
    }
}

/// Deduplication key: `visualId:type[:stage]` (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnimKey {
    pub visual_id: VisualId,
    pub property: PropertyKind,
    pub stage: Option<String>,
}

impl AnimKey {
    pub fn new(visual_id: impl Into<VisualId>, property: PropertyKind) -> Self {
        Self { visual_id: visual_id.into(), property, stage: None }
    }

    pub fn staged(visual_id: impl Into<VisualId>, property: PropertyKind, stage: impl Into<String>) -> Self {
        Self { visual_id: visual_id.into(), property, stage: Some(stage.into()) }
    }
}

type CompletionCallback = Box<dyn FnOnce(&AnimationScheduler) + Send>;

pub struct AnimationSpec {
    pub key: AnimKey,
    pub from: Value,
    pub to: Value,
    pub duration: Duration,
    pub easing: Easing,
    pub on_complete: Option<CompletionCallback>,
}

struct ActiveAnimation {
    spec_from: Value,
    spec_to: Value,
    duration: Duration,
    easing: Easing,
    started_at: Instant,
    on_complete: Option<CompletionCallback>,
}

/// Receives interpolated writes; implemented by the visual manager (C6) in
/// production, by a recording stub in tests.
pub trait AnimationSink: Send + Sync {
    fn write_property(&self, visual_id: &str, property: PropertyKind, value: Value);
}

struct SchedulerState {
    active: HashMap<AnimKey, ActiveAnimation>,
    ticker: Option<JoinHandle<()>>,
}

/// Cheap to clone — internally `Arc`-shared so the ticker task and external
/// callers (including `onComplete` callbacks registering successors) share
/// one scheduler.
#[derive(Clone)]
pub struct AnimationScheduler {
    state: Arc<Mutex<SchedulerState>>,
    sink: Arc<dyn AnimationSink>,
    tick_interval: Duration,
}

impl AnimationScheduler {
    pub fn new(sink: Arc<dyn AnimationSink>, tick_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState { active: HashMap::new(), ticker: None })),
            sink,
            tick_interval,
        }
    }

    /// Registers (or replaces) an animation. Starts the ticker if this is
    /// the first active animation.
    pub fn register(&self, spec: AnimationSpec) {
        let mut state = self.state.lock().unwrap();
        state.active.insert(
            spec.key,
            ActiveAnimation {
                spec_from: spec.from,
                spec_to: spec.to,
                duration: spec.duration,
                easing: spec.easing,
                started_at: Instant::now(),
                on_complete: spec.on_complete,
            },
        );

        if state.ticker.is_none() {
            let this = self.clone();
            state.ticker = Some(tokio::spawn(async move { this.run_ticker().await }));
        }
    }

    /// Cancelling `(visualId, type)` also removes every staged variant
    /// `(visualId, type, *)` (spec §4.5, §5).
    pub fn cancel(&self, visual_id: &str, property: PropertyKind) {
        let mut state = self.state.lock().unwrap();
        state.active.retain(|k, _| !(k.visual_id == visual_id && k.property == property));
    }

    /// Cancels every key prefixed by `visualId:` (spec §5).
    pub fn cancel_all_for_visual(&self, visual_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.active.retain(|k, _| k.visual_id != visual_id);
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().unwrap().active.len()
    }

    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    async fn run_ticker(&self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            interval.tick().await;

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.tick_once()));

            match outcome {
                Ok(still_running) => {
                    if !still_running {
                        break;
                    }
                }
                Err(_) => {
                    // Fault policy (spec §4.5, §7 class 5): stop the ticker
                    // and clear the active set rather than looping on errors.
                    crate::logger::error("animation ticker panicked; clearing active set");
                    let mut state = self.state.lock().unwrap();
                    state.active.clear();
                    state.ticker = None;
                    break;
                }
            }
        }
    }

    /// One frame: interpolate every active animation, buffer completions,
    /// invoke `onComplete` for each, THEN delete the completed entries,
    /// finally "render" (the sink writes are the render in this headless
    /// core). Returns whether the ticker should keep running.
    fn tick_once(&self) -> bool {
        let mut completed_callbacks: Vec<(AnimKey, Option<CompletionCallback>)> = Vec::new();

        {
            let mut state = self.state.lock().unwrap();
            let mut completed_keys = Vec::new();

            for (key, anim) in state.active.iter_mut() {
                let elapsed = anim.started_at.elapsed();
                let t = (elapsed.as_secs_f64() / anim.duration.as_secs_f64().max(1e-9)).clamp(0.0, 1.0);
                let eased = anim.easing.apply(t);
                let value = Value::lerp(anim.spec_from, anim.spec_to, eased);
                self.sink.write_property(&key.visual_id, key.property, value);

                if t >= 1.0 {
                    completed_keys.push(key.clone());
                }
            }

            for key in &completed_keys {
                if let Some(anim) = state.active.get_mut(key) {
                    completed_callbacks.push((key.clone(), anim.on_complete.take()));
                }
            }
        }

        // Callbacks run with the lock released so they can call back into
        // `register`/`cancel` without deadlocking.
        for (_, cb) in completed_callbacks.drain(..) {
            if let Some(cb) = cb {
                cb(self);
            }
        }

        let mut state = self.state.lock().unwrap();
        // Re-collect: a callback may have re-registered the same key with a
        // fresh animation, in which case it must NOT be deleted here.
        state.active.retain(|_, a| a.started_at.elapsed() < a.duration || a.on_complete.is_some());

        let still_running = !state.active.is_empty();
        if !still_running {
            state.ticker = None;
        }
        still_running
    }
}
