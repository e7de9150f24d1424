//! Animation Scheduler (spec §4.5, C5).

pub mod composites;
pub mod easing;
pub mod scheduler;

pub use composites::{flip, shuffle_burst, shuffle_spin, shuffle_wobble, BurstVariant, GhostSpawner};
pub use easing::Easing;
pub use scheduler::{AnimKey, AnimationScheduler, AnimationSink, AnimationSpec, PropertyKind, Value};
