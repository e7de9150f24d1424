//! Interaction State Machine (spec §4.7, C7).

pub mod modes;
pub mod state_machine;

pub use modes::{GestureMode, InteractionMode, Modifiers, PointerTarget};
pub use state_machine::{InteractionStateMachine, PointerDownOutcome, PointerMoveOutcome, PointerUpOutcome};
