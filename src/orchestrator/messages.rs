//! Typed bus messages (spec §4.8). Generalizes the teacher's flat
//! `Message` enum (`app.rs`/`messages.rs`) from app-navigation events to
//! the renderer's lifecycle/pointer/camera/object/awareness taxonomy.

use crate::interaction::{Modifiers, PointerDownOutcome, PointerMoveOutcome, PointerTarget, PointerUpOutcome};
use crate::model::{ActorId, ObjectId};

#[derive(Debug, Clone)]
pub enum Message {
    // Lifecycle
    Resize { width: f64, height: f64 },
    Ping,
    Echo(String),

    // Pointer
    PointerDown { pos: (f64, f64), target: PointerTarget, modifiers: Modifiers },
    PointerMove { pos: (f64, f64) },
    PointerUp { pos: (f64, f64) },
    PointerCancel,
    PointerLeave,
    PinchStart,
    PinchEnd,

    // Camera
    Wheel { delta_y: f64, pos: (f64, f64) },

    // Objects
    SyncObjects,
    ObjectsAdded(Vec<ObjectId>),
    ObjectsUpdated(Vec<ObjectId>),
    ObjectsRemoved(Vec<ObjectId>),
    ClearObjects,

    // Awareness
    AwarenessUpdate(ActorId),

    // Coordinates
    RequestScreenCoords { ids: Vec<ObjectId> },

    // Testing
    Flush,
    TestAnimation { visual_id: ObjectId },
}

impl Message {
    /// Stable tag for logging/instrumentation, independent of `Debug`
    /// formatting so log lines don't change shape when a variant grows a
    /// field.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Resize { .. } => "resize",
            Message::Ping => "ping",
            Message::Echo(_) => "echo",
            Message::PointerDown { .. } => "pointer-down",
            Message::PointerMove { .. } => "pointer-move",
            Message::PointerUp { .. } => "pointer-up",
            Message::PointerCancel => "pointer-cancel",
            Message::PointerLeave => "pointer-leave",
            Message::PinchStart => "pinch-start",
            Message::PinchEnd => "pinch-end",
            Message::Wheel { .. } => "wheel",
            Message::SyncObjects => "sync-objects",
            Message::ObjectsAdded(_) => "objects-added",
            Message::ObjectsUpdated(_) => "objects-updated",
            Message::ObjectsRemoved(_) => "objects-removed",
            Message::ClearObjects => "clear-objects",
            Message::AwarenessUpdate(_) => "awareness-update",
            Message::RequestScreenCoords { .. } => "request-screen-coords",
            Message::Flush => "flush",
            Message::TestAnimation { .. } => "test-animation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenCoord {
    pub id: ObjectId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Response {
    #[default]
    None,
    Pong,
    Echoed(String),
    ScreenCoords(Vec<ScreenCoord>),
    Flushed { pending_operations: u32 },
    /// Surfaces C7's transition outcome so the caller can, e.g., apply a
    /// camera pan delta or draw a rubber-band rectangle — this engine has
    /// no camera/viewport state of its own to mutate on the gesture's
    /// behalf (spec §4.7 "update camera pan" is the input adapter's job).
    PointerDown(PointerDownOutcome),
    PointerMove(PointerMoveOutcome),
    PointerUp(PointerUpOutcome),
}
