//! Action Layer (spec §4.3, C3).
//!
//! Every action opens one store transaction and returns a structured
//! success/failure report. Actions never throw on user-caused conditions —
//! unexpected state is logged and skipped (spec §7 taxonomy class 1), the
//! same contract the teacher's controllers hold for `DbAction` results.

pub mod creation;
pub mod removal;
pub mod reset;
pub mod selection;
pub mod shuffle;
pub mod transform;

pub use creation::create_object;
pub use removal::remove_object;
pub use reset::reset_to_test_scene;
pub use selection::{clear_all_selections, select_objects, unselect_objects, ClearSelectionsOptions, SelectionResult};
pub use shuffle::shuffle_cards;
pub use transform::{exhaust_cards, flip_cards, move_objects};

use crate::model::ObjectId;

/// A skipped id plus the (loggable, never user-facing-as-exception) reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    Locked,
    OwnedByOther,
    WrongKind,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: Vec<ObjectId>,
    pub skipped: Vec<(ObjectId, SkipReason)>,
}
