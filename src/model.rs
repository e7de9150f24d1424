//! TableObject data model (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ObjectId = String;
pub type ActorId = String;

/// World-space position with rotation in degrees (spec §3.1 `_pos`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl Pos {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        Self { x, y, r }
    }

    /// Invariant 2: rotation rounded to one decimal place on write.
    pub fn normalize_rotation(&mut self) {
        self.r = (self.r * 10.0).round() / 10.0;
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, r: 0.0 }
    }
}

/// Discriminating tag, immutable after creation (spec §3 `_kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Stack,
    Token,
    Zone,
    Mat,
    Counter,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Stack => "stack",
            ObjectKind::Token => "token",
            ObjectKind::Zone => "zone",
            ObjectKind::Mat => "mat",
            ObjectKind::Counter => "counter",
        };
        write!(f, "{s}")
    }
}

impl ObjectKind {
    pub fn from_str_lossy(s: &str) -> Option<Self> {
        match s {
            "stack" => Some(ObjectKind::Stack),
            "token" => Some(ObjectKind::Token),
            "zone" => Some(ObjectKind::Zone),
            "mat" => Some(ObjectKind::Mat),
            "counter" => Some(ObjectKind::Counter),
            _ => None,
        }
    }
}

/// Kind-specific fields (spec §3 "Variant additions").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Variant {
    Stack { cards: Vec<String>, face_up: bool },
    Token { face_up: bool },
    Zone,
    Mat,
    Counter,
}

impl Variant {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Variant::Stack { .. } => ObjectKind::Stack,
            Variant::Token { .. } => ObjectKind::Token,
            Variant::Zone => ObjectKind::Zone,
            Variant::Mat => ObjectKind::Mat,
            Variant::Counter => ObjectKind::Counter,
        }
    }

    /// Default schema for a freshly created object of this kind (spec §4.2).
    pub fn default_for(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Stack => Variant::Stack { cards: Vec::new(), face_up: true },
            ObjectKind::Token => Variant::Token { face_up: true },
            ObjectKind::Zone => Variant::Zone,
            ObjectKind::Mat => Variant::Mat,
            ObjectKind::Counter => Variant::Counter,
        }
    }
}

/// The replicated unit (spec §3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableObject {
    pub id: ObjectId,
    pub container_id: Option<ObjectId>,
    pub pos: Pos,
    pub sort_key: String,
    pub locked: bool,
    pub selected_by: Option<ActorId>,
    pub meta: serde_json::Map<String, serde_json::Value>,
    pub variant: Variant,
}

impl TableObject {
    pub fn kind(&self) -> ObjectKind {
        self.variant.kind()
    }

    pub fn face_up(&self) -> Option<bool> {
        match &self.variant {
            Variant::Stack { face_up, .. } => Some(*face_up),
            Variant::Token { face_up } => Some(*face_up),
            _ => None,
        }
    }

    pub fn cards(&self) -> Option<&[String]> {
        match &self.variant {
            Variant::Stack { cards, .. } => Some(cards),
            _ => None,
        }
    }
}

/// Fractional-index sort keys of the form `"<prefix>|<suffix>"` (spec §3.1).
/// The prefix is a monotonically increasing integer generation; the suffix
/// breaks ties between same-generation keys using ordinary string
/// ordering, so `next_top` always compares strictly greater than every
/// existing key at the same or lower generation.
pub mod sort_key {
    /// Generation prefixes are zero-padded to this width so plain string
    /// comparison agrees with numeric comparison up to `10^PREFIX_WIDTH`
    /// generations — the GLOSSARY defines `_sortKey` as a string-ordered
    /// key, and an unpadded decimal prefix stops being monotonic under
    /// string order the moment the digit count grows (`"10|a" < "2|a"`).
    const PREFIX_WIDTH: usize = 10;

    /// Returns a key strictly greater than every key in `existing`, under
    /// ordinary string ordering (invariant 3: sort-key monotonicity on
    /// creation).
    pub fn next_top(existing: impl IntoIterator<Item = impl AsRef<str>>) -> String {
        let max_prefix = existing
            .into_iter()
            .filter_map(|k| prefix_of(k.as_ref()))
            .max()
            .unwrap_or(0);
        format!("{:0width$}|a", max_prefix + 1, width = PREFIX_WIDTH)
    }

    fn prefix_of(key: &str) -> Option<i64> {
        key.split('|').next()?.parse().ok()
    }
}

/// Options accepted by `createObject` (spec §4.3); caller-provided fields
/// overlay kind defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub container_id: Option<ObjectId>,
    pub pos: Option<Pos>,
    pub locked: Option<bool>,
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
    pub variant_overrides: Option<Variant>,
}
