//! Conversions between [`TableObject`] and the CRDT-native [`yrs::Any`]
//! representation, plus the nested-map field layout that gives each
//! property of an object its own last-writer-wins register (spec §3.2
//! invariant 1, §9 "a selection claim is a field write that CRDT may
//! revert on merge").

use crate::error::StoreError;
use crate::model::{ObjectKind, Pos, TableObject, Variant};
use yrs::{Any, Map, MapPrelim, MapRef, ReadTxn, TransactionMut};

const F_KIND: &str = "_kind";
const F_CONTAINER: &str = "_containerId";
const F_POS: &str = "_pos";
const F_SORT_KEY: &str = "_sortKey";
const F_LOCKED: &str = "_locked";
const F_SELECTED_BY: &str = "_selectedBy";
const F_META: &str = "_meta";
const F_FACE_UP: &str = "_faceUp";
const F_CARDS: &str = "_cards";

pub fn json_to_any(value: &serde_json::Value) -> Any {
    match value {
        serde_json::Value::Null => Any::Null,
        serde_json::Value::Bool(b) => Any::Bool(*b),
        serde_json::Value::Number(n) => Any::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Any::String(s.as_str().into()),
        serde_json::Value::Array(items) => {
            Any::Array(items.iter().map(json_to_any).collect::<Vec<_>>().into())
        }
        serde_json::Value::Object(map) => Any::Map(Box::new(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_any(v)))
                .collect(),
        )),
    }
}

pub fn any_to_json(value: &Any) -> serde_json::Value {
    match value {
        Any::Null | Any::Undefined => serde_json::Value::Null,
        Any::Bool(b) => serde_json::Value::Bool(*b),
        Any::Number(n) => serde_json::json!(n),
        Any::BigInt(n) => serde_json::json!(n),
        Any::String(s) => serde_json::Value::String(s.to_string()),
        Any::Array(items) => serde_json::Value::Array(items.iter().map(any_to_json).collect()),
        Any::Map(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter() {
                out.insert(k.clone(), any_to_json(v));
            }
            serde_json::Value::Object(out)
        }
        Any::Buffer(bytes) => {
            serde_json::Value::String(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes))
        }
    }
}

fn pos_to_any(pos: &Pos) -> Any {
    let mut map = std::collections::HashMap::new();
    map.insert("x".to_string(), Any::Number(pos.x));
    map.insert("y".to_string(), Any::Number(pos.y));
    map.insert("r".to_string(), Any::Number(pos.r));
    Any::Map(Box::new(map))
}

fn any_to_pos(value: &Any) -> Pos {
    if let Any::Map(map) = value {
        let get = |k: &str| map.get(k).and_then(|v| if let Any::Number(n) = v { Some(*n) } else { None }).unwrap_or(0.0);
        Pos::new(get("x"), get("y"), get("r"))
    } else {
        Pos::default()
    }
}

/// Writes every field of `obj` into `obj_map`. Used both by `setObject`
/// (full upsert) and by the migrator (targeted default backfill).
pub fn write_object_fields(txn: &mut TransactionMut, obj_map: &MapRef, obj: &TableObject) {
    obj_map.insert(txn, F_KIND, obj.kind().to_string());
    match &obj.container_id {
        Some(c) => { obj_map.insert(txn, F_CONTAINER, c.as_str()); }
        None => { obj_map.insert(txn, F_CONTAINER, Any::Null); }
    }
    obj_map.insert(txn, F_POS, pos_to_any(&obj.pos));
    obj_map.insert(txn, F_SORT_KEY, obj.sort_key.as_str());
    obj_map.insert(txn, F_LOCKED, obj.locked);
    match &obj.selected_by {
        Some(a) => { obj_map.insert(txn, F_SELECTED_BY, a.as_str()); }
        None => { obj_map.insert(txn, F_SELECTED_BY, Any::Null); }
    }
    obj_map.insert(txn, F_META, json_to_any(&serde_json::Value::Object(obj.meta.clone())));

    match &obj.variant {
        Variant::Stack { cards, face_up } => {
            obj_map.insert(txn, F_FACE_UP, *face_up);
            obj_map.insert(
                txn,
                F_CARDS,
                Any::Array(cards.iter().map(|c| Any::String(c.as_str().into())).collect::<Vec<_>>().into()),
            );
        }
        Variant::Token { face_up } => {
            obj_map.insert(txn, F_FACE_UP, *face_up);
        }
        Variant::Zone | Variant::Mat | Variant::Counter => {}
    }
}

/// Builds a fresh nested map preloaded with `obj`'s fields, for inserting a
/// brand-new object into the root "objects" map.
pub fn object_prelim(obj: &TableObject) -> MapPrelim {
    let mut fields: std::collections::HashMap<String, Any> = std::collections::HashMap::new();
    fields.insert(F_KIND.to_string(), Any::String(obj.kind().to_string().into()));
    fields.insert(
        F_CONTAINER.to_string(),
        obj.container_id.as_ref().map(|c| Any::String(c.as_str().into())).unwrap_or(Any::Null),
    );
    fields.insert(F_POS.to_string(), pos_to_any(&obj.pos));
    fields.insert(F_SORT_KEY.to_string(), Any::String(obj.sort_key.as_str().into()));
    fields.insert(F_LOCKED.to_string(), Any::Bool(obj.locked));
    fields.insert(
        F_SELECTED_BY.to_string(),
        obj.selected_by.as_ref().map(|a| Any::String(a.as_str().into())).unwrap_or(Any::Null),
    );
    fields.insert(F_META.to_string(), json_to_any(&serde_json::Value::Object(obj.meta.clone())));

    match &obj.variant {
        Variant::Stack { cards, face_up } => {
            fields.insert(F_FACE_UP.to_string(), Any::Bool(*face_up));
            fields.insert(
                F_CARDS.to_string(),
                Any::Array(cards.iter().map(|c| Any::String(c.as_str().into())).collect::<Vec<_>>().into()),
            );
        }
        Variant::Token { face_up } => {
            fields.insert(F_FACE_UP.to_string(), Any::Bool(*face_up));
        }
        Variant::Zone | Variant::Mat | Variant::Counter => {}
    }

    MapPrelim::from(fields)
}

/// Reads `obj_map` back into a [`TableObject`]. Returns a [`StoreError`] if
/// the kind tag is missing or unrecognized — required fields missing
/// because migration hasn't run yet are *not* an error here, callers that
/// need completeness run the migrator first (spec §4.2).
pub fn read_object_fields<T: ReadTxn>(
    txn: &T,
    id: &str,
    obj_map: &MapRef,
) -> Result<TableObject, StoreError> {
    let get = |key: &str| obj_map.get(txn, key);

    let kind_str = match get(F_KIND) {
        Some(yrs::Value::Any(Any::String(s))) => s.to_string(),
        _ => return Err(StoreError::UnknownKind(id.to_string())),
    };
    let kind = ObjectKind::from_str_lossy(&kind_str)
        .ok_or_else(|| StoreError::UnknownKind(kind_str.clone()))?;

    let container_id = match get(F_CONTAINER) {
        Some(yrs::Value::Any(Any::String(s))) => Some(s.to_string()),
        _ => None,
    };

    let pos = match get(F_POS) {
        Some(yrs::Value::Any(any)) => any_to_pos(&any),
        _ => Pos::default(),
    };

    let sort_key = match get(F_SORT_KEY) {
        Some(yrs::Value::Any(Any::String(s))) => s.to_string(),
        _ => String::new(),
    };

    let locked = matches!(get(F_LOCKED), Some(yrs::Value::Any(Any::Bool(true))));

    let selected_by = match get(F_SELECTED_BY) {
        Some(yrs::Value::Any(Any::String(s))) => Some(s.to_string()),
        _ => None,
    };

    let meta = match get(F_META) {
        Some(yrs::Value::Any(any)) => match any_to_json(&any) {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
        _ => serde_json::Map::new(),
    };

    let face_up = matches!(get(F_FACE_UP), Some(yrs::Value::Any(Any::Bool(true))));

    let cards = match get(F_CARDS) {
        Some(yrs::Value::Any(Any::Array(items))) => items
            .iter()
            .filter_map(|v| if let Any::String(s) = v { Some(s.to_string()) } else { None })
            .collect(),
        _ => Vec::new(),
    };

    let variant = match kind {
        ObjectKind::Stack => Variant::Stack { cards, face_up },
        ObjectKind::Token => Variant::Token { face_up },
        ObjectKind::Zone => Variant::Zone,
        ObjectKind::Mat => Variant::Mat,
        ObjectKind::Counter => Variant::Counter,
    };

    Ok(TableObject {
        id: id.to_string(),
        container_id,
        pos,
        sort_key,
        locked,
        selected_by,
        meta,
        variant,
    })
}

/// Keys that `default_for`/migration may need to backfill, alongside the
/// JSON-ish default they'd carry (used only by the migrator's presence
/// check — writes still go through `write_object_fields`/variant defaults).
pub fn required_keys(kind: ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::Stack => &[F_FACE_UP, F_CARDS],
        ObjectKind::Token => &[F_FACE_UP],
        ObjectKind::Zone | ObjectKind::Mat | ObjectKind::Counter => &[],
    }
}
