//! Replicated Object Store (spec §4.1, C1).
//!
//! A CRDT-backed `id -> TableObject` map. Every mutation happens inside a
//! transaction; observers are notified once per transaction with a
//! coalesced `{added, updated, removed}` report. Remote merges never fail —
//! conflicts are resolved by CRDT semantics and reconciled by the action
//! layer (selection) and visual manager (animation) rather than rejected
//! here.

pub mod encode;
pub mod migrator;

use crate::error::StoreError;
use crate::model::{ObjectId, TableObject};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use yrs::{Doc, Map, MapPrelim, MapRef, Origin, Subscription, Transact, TransactionMut};

/// Per-transaction change report handed to `onObjectsChange` subscribers.
///
/// `snapshots` carries the post-write `TableObject` for every added/updated
/// id, resolved through the transaction that is still committing. Handlers
/// fire synchronously inside that commit (spec §5), before `txn` is
/// dropped, so a handler must not open a second, independent transaction on
/// the same `Doc` to re-read an object — yrs does not support nested
/// transactions on one document. `snapshots` exists so handlers never need
/// to: everything they'd otherwise re-fetch is already here.
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    pub added: Vec<ObjectId>,
    pub updated: Vec<ObjectId>,
    pub removed: Vec<ObjectId>,
    pub snapshots: HashMap<ObjectId, TableObject>,
    pub origin: Option<String>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

type ChangeHandler = Box<dyn Fn(&ChangeReport) + Send + Sync>;
type UpdateHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// The replicated object store. Cheap to clone — internally `Arc`-shared,
/// like the teacher's `Database { pool: SqlitePool, .. }` wrapper.
#[derive(Clone)]
pub struct TableStore {
    inner: Arc<Inner>,
}

struct Inner {
    doc: Doc,
    objects: MapRef,
    handlers: Mutex<Vec<(u64, ChangeHandler)>>,
    next_handler_id: Mutex<u64>,
    update_handlers: Mutex<Vec<(u64, UpdateHandler)>>,
    next_update_handler_id: Mutex<u64>,
    // Tracks which top-level ids existed before the in-flight transaction so
    // the deep observer can classify add/update/remove.
    pending_before: Mutex<Option<HashSet<ObjectId>>>,
    // Kept alive for the lifetime of the store.
    _subscription: Mutex<Option<Subscription>>,
    _update_subscription: Mutex<Option<Subscription>>,
}

/// Handle returned by `onObjectsChange`; dropping it unsubscribes.
pub struct Unsubscribe {
    id: u64,
    handlers: Arc<Inner>,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.handlers.handlers.lock().unwrap().retain(|(hid, _)| *hid != self.id);
    }
}

/// Handle returned by `on_update` (spec §6.1/§6.2: raw CRDT update bytes,
/// the unit `PersistenceAdapter::persist` and `SyncTransport::broadcast`
/// both operate on). Dropping it unsubscribes.
pub struct UpdateUnsubscribe {
    id: u64,
    handlers: Arc<Inner>,
}

impl Drop for UpdateUnsubscribe {
    fn drop(&mut self) {
        self.handlers.update_handlers.lock().unwrap().retain(|(hid, _)| *hid != self.id);
    }
}

impl TableStore {
    pub fn new() -> Self {
        let doc = Doc::new();
        let objects = doc.get_or_insert_map("objects");
        let inner = Arc::new(Inner {
            doc,
            objects,
            handlers: Mutex::new(Vec::new()),
            next_handler_id: Mutex::new(0),
            update_handlers: Mutex::new(Vec::new()),
            next_update_handler_id: Mutex::new(0),
            pending_before: Mutex::new(None),
            _subscription: Mutex::new(None),
            _update_subscription: Mutex::new(None),
        });

        let weak_inner = Arc::downgrade(&inner);
        let sub = inner.objects.observe_deep(move |txn, events| {
            let Some(inner) = weak_inner.upgrade() else { return };
            inner.dispatch(txn, events);
        });
        *inner._subscription.lock().unwrap() = Some(sub);

        let weak_inner = Arc::downgrade(&inner);
        let update_sub = inner.doc.observe_update_v1(move |_txn, event| {
            let Some(inner) = weak_inner.upgrade() else { return };
            for (_, handler) in inner.update_handlers.lock().unwrap().iter() {
                handler(&event.update);
            }
        }).expect("doc supports update_v1 observation");
        *inner._update_subscription.lock().unwrap() = Some(update_sub);

        Self { inner }
    }

    pub fn get_actor_id(&self) -> String {
        self.inner.doc.client_id().to_string()
    }

    /// Subscribes to raw CRDT update bytes emitted after every commit,
    /// local or merged-remote alike (spec §6.1 `persist(update)`, §6.2
    /// `broadcast(update)`). Returns an unsubscribe handle.
    pub fn on_update<F>(&self, handler: F) -> UpdateUnsubscribe
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let mut next_id = self.inner.next_update_handler_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        self.inner.update_handlers.lock().unwrap().push((id, Box::new(handler)));
        UpdateUnsubscribe { id, handlers: self.inner.clone() }
    }

    /// Encodes the entire current document state as one update (spec §6.1
    /// `load() -> updates`'s counterpart on the write side: a fresh
    /// snapshot an adapter can hand back wholesale instead of replaying
    /// history).
    pub fn encode_full_state(&self) -> Vec<u8> {
        use yrs::{ReadTxn, StateVector};
        let txn = self.inner.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Merges a remote or persisted update into the document (spec §6.1
    /// `load() -> updates` replay, §6.2 `onUpdate(cb)`). CRDT merges never
    /// fail at this layer (spec §4.1 failure model) — a malformed byte
    /// stream is the one exception, reported as a `StoreError::Codec`.
    /// Runs through the same `transact` bookkeeping as a local write so
    /// `onObjectsChange` classifies merged objects as added/updated/removed
    /// correctly rather than treating everything as new.
    pub fn apply_update(&self, bytes: &[u8]) -> Result<(), StoreError> {
        use yrs::Update;
        let update = Update::decode_v1(bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.transact(Some("remote"), |txn| txn.apply_update(update))
            .map_err(|e| StoreError::Codec(e.to_string()))
    }

    /// Executes `body` inside one CRDT transaction; observers fire once
    /// after commit with `origin` propagated (spec §4.1).
    pub fn transact<F, R>(&self, origin: Option<&str>, body: F) -> R
    where
        F: FnOnce(&mut TransactionMut) -> R,
    {
        let before: HashSet<ObjectId> = {
            let txn = self.inner.doc.transact();
            self.inner.objects.keys(&txn).map(|k| k.to_string()).collect()
        };
        *self.inner.pending_before.lock().unwrap() = Some(before);

        let result = match origin {
            Some(o) => {
                let mut txn = self.inner.doc.transact_mut_with(Origin::from(o.as_bytes().to_vec()));
                body(&mut txn)
            }
            None => {
                let mut txn = self.inner.doc.transact_mut();
                body(&mut txn)
            }
        };

        *self.inner.pending_before.lock().unwrap() = None;
        result
    }

    /// Upsert full object; emits `added` if new, `updated` otherwise.
    /// Must be called from within `transact`.
    pub fn set_object(&self, txn: &mut TransactionMut, obj: &TableObject) {
        match self.inner.objects.get(txn, &obj.id) {
            Some(yrs::Value::YMap(existing)) => {
                encode::write_object_fields(txn, &existing, obj);
            }
            _ => {
                let prelim: MapPrelim = encode::object_prelim(obj);
                self.inner.objects.insert(txn, obj.id.as_str(), prelim);
            }
        }
    }

    /// Read an object using a transaction the caller already holds (e.g.
    /// from inside a `transact` closure, where opening a second fresh
    /// transaction on the same `Doc` would deadlock/panic).
    pub fn get_object_in<T: yrs::ReadTxn>(&self, txn: &T, id: &str) -> Option<TableObject> {
        match self.inner.objects.get(txn, id) {
            Some(yrs::Value::YMap(m)) => encode::read_object_fields(txn, id, &m).ok(),
            _ => None,
        }
    }

    /// Read every object using a transaction the caller already holds.
    pub fn get_all_objects_in<T: yrs::ReadTxn>(&self, txn: &T) -> Vec<TableObject> {
        self.inner
            .objects
            .iter(txn)
            .filter_map(|(id, value)| match value {
                yrs::Value::YMap(m) => encode::read_object_fields(txn, id, &m).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn get_object(&self, id: &str) -> Option<TableObject> {
        let txn = self.inner.doc.transact();
        match self.inner.objects.get(&txn, id) {
            Some(yrs::Value::YMap(m)) => encode::read_object_fields(&txn, id, &m).ok(),
            _ => None,
        }
    }

    pub fn get_all_objects(&self) -> Vec<TableObject> {
        let txn = self.inner.doc.transact();
        self.inner
            .objects
            .iter(&txn)
            .filter_map(|(id, value)| match value {
                yrs::Value::YMap(m) => encode::read_object_fields(&txn, id, &m).ok(),
                _ => None,
            })
            .collect()
    }

    /// Raw `(id, kind, present-keys)` scan, used by the migrator to find
    /// objects missing required properties without failing the whole read
    /// the way `get_all_objects`/`read_object_fields` would on an
    /// incomplete object.
    pub(crate) fn get_all_objects_raw(&self) -> Vec<(ObjectId, crate::model::ObjectKind, HashSet<String>)> {
        let txn = self.inner.doc.transact();
        self.inner
            .objects
            .iter(&txn)
            .filter_map(|(id, value)| {
                let yrs::Value::YMap(m) = value else { return None };
                let kind = match m.get(&txn, "_kind") {
                    Some(yrs::Value::Any(yrs::Any::String(s))) => {
                        crate::model::ObjectKind::from_str_lossy(&s)?
                    }
                    _ => return None,
                };
                let keys: HashSet<String> = m.keys(&txn).map(|k| k.to_string()).collect();
                Some((id.to_string(), kind, keys))
            })
            .collect()
    }

    pub(crate) fn objects_map(&self) -> &MapRef {
        &self.inner.objects
    }

    /// Removes every object in one transaction. The caller should run this
    /// inside `transact` with an origin tag so observers can distinguish a
    /// deliberate clear from an individual removal.
    pub fn clear_all_objects(&self, txn: &mut TransactionMut) {
        let ids: Vec<String> = self.inner.objects.keys(txn).map(|k| k.to_string()).collect();
        for id in ids {
            self.inner.objects.remove(txn, &id);
        }
    }

    pub fn remove_object(&self, txn: &mut TransactionMut, id: &str) -> Option<TableObject> {
        // Must read through the transaction the caller already holds: opening
        // a fresh `self.get_object` read transaction here would try to
        // borrow the `Doc` a second time while `txn` is still live and yrs
        // panics on overlapping transactions (see `get_object_in`'s doc
        // comment for the same constraint).
        let existing = self.get_object_in(txn, id);
        self.inner.objects.remove(txn, id);
        existing
    }

    /// Subscribe to coalesced per-transaction change reports.
    pub fn on_objects_change<F>(&self, handler: F) -> Unsubscribe
    where
        F: Fn(&ChangeReport) + Send + Sync + 'static,
    {
        let mut next_id = self.inner.next_handler_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        self.inner.handlers.lock().unwrap().push((id, Box::new(handler)));
        Unsubscribe { id, handlers: self.inner.clone() }
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn dispatch(&self, txn: &TransactionMut, events: &yrs::types::Events) {
        let before = self.pending_before.lock().unwrap().clone().unwrap_or_default();
        let mut touched: HashSet<ObjectId> = HashSet::new();

        for event in events.iter() {
            let path = event.path();
            match path.first() {
                // A nested per-object map changed one of its fields: the
                // first path segment is that object's id.
                Some(yrs::types::PathSegment::Key(k)) => {
                    touched.insert(k.to_string());
                }
                // The event fired directly on the root "objects" map: an
                // object was inserted or removed wholesale. The changed
                // keys of that event ARE the affected ids.
                None => {
                    if let yrs::types::Event::Map(map_event) = event {
                        for key in map_event.keys(txn).keys() {
                            touched.insert(key.to_string());
                        }
                    }
                }
            }
        }

        if touched.is_empty() {
            return;
        }

        let mut report = ChangeReport { origin: txn.origin().map(|o| String::from_utf8_lossy(o.as_ref()).into_owned()), ..Default::default() };
        for id in touched {
            let current = match self.objects.get(txn, &id) {
                Some(yrs::Value::YMap(m)) => encode::read_object_fields(txn, &id, &m).ok(),
                _ => None,
            };
            match (before.contains(&id), current) {
                (false, Some(obj)) => {
                    report.snapshots.insert(id.clone(), obj);
                    report.added.push(id);
                }
                (true, Some(obj)) => {
                    report.snapshots.insert(id.clone(), obj);
                    report.updated.push(id);
                }
                (true, None) => report.removed.push(id),
                (false, None) => {}
            }
        }

        if report.is_empty() {
            return;
        }

        for (_, handler) in self.handlers.lock().unwrap().iter() {
            handler(&report);
        }
    }
}
