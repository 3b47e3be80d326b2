//! The record store: nodes, links and the change plumbing around them.
//!
//! A `Model` owns its records and turns every mutation into a
//! `ChangeRecord`. Changes are forwarded to the attached history manager
//! (when one is attached and forwarding is not suppressed) and to every
//! registered listener. Link operations live in the `links` submodule and
//! serialization in the `io` submodule.

mod io;
mod links;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use diagram_config::{DiagramConfig, ModelClass};
use serde_json::Value;

use crate::accessor::{Accessor, AccessorField, Accessors};
use crate::change::{ChangeKind, ChangeRecord};
use crate::history::{ChangeSink, ModelUndoManager};
use crate::record::{Key, ObjectData, RecordId, RecordKind};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by `Model::add_changed_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&ChangeRecord)>;

#[derive(Debug)]
struct Entry {
    id: RecordId,
    data: ObjectData,
}

#[derive(Debug, Default)]
struct Records {
    nodes: Vec<Entry>,
    links: Vec<Entry>,
    next_id: u64,
}

impl Records {
    fn collection(&self, kind: RecordKind) -> &Vec<Entry> {
        match kind {
            RecordKind::Node => &self.nodes,
            RecordKind::Link => &self.links,
        }
    }

    fn collection_mut(&mut self, kind: RecordKind) -> &mut Vec<Entry> {
        match kind {
            RecordKind::Node => &mut self.nodes,
            RecordKind::Link => &mut self.links,
        }
    }

    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }

    fn position(&self, kind: RecordKind, id: RecordId) -> Option<usize> {
        self.collection(kind).iter().position(|e| e.id == id)
    }

    fn kind_of(&self, id: RecordId) -> Option<RecordKind> {
        [RecordKind::Node, RecordKind::Link]
            .into_iter()
            .find(|&kind| self.position(kind, id).is_some())
    }

    fn get(&self, kind: RecordKind, id: RecordId) -> Option<&ObjectData> {
        self.collection(kind)
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.data)
    }

    fn get_mut(&mut self, kind: RecordKind, id: RecordId) -> Option<&mut ObjectData> {
        self.collection_mut(kind)
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| &mut e.data)
    }

    /// Inserts at `index`, clamped to the collection length. Returns the
    /// index actually used, or `None` if the handle is already present.
    fn insert_at(
        &mut self,
        kind: RecordKind,
        index: usize,
        id: RecordId,
        data: ObjectData,
    ) -> Option<usize> {
        if self.position(kind, id).is_some() {
            return None;
        }
        self.next_id = self.next_id.max(id.0);
        let collection = self.collection_mut(kind);
        let index = index.min(collection.len());
        collection.insert(index, Entry { id, data });
        Some(index)
    }

    fn remove(&mut self, kind: RecordKind, id: RecordId) -> Option<(usize, ObjectData)> {
        let index = self.position(kind, id)?;
        let entry = self.collection_mut(kind).remove(index);
        Some((index, entry.data))
    }

    fn find_by_key(&self, kind: RecordKind, accessor: &Accessor, key: &Key) -> Option<RecordId> {
        self.collection(kind)
            .iter()
            .find(|e| {
                accessor
                    .get(&e.data)
                    .and_then(|v| Key::from_value(&v))
                    .is_some_and(|k| &k == key)
            })
            .map(|e| e.id)
    }
}

/// The part of a model reachable from change records and the history
/// manager: its records and its observers.
pub(crate) struct ModelShared {
    id: u64,
    records: RefCell<Records>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
    renderer: RefCell<Option<Weak<dyn ChangeSink<ChangeRecord>>>>,
}

impl ModelShared {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            records: RefCell::new(Records::default()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            renderer: RefCell::new(None),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Performs a change's effect on the collections without raising
    /// anything.
    pub(crate) fn apply_change(&self, change: &ChangeRecord) {
        let (Some(kind), Some(collection), Some(id)) =
            (change.kind(), change.collection(), change.record())
        else {
            return;
        };
        let mut records = self.records.borrow_mut();
        match kind {
            ChangeKind::Insert => {
                let Some(snapshot) = change.snapshot() else {
                    return;
                };
                let index = change.new_param().unwrap_or(usize::MAX);
                if records
                    .insert_at(collection, index, id, snapshot.clone())
                    .is_none()
                {
                    tracing::warn!(record = %id, "replayed insert of a record already present");
                }
            }
            ChangeKind::Remove => {
                records.remove(collection, id);
            }
            ChangeKind::Property => {
                let (Some(accessor), Some(data)) =
                    (change.property(), records.get_mut(collection, id))
                else {
                    return;
                };
                accessor.set(data, change.new_value().cloned());
            }
            ChangeKind::Transaction => {}
        }
    }

    /// Delivers a change to every listener, then to the bound renderer.
    pub(crate) fn notify_observers(&self, change: &ChangeRecord) {
        // Snapshot first: a listener may add or remove listeners.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }
        let renderer = self.renderer.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(renderer) = renderer {
            renderer.notify(change);
        }
    }
}

impl ChangeSink<ChangeRecord> for ModelShared {
    fn notify(&self, change: &ChangeRecord) {
        self.notify_observers(change);
    }
}

/// A diagram document: ordered node records and, for graph-links models,
/// ordered link records.
pub struct Model {
    shared: Rc<ModelShared>,
    class: ModelClass,
    accessors: Accessors,
    archetype_node_data: Option<ObjectData>,
    read_only: bool,
    skips_undo_manager: bool,
    model_data: ObjectData,
    undo_manager: Option<Rc<ModelUndoManager>>,
    node_key_prefix: String,
    link_key_prefix: String,
}

impl Model {
    /// Creates an empty model of `class` with default settings.
    pub fn new(class: ModelClass) -> Self {
        Self::from_config(&DiagramConfig {
            class,
            ..DiagramConfig::default()
        })
    }

    /// Creates an empty model configured by `config`. No history manager
    /// is attached; see `Session` for the wired-up form.
    pub fn from_config(config: &DiagramConfig) -> Self {
        Self {
            shared: Rc::new(ModelShared::new()),
            class: config.class,
            accessors: Accessors::from_config(config),
            archetype_node_data: config.archetype_node_data.clone(),
            read_only: config.is_read_only,
            skips_undo_manager: config.skips_undo_manager,
            model_data: ObjectData::new(),
            undo_manager: None,
            node_key_prefix: config.node_key_prefix.clone(),
            link_key_prefix: config.link_key_prefix.clone(),
        }
    }

    /// Process-unique id of this model.
    pub fn id(&self) -> u64 {
        self.shared.id()
    }

    pub fn class(&self) -> ModelClass {
        self.class
    }

    // --- Settings ---

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// While read-only, every mutation is silently ignored.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn skips_undo_manager(&self) -> bool {
        self.skips_undo_manager
    }

    /// Stops (or resumes) forwarding changes to the history manager.
    /// Listeners keep receiving them.
    pub fn set_skips_undo_manager(&mut self, skips: bool) {
        self.skips_undo_manager = skips;
    }

    pub fn accessor(&self, field: AccessorField) -> &Accessor {
        self.accessors.get(field)
    }

    pub fn set_accessor(&mut self, field: AccessorField, accessor: Accessor) {
        self.accessors.set(field, accessor);
    }

    pub fn archetype_node_data(&self) -> Option<&ObjectData> {
        self.archetype_node_data.as_ref()
    }

    /// Template cloned by `add_link` for endpoints that don't exist.
    pub fn set_archetype_node_data(&mut self, archetype: Option<ObjectData>) {
        self.archetype_node_data = archetype;
    }

    /// Prefixes used when generating keys for nodes and links.
    pub fn set_key_prefixes(&mut self, node: impl Into<String>, link: impl Into<String>) {
        self.node_key_prefix = node.into();
        self.link_key_prefix = link.into();
    }

    pub fn model_data(&self) -> &ObjectData {
        &self.model_data
    }

    /// Replaces the document-level custom data. Not recorded in history.
    pub fn set_model_data(&mut self, data: ObjectData) {
        if !self.read_only {
            self.model_data = data;
        }
    }

    // --- History wiring ---

    pub fn undo_manager(&self) -> Option<&Rc<ModelUndoManager>> {
        self.undo_manager.as_ref()
    }

    /// Attaches this model to `manager` (or detaches it with `None`).
    ///
    /// The manager only keeps a weak reference back to the model.
    pub fn set_undo_manager(&mut self, manager: Option<Rc<ModelUndoManager>>) {
        let sink = self.as_sink();
        if let Some(old) = self.undo_manager.take() {
            old.remove_sink(&sink);
        }
        if let Some(manager) = &manager {
            manager.add_sink(sink);
        }
        self.undo_manager = manager;
    }

    fn as_sink(&self) -> Weak<dyn ChangeSink<ChangeRecord>> {
        let shared: Rc<dyn ChangeSink<ChangeRecord>> = self.shared.clone();
        Rc::downgrade(&shared)
    }

    /// Opens a transaction on the attached manager. `false` without one.
    pub fn start_transaction(&self, name: &str) -> bool {
        self.undo_manager
            .as_ref()
            .is_some_and(|m| m.start_transaction(name))
    }

    pub fn commit_transaction(&self, name: Option<&str>) -> bool {
        self.undo_manager
            .as_ref()
            .is_some_and(|m| m.commit_transaction(name))
    }

    pub fn rollback_transaction(&self) -> bool {
        self.undo_manager
            .as_ref()
            .is_some_and(|m| m.rollback_transaction())
    }

    /// Runs `edit` inside one start/commit pair named `name`.
    fn in_transaction<R>(&mut self, name: &str, edit: impl FnOnce(&mut Self) -> R) -> R {
        self.start_transaction(name);
        let result = edit(self);
        self.commit_transaction(Some(name));
        result
    }

    // --- Observers ---

    /// Registers a callback receiving every change, including replayed
    /// ones and transaction-finished markers.
    pub fn add_changed_listener(&self, listener: impl Fn(&ChangeRecord) + 'static) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.get());
        self.shared.next_listener.set(id.0 + 1);
        let listener: Listener = Rc::new(listener);
        self.shared.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn remove_changed_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    /// Associates a renderer that is notified alongside listeners. The
    /// model never keeps it alive.
    pub fn bind_renderer(&self, renderer: Weak<dyn ChangeSink<ChangeRecord>>) {
        *self.shared.renderer.borrow_mut() = Some(renderer);
    }

    pub fn unbind_renderer(&self) {
        *self.shared.renderer.borrow_mut() = None;
    }

    fn raise_changed(&self, change: ChangeRecord) {
        tracing::trace!(model = self.id(), change = %change, "change raised");
        if let Some(manager) = &self.undo_manager {
            if !self.skips_undo_manager && !manager.is_undoing_redoing() {
                manager.handle_changed(&change);
            }
        }
        self.shared.notify_observers(&change);
    }

    // --- Queries ---

    pub fn node_count(&self) -> usize {
        self.shared.records.borrow().nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.shared.records.borrow().links.len()
    }

    /// Handles of all nodes, in collection order.
    pub fn node_ids(&self) -> Vec<RecordId> {
        self.ids(RecordKind::Node)
    }

    pub fn link_ids(&self) -> Vec<RecordId> {
        self.ids(RecordKind::Link)
    }

    fn ids(&self, kind: RecordKind) -> Vec<RecordId> {
        self.shared
            .records
            .borrow()
            .collection(kind)
            .iter()
            .map(|e| e.id)
            .collect()
    }

    /// Copies of every node record, in collection order.
    pub fn node_data_array(&self) -> Vec<ObjectData> {
        self.data_array(RecordKind::Node)
    }

    pub fn link_data_array(&self) -> Vec<ObjectData> {
        self.data_array(RecordKind::Link)
    }

    fn data_array(&self, kind: RecordKind) -> Vec<ObjectData> {
        self.shared
            .records
            .borrow()
            .collection(kind)
            .iter()
            .map(|e| e.data.clone())
            .collect()
    }

    pub fn node_data(&self, id: RecordId) -> Option<ObjectData> {
        self.data(RecordKind::Node, id)
    }

    pub fn link_data(&self, id: RecordId) -> Option<ObjectData> {
        self.data(RecordKind::Link, id)
    }

    fn data(&self, kind: RecordKind, id: RecordId) -> Option<ObjectData> {
        self.shared.records.borrow().get(kind, id).cloned()
    }

    /// Whether `id` is a node or link of this model.
    pub fn kind_of(&self, id: RecordId) -> Option<RecordKind> {
        self.shared.records.borrow().kind_of(id)
    }

    /// First node whose key equals `key`.
    pub fn find_node_for_key(&self, key: &Key) -> Option<RecordId> {
        self.find_for_key(RecordKind::Node, key)
    }

    pub fn find_node_data_for_key(&self, key: &Key) -> Option<ObjectData> {
        self.find_node_for_key(key).and_then(|id| self.node_data(id))
    }

    pub fn contains_node_key(&self, key: &Key) -> bool {
        self.find_node_for_key(key).is_some()
    }

    fn find_for_key(&self, kind: RecordKind, key: &Key) -> Option<RecordId> {
        let accessor = self.accessors.key(kind);
        self.shared.records.borrow().find_by_key(kind, accessor, key)
    }

    /// Reads a property of any record by name.
    pub fn property(&self, id: RecordId, name: &str) -> Option<Value> {
        let records = self.shared.records.borrow();
        let kind = records.kind_of(id)?;
        records.get(kind, id)?.get(name).cloned()
    }

    /// Reads a configured field of a record of the field's kind.
    pub fn field(&self, id: RecordId, field: AccessorField) -> Option<Value> {
        let records = self.shared.records.borrow();
        records
            .get(field.kind(), id)
            .and_then(|data| self.accessors.get(field).get(data))
    }

    fn field_key(&self, id: RecordId, field: AccessorField) -> Option<Key> {
        self.field(id, field).and_then(|v| Key::from_value(&v))
    }

    fn field_string(&self, id: RecordId, field: AccessorField) -> Option<String> {
        self.field(id, field)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    // --- Node insertion and removal ---

    /// Appends a node, generating a key if it has none.
    ///
    /// Returns the new record's handle, or `None` when read-only.
    pub fn add_node(&mut self, data: ObjectData) -> Option<RecordId> {
        if self.read_only {
            return None;
        }
        Some(self.in_transaction("Add Node", |m| m.insert_record(RecordKind::Node, data)))
    }

    /// Removes a node. Links attached to it are left in place.
    pub fn remove_node(&mut self, id: RecordId) -> Option<ObjectData> {
        if self.read_only {
            return None;
        }
        self.in_transaction("Remove Node", |m| m.remove_record(RecordKind::Node, id))
    }

    fn insert_record(&mut self, kind: RecordKind, mut data: ObjectData) -> RecordId {
        self.ensure_key(kind, &mut data);
        let (id, index) = {
            let mut records = self.shared.records.borrow_mut();
            let id = records.allocate_id();
            let index = records.collection(kind).len();
            records.collection_mut(kind).push(Entry {
                id,
                data: data.clone(),
            });
            (id, index)
        };
        tracing::debug!(model = self.id(), record = %id, ?kind, index, "record inserted");
        self.raise_changed(ChangeRecord::insert(&self.shared, kind, id, index, data));
        id
    }

    fn remove_record(&mut self, kind: RecordKind, id: RecordId) -> Option<ObjectData> {
        let (index, data) = self.shared.records.borrow_mut().remove(kind, id)?;
        tracing::debug!(model = self.id(), record = %id, ?kind, index, "record removed");
        self.raise_changed(ChangeRecord::remove(
            &self.shared,
            kind,
            id,
            index,
            data.clone(),
        ));
        Some(data)
    }

    fn ensure_key(&self, kind: RecordKind, data: &mut ObjectData) {
        let accessor = self.accessors.key(kind);
        // Missing, null and "" get a generated key. Anything else is kept.
        match accessor.get(data) {
            None => {}
            Some(Value::String(s)) if s.is_empty() => {}
            Some(_) => return,
        }
        let prefix = match kind {
            RecordKind::Node => &self.node_key_prefix,
            RecordKind::Link => &self.link_key_prefix,
        };
        let key = format!("{prefix}_{}", uuid::Uuid::new_v4());
        tracing::trace!(key = %key, ?kind, "generated record key");
        accessor.set(data, Some(Value::String(key)));
    }

    // --- Property writes ---

    /// Writes a named property of any record.
    ///
    /// Does nothing (and returns `false`) when read-only, when the record
    /// is unknown, or when the value is unchanged.
    pub fn set_property(&mut self, id: RecordId, name: &str, value: Value) -> bool {
        let Some(kind) = self.kind_of(id) else {
            return false;
        };
        self.write(kind, id, Accessor::fixed(name), name, value, "Set Property")
    }

    /// Writes a configured field of a record of the field's kind.
    pub fn set_field(&mut self, id: RecordId, field: AccessorField, value: Value) -> bool {
        let accessor = self.accessors.get(field).clone();
        self.write(
            field.kind(),
            id,
            accessor,
            field.model_change(),
            value,
            field.transaction_name(),
        )
    }

    fn write(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        accessor: Accessor,
        model_change: &str,
        value: Value,
        transaction: &str,
    ) -> bool {
        if self.read_only {
            return false;
        }
        let old = {
            let records = self.shared.records.borrow();
            let Some(data) = records.get(kind, id) else {
                return false;
            };
            // Raw read: a stored `null` differs from an absent property.
            match &accessor {
                Accessor::Fixed(name) => data.get(name).cloned(),
                Accessor::Computed { .. } => accessor.get(data),
            }
        };
        if old.as_ref() == Some(&value) {
            return false;
        }

        self.in_transaction(transaction, |m| {
            if let Some(data) = m.shared.records.borrow_mut().get_mut(kind, id) {
                accessor.set(data, Some(value.clone()));
            }
            m.raise_changed(ChangeRecord::property_set(
                &m.shared,
                kind,
                id,
                model_change,
                accessor,
                old,
                Some(value),
            ));
        });
        true
    }

    // --- Node fields ---

    pub fn node_key(&self, id: RecordId) -> Option<Key> {
        self.field_key(id, AccessorField::NodeKey)
    }

    /// Rekeys a node. Links referring to the old key are not updated.
    pub fn set_node_key(&mut self, id: RecordId, key: Key) -> bool {
        self.set_field(id, AccessorField::NodeKey, key.to_value())
    }

    pub fn node_category(&self, id: RecordId) -> Option<String> {
        self.field_string(id, AccessorField::NodeCategory)
    }

    pub fn set_node_category(&mut self, id: RecordId, category: &str) -> bool {
        self.set_field(id, AccessorField::NodeCategory, Value::from(category))
    }

    /// Key of the group node containing this node.
    pub fn node_group_key(&self, id: RecordId) -> Option<Key> {
        self.field_key(id, AccessorField::NodeGroupKey)
    }

    pub fn set_node_group_key(&mut self, id: RecordId, group: Key) -> bool {
        self.set_field(id, AccessorField::NodeGroupKey, group.to_value())
    }

    pub fn node_is_group(&self, id: RecordId) -> bool {
        self.field(id, AccessorField::NodeIsGroup)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_node_is_group(&mut self, id: RecordId, is_group: bool) -> bool {
        self.set_field(id, AccessorField::NodeIsGroup, Value::Bool(is_group))
    }

    // --- Whole-model operations ---

    /// Removes every record inside one "Clear Model" transaction: links
    /// first, then nodes, each in collection order.
    pub fn clear(&mut self) {
        if self.read_only {
            return;
        }
        self.in_transaction("Clear Model", |m| {
            for kind in [RecordKind::Link, RecordKind::Node] {
                while let Some(id) = m.first_id(kind) {
                    m.remove_record(kind, id);
                }
            }
        });
    }

    fn first_id(&self, kind: RecordKind) -> Option<RecordId> {
        self.shared
            .records
            .borrow()
            .collection(kind)
            .first()
            .map(|e| e.id)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id())
            .field("class", &self.class)
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("read_only", &self.read_only)
            .field("has_undo_manager", &self.undo_manager.is_some())
            .finish()
    }
}
