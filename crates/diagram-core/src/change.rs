//! Change records: one atomic model mutation that can replay itself.

use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::accessor::Accessor;
use crate::history::{Change, Direction};
use crate::model::ModelShared;
use crate::record::{ObjectData, RecordId, RecordKind};

/// Tag of transaction-finished notifications.
pub const COMMITTED_TRANSACTION: &str = "CommittedTransaction";

/// What a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A record entered a collection.
    Insert,
    /// A record left a collection.
    Remove,
    /// A property of a record was written.
    Property,
    /// A transaction just finished. Informational only.
    Transaction,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "Insert",
            ChangeKind::Remove => "Remove",
            ChangeKind::Property => "Property",
            ChangeKind::Transaction => "Transaction",
        }
    }
}

/// One atomic mutation of a model.
///
/// Insert and Remove changes carry a full snapshot of the record and its
/// collection index, so they can rebuild or drop it on replay. Property
/// changes carry the accessor that was written and the values on either
/// side, `None` meaning the property was absent. Cloning produces an
/// independent copy suitable for storing in history.
#[derive(Clone, Default)]
pub struct ChangeRecord {
    kind: Option<ChangeKind>,
    model_change: String,
    record: Option<RecordId>,
    collection: Option<RecordKind>,
    property: Option<Accessor>,
    old_value: Option<Value>,
    new_value: Option<Value>,
    old_param: Option<usize>,
    new_param: Option<usize>,
    store: u64,
    model: Weak<ModelShared>,
}

impl ChangeRecord {
    pub(crate) fn insert(
        model: &Rc<ModelShared>,
        collection: RecordKind,
        record: RecordId,
        index: usize,
        snapshot: ObjectData,
    ) -> Self {
        Self {
            kind: Some(ChangeKind::Insert),
            model_change: collection.collection_name().to_string(),
            record: Some(record),
            collection: Some(collection),
            new_value: Some(Value::Object(snapshot)),
            new_param: Some(index),
            ..Self::for_model(model)
        }
    }

    pub(crate) fn remove(
        model: &Rc<ModelShared>,
        collection: RecordKind,
        record: RecordId,
        index: usize,
        snapshot: ObjectData,
    ) -> Self {
        Self {
            kind: Some(ChangeKind::Remove),
            model_change: collection.collection_name().to_string(),
            record: Some(record),
            collection: Some(collection),
            old_value: Some(Value::Object(snapshot)),
            old_param: Some(index),
            ..Self::for_model(model)
        }
    }

    pub(crate) fn property_set(
        model: &Rc<ModelShared>,
        collection: RecordKind,
        record: RecordId,
        model_change: &str,
        property: Accessor,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            kind: Some(ChangeKind::Property),
            model_change: model_change.to_string(),
            record: Some(record),
            collection: Some(collection),
            property: Some(property),
            old_value,
            new_value,
            ..Self::for_model(model)
        }
    }

    fn for_model(model: &Rc<ModelShared>) -> Self {
        Self {
            store: model.id(),
            model: Rc::downgrade(model),
            ..Self::default()
        }
    }

    // --- Accessors ---

    /// `None` after `clear()`.
    pub fn kind(&self) -> Option<ChangeKind> {
        self.kind
    }

    /// Logical field touched: a collection name, a field tag such as
    /// `nodeKey`, or a property name.
    pub fn model_change(&self) -> &str {
        &self.model_change
    }

    pub fn record(&self) -> Option<RecordId> {
        self.record
    }

    pub fn collection(&self) -> Option<RecordKind> {
        self.collection
    }

    pub fn property(&self) -> Option<&Accessor> {
        self.property.as_ref()
    }

    pub fn old_value(&self) -> Option<&Value> {
        self.old_value.as_ref()
    }

    pub fn new_value(&self) -> Option<&Value> {
        self.new_value.as_ref()
    }

    pub fn old_param(&self) -> Option<usize> {
        self.old_param
    }

    pub fn new_param(&self) -> Option<usize> {
        self.new_param
    }

    /// The value in effect after replaying toward `direction`.
    pub fn value(&self, direction: Direction) -> Option<&Value> {
        match direction {
            Direction::Undo => self.old_value.as_ref(),
            Direction::Redo => self.new_value.as_ref(),
        }
    }

    /// The collection index in effect after replaying toward `direction`.
    pub fn param(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Undo => self.old_param,
            Direction::Redo => self.new_param,
        }
    }

    /// Id of the model this change belongs to.
    pub fn store(&self) -> u64 {
        self.store
    }

    pub fn is_transaction_finished(&self) -> bool {
        self.kind == Some(ChangeKind::Transaction)
    }

    /// Name of the finished transaction for boundary changes.
    pub fn transaction_name(&self) -> Option<&str> {
        if !self.is_transaction_finished() {
            return None;
        }
        self.old_value.as_ref().and_then(Value::as_str)
    }

    /// The change that undoes this one: Insert and Remove swap, old and
    /// new sides swap.
    pub fn inverted(&self) -> Self {
        let mut inverse = self.clone();
        inverse.kind = match self.kind {
            Some(ChangeKind::Insert) => Some(ChangeKind::Remove),
            Some(ChangeKind::Remove) => Some(ChangeKind::Insert),
            other => other,
        };
        std::mem::swap(&mut inverse.old_value, &mut inverse.new_value);
        std::mem::swap(&mut inverse.old_param, &mut inverse.new_param);
        inverse
    }

    /// Resets every field. A cleared change can be neither undone nor redone.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The record snapshot carried by an Insert (new side) or Remove (old side).
    pub(crate) fn snapshot(&self) -> Option<&ObjectData> {
        let value = match self.kind? {
            ChangeKind::Insert => self.new_value.as_ref(),
            ChangeKind::Remove => self.old_value.as_ref(),
            _ => None,
        };
        value.and_then(Value::as_object)
    }
}

impl Change for ChangeRecord {
    type CoalesceKey = (u64, RecordId, String);

    fn can_undo(&self) -> bool {
        self.kind.is_some()
    }

    fn can_redo(&self) -> bool {
        self.kind.is_some()
    }

    fn apply(&self, direction: Direction) {
        let Some(model) = self.model.upgrade() else {
            tracing::trace!(change = %self, "model dropped, change not replayed");
            return;
        };
        let effective = match direction {
            Direction::Undo => self.inverted(),
            Direction::Redo => self.clone(),
        };
        model.apply_change(&effective);
        model.notify_observers(&effective);
    }

    fn coalesce_key(&self) -> Option<Self::CoalesceKey> {
        if self.kind != Some(ChangeKind::Property) {
            return None;
        }
        let name = self.property.as_ref()?.name()?;
        Some((self.store, self.record?, name.to_string()))
    }

    fn is_structural(&self) -> bool {
        matches!(self.kind, Some(ChangeKind::Insert | ChangeKind::Remove))
    }

    fn absorb(&mut self, later: &Self) {
        self.new_value.clone_from(&later.new_value);
        self.new_param = later.new_param;
    }

    fn is_transaction_boundary(&self) -> bool {
        self.is_transaction_finished()
    }

    fn transaction_finished(name: &str) -> Self {
        Self {
            kind: Some(ChangeKind::Transaction),
            model_change: COMMITTED_TRANSACTION.to_string(),
            old_value: Some(Value::from(name)),
            ..Self::default()
        }
    }

    fn label(&self) -> &'static str {
        self.kind.map_or("none", ChangeKind::as_str)
    }
}

impl fmt::Debug for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRecord")
            .field("kind", &self.kind)
            .field("model_change", &self.model_change)
            .field("record", &self.record)
            .field("collection", &self.collection)
            .field("property", &self.property)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .field("old_param", &self.old_param)
            .field("new_param", &self.new_param)
            .field("store", &self.store)
            .finish()
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label(), self.model_change)?;
        if let Some(record) = self.record {
            write!(f, " {record}")?;
        }
        match self.kind {
            Some(ChangeKind::Property) => {
                let show = |v: &Option<Value>| v.as_ref().map_or("-".to_string(), Value::to_string);
                write!(f, ": {} -> {}", show(&self.old_value), show(&self.new_value))
            }
            Some(ChangeKind::Transaction) => {
                write!(f, " {}", self.transaction_name().unwrap_or_default())
            }
            _ => Ok(()),
        }
    }
}
