//! Pluggable resolution of well-known record fields.
//!
//! Keys, categories, link endpoints and grouping are read and written
//! through an `Accessor`: either a fixed property name or a pair of
//! callbacks computing the value from the whole record.

use std::fmt;
use std::rc::Rc;

use diagram_config::DiagramConfig;
use serde_json::Value;

use crate::record::{ObjectData, RecordKind};

type Getter = Rc<dyn Fn(&ObjectData) -> Option<Value>>;
type Setter = Rc<dyn Fn(&mut ObjectData, Option<Value>)>;

/// How a field is located inside a record.
#[derive(Clone)]
pub enum Accessor {
    /// The value lives in the named property.
    Fixed(String),
    /// The value is derived by `get` and stored by `set`. `set` receives
    /// `None` when the field must become absent.
    Computed { get: Getter, set: Setter },
}

impl Accessor {
    pub fn fixed(name: impl Into<String>) -> Self {
        Accessor::Fixed(name.into())
    }

    pub fn computed(
        get: impl Fn(&ObjectData) -> Option<Value> + 'static,
        set: impl Fn(&mut ObjectData, Option<Value>) + 'static,
    ) -> Self {
        Accessor::Computed {
            get: Rc::new(get),
            set: Rc::new(set),
        }
    }

    /// The property name of a fixed accessor.
    pub fn name(&self) -> Option<&str> {
        match self {
            Accessor::Fixed(name) => Some(name),
            Accessor::Computed { .. } => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Accessor::Fixed(_))
    }

    /// Reads the field. `null` counts as absent.
    pub fn get(&self, data: &ObjectData) -> Option<Value> {
        let value = match self {
            Accessor::Fixed(name) => data.get(name).cloned(),
            Accessor::Computed { get, .. } => get(data),
        };
        value.filter(|v| !v.is_null())
    }

    /// Writes the field, removing a fixed property when `value` is `None`.
    pub fn set(&self, data: &mut ObjectData, value: Option<Value>) {
        match self {
            Accessor::Fixed(name) => match value {
                Some(value) => {
                    data.insert(name.clone(), value);
                }
                None => {
                    data.remove(name);
                }
            },
            Accessor::Computed { set, .. } => set(data, value),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            Accessor::Computed { .. } => f.write_str("Computed"),
        }
    }
}

/// The configurable fields of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorField {
    NodeKey,
    NodeCategory,
    NodeGroupKey,
    NodeIsGroup,
    LinkKey,
    LinkCategory,
    LinkFromKey,
    LinkToKey,
    LinkFromPortId,
    LinkToPortId,
}

impl AccessorField {
    pub const ALL: [AccessorField; 10] = [
        AccessorField::NodeKey,
        AccessorField::NodeCategory,
        AccessorField::NodeGroupKey,
        AccessorField::NodeIsGroup,
        AccessorField::LinkKey,
        AccessorField::LinkCategory,
        AccessorField::LinkFromKey,
        AccessorField::LinkToKey,
        AccessorField::LinkFromPortId,
        AccessorField::LinkToPortId,
    ];

    /// The collection whose records carry this field.
    pub fn kind(self) -> RecordKind {
        match self {
            AccessorField::NodeKey
            | AccessorField::NodeCategory
            | AccessorField::NodeGroupKey
            | AccessorField::NodeIsGroup => RecordKind::Node,
            _ => RecordKind::Link,
        }
    }

    /// Tag stored in `ChangeRecord::model_change` for writes to this field.
    pub fn model_change(self) -> &'static str {
        match self {
            AccessorField::NodeKey => "nodeKey",
            AccessorField::NodeCategory => "nodeCategory",
            AccessorField::NodeGroupKey => "nodeGroupKey",
            AccessorField::NodeIsGroup => "nodeIsGroup",
            AccessorField::LinkKey => "linkKey",
            AccessorField::LinkCategory => "linkCategory",
            AccessorField::LinkFromKey => "linkFromKey",
            AccessorField::LinkToKey => "linkToKey",
            AccessorField::LinkFromPortId => "linkFromPortId",
            AccessorField::LinkToPortId => "linkToPortId",
        }
    }

    /// Name of the transaction wrapping a write to this field.
    pub fn transaction_name(self) -> &'static str {
        match self {
            AccessorField::NodeKey => "Set Node Key",
            AccessorField::NodeCategory => "Set Node Category",
            AccessorField::NodeGroupKey => "Set Node Group",
            AccessorField::NodeIsGroup => "Set Node Is Group",
            AccessorField::LinkKey => "Set Link Key",
            AccessorField::LinkCategory => "Set Link Category",
            AccessorField::LinkFromKey => "Set Link From",
            AccessorField::LinkToKey => "Set Link To",
            AccessorField::LinkFromPortId => "Set Link From Port",
            AccessorField::LinkToPortId => "Set Link To Port",
        }
    }
}

/// One accessor per configurable field.
#[derive(Debug, Clone)]
pub(crate) struct Accessors {
    node_key: Accessor,
    node_category: Accessor,
    node_group_key: Accessor,
    node_is_group: Accessor,
    link_key: Accessor,
    link_category: Accessor,
    link_from_key: Accessor,
    link_to_key: Accessor,
    link_from_port_id: Accessor,
    link_to_port_id: Accessor,
}

impl Accessors {
    pub(crate) fn from_config(config: &DiagramConfig) -> Self {
        Self {
            node_key: Accessor::fixed(&config.node_key_property),
            node_category: Accessor::fixed(&config.node_category_property),
            node_group_key: Accessor::fixed(&config.node_group_key_property),
            node_is_group: Accessor::fixed(&config.node_is_group_property),
            link_key: Accessor::fixed(&config.link_key_property),
            link_category: Accessor::fixed(&config.link_category_property),
            link_from_key: Accessor::fixed(&config.link_from_key_property),
            link_to_key: Accessor::fixed(&config.link_to_key_property),
            link_from_port_id: Accessor::fixed(&config.link_from_port_id_property),
            link_to_port_id: Accessor::fixed(&config.link_to_port_id_property),
        }
    }

    pub(crate) fn get(&self, field: AccessorField) -> &Accessor {
        match field {
            AccessorField::NodeKey => &self.node_key,
            AccessorField::NodeCategory => &self.node_category,
            AccessorField::NodeGroupKey => &self.node_group_key,
            AccessorField::NodeIsGroup => &self.node_is_group,
            AccessorField::LinkKey => &self.link_key,
            AccessorField::LinkCategory => &self.link_category,
            AccessorField::LinkFromKey => &self.link_from_key,
            AccessorField::LinkToKey => &self.link_to_key,
            AccessorField::LinkFromPortId => &self.link_from_port_id,
            AccessorField::LinkToPortId => &self.link_to_port_id,
        }
    }

    pub(crate) fn set(&mut self, field: AccessorField, accessor: Accessor) {
        let slot = match field {
            AccessorField::NodeKey => &mut self.node_key,
            AccessorField::NodeCategory => &mut self.node_category,
            AccessorField::NodeGroupKey => &mut self.node_group_key,
            AccessorField::NodeIsGroup => &mut self.node_is_group,
            AccessorField::LinkKey => &mut self.link_key,
            AccessorField::LinkCategory => &mut self.link_category,
            AccessorField::LinkFromKey => &mut self.link_from_key,
            AccessorField::LinkToKey => &mut self.link_to_key,
            AccessorField::LinkFromPortId => &mut self.link_from_port_id,
            AccessorField::LinkToPortId => &mut self.link_to_port_id,
        };
        *slot = accessor;
    }

    /// The key accessor for records of `kind`.
    pub(crate) fn key(&self, kind: RecordKind) -> &Accessor {
        match kind {
            RecordKind::Node => &self.node_key,
            RecordKind::Link => &self.link_key,
        }
    }
}
