//! Link records: insertion with endpoint synthesis, removal and link fields.

use serde_json::Value;

use super::Model;
use crate::accessor::AccessorField;
use crate::record::{Key, ObjectData, RecordId, RecordKind};

impl Model {
    /// Appends a link, generating a key if it has none.
    ///
    /// With an archetype configured, a missing from-node and then a missing
    /// to-node are created from the archetype before the link is appended.
    /// Returns `None` when read-only or when this model has no links.
    pub fn add_link(&mut self, data: ObjectData) -> Option<RecordId> {
        if self.read_only {
            return None;
        }
        if !self.class.has_links() {
            tracing::debug!(model = self.id(), class = %self.class, "add_link ignored");
            return None;
        }
        Some(self.in_transaction("Add Link", |m| {
            for field in [AccessorField::LinkFromKey, AccessorField::LinkToKey] {
                let endpoint = m
                    .accessors
                    .get(field)
                    .get(&data)
                    .and_then(|v| Key::from_value(&v));
                if let Some(key) = endpoint {
                    m.ensure_endpoint(&key);
                }
            }
            m.insert_record(RecordKind::Link, data)
        }))
    }

    /// Removes a link. Its endpoint nodes are left in place.
    pub fn remove_link(&mut self, id: RecordId) -> Option<ObjectData> {
        if self.read_only {
            return None;
        }
        if !self.class.has_links() {
            tracing::debug!(model = self.id(), class = %self.class, "remove_link ignored");
            return None;
        }
        self.in_transaction("Remove Link", |m| m.remove_record(RecordKind::Link, id))
    }

    fn ensure_endpoint(&mut self, key: &Key) {
        if self.contains_node_key(key) {
            return;
        }
        let Some(mut node) = self.archetype_node_data.clone() else {
            return;
        };
        self.accessors
            .key(RecordKind::Node)
            .set(&mut node, Some(key.to_value()));
        tracing::debug!(model = self.id(), key = %key, "synthesized link endpoint from archetype");
        self.add_node(node);
    }

    // --- Lookups ---

    /// First link whose key equals `key`.
    pub fn find_link_for_key(&self, key: &Key) -> Option<RecordId> {
        self.find_for_key(RecordKind::Link, key)
    }

    pub fn find_link_data_for_key(&self, key: &Key) -> Option<ObjectData> {
        self.find_link_for_key(key).and_then(|id| self.link_data(id))
    }

    /// Links whose from-key or to-key equals `key`, in collection order.
    pub fn links_for_node_key(&self, key: &Key) -> Vec<RecordId> {
        self.link_ids()
            .into_iter()
            .filter(|&id| {
                self.link_from_key(id).as_ref() == Some(key)
                    || self.link_to_key(id).as_ref() == Some(key)
            })
            .collect()
    }

    // --- Link fields ---

    pub fn link_key(&self, id: RecordId) -> Option<Key> {
        self.field_key(id, AccessorField::LinkKey)
    }

    pub fn set_link_key(&mut self, id: RecordId, key: Key) -> bool {
        self.set_link_field(id, AccessorField::LinkKey, key.to_value())
    }

    pub fn link_category(&self, id: RecordId) -> Option<String> {
        self.field_string(id, AccessorField::LinkCategory)
    }

    pub fn set_link_category(&mut self, id: RecordId, category: &str) -> bool {
        self.set_link_field(id, AccessorField::LinkCategory, Value::from(category))
    }

    pub fn link_from_key(&self, id: RecordId) -> Option<Key> {
        self.field_key(id, AccessorField::LinkFromKey)
    }

    /// Reconnects the link's source. No endpoint node is synthesized.
    pub fn set_link_from_key(&mut self, id: RecordId, key: Key) -> bool {
        self.set_link_field(id, AccessorField::LinkFromKey, key.to_value())
    }

    pub fn link_to_key(&self, id: RecordId) -> Option<Key> {
        self.field_key(id, AccessorField::LinkToKey)
    }

    pub fn set_link_to_key(&mut self, id: RecordId, key: Key) -> bool {
        self.set_link_field(id, AccessorField::LinkToKey, key.to_value())
    }

    pub fn link_from_port_id(&self, id: RecordId) -> Option<String> {
        self.field_string(id, AccessorField::LinkFromPortId)
    }

    pub fn set_link_from_port_id(&mut self, id: RecordId, port: &str) -> bool {
        self.set_link_field(id, AccessorField::LinkFromPortId, Value::from(port))
    }

    pub fn link_to_port_id(&self, id: RecordId) -> Option<String> {
        self.field_string(id, AccessorField::LinkToPortId)
    }

    pub fn set_link_to_port_id(&mut self, id: RecordId, port: &str) -> bool {
        self.set_link_field(id, AccessorField::LinkToPortId, Value::from(port))
    }

    fn set_link_field(&mut self, id: RecordId, field: AccessorField, value: Value) -> bool {
        if !self.class.has_links() {
            tracing::debug!(model = self.id(), field = field.model_change(), "link write ignored");
            return false;
        }
        self.set_field(id, field, value)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use diagram_config::ModelClass;
    use serde_json::json;

    use super::*;
    use crate::change::ChangeKind;
    use crate::model::tests::{obj, tracked};

    fn archetyped() -> (Model, Rc<crate::history::ModelUndoManager>) {
        let (mut model, manager) = tracked(ModelClass::GraphLinksModel);
        model.set_archetype_node_data(Some(obj(json!({"text": "new node"}))));
        (model, manager)
    }

    #[test]
    fn test_add_link_synthesizes_both_endpoints() {
        let (mut model, manager) = archetyped();
        let inserts = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&inserts);
        model.add_changed_listener(move |c| {
            if c.kind() == Some(ChangeKind::Insert) {
                sink.borrow_mut().push(c.collection());
            }
        });

        let link = model.add_link(obj(json!({"from": "A", "to": "B"}))).unwrap();
        assert_eq!(model.node_count(), 2);
        assert_eq!(model.link_count(), 1);
        assert_eq!(
            *inserts.borrow(),
            vec![
                Some(RecordKind::Node),
                Some(RecordKind::Node),
                Some(RecordKind::Link)
            ]
        );
        let keys: Vec<Option<Key>> = model.node_ids().into_iter().map(|id| model.node_key(id)).collect();
        assert_eq!(keys, vec![Some(Key::from("A")), Some(Key::from("B"))]);
        let a = model.find_node_data_for_key(&Key::from("A")).unwrap();
        assert_eq!(a["text"], "new node");
        assert_eq!(model.link_from_key(link), Some(Key::from("A")));

        // One undoable unit
        assert_eq!(manager.history_len(), 1);
        assert!(manager.undo());
        assert_eq!(model.node_count(), 0);
        assert_eq!(model.link_count(), 0);
    }

    #[test]
    fn test_self_link_synthesizes_one_node() {
        let (mut model, _manager) = archetyped();
        model.add_link(obj(json!({"from": "A", "to": "A"})));
        assert_eq!(model.node_count(), 1);
        assert_eq!(model.link_count(), 1);
    }

    #[test]
    fn test_existing_endpoint_is_not_duplicated() {
        let (mut model, _manager) = archetyped();
        model.add_node(obj(json!({"id": "A"})));
        model.add_link(obj(json!({"from": "A", "to": "B"})));
        assert_eq!(model.node_count(), 2);
        assert_eq!(model.links_for_node_key(&Key::from("B")).len(), 1);
    }

    #[test]
    fn test_no_archetype_no_synthesis() {
        let (mut model, _manager) = tracked(ModelClass::GraphLinksModel);
        model.add_link(obj(json!({"from": "A", "to": "B"})));
        assert_eq!(model.node_count(), 0);
        assert_eq!(model.link_count(), 1);
    }

    #[test]
    fn test_link_without_endpoints() {
        let (mut model, _manager) = archetyped();
        let id = model.add_link(ObjectData::new()).unwrap();
        assert_eq!(model.node_count(), 0);
        match model.link_key(id) {
            Some(Key::Text(key)) => assert!(key.starts_with("link_")),
            other => panic!("expected generated key, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_model_ignores_links() {
        let (mut model, manager) = tracked(ModelClass::Model);
        assert!(model.add_link(obj(json!({"from": "A", "to": "B"}))).is_none());
        assert!(model.remove_link(RecordId(1)).is_none());
        assert_eq!(model.link_count(), 0);
        assert_eq!(manager.history_len(), 0);
    }

    #[test]
    fn test_remove_link_and_undo() {
        let (mut model, manager) = tracked(ModelClass::GraphLinksModel);
        let first = model.add_link(obj(json!({"key": "L1"}))).unwrap();
        let second = model.add_link(obj(json!({"key": "L2"}))).unwrap();
        let removed = model.remove_link(first).unwrap();
        assert_eq!(removed["key"], "L1");
        assert_eq!(model.link_ids(), vec![second]);

        assert!(manager.undo());
        assert_eq!(model.link_ids(), vec![first, second]);
        assert_eq!(model.find_link_for_key(&Key::from("L1")), Some(first));
    }

    #[test]
    fn test_link_field_setters() {
        let (mut model, manager) = tracked(ModelClass::GraphLinksModel);
        let id = model.add_link(obj(json!({"from": "A", "to": "B"}))).unwrap();

        assert!(model.set_link_from_key(id, Key::from("C")));
        assert!(model.set_link_to_key(id, Key::Number(4)));
        assert!(model.set_link_from_port_id(id, "out"));
        assert!(model.set_link_to_port_id(id, "in"));
        assert!(model.set_link_category(id, "flow"));
        assert!(model.set_link_key(id, Key::from("L")));

        assert_eq!(model.link_from_key(id), Some(Key::from("C")));
        assert_eq!(model.link_to_key(id), Some(Key::Number(4)));
        assert_eq!(model.link_from_port_id(id).as_deref(), Some("out"));
        assert_eq!(model.link_to_port_id(id).as_deref(), Some("in"));
        assert_eq!(model.link_category(id).as_deref(), Some("flow"));
        assert_eq!(model.find_link_data_for_key(&Key::from("L")).unwrap()["to"], 4);
        assert_eq!(manager.history_len(), 7);

        // Port ids were absent before: undo removes them again
        assert!(manager.undo());
        assert!(manager.undo());
        assert!(manager.undo());
        assert!(manager.undo());
        assert_eq!(model.link_from_port_id(id), None);
        assert_eq!(model.link_data(id).unwrap().get("toPort"), None);
    }

    #[test]
    fn test_link_setters_on_plain_model() {
        let mut model = Model::new(ModelClass::Model);
        let node = model.add_node(obj(json!({"id": "A"}))).unwrap();
        assert!(!model.set_link_category(node, "flow"));
        assert_eq!(model.node_category(node), None);
    }
}
