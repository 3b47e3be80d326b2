//! An editing session: one model wired to one shared history manager.

use std::rc::Rc;

use diagram_config::DiagramConfig;

use crate::history::{history_config, ModelUndoManager, UndoManager};
use crate::model::Model;

/// Owns a model and holds the manager that records its edits.
///
/// The manager is shared: other models may be attached to the same
/// manager so their edits land in one history.
pub struct Session {
    model: Model,
    manager: Rc<ModelUndoManager>,
}

impl Session {
    /// Attaches `model` to `manager`.
    pub fn new(mut model: Model, manager: Rc<ModelUndoManager>) -> Self {
        model.set_undo_manager(Some(Rc::clone(&manager)));
        Self { model, manager }
    }

    /// Builds a fresh model and manager from one configuration.
    pub fn from_config(config: &DiagramConfig) -> Self {
        let manager = UndoManager::shared(history_config(config));
        Self::new(Model::from_config(config), manager)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn manager(&self) -> &Rc<ModelUndoManager> {
        &self.manager
    }

    pub fn undo(&self) -> bool {
        self.manager.undo()
    }

    pub fn redo(&self) -> bool {
        self.manager.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.manager.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.manager.can_redo()
    }

    /// Detaches the model from the manager and hands it back.
    pub fn into_model(mut self) -> Model {
        self.model.set_undo_manager(None);
        self.model
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::from_config(&DiagramConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::obj;
    use diagram_config::ModelClass;
    use serde_json::json;

    #[test]
    fn test_from_config_wires_manager() {
        let config = DiagramConfig {
            class: ModelClass::Model,
            max_history_length: 4,
            ..DiagramConfig::default()
        };
        let session = Session::from_config(&config);
        assert_eq!(session.model().class(), ModelClass::Model);
        assert_eq!(session.manager().max_history_length(), 4);
        assert_eq!(session.manager().sink_count(), 1);
        assert!(session.model().undo_manager().is_some());
    }

    #[test]
    fn test_undo_redo_through_session() {
        let mut session = Session::default();
        assert!(!session.can_undo());
        session.model_mut().add_node(obj(json!({"id": "A"})));
        assert!(session.can_undo());

        assert!(session.undo());
        assert_eq!(session.model().node_count(), 0);
        assert!(session.can_redo());
        assert!(session.redo());
        assert_eq!(session.model().node_count(), 1);
    }

    #[test]
    fn test_disabled_undo_from_config() {
        let config = DiagramConfig {
            undo_enabled: false,
            ..DiagramConfig::default()
        };
        let mut session = Session::from_config(&config);
        session.model_mut().add_node(obj(json!({"id": "A"})));
        assert_eq!(session.model().node_count(), 1);
        assert!(!session.can_undo());
        assert!(!session.undo());
    }

    #[test]
    fn test_two_models_share_one_history() {
        let mut first = Session::default();
        let mut second = Model::new(ModelClass::GraphLinksModel);
        second.set_undo_manager(Some(Rc::clone(first.manager())));

        let manager = Rc::clone(first.manager());
        manager.start_transaction("both");
        first.model_mut().add_node(obj(json!({"id": "A"})));
        second.add_node(obj(json!({"id": "B"})));
        manager.commit_transaction(Some("both"));

        assert_eq!(manager.history_len(), 1);
        assert!(first.undo());
        assert_eq!(first.model().node_count(), 0);
        assert_eq!(second.node_count(), 0);
    }

    #[test]
    fn test_into_model_detaches() {
        let session = Session::default();
        let manager = Rc::clone(session.manager());
        let mut model = session.into_model();
        assert_eq!(manager.sink_count(), 0);
        model.add_node(obj(json!({"id": "A"})));
        assert_eq!(manager.history_len(), 0);
    }
}
