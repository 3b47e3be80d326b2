// Re-exports from diagram-mod-history and conversion helpers.
// Bridges the generic history engine with diagram change records and config.
pub use diagram_mod_history::{
    Change, ChangeSink, Direction, HistoryConfig, Transaction, UndoManager,
};

use diagram_config::DiagramConfig;

use crate::change::ChangeRecord;

/// The history manager specialized for model changes.
pub type ModelUndoManager = UndoManager<ChangeRecord>;

/// A committed (or open) batch of model changes.
pub type ModelTransaction = Transaction<ChangeRecord>;

/// Extracts the history settings from a model configuration.
pub fn history_config(config: &DiagramConfig) -> HistoryConfig {
    HistoryConfig {
        max_history_length: config.max_history_length,
        enabled: config.undo_enabled,
    }
}
