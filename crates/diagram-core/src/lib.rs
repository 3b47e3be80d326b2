//! Transactional diagram document model.
//!
//! A `Model` stores node and link records as schema-free JSON objects,
//! turns every mutation into a `ChangeRecord` and feeds those into a shared
//! `UndoManager` so edits can be grouped, nested, undone and redone.

pub mod accessor;
pub mod change;
pub mod history;
pub mod model;
pub mod record;
pub mod session;

pub use accessor::{Accessor, AccessorField};
pub use change::{ChangeKind, ChangeRecord};
pub use history::{history_config, ModelTransaction, ModelUndoManager};
pub use model::{ListenerId, Model};
pub use record::{Key, ObjectData, RecordId, RecordKind};
pub use session::Session;
