/// Undo/redo history management with nested transactions.
///
/// Provides an `UndoManager` that groups recorded changes into named,
/// nestable transactions, keeps a bounded history of committed ones and
/// replays them backward or forward on demand. The engine is generic over
/// the `Change` trait and knows nothing about the documents it edits.
pub mod change;
pub mod config;
pub mod manager;
pub mod transaction;

pub use change::{Change, ChangeSink, Direction};
pub use config::HistoryConfig;
pub use manager::UndoManager;
pub use transaction::Transaction;
