//! The contract between recorded changes and the history engine.
use std::hash::Hash;

/// Which way a recorded change is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Revert the change (old values, inverse structural effect).
    Undo,
    /// Re-apply the change (new values, original structural effect).
    Redo,
}

impl Direction {
    /// Whether this is the undo direction.
    pub fn is_undo(self) -> bool {
        matches!(self, Direction::Undo)
    }
}

/// A single atomic mutation that can replay itself against its target.
///
/// Implementors own everything needed to apply themselves in either
/// direction, so a `Transaction` can replay them without knowing what
/// kind of document they belong to. `Clone` must produce an independent
/// snapshot: a cloned change stored in history is never affected by later
/// edits at the call site that produced it.
pub trait Change: Clone {
    /// Identifies the (target, field) pair a property-style change writes.
    type CoalesceKey: Eq + Hash;

    /// Whether the change can be reverted.
    fn can_undo(&self) -> bool;

    /// Whether the change can be re-applied.
    fn can_redo(&self) -> bool;

    /// Performs the change's effect directly on its target.
    ///
    /// Must not feed a new change back into the history manager.
    fn apply(&self, direction: Direction);

    /// Key under which consecutive writes may be merged, or `None` if the
    /// change must never be merged.
    fn coalesce_key(&self) -> Option<Self::CoalesceKey>;

    /// Whether the change alters the shape of the target (insertions and
    /// removals). Structural changes are merge barriers.
    fn is_structural(&self) -> bool;

    /// Folds a later change with the same coalesce key into this one,
    /// keeping this change's old value and taking the later new value.
    fn absorb(&mut self, later: &Self);

    /// Whether this is an informational "transaction finished" marker.
    fn is_transaction_boundary(&self) -> bool;

    /// Builds the marker delivered to governed targets after a commit.
    fn transaction_finished(name: &str) -> Self;

    /// Short label for tracing output.
    fn label(&self) -> &'static str;
}

/// Receives change notifications from the history manager.
///
/// The manager holds sinks weakly; a sink that has been dropped is
/// skipped silently.
pub trait ChangeSink<C> {
    /// Called with every notification addressed to this sink.
    fn notify(&self, change: &C);
}


#[cfg(test)]
mod tests {
    use super::testing::{ToyChange, ToyEdit, ToyRef};
    use super::*;

    #[test]
    fn test_direction_is_undo() {
        assert!(Direction::Undo.is_undo());
        assert!(!Direction::Redo.is_undo());
    }

    #[test]
    fn test_clone_is_independent_snapshot() {
        let doc = ToyRef::default();
        let mut change = ToyChange::set(&doc, 0, 5);
        let stored = change.clone();
        change.edit = ToyEdit::Set {
            slot: 0,
            old: 0,
            new: 99,
        };
        assert_eq!(
            stored.edit,
            ToyEdit::Set {
                slot: 0,
                old: 0,
                new: 5
            }
        );
    }

    #[test]
    fn test_apply_both_directions() {
        let doc = ToyRef::default();
        let change = ToyChange::set(&doc, 2, 7);
        change.apply(Direction::Undo);
        assert_eq!(doc.borrow().slots[2], 0);
        change.apply(Direction::Redo);
        assert_eq!(doc.borrow().slots[2], 7);
    }
}
