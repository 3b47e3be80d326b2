//! Ordered batches of changes that undo/redo as one step.
use std::collections::HashMap;

use crate::change::{Change, Direction};

/// A group of changes that form a single undo step.
///
/// Changes are kept in the order they were recorded. Undo replays them
/// newest first; redo replays them oldest first.
#[derive(Debug, Clone)]
pub struct Transaction<C> {
    changes: Vec<C>,
    name: String,
    is_complete: bool,
}

impl<C: Change> Transaction<C> {
    /// Creates an empty, open transaction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            changes: Vec::new(),
            name: name.into(),
            is_complete: false,
        }
    }

    /// The name given to the outermost `start_transaction` call.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the transaction was committed into history.
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub(crate) fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    /// Recorded changes, in chronological order.
    pub fn changes(&self) -> &[C] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Appends a change.
    pub fn push(&mut self, change: C) {
        self.changes.push(change);
    }

    /// Whether every change can be reverted.
    pub fn can_undo(&self) -> bool {
        self.changes.iter().all(Change::can_undo)
    }

    /// Whether every change can be re-applied.
    pub fn can_redo(&self) -> bool {
        self.changes.iter().all(Change::can_redo)
    }

    /// Drops all changes and resets the completion flag.
    pub fn clear(&mut self) {
        self.changes.clear();
        self.is_complete = false;
    }

    /// Collapses repeated writes to the same field.
    ///
    /// A change with a coalesce key is folded into the earliest change with
    /// the same key, provided no structural or keyless change was recorded
    /// in between.
    /// The surviving change keeps its own old value and takes the new value
    /// of the last write.
    pub fn optimize(&mut self) {
        let before = self.changes.len();
        let mut optimized: Vec<C> = Vec::with_capacity(before);
        let mut open: HashMap<C::CoalesceKey, usize> = HashMap::new();

        for change in self.changes.drain(..) {
            if change.is_structural() {
                open.clear();
                optimized.push(change);
                continue;
            }
            match change.coalesce_key() {
                Some(key) => match open.get(&key) {
                    Some(&index) => optimized[index].absorb(&change),
                    None => {
                        open.insert(key, optimized.len());
                        optimized.push(change);
                    }
                },
                None => {
                    open.clear();
                    optimized.push(change);
                }
            }
        }

        if optimized.len() != before {
            tracing::trace!(
                transaction = %self.name,
                before,
                after = optimized.len(),
                "compacted transaction"
            );
        }
        self.changes = optimized;
    }

    /// Reverts every change, newest first.
    ///
    /// Returns `false` without touching anything if any change refuses.
    pub fn undo(&self) -> bool {
        if !self.can_undo() {
            return false;
        }
        for (index, change) in self.changes.iter().enumerate().rev() {
            replay(change, index, Direction::Undo);
        }
        true
    }

    /// Re-applies every change, oldest first.
    ///
    /// Returns `false` without touching anything if any change refuses.
    pub fn redo(&self) -> bool {
        if !self.can_redo() {
            return false;
        }
        for (index, change) in self.changes.iter().enumerate() {
            replay(change, index, Direction::Redo);
        }
        true
    }
}

fn replay<C: Change>(change: &C, index: usize, direction: Direction) {
    let span = tracing::trace_span!("change", index, kind = change.label(), ?direction);
    span.in_scope(|| change.apply(direction));
}
