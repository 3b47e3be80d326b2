//! Core undo/redo manager with nested transactions.
//!
//! Changes are recorded only while a transaction is open. Nested
//! `start_transaction` calls share the outermost transaction, which is
//! compacted and pushed onto a bounded history when the outermost level
//! commits. Undo and redo replay a committed transaction directly against
//! its targets; the re-entrancy flag keeps targets from feeding the
//! replayed effects back in as new changes.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::change::{Change, ChangeSink};
use crate::config::HistoryConfig;
use crate::transaction::Transaction;

/// Mutable bookkeeping, kept behind one `RefCell` so that borrows are
/// short and never held across replay or notification.
struct HistoryState<C> {
    /// Committed transactions, oldest first.
    history: VecDeque<Transaction<C>>,
    /// Number of transactions currently applied (cursor + 1).
    applied: usize,
    /// The open outermost transaction, if any.
    current: Option<Transaction<C>>,
    /// Nesting depth of `start_transaction` calls.
    level: usize,
    /// Names passed to `start_transaction`, innermost last.
    names: Vec<String>,
}

impl<C> Default for HistoryState<C> {
    fn default() -> Self {
        Self {
            history: VecDeque::new(),
            applied: 0,
            current: None,
            level: 0,
            names: Vec::new(),
        }
    }
}

/// Manages undo/redo history for one editing session.
///
/// The manager is shared (`Rc`) by every target it governs and uses
/// interior mutability, so all methods take `&self`. Governed targets are
/// held weakly; whoever wires the session together owns their lifetime.
pub struct UndoManager<C: Change + 'static> {
    state: RefCell<HistoryState<C>>,
    sinks: RefCell<Vec<Weak<dyn ChangeSink<C>>>>,
    enabled: Cell<bool>,
    undoing_redoing: Cell<bool>,
    max_history_length: Cell<usize>,
}

impl<C: Change + 'static> std::fmt::Debug for UndoManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.try_borrow();
        let mut dbg = f.debug_struct("UndoManager");
        if let Ok(state) = state {
            dbg.field("history_len", &state.history.len())
                .field("applied", &state.applied)
                .field("level", &state.level);
        }
        dbg.field("enabled", &self.enabled.get())
            .field("undoing_redoing", &self.undoing_redoing.get())
            .field("max_history_length", &self.max_history_length.get())
            .finish()
    }
}

impl<C: Change + 'static> Default for UndoManager<C> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

/// Clears the undoing/redoing flag when replay ends, even by unwinding.
struct ReplayGuard<'a>(&'a Cell<bool>);

impl<'a> ReplayGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<C: Change + 'static> UndoManager<C> {
    /// Creates an empty manager.
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            state: RefCell::new(HistoryState::default()),
            sinks: RefCell::new(Vec::new()),
            enabled: Cell::new(config.enabled),
            undoing_redoing: Cell::new(false),
            max_history_length: Cell::new(config.max_history_length),
        }
    }

    /// Creates an empty manager ready to be shared between targets.
    pub fn shared(config: HistoryConfig) -> Rc<Self> {
        Rc::new(Self::new(config))
    }

    /// Current settings.
    pub fn config(&self) -> HistoryConfig {
        HistoryConfig {
            max_history_length: self.max_history_length.get(),
            enabled: self.enabled.get(),
        }
    }

    // --- Governed targets ---

    /// Registers a target to receive transaction-finished notifications.
    ///
    /// Returns `false` if the target was already registered.
    pub fn add_sink(&self, sink: Weak<dyn ChangeSink<C>>) -> bool {
        let mut sinks = self.sinks.borrow_mut();
        sinks.retain(|s| s.strong_count() > 0);
        if sinks.iter().any(|s| same_sink(s, &sink)) {
            return false;
        }
        sinks.push(sink);
        true
    }

    /// Unregisters a target. Returns `false` if it was not registered.
    pub fn remove_sink(&self, sink: &Weak<dyn ChangeSink<C>>) -> bool {
        let mut sinks = self.sinks.borrow_mut();
        let before = sinks.len();
        sinks.retain(|s| !same_sink(s, sink));
        sinks.len() != before
    }

    /// Number of registered targets that are still alive.
    pub fn sink_count(&self) -> usize {
        self.sinks
            .borrow()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    fn notify_sinks(&self, change: &C) {
        // Snapshot first: a sink may register or drop targets while notified.
        let live: Vec<Rc<dyn ChangeSink<C>>> =
            self.sinks.borrow().iter().filter_map(Weak::upgrade).collect();
        for sink in live {
            sink.notify(change);
        }
    }

    // --- Flags and queries ---

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Turns recording and replay on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn max_history_length(&self) -> usize {
        self.max_history_length.get()
    }

    /// Changes the history bound, evicting the oldest entries if needed.
    pub fn set_max_history_length(&self, max: usize) {
        self.max_history_length.set(max);
        let mut state = self.state.borrow_mut();
        evict_overflow(&mut state, max);
    }

    /// Whether a transaction is open at any nesting level.
    pub fn is_in_transaction(&self) -> bool {
        self.state.borrow().level > 0
    }

    /// Whether an undo or redo replay is in progress.
    pub fn is_undoing_redoing(&self) -> bool {
        self.undoing_redoing.get()
    }

    /// Current nesting depth.
    pub fn transaction_level(&self) -> usize {
        self.state.borrow().level
    }

    /// Names of the open transactions, outermost first.
    pub fn nested_transaction_names(&self) -> Vec<String> {
        self.state.borrow().names.clone()
    }

    /// Number of changes recorded so far in the open transaction.
    pub fn current_transaction_len(&self) -> Option<usize> {
        self.state.borrow().current.as_ref().map(Transaction::len)
    }

    /// Number of committed transactions held.
    pub fn history_len(&self) -> usize {
        self.state.borrow().history.len()
    }

    /// Index of the last applied transaction, `None` when nothing is applied.
    pub fn history_index(&self) -> Option<usize> {
        self.state.borrow().applied.checked_sub(1)
    }

    /// Names of the committed transactions, oldest first.
    pub fn history_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .history
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    /// A copy of the transaction at `index` in history.
    pub fn transaction_at(&self, index: usize) -> Option<Transaction<C>> {
        self.state.borrow().history.get(index).cloned()
    }

    /// The transaction the next `undo` would revert.
    pub fn transaction_to_undo(&self) -> Option<Transaction<C>> {
        let state = self.state.borrow();
        let index = state.applied.checked_sub(1)?;
        state.history.get(index).cloned()
    }

    /// The transaction the next `redo` would re-apply.
    pub fn transaction_to_redo(&self) -> Option<Transaction<C>> {
        let state = self.state.borrow();
        state.history.get(state.applied).cloned()
    }

    /// Whether `undo` would do anything right now.
    pub fn can_undo(&self) -> bool {
        if !self.enabled.get() || self.undoing_redoing.get() {
            return false;
        }
        let state = self.state.borrow();
        state.level == 0 && state.applied > 0
    }

    /// Whether `redo` would do anything right now.
    pub fn can_redo(&self) -> bool {
        if !self.enabled.get() || self.undoing_redoing.get() {
            return false;
        }
        let state = self.state.borrow();
        state.level == 0 && state.applied < state.history.len()
    }

    // --- Transactions ---

    /// Opens a transaction level.
    ///
    /// Returns `true` only when this call opened the outermost level and
    /// created a new transaction; nested calls share it.
    pub fn start_transaction(&self, name: &str) -> bool {
        if !self.enabled.get() {
            return false;
        }
        let mut state = self.state.borrow_mut();
        state.level += 1;
        state.names.push(name.to_string());
        if state.level == 1 {
            tracing::debug!(transaction = name, "transaction started");
            state.current = Some(Transaction::new(name));
            return true;
        }
        false
    }

    /// Closes a transaction level.
    ///
    /// A `name` that differs from the innermost open name is logged and
    /// otherwise ignored. When the outermost level closes, a non-empty
    /// transaction is compacted and appended to history, and every
    /// governed target is told the transaction finished. Returns `true`
    /// when the outermost level closed.
    pub fn commit_transaction(&self, name: Option<&str>) -> bool {
        if !self.enabled.get() {
            return false;
        }

        let finished = {
            let mut state = self.state.borrow_mut();
            if state.level == 0 {
                return false;
            }
            let expected = state.names.pop().unwrap_or_default();
            if let Some(name) = name {
                if name != expected {
                    tracing::warn!(
                        expected = %expected,
                        got = name,
                        "transaction name mismatch on commit"
                    );
                }
            }
            state.level -= 1;
            if state.level > 0 {
                return false;
            }

            let Some(mut tx) = state.current.take() else {
                return true;
            };
            if tx.is_empty() {
                tracing::debug!(transaction = %tx.name(), "discarded empty transaction");
                return true;
            }

            tx.mark_complete();
            tx.optimize();
            let finished = tx.name().to_string();
            let changes = tx.len();

            // A new edit invalidates everything that could have been redone.
            let applied = state.applied;
            state.history.truncate(applied);
            state.history.push_back(tx);
            state.applied += 1;
            evict_overflow(&mut state, self.max_history_length.get());

            tracing::debug!(
                transaction = %finished,
                changes,
                history_len = state.history.len(),
                "transaction committed"
            );
            finished
        };

        self.notify_sinks(&C::transaction_finished(&finished));
        true
    }

    /// Abandons a transaction level.
    ///
    /// When the outermost level closes, everything recorded in the open
    /// transaction is reverted and the transaction is dropped without
    /// entering history. Returns `true` when the outermost level closed.
    pub fn rollback_transaction(&self) -> bool {
        if !self.enabled.get() {
            return false;
        }

        let abandoned = {
            let mut state = self.state.borrow_mut();
            if state.level == 0 {
                return false;
            }
            state.names.pop();
            state.level -= 1;
            if state.level > 0 {
                return false;
            }
            state.current.take()
        };

        if let Some(tx) = abandoned {
            let span = tracing::debug_span!("rollback", transaction = %tx.name(), changes = tx.len());
            let _enter = span.enter();
            tx.undo();
        }
        true
    }

    // --- Undo / redo ---

    /// Reverts the last applied transaction.
    ///
    /// Refused while a transaction is open, while another replay is in
    /// progress, or while disabled.
    pub fn undo(&self) -> bool {
        if !self.can_undo() {
            return false;
        }
        let Some(tx) = self.transaction_to_undo() else {
            return false;
        };

        let done = {
            let _guard = ReplayGuard::enter(&self.undoing_redoing);
            let span = tracing::debug_span!("undo", transaction = %tx.name(), changes = tx.len());
            let _enter = span.enter();
            tx.undo()
        };
        if done {
            let mut state = self.state.borrow_mut();
            state.applied = state.applied.saturating_sub(1);
        }
        done
    }

    /// Re-applies the next undone transaction.
    ///
    /// Refused under the same conditions as `undo`.
    pub fn redo(&self) -> bool {
        if !self.can_redo() {
            return false;
        }
        let Some(tx) = self.transaction_to_redo() else {
            return false;
        };

        let done = {
            let _guard = ReplayGuard::enter(&self.undoing_redoing);
            let span = tracing::debug_span!("redo", transaction = %tx.name(), changes = tx.len());
            let _enter = span.enter();
            tx.redo()
        };
        if done {
            self.state.borrow_mut().applied += 1;
        }
        done
    }

    /// Drops all history and any open transaction.
    pub fn clear(&self) {
        *self.state.borrow_mut() = HistoryState::default();
    }

    // --- Recording ---

    /// Records a change into the open transaction.
    ///
    /// Ignored when disabled, when no transaction is open, or when the
    /// change is one this manager skips.
    pub fn handle_changed(&self, change: &C) {
        if !self.enabled.get() || self.skips_change(change) {
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.level == 0 {
            return;
        }
        if let Some(tx) = state.current.as_mut() {
            tracing::trace!(transaction = %tx.name(), kind = change.label(), "recorded change");
            tx.push(change.clone());
        }
    }

    /// Whether a change is never recorded: transaction-finished markers and
    /// changes that can be neither undone nor redone.
    pub fn skips_change(&self, change: &C) -> bool {
        change.is_transaction_boundary() || !(change.can_undo() || change.can_redo())
    }
}

fn evict_overflow<C: Change>(state: &mut HistoryState<C>, max: usize) {
    while state.history.len() > max {
        if let Some(evicted) = state.history.pop_front() {
            tracing::debug!(transaction = %evicted.name(), "evicted oldest transaction");
        }
        state.applied = state.applied.saturating_sub(1);
    }
}

fn same_sink<C>(a: &Weak<dyn ChangeSink<C>>, b: &Weak<dyn ChangeSink<C>>) -> bool {
    std::ptr::eq(a.as_ptr() as *const (), b.as_ptr() as *const ())
}
