// Integration tests for the history system.
//
// These tests drive the UndoManager through its public API with a small
// list-editing change type, simulating realistic editing sessions that
// span several targets.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use diagram_mod_history::{
    Change, ChangeSink, Direction, HistoryConfig, Transaction, UndoManager,
};

#[derive(Debug, Default)]
struct ListDoc {
    items: RefCell<Vec<String>>,
    seen: RefCell<Vec<String>>,
    manager: RefCell<Option<Weak<UndoManager<ListChange>>>>,
    undo_attempts: RefCell<Vec<bool>>,
}

#[derive(Debug, Clone)]
enum ListEdit {
    Append(String),
    Rename { index: usize, old: String, new: String },
    Finished(String),
}

#[derive(Debug, Clone)]
struct ListChange {
    doc: Weak<ListDoc>,
    edit: ListEdit,
}

impl Change for ListChange {
    type CoalesceKey = (usize, usize);

    fn can_undo(&self) -> bool {
        true
    }

    fn can_redo(&self) -> bool {
        true
    }

    fn apply(&self, direction: Direction) {
        let Some(doc) = self.doc.upgrade() else {
            return;
        };
        {
            let mut items = doc.items.borrow_mut();
            match (&self.edit, direction) {
                (ListEdit::Append(_), Direction::Undo) => {
                    items.pop();
                }
                (ListEdit::Append(item), Direction::Redo) => items.push(item.clone()),
                (ListEdit::Rename { index, old, .. }, Direction::Undo) => {
                    items[*index] = old.clone()
                }
                (ListEdit::Rename { index, new, .. }, Direction::Redo) => {
                    items[*index] = new.clone()
                }
                (ListEdit::Finished(_), _) => {}
            }
        }
        // A replay-time observer trying to start another undo must be refused.
        let manager = doc.manager.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(manager) = manager {
            doc.undo_attempts.borrow_mut().push(manager.undo());
        }
    }

    fn coalesce_key(&self) -> Option<(usize, usize)> {
        match &self.edit {
            ListEdit::Rename { index, .. } => Some((self.doc.as_ptr() as usize, *index)),
            _ => None,
        }
    }

    fn is_structural(&self) -> bool {
        matches!(self.edit, ListEdit::Append(_))
    }

    fn absorb(&mut self, later: &Self) {
        if let (ListEdit::Rename { new, .. }, ListEdit::Rename { new: later_new, .. }) =
            (&mut self.edit, &later.edit)
        {
            new.clone_from(later_new);
        }
    }

    fn is_transaction_boundary(&self) -> bool {
        matches!(self.edit, ListEdit::Finished(_))
    }

    fn transaction_finished(name: &str) -> Self {
        Self {
            doc: Weak::new(),
            edit: ListEdit::Finished(name.to_string()),
        }
    }

    fn label(&self) -> &'static str {
        match self.edit {
            ListEdit::Append(_) => "append",
            ListEdit::Rename { .. } => "rename",
            ListEdit::Finished(_) => "finished",
        }
    }
}

impl ChangeSink<ListChange> for ListDoc {
    fn notify(&self, change: &ListChange) {
        if let ListEdit::Finished(name) = &change.edit {
            self.seen.borrow_mut().push(name.clone());
        }
    }
}

struct Session {
    manager: Rc<UndoManager<ListChange>>,
    docs: Vec<Rc<ListDoc>>,
}

fn session(doc_count: usize, config: HistoryConfig) -> Session {
    let manager = UndoManager::shared(config);
    let docs: Vec<Rc<ListDoc>> = (0..doc_count).map(|_| Rc::new(ListDoc::default())).collect();
    for doc in &docs {
        let sink: Rc<dyn ChangeSink<ListChange>> = doc.clone();
        manager.add_sink(Rc::downgrade(&sink));
    }
    Session { manager, docs }
}

fn append(s: &Session, doc: usize, item: &str) {
    let target = &s.docs[doc];
    target.items.borrow_mut().push(item.to_string());
    s.manager.handle_changed(&ListChange {
        doc: Rc::downgrade(target),
        edit: ListEdit::Append(item.to_string()),
    });
}

fn rename(s: &Session, doc: usize, index: usize, new: &str) {
    let target = &s.docs[doc];
    let old = std::mem::replace(&mut target.items.borrow_mut()[index], new.to_string());
    s.manager.handle_changed(&ListChange {
        doc: Rc::downgrade(target),
        edit: ListEdit::Rename {
            index,
            old,
            new: new.to_string(),
        },
    });
}

fn items(s: &Session, doc: usize) -> Vec<String> {
    s.docs[doc].items.borrow().clone()
}

// ── Full Workflow ──────────────────────────────────────────────────────

#[test]
fn test_full_workflow_across_two_targets() {
    let s = session(2, HistoryConfig::default());

    s.manager.start_transaction("seed");
    append(&s, 0, "a");
    append(&s, 1, "x");
    s.manager.commit_transaction(Some("seed"));

    s.manager.start_transaction("rename");
    rename(&s, 0, 0, "b");
    rename(&s, 0, 0, "c");
    rename(&s, 1, 0, "y");
    s.manager.commit_transaction(Some("rename"));

    assert_eq!(items(&s, 0), vec!["c"]);
    assert_eq!(items(&s, 1), vec!["y"]);
    assert_eq!(s.manager.transaction_at(1).map(|t| t.len()), Some(2));

    assert!(s.manager.undo());
    assert_eq!(items(&s, 0), vec!["a"]);
    assert_eq!(items(&s, 1), vec!["x"]);

    assert!(s.manager.undo());
    assert!(items(&s, 0).is_empty());
    assert!(items(&s, 1).is_empty());

    assert!(s.manager.redo());
    assert!(s.manager.redo());
    assert_eq!(items(&s, 0), vec!["c"]);
    assert_eq!(items(&s, 1), vec!["y"]);
}

#[test]
fn test_every_target_hears_each_commit_once() {
    let s = session(3, HistoryConfig::default());
    for name in ["one", "two"] {
        s.manager.start_transaction(name);
        append(&s, 0, name);
        s.manager.commit_transaction(Some(name));
    }
    for doc in &s.docs {
        assert_eq!(*doc.seen.borrow(), vec!["one".to_string(), "two".to_string()]);
    }
}

// ── Re-entrancy ────────────────────────────────────────────────────────

#[test]
fn test_undo_during_replay_is_refused() {
    let s = session(1, HistoryConfig::default());
    *s.docs[0].manager.borrow_mut() = Some(Rc::downgrade(&s.manager));

    s.manager.start_transaction("t1");
    append(&s, 0, "a");
    s.manager.commit_transaction(Some("t1"));
    s.manager.start_transaction("t2");
    append(&s, 0, "b");
    s.manager.commit_transaction(Some("t2"));

    assert!(s.manager.undo());
    assert_eq!(*s.docs[0].undo_attempts.borrow(), vec![false]);
    assert_eq!(items(&s, 0), vec!["a"]);
    assert_eq!(s.manager.history_index(), Some(0));
    assert!(!s.manager.is_undoing_redoing());
}

// ── Bounded History ────────────────────────────────────────────────────

#[test]
fn test_eviction_then_full_undo() {
    let s = session(1, HistoryConfig::with_max_history_length(5));
    for i in 0..8 {
        let name = format!("t{i}");
        s.manager.start_transaction(&name);
        append(&s, 0, &name);
        s.manager.commit_transaction(Some(&name));
    }
    assert_eq!(s.manager.history_len(), 5);
    assert_eq!(s.manager.history_names().first().map(String::as_str), Some("t3"));

    while s.manager.undo() {}
    assert_eq!(items(&s, 0), vec!["t0", "t1", "t2"]);
    assert_eq!(s.manager.history_index(), None);
}

#[test]
fn test_zero_length_history_keeps_nothing() {
    let s = session(1, HistoryConfig::with_max_history_length(0));
    s.manager.start_transaction("t");
    append(&s, 0, "a");
    assert!(s.manager.commit_transaction(Some("t")));
    assert_eq!(s.manager.history_len(), 0);
    assert!(!s.manager.can_undo());
    assert_eq!(*s.docs[0].seen.borrow(), vec!["t".to_string()]);
}

// ── Standalone Transactions ────────────────────────────────────────────

#[test]
fn test_transaction_replay_without_manager() {
    let s = session(1, HistoryConfig::default());
    let mut tx = Transaction::new("manual");
    let target = &s.docs[0];
    for item in ["a", "b"] {
        target.items.borrow_mut().push(item.to_string());
        tx.push(ListChange {
            doc: Rc::downgrade(target),
            edit: ListEdit::Append(item.to_string()),
        });
    }
    assert!(tx.undo());
    assert!(items(&s, 0).is_empty());
    assert!(tx.redo());
    assert_eq!(items(&s, 0), vec!["a", "b"]);
}
