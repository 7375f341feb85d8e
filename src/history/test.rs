use std::cell::Cell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::*;
use crate::config::HistoryLimits;
use crate::document::{Document, ElementPath};
use crate::error::HistoryError;

#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
struct DocError(&'static str);

/// Minimal document: a number plus a set of named elements
#[derive(Debug, Clone, PartialEq, Default)]
struct Doc {
    x: i64,
    elements: Vec<String>,
    reject: bool,
    copy_budget: Option<Rc<Cell<usize>>>,
}

impl Doc {
    fn with_x(x: i64) -> Self {
        Self { x, ..Self::default() }
    }
}

impl Document for Doc {
    type Error = DocError;

    fn deep_copy(&self) -> Result<Self, DocError> {
        if let Some(budget) = &self.copy_budget {
            if budget.get() == 0 {
                return Err(DocError("out of copies"));
            }
            budget.set(budget.get() - 1);
        }
        Ok(self.clone())
    }

    fn reconcile(&mut self) -> Result<(), DocError> {
        if self.reject {
            return Err(DocError("rejected"));
        }
        self.elements.sort();
        self.elements.dedup();
        Ok(())
    }

    fn contains_element(&self, path: &ElementPath) -> bool {
        self.elements.iter().any(|e| e == path.as_str())
    }
}

fn history(limits: HistoryLimits) -> History<Doc> {
    History::new(Doc::with_x(0), "init", limits).unwrap()
}

fn set_x_and_commit(h: &mut History<Doc>, x: i64) -> CommitId {
    h.document_mut().x = x;
    h.commit(format!("set X={}", x)).unwrap()
}

fn count_undos(h: &mut History<Doc>) -> usize {
    let mut n = 0;
    while h.undo().unwrap() {
        n += 1;
    }
    n
}

fn count_redos(h: &mut History<Doc>) -> usize {
    let mut n = 0;
    while h.redo().unwrap() {
        n += 1;
    }
    n
}

// === CommitStore tests ===

/// Builds a chain root <- c1 <- ... <- c(n-1), returning ids root-first
fn chain(store: &mut CommitStore<i32>, n: usize) -> Vec<CommitId> {
    let mut ids = Vec::new();
    let mut parent = None;
    for i in 0..n {
        let commit = Commit::new(i as i32, format!("c{}", i), parent);
        parent = Some(commit.id());
        ids.push(commit.id());
        store.insert(commit);
    }
    ids
}

#[test]
fn test_store_distance() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 4);

    assert_eq!(store.distance(ids[3], ids[3]), Some(0));
    assert_eq!(store.distance(ids[3], ids[0]), Some(3));
    assert_eq!(store.distance(ids[2], ids[1]), Some(1));
    // only walks towards the root
    assert_eq!(store.distance(ids[0], ids[3]), None);
}

#[test]
fn test_store_nth_ancestor() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 4);

    assert_eq!(store.nth_ancestor(ids[3], 0).map(Commit::id), Some(ids[3]));
    assert_eq!(store.nth_ancestor(ids[3], 2).map(Commit::id), Some(ids[1]));
    assert_eq!(store.nth_ancestor(ids[3], 3).map(Commit::id), Some(ids[0]));
    assert!(store.nth_ancestor(ids[3], 4).is_none());
}

#[test]
fn test_store_is_ancestor() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 3);

    assert!(store.is_ancestor(ids[0], ids[2]));
    assert!(store.is_ancestor(ids[2], ids[2]));
    assert!(!store.is_ancestor(ids[2], ids[0]));
}

#[test]
fn test_store_erase_range_stops_before_stop() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 5);

    assert_eq!(store.erase_range(ids[4], Some(ids[2])), 2);
    assert!(!store.contains(ids[4]));
    assert!(!store.contains(ids[3]));
    assert!(store.contains(ids[2]));
    assert_eq!(store.len(), 3);
}

#[test]
fn test_store_erase_range_to_root() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 5);

    assert_eq!(store.erase_range(ids[1], None), 2);
    assert_eq!(store.len(), 3);
    assert!(store.contains(ids[2]));
}

#[test]
fn test_store_walks_stop_at_missing_parent() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 4);
    store.erase_range(ids[1], None);

    // ids[2]'s parent is gone
    assert_eq!(store.parent_of(ids[2]), Some(ids[1]));
    assert_eq!(store.distance(ids[3], ids[0]), None);
    assert!(store.nth_ancestor(ids[3], 2).is_none());
    assert_eq!(store.ancestry(ids[3]).count(), 2);
}

#[test]
fn test_store_erase_unreachable() {
    let mut store = CommitStore::new();
    let ids = chain(&mut store, 3);

    // a sibling of ids[2]
    let side = Commit::new(99, "side", Some(ids[1]));
    let side_id = side.id();
    store.insert(side);

    assert_eq!(store.erase_unreachable_from(ids[2]), 1);
    assert!(!store.contains(side_id));
    assert_eq!(store.len(), 3);
}

#[test]
fn test_commit_id_parse_and_display() {
    let id = CommitId::next();
    let shown = id.to_string();
    assert!(shown.starts_with('#'));
    assert_eq!(shown.parse::<CommitId>().unwrap(), id);
    assert_eq!(id.get().to_string().parse::<CommitId>().unwrap(), id);
    assert!("abc".parse::<CommitId>().is_err());
}

#[test]
fn test_commit_ids_are_unique() {
    let a = CommitId::next();
    let b = CommitId::next();
    assert_ne!(a, b);
    assert!(b > a);
}

// === History: construction and no-op safety ===

#[test]
fn test_new_history_has_single_root() {
    let h = history(HistoryLimits::default());

    assert_eq!(h.commits().len(), 1);
    assert_eq!(h.head(), h.branch_head());
    let root = h.latest_commit().unwrap();
    assert_eq!(root.parent(), None);
    assert_eq!(root.message(), "init");
    assert!(!h.is_dirty());
}

#[test]
fn test_undo_redo_on_fresh_history_are_noops() {
    let mut h = history(HistoryLimits::default());
    let head = h.head();
    h.document_mut().x = 42;

    assert!(!h.can_undo());
    assert!(!h.can_redo());
    assert!(!h.undo().unwrap());
    assert!(!h.redo().unwrap());

    assert_eq!(h.head(), head);
    assert_eq!(h.document().x, 42);
}

#[test]
fn test_constructor_reconciles() {
    let doc = Doc {
        elements: vec!["/b".into(), "/a".into(), "/b".into()],
        ..Doc::default()
    };
    let h = History::with_default_limits(doc, "init").unwrap();
    assert_eq!(h.document().elements, vec!["/a", "/b"]);
    assert_eq!(h.latest_commit().unwrap().document().elements, vec!["/a", "/b"]);
}

#[test]
fn test_constructor_fails_on_rejected_document() {
    let doc = Doc {
        reject: true,
        ..Doc::default()
    };
    let err = History::with_default_limits(doc, "init").unwrap_err();
    assert!(matches!(err, HistoryError::Reconciliation(_)));
}

// === Walkthroughs ===

#[test]
fn test_linear_undo() {
    let mut h = history(HistoryLimits::default());
    set_x_and_commit(&mut h, 1);
    set_x_and_commit(&mut h, 2);

    assert!(h.undo().unwrap());
    assert_eq!(h.document().x, 1);
    assert!(h.undo().unwrap());
    assert_eq!(h.document().x, 0);
    assert!(!h.undo().unwrap());
    assert_eq!(h.document().x, 0);
}

#[test]
fn test_side_branch_discards_future() {
    let mut h = history(HistoryLimits::default());
    set_x_and_commit(&mut h, 1);
    let x2 = set_x_and_commit(&mut h, 2);
    h.undo().unwrap();
    h.undo().unwrap();
    assert_eq!(h.redo_depth(), 2);

    assert!(h.redo().unwrap());
    assert_eq!(h.document().x, 1);

    set_x_and_commit(&mut h, 5);
    assert!(!h.redo().unwrap());
    assert!(!h.commits().contains(x2));
    assert_eq!(h.document().x, 5);
}

#[test]
fn test_forty_commits_keep_thirty_two_undos() {
    let mut h = history(HistoryLimits::default());
    for x in 1..=40 {
        set_x_and_commit(&mut h, x);
    }

    assert_eq!(count_undos(&mut h), 32);
    assert_eq!(h.document().x, 8);
    assert!(!h.undo().unwrap());
}

// === Properties ===

#[test]
fn test_undo_all_then_redo_all_round_trips() {
    let mut h = history(HistoryLimits::default());
    for x in 1..=10 {
        h.document_mut().elements.push(format!("/e{}", x));
        set_x_and_commit(&mut h, x * 3);
    }
    let before = h.document().clone();

    for _ in 0..10 {
        assert!(h.undo().unwrap());
    }
    assert_eq!(h.document(), &Doc::with_x(0));
    for _ in 0..10 {
        assert!(h.redo().unwrap());
    }

    assert_eq!(h.document(), &before);
    assert_eq!(h.head(), h.branch_head());
}

#[test]
fn test_undo_depth_is_bounded() {
    for k in [1, 2, 7] {
        let limits = HistoryLimits::new(4, 4);
        let mut h = history(limits);
        for x in 0..(4 + k) {
            set_x_and_commit(&mut h, x as i64 + 1);
        }
        assert_eq!(h.undo_depth(), 4);
        assert_eq!(count_undos(&mut h), 4);
    }
}

#[test]
fn test_commit_after_undo_truncates_redo() {
    let mut h = history(HistoryLimits::default());
    set_x_and_commit(&mut h, 1);
    let future = set_x_and_commit(&mut h, 2);

    h.undo().unwrap();
    assert!(h.can_redo());
    set_x_and_commit(&mut h, 3);

    assert!(!h.can_redo());
    assert!(!h.redo().unwrap());
    assert!(!h.commits().contains(future));
    assert_eq!(h.commits().len(), 3);
}

#[test]
fn test_redo_depth_is_bounded() {
    let mut h = history(HistoryLimits::new(40, 32));
    for x in 1..=40 {
        set_x_and_commit(&mut h, x);
    }

    for _ in 0..36 {
        assert!(h.undo().unwrap());
    }
    assert_eq!(h.document().x, 4);
    assert_eq!(h.redo_depth(), 32);

    assert_eq!(count_redos(&mut h), 32);
    assert_eq!(h.document().x, 36);
}

#[test]
fn test_sticky_scale_factor_survives_navigation() {
    let mut h = history(HistoryLimits::default());
    h.sticky_mut().scale_factor = 2.5;

    set_x_and_commit(&mut h, 1);
    h.undo().unwrap();
    assert_eq!(h.sticky().scale_factor, 2.5);
    h.redo().unwrap();

    assert_eq!(h.sticky().scale_factor, 2.5);
    assert_eq!(h.document().x, 1);
}

#[test]
fn test_committed_snapshot_is_isolated_from_scratch() {
    let mut h = history(HistoryLimits::default());
    let id = set_x_and_commit(&mut h, 1);

    h.document_mut().x = 100;
    h.document_mut().elements.push("/late".into());

    let committed = h.commits().get(id).unwrap().document();
    assert_eq!(committed.x, 1);
    assert!(committed.elements.is_empty());
}

// === Reconciliation and rollback ===

#[test]
fn test_failed_reconcile_leaves_scratch_untouched() {
    let mut h = history(HistoryLimits::default());
    let head = h.head();
    h.document_mut().x = 9;
    h.document_mut().elements = vec!["/z".into(), "/a".into()];
    h.document_mut().reject = true;
    let before = h.document().clone();

    let err = h.commit("broken").unwrap_err();
    assert!(matches!(err, HistoryError::Reconciliation(_)));
    assert_eq!(h.document(), &before);
    assert_eq!(h.head(), head);
    assert_eq!(h.commits().len(), 1);
    assert!(h.is_dirty());

    // caller fixes the document and retries
    h.document_mut().reject = false;
    h.commit("fixed").unwrap();
    assert_eq!(h.document().elements, vec!["/a", "/z"]);
}

#[test]
fn test_rollback_after_failed_commit() {
    let mut h = history(HistoryLimits::default());
    set_x_and_commit(&mut h, 1);
    h.document_mut().x = 2;
    h.document_mut().reject = true;
    assert!(h.commit("broken").is_err());

    h.rollback().unwrap();
    assert_eq!(h.document(), &Doc::with_x(1));
    assert!(!h.is_dirty());
}

#[test]
fn test_rollback_keeps_sticky_state() {
    let mut h = history(HistoryLimits::default());
    h.document_mut().elements.push("/a".into());
    h.commit("add a").unwrap();
    h.sticky_mut().selected = Some("/a".into());
    h.sticky_mut().scale_factor = 0.01;

    // /b only exists in the edit being thrown away
    h.document_mut().elements.push("/b".into());
    h.sticky_mut().hovered = Some("/b".into());
    h.document_mut().reject = true;
    assert!(h.commit("broken").is_err());

    h.rollback().unwrap();
    assert_eq!(h.sticky().selected, Some("/a".into()));
    assert_eq!(h.sticky().hovered, None);
    assert_eq!(h.sticky().scale_factor, 0.01);
}

#[test]
fn test_reconcile_is_applied_to_scratch_and_commit() {
    let mut h = history(HistoryLimits::default());
    h.document_mut().elements = vec!["/b".into(), "/a".into(), "/a".into()];
    let id = h.commit("elements").unwrap();

    assert_eq!(h.document().elements, vec!["/a", "/b"]);
    assert_eq!(h.commits().get(id).unwrap().document().elements, vec!["/a", "/b"]);
    assert!(!h.is_dirty());
}

// === Checkout ===

#[test]
fn test_checkout_unknown_commit() {
    let mut h = history(HistoryLimits::default());
    let other = history(HistoryLimits::default());
    set_x_and_commit(&mut h, 1);
    let head = h.head();

    let err = h.checkout(other.head()).unwrap_err();
    assert!(matches!(err, HistoryError::CheckoutNotFound(id) if id == other.head()));
    assert_eq!(h.head(), head);
    assert_eq!(h.document().x, 1);
}

#[test]
fn test_checkout_older_commit_keeps_redo_lane() {
    let mut h = history(HistoryLimits::default());
    let c1 = set_x_and_commit(&mut h, 1);
    set_x_and_commit(&mut h, 2);
    set_x_and_commit(&mut h, 3);

    h.checkout(c1).unwrap();
    assert_eq!(h.document().x, 1);
    assert_eq!(h.redo_depth(), 2);

    assert!(h.redo().unwrap());
    assert_eq!(h.document().x, 2);
}

#[test]
fn test_checkout_preserves_sticky_state() {
    let mut h = history(HistoryLimits::default());
    let root = h.head();
    set_x_and_commit(&mut h, 1);
    h.sticky_mut().scale_factor = 0.25;

    h.checkout(root).unwrap();
    assert_eq!(h.sticky().scale_factor, 0.25);
}

// === Deep copy failure ===

#[test]
fn test_deep_copy_failure_does_not_move_heads() {
    let budget = Rc::new(Cell::new(4));
    let doc = Doc {
        copy_budget: Some(budget.clone()),
        ..Doc::default()
    };
    // two copies for the root commit, two for the next
    let mut h = History::with_default_limits(doc, "init").unwrap();
    h.document_mut().x = 1;
    let head = h.commit("x=1").unwrap();
    assert_eq!(budget.get(), 0);

    let err = h.undo().unwrap_err();
    assert!(matches!(err, HistoryError::DeepCopy(_)));
    assert_eq!(h.head(), head);
    assert_eq!(h.document().x, 1);

    let err = h.commit("again").unwrap_err();
    assert!(matches!(err, HistoryError::DeepCopy(_)));
    assert_eq!(h.head(), head);
    assert_eq!(h.commits().len(), 2);
}

// === Sticky references ===

#[test]
fn test_selection_of_removed_element_is_cleared() {
    let mut h = history(HistoryLimits::default());
    h.document_mut().elements.push("/knee".into());
    h.commit("add knee").unwrap();
    h.sticky_mut().selected = Some("/knee".into());
    h.sticky_mut().hovered = Some("/knee".into());

    // the root commit has no such element
    h.undo().unwrap();
    assert_eq!(h.sticky().selected, None);
    assert_eq!(h.sticky().hovered, None);

    // not resurrected by redo
    h.redo().unwrap();
    assert_eq!(h.sticky().selected, None);
}

#[test]
fn test_selection_survives_when_element_still_exists() {
    let mut h = history(HistoryLimits::default());
    h.document_mut().elements.push("/knee".into());
    h.commit("add knee").unwrap();
    h.sticky_mut().isolated = Some("/knee".into());
    set_x_and_commit(&mut h, 7);

    h.undo().unwrap();
    assert_eq!(h.sticky().isolated, Some(ElementPath::new("/knee")));
}

#[test]
fn test_set_document_keeps_sticky_and_marks_dirty() {
    let mut h = history(HistoryLimits::default());
    h.document_mut().elements.push("/a".into());
    h.commit("a").unwrap();
    h.sticky_mut().selected = Some("/a".into());
    h.sticky_mut().scale_factor = 4.0;

    h.set_document(Doc::with_x(11));
    assert!(h.is_dirty());
    assert_eq!(h.document().x, 11);
    assert_eq!(h.sticky().selected, None);
    assert_eq!(h.sticky().scale_factor, 4.0);
}

#[test]
fn test_explicit_element_removal() {
    let mut h = history(HistoryLimits::default());
    h.sticky_mut().hovered = Some("/gone".into());
    h.on_element_removed(&"/gone".into());
    assert_eq!(h.sticky().hovered, None);
}

// === Bookkeeping ===

#[test]
fn test_lineage_runs_from_branch_head_to_root() {
    let mut h = history(HistoryLimits::default());
    set_x_and_commit(&mut h, 1);
    set_x_and_commit(&mut h, 2);
    h.undo().unwrap();

    let messages: Vec<&str> = h.lineage().map(Commit::message).collect();
    assert_eq!(messages, vec!["set X=2", "set X=1", "init"]);
}

#[test]
fn test_saved_tracking() {
    let mut h = history(HistoryLimits::default());
    assert!(!h.is_up_to_date_with_saved());

    h.mark_saved();
    assert!(h.is_up_to_date_with_saved());
    assert_eq!(h.saved_commit(), Some(h.head()));

    h.document_mut().x = 1;
    assert!(!h.is_up_to_date_with_saved());
    h.commit("x").unwrap();
    assert!(!h.is_up_to_date_with_saved());

    h.undo().unwrap();
    assert!(h.is_up_to_date_with_saved());
}

#[test]
fn test_zero_limits_keep_only_head() {
    let mut h = history(HistoryLimits::new(0, 0));
    set_x_and_commit(&mut h, 1);
    set_x_and_commit(&mut h, 2);

    assert_eq!(h.commits().len(), 1);
    assert!(!h.can_undo());
    assert!(!h.can_redo());
}

#[test]
fn test_random_walk_preserves_invariants() {
    let limits = HistoryLimits::new(6, 4);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut h = history(limits);
    let mut seen = Vec::new();

    for step in 0..2_000 {
        match rng.gen_range(0..10) {
            0..=3 => {
                seen.push(set_x_and_commit(&mut h, step));
            }
            4..=5 => {
                h.undo().unwrap();
            }
            6..=7 => {
                h.redo().unwrap();
            }
            8 => {
                if let Some(&id) = seen.get(rng.gen_range(0..seen.len().max(1))) {
                    let retained = h.commits().contains(id);
                    assert_eq!(h.checkout(id).is_ok(), retained);
                }
            }
            _ => {
                h.document_mut().x = -1;
                h.rollback().unwrap();
            }
        }

        let store = h.commits();
        assert!(store.contains(h.head()));
        assert!(store.is_ancestor(h.head(), h.branch_head()));
        assert!(h.undo_depth() <= limits.max_undo);
        assert!(h.redo_depth() <= limits.max_redo);
        assert_eq!(store.len(), h.lineage().count());
        assert_eq!(h.document().x, h.latest_commit().unwrap().document().x);
    }
}
