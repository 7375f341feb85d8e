use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::config::HistoryLimits;
use crate::document::{Document, ElementPath, StickyState};
use crate::error::HistoryError;

use super::commit::{Commit, CommitId};
use super::store::{Ancestry, CommitStore};

/// The live, mutable working copy
#[derive(Debug)]
struct Scratch<D> {
    document: D,
    sticky: StickyState,
    /// Set whenever the document is handed out mutably
    dirty: bool,
}

impl<D> Scratch<D> {
    fn clean(document: D, sticky: StickyState) -> Self {
        Self {
            document,
            sticky,
            dirty: false,
        }
    }
}

/// Undo/redo history over a single mutable document.
///
/// Callers edit the scratch document in place and `commit` when an edit is
/// complete. History is linear: `head` is the commit scratch was last loaded
/// from, and `branch_head` is the newest commit on the line, which is ahead of
/// `head` after undoing.
#[derive(Debug)]
pub struct History<D: Document> {
    scratch: Scratch<D>,
    head: CommitId,
    branch_head: CommitId,
    commits: CommitStore<D>,
    limits: HistoryLimits,
    saved: Option<CommitId>,
    filesystem_path: Option<PathBuf>,
}

/// Copy and reconcile `doc`, returning the new scratch document and the
/// document to freeze into a commit
fn prepare_commit<D: Document>(doc: &D) -> Result<(D, D), HistoryError> {
    let mut reconciled = doc.deep_copy().map_err(HistoryError::deep_copy)?;
    reconciled.reconcile().map_err(HistoryError::reconciliation)?;
    let frozen = reconciled.deep_copy().map_err(HistoryError::deep_copy)?;
    Ok((reconciled, frozen))
}

impl<D: Document> History<D> {
    /// Start a history whose root commit holds `document`
    pub fn new(
        document: D,
        message: impl Into<String>,
        limits: HistoryLimits,
    ) -> Result<Self, HistoryError> {
        let (reconciled, frozen) = prepare_commit(&document)?;
        let root = Commit::new(frozen, message, None);
        let id = root.id();
        debug!(commit = %id, message = root.message(), "created history");

        let mut commits = CommitStore::new();
        commits.insert(root);

        let mut history = Self {
            scratch: Scratch::clean(reconciled, StickyState::default()),
            head: id,
            branch_head: id,
            commits,
            limits,
            saved: None,
            filesystem_path: None,
        };
        history.garbage_collect();
        Ok(history)
    }

    pub fn with_default_limits(document: D, message: impl Into<String>) -> Result<Self, HistoryError> {
        Self::new(document, message, HistoryLimits::default())
    }

    pub fn document(&self) -> &D {
        &self.scratch.document
    }

    /// Mutable access to scratch. Marks scratch as having uncommitted edits.
    pub fn document_mut(&mut self) -> &mut D {
        self.scratch.dirty = true;
        &mut self.scratch.document
    }

    /// Replace the scratch document wholesale, keeping sticky state
    pub fn set_document(&mut self, document: D) {
        self.scratch.document = document;
        self.scratch.dirty = true;
        self.resolve_sticky();
    }

    pub fn sticky(&self) -> &StickyState {
        &self.scratch.sticky
    }

    pub fn sticky_mut(&mut self) -> &mut StickyState {
        &mut self.scratch.sticky
    }

    /// Whether scratch may differ from the head commit
    pub fn is_dirty(&self) -> bool {
        self.scratch.dirty
    }

    pub fn head(&self) -> CommitId {
        self.head
    }

    pub fn branch_head(&self) -> CommitId {
        self.branch_head
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// The commit scratch was last loaded from or committed to
    pub fn latest_commit(&self) -> Option<&Commit<D>> {
        self.commits.get(self.head)
    }

    pub fn commits(&self) -> &CommitStore<D> {
        &self.commits
    }

    /// Commits from the branch head back to the oldest retained one
    pub fn lineage(&self) -> Ancestry<'_, D> {
        self.commits.ancestry(self.branch_head)
    }

    /// Freeze scratch into a new commit on top of `head`.
    ///
    /// The document is reconciled on a copy, so if reconciliation fails
    /// scratch is untouched and the caller may fix it up or `rollback`.
    /// Any undone commits ahead of `head` are discarded.
    pub fn commit(&mut self, message: impl Into<String>) -> Result<CommitId, HistoryError> {
        let message = message.into();

        let (reconciled, frozen) = match prepare_commit(&self.scratch.document) {
            Ok(docs) => docs,
            Err(err) => {
                warn!(error = %err, message = %message, "commit rejected");
                return Err(err);
            }
        };

        let commit = Commit::new(frozen, message, Some(self.head));
        let id = commit.id();
        debug!(commit = %id, parent = %self.head, message = commit.message(), "committed");
        self.commits.insert(commit);

        self.scratch.document = reconciled;
        self.scratch.dirty = false;
        self.head = id;
        self.branch_head = id;

        self.resolve_sticky();
        self.garbage_collect();
        Ok(id)
    }

    fn undo_target(&self) -> Option<CommitId> {
        self.commits
            .parent_of(self.head)
            .filter(|parent| self.commits.contains(*parent))
    }

    fn redo_target(&self) -> Option<CommitId> {
        let distance = self.commits.distance(self.branch_head, self.head)?;
        if distance < 1 {
            return None;
        }
        self.commits
            .nth_ancestor(self.branch_head, distance - 1)
            .map(Commit::id)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_target().is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.redo_target().is_some()
    }

    /// How many times `undo` can currently succeed
    pub fn undo_depth(&self) -> usize {
        self.commits.ancestry(self.head).count().saturating_sub(1)
    }

    /// How many times `redo` can currently succeed
    pub fn redo_depth(&self) -> usize {
        self.commits
            .distance(self.branch_head, self.head)
            .unwrap_or(0)
    }

    /// Check out `head`'s parent. Returns `Ok(false)` if there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, HistoryError> {
        let Some(target) = self.undo_target() else {
            return Ok(false);
        };
        let sticky = self.scratch.sticky.clone();
        self.load(target, sticky)?;
        debug!(commit = %target, "undo");
        self.garbage_collect();
        Ok(true)
    }

    /// Move `head` one step back towards `branch_head`. Returns `Ok(false)` if
    /// there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, HistoryError> {
        let Some(target) = self.redo_target() else {
            return Ok(false);
        };
        let sticky = self.scratch.sticky.clone();
        self.load(target, sticky)?;
        debug!(commit = %target, "redo");
        self.garbage_collect();
        Ok(true)
    }

    /// Load an arbitrary retained commit into scratch
    pub fn checkout(&mut self, target: CommitId) -> Result<(), HistoryError> {
        if !self.commits.contains(target) {
            return Err(HistoryError::CheckoutNotFound(target));
        }
        let sticky = self.scratch.sticky.clone();
        self.load(target, sticky)?;
        debug!(commit = %target, "checkout");
        self.garbage_collect();
        Ok(())
    }

    /// Throw away uncommitted edits by reloading `head`. Sticky state is kept,
    /// minus references to elements that only existed in the discarded edit.
    pub fn rollback(&mut self) -> Result<(), HistoryError> {
        self.load(self.head, self.scratch.sticky.clone())?;
        debug!(commit = %self.head, "rollback");
        Ok(())
    }

    /// Forget sticky references to an element that no longer exists
    pub fn on_element_removed(&mut self, path: &ElementPath) {
        if self.scratch.sticky.on_element_removed(path) {
            debug!(path = %path, "dropped reference to removed element");
        }
    }

    /// Record `head` as the version that was last written to disk
    pub fn mark_saved(&mut self) {
        self.saved = Some(self.head);
    }

    pub fn saved_commit(&self) -> Option<CommitId> {
        self.saved
    }

    /// Where the document was last saved to or opened from
    pub fn filesystem_path(&self) -> Option<&Path> {
        self.filesystem_path.as_deref()
    }

    pub fn set_filesystem_path(&mut self, path: Option<PathBuf>) {
        self.filesystem_path = path;
    }

    /// True if scratch matches the version last written to disk
    pub fn is_up_to_date_with_saved(&self) -> bool {
        self.saved == Some(self.head) && !self.scratch.dirty
    }

    /// Replace scratch with a copy of `target`. Heads only move once the copy exists.
    fn load(&mut self, target: CommitId, sticky: StickyState) -> Result<(), HistoryError> {
        let commit = self
            .commits
            .get(target)
            .ok_or(HistoryError::CheckoutNotFound(target))?;
        let document = commit.document().deep_copy().map_err(HistoryError::deep_copy)?;

        self.scratch = Scratch::clean(document, sticky);
        self.head = target;
        self.resolve_sticky();
        Ok(())
    }

    fn resolve_sticky(&mut self) {
        for path in self.scratch.sticky.dangling_in(&self.scratch.document) {
            self.on_element_removed(&path);
        }
    }

    fn garbage_collect(&mut self) {
        let undo = self.collect_beyond_max_undo();
        let redo = self.collect_beyond_max_redo();
        let unreachable = self.commits.erase_unreachable_from(self.branch_head);

        if undo + redo + unreachable > 0 {
            debug!(
                undo,
                redo,
                unreachable,
                retained = self.commits.len(),
                "garbage collected commits"
            );
        }
    }

    fn collect_beyond_max_undo(&mut self) -> usize {
        let depth = self.limits.max_undo.saturating_add(1);
        match self.commits.nth_ancestor(self.head, depth).map(Commit::id) {
            Some(first_bad) => self.commits.erase_range(first_bad, None),
            None => 0,
        }
    }

    fn collect_beyond_max_redo(&mut self) -> usize {
        let Some(redos) = self.commits.distance(self.branch_head, self.head) else {
            return 0;
        };
        let excess = redos.saturating_sub(self.limits.max_redo);
        if excess == 0 {
            return 0;
        }

        let Some(new_branch_head) = self
            .commits
            .nth_ancestor(self.branch_head, excess)
            .map(Commit::id)
        else {
            return 0;
        };

        trace!(from = %self.branch_head, to = %new_branch_head, "trimming redo lane");
        let erased = self.commits.erase_range(self.branch_head, Some(new_branch_head));
        self.branch_head = new_branch_head;
        erased
    }
}
