use std::collections::{HashMap, HashSet};

use super::commit::{Commit, CommitId};

/// Owning storage for every retained commit, keyed by id.
///
/// Parent links may dangle once garbage collection has removed old ancestors,
/// so every walk stops at the first parent that is not stored.
#[derive(Debug)]
pub struct CommitStore<D> {
    commits: HashMap<CommitId, Commit<D>>,
}

impl<D> Default for CommitStore<D> {
    fn default() -> Self {
        Self {
            commits: HashMap::new(),
        }
    }
}

impl<D> CommitStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a commit. An existing commit with the same id is overwritten.
    pub fn insert(&mut self, commit: Commit<D>) {
        self.commits.insert(commit.id(), commit);
    }

    pub fn get(&self, id: CommitId) -> Option<&Commit<D>> {
        self.commits.get(&id)
    }

    pub fn contains(&self, id: CommitId) -> bool {
        self.commits.contains_key(&id)
    }

    /// Parent of `id`, if `id` is stored and has one
    pub fn parent_of(&self, id: CommitId) -> Option<CommitId> {
        self.get(id).and_then(Commit::parent)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Commit<D>> {
        self.commits.values()
    }

    /// Number of parent hops from `from` to `to`, or `None` if `to` is not an
    /// ancestor of `from`. The distance from a commit to itself is 0.
    pub fn distance(&self, from: CommitId, to: CommitId) -> Option<usize> {
        if from == to {
            return Some(0);
        }

        let mut hops = 1;
        let mut cursor = self.parent_of(from);

        while let Some(id) = cursor {
            if id == to {
                return Some(hops);
            }
            cursor = self.parent_of(id);
            hops += 1;
        }

        None
    }

    /// The commit `n` parent hops behind `from` (`n == 0` is `from` itself)
    pub fn nth_ancestor(&self, from: CommitId, n: usize) -> Option<&Commit<D>> {
        let mut commit = self.get(from)?;
        for _ in 0..n {
            commit = self.get(commit.parent()?)?;
        }
        Some(commit)
    }

    /// Whether `candidate` is `of` or one of its stored ancestors
    pub fn is_ancestor(&self, candidate: CommitId, of: CommitId) -> bool {
        self.ancestry(of).any(|c| c.id() == candidate)
    }

    /// Walk from `from` (inclusive) towards the root
    pub fn ancestry(&self, from: CommitId) -> Ancestry<'_, D> {
        Ancestry {
            store: self,
            next: self.get(from),
        }
    }

    /// Erase `start` and its ancestors, stopping before `stop` (which is kept)
    /// or at the end of the stored chain. Returns how many commits were erased.
    pub fn erase_range(&mut self, start: CommitId, stop: Option<CommitId>) -> usize {
        let mut erased = 0;
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if Some(id) == stop {
                break;
            }
            match self.commits.remove(&id) {
                Some(commit) => {
                    erased += 1;
                    cursor = commit.parent();
                }
                None => break,
            }
        }

        erased
    }

    /// Erase everything that is neither `root` nor an ancestor of it.
    /// Returns how many commits were erased.
    pub fn erase_unreachable_from(&mut self, root: CommitId) -> usize {
        let reachable: HashSet<CommitId> = self.ancestry(root).map(Commit::id).collect();
        let before = self.commits.len();
        self.commits.retain(|id, _| reachable.contains(id));
        before - self.commits.len()
    }
}

/// Iterator over a commit and its stored ancestors
pub struct Ancestry<'a, D> {
    store: &'a CommitStore<D>,
    next: Option<&'a Commit<D>>,
}

impl<'a, D> Iterator for Ancestry<'a, D> {
    type Item = &'a Commit<D>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent().and_then(|p| self.store.get(p));
        Some(current)
    }
}
