use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_COMMIT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique commit identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(u64);

impl CommitId {
    /// Allocate a fresh id. Ids are never reused within a process.
    pub(crate) fn next() -> Self {
        Self(NEXT_COMMIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for CommitId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        digits.parse::<u64>().map(CommitId)
    }
}

/// An immutable snapshot of a document plus metadata
#[derive(Debug)]
pub struct Commit<D> {
    id: CommitId,
    parent: Option<CommitId>,
    message: String,
    timestamp: SystemTime,
    document: D,
}

impl<D> Commit<D> {
    pub(crate) fn new(document: D, message: impl Into<String>, parent: Option<CommitId>) -> Self {
        Self {
            id: CommitId::next(),
            parent,
            message: message.into(),
            timestamp: SystemTime::now(),
            document,
        }
    }

    pub fn id(&self) -> CommitId {
        self.id
    }

    /// `None` for a root commit
    pub fn parent(&self) -> Option<CommitId> {
        self.parent
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn document(&self) -> &D {
        &self.document
    }
}

impl<D> PartialEq for Commit<D> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<D> Eq for Commit<D> {}
