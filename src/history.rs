//! Linear undo/redo history for in-memory documents.
//!
//! Every commit is a deep copy of the document, so checking one out never
//! aliases the live scratch copy. Old commits beyond the configured undo and
//! redo depths are garbage collected as heads move.

pub mod commit;
pub mod controller;
pub mod store;

pub use commit::{Commit, CommitId};
pub use controller::History;
pub use store::{Ancestry, CommitStore};

#[cfg(test)]
mod test;
