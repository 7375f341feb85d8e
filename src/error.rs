use thiserror::Error;

use crate::history::CommitId;

/// Boxed error raised by a document's own hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures reported by [`crate::history::History`]
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The document refused to reconcile its pending edits, so nothing was committed.
    /// Scratch is left exactly as it was before the commit attempt.
    #[error("failed to reconcile document: {0}")]
    Reconciliation(#[source] BoxError),

    /// The requested commit does not belong to this history
    #[error("commit {0} is not part of this history")]
    CheckoutNotFound(CommitId),

    /// The document could not be copied. Heads are never moved when this happens.
    #[error("failed to copy document: {0}")]
    DeepCopy(#[source] BoxError),
}

impl HistoryError {
    pub(crate) fn reconciliation<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HistoryError::Reconciliation(Box::new(err))
    }

    pub(crate) fn deep_copy<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HistoryError::DeepCopy(Box::new(err))
    }
}
