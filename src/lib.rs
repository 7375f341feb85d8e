//! Undo/redo for in-memory documents, built on a linear chain of immutable
//! commits. See [`history::History`] for the entry point.

pub mod command;
pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod landmarks;

pub use config::{AppConfig, HistoryLimits};
pub use document::{Document, ElementPath, StickyState};
pub use error::HistoryError;
pub use history::{Commit, CommitId, History};
