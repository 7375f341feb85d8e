//! Undoable edits on a landmark document.
//!
//! Each action edits scratch and commits it. If the commit is rejected the
//! edit is rolled back, so scratch never holds a half-applied action.

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use crate::document::{Document, ElementPath};
use crate::error::HistoryError;
use crate::history::{CommitId, History};

use super::csvio::{self, CsvLandmark};
use super::{LandmarkDocument, LandmarkError, Side, Vec3};

pub type LandmarkHistory = History<LandmarkDocument>;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Landmark(#[from] LandmarkError),
}

fn commit_or_rollback(history: &mut LandmarkHistory, message: &str) -> Result<CommitId, HistoryError> {
    match history.commit(message) {
        Ok(id) => Ok(id),
        Err(err) => {
            if let Err(rollback_err) = history.rollback() {
                error!(error = %rollback_err, "rollback after failed commit also failed");
            }
            Err(err)
        }
    }
}

/// Returns the name of the pair the location was assigned to
pub fn add_landmark(history: &mut LandmarkHistory, side: Side, position: Vec3) -> Result<String, HistoryError> {
    let name = history.document_mut().add_landmark(side, position, None);
    commit_or_rollback(history, "added landmark")?;
    Ok(name)
}

pub fn add_non_participating_landmark(history: &mut LandmarkHistory, position: Vec3) -> Result<String, HistoryError> {
    let name = history.document_mut().add_non_participating(position, None);
    commit_or_rollback(history, "added non-participating landmark")?;
    Ok(name)
}

/// Returns false if no pair is called `name`
pub fn set_landmark_position(
    history: &mut LandmarkHistory,
    name: &str,
    side: Side,
    position: Vec3,
) -> Result<bool, HistoryError> {
    if history.document().find_pair(name).is_none() {
        return Ok(false);
    }
    if let Some(pair) = history.document_mut().find_pair_mut(name) {
        *pair.location_mut(side) = Some(position);
    }
    commit_or_rollback(history, "set landmark position")?;
    Ok(true)
}

pub fn set_non_participating_position(
    history: &mut LandmarkHistory,
    name: &str,
    position: Vec3,
) -> Result<bool, HistoryError> {
    if history.document().find_non_participating(name).is_none() {
        return Ok(false);
    }
    if let Some(lm) = history.document_mut().find_non_participating_mut(name) {
        lm.location = position;
    }
    commit_or_rollback(history, "change non-participating landmark position")?;
    Ok(true)
}

/// Returns false if `old` does not exist or `new` is already taken
pub fn rename_landmark(history: &mut LandmarkHistory, old: &str, new: &str) -> Result<bool, HistoryError> {
    let doc = history.document();
    if doc.find_pair(old).is_none() || doc.contains_name(new) {
        return Ok(false);
    }
    if let Some(pair) = history.document_mut().find_pair_mut(old) {
        pair.name = new.to_string();
    }
    commit_or_rollback(history, "set landmark name")?;
    Ok(true)
}

pub fn rename_non_participating_landmark(
    history: &mut LandmarkHistory,
    old: &str,
    new: &str,
) -> Result<bool, HistoryError> {
    let doc = history.document();
    if doc.find_non_participating(old).is_none() || doc.contains_name(new) {
        return Ok(false);
    }
    if let Some(lm) = history.document_mut().find_non_participating_mut(old) {
        lm.name = new.to_string();
    }
    commit_or_rollback(history, "set non-participating landmark name")?;
    Ok(true)
}

/// For live previews (e.g. while a slider is dragged). Commit with
/// [`set_blend_factor`] once the value settles.
pub fn set_blend_factor_without_committing(history: &mut LandmarkHistory, factor: f32) {
    history.document_mut().blending_factor = factor;
}

pub fn set_blend_factor(history: &mut LandmarkHistory, factor: f32) -> Result<CommitId, HistoryError> {
    set_blend_factor_without_committing(history, factor);
    commit_or_rollback(history, "changed blend factor")
}

pub fn set_recalculating_normals(history: &mut LandmarkHistory, enabled: bool) -> Result<CommitId, HistoryError> {
    history.document_mut().recalculate_normals = enabled;
    let message = if enabled {
        "enabled recalculating normals"
    } else {
        "disabled recalculating normals"
    };
    commit_or_rollback(history, message)
}

pub fn create_new_document(history: &mut LandmarkHistory) -> Result<CommitId, HistoryError> {
    history.set_document(LandmarkDocument::default());
    commit_or_rollback(history, "created new document")
}

pub fn clear_all_landmarks(history: &mut LandmarkHistory) -> Result<CommitId, HistoryError> {
    history.document_mut().pairs.clear();
    commit_or_rollback(history, "cleared all landmarks")
}

/// Clears pairs and non-participating landmarks as one undoable step
pub fn clear_everything(history: &mut LandmarkHistory) -> Result<CommitId, HistoryError> {
    let doc = history.document_mut();
    doc.pairs.clear();
    doc.non_participating.clear();
    commit_or_rollback(history, "cleared all landmarks and non-participating landmarks")
}

pub fn clear_all_non_participating_landmarks(history: &mut LandmarkHistory) -> Result<CommitId, HistoryError> {
    history.document_mut().non_participating.clear();
    commit_or_rollback(history, "cleared all non-participating landmarks")
}

/// Commits only if something was actually deleted
pub fn delete_elements(history: &mut LandmarkHistory, paths: &[ElementPath]) -> Result<bool, HistoryError> {
    let mut deleted = false;
    for path in paths {
        if history.document().contains_element(path) {
            deleted = history.document_mut().delete_element(path) || deleted;
        }
    }

    if deleted {
        commit_or_rollback(history, "deleted elements")?;
    }
    Ok(deleted)
}

pub fn delete_element(history: &mut LandmarkHistory, path: &ElementPath) -> Result<bool, HistoryError> {
    if !history.document().contains_element(path) {
        return Ok(false);
    }
    history.document_mut().delete_element(path);
    commit_or_rollback(history, "deleted element")?;
    Ok(true)
}

/// Place every landmark in the CSV onto one side. Returns how many were read.
pub fn load_landmarks_from_csv<R: Read>(
    history: &mut LandmarkHistory,
    side: Side,
    reader: R,
) -> Result<usize, ActionError> {
    let landmarks = csvio::read_landmarks(reader)?;
    for CsvLandmark { name, position } in &landmarks {
        history
            .document_mut()
            .add_landmark(side, *position, name.as_deref());
    }
    commit_or_rollback(history, "loaded landmarks")?;
    Ok(landmarks.len())
}

pub fn load_non_participating_landmarks_from_csv<R: Read>(
    history: &mut LandmarkHistory,
    reader: R,
) -> Result<usize, ActionError> {
    let landmarks = csvio::read_landmarks(reader)?;
    for CsvLandmark { name, position } in &landmarks {
        history
            .document_mut()
            .add_non_participating(*position, name.as_deref());
    }
    commit_or_rollback(history, "added non-participating landmarks")?;
    Ok(landmarks.len())
}

/// Replace the document with one read from `path`. The opened version counts
/// as saved, and later `save_document` calls write back to `path`.
pub fn open_document(history: &mut LandmarkHistory, path: &Path) -> Result<CommitId, ActionError> {
    let content = std::fs::read_to_string(path).map_err(LandmarkError::from)?;
    let doc = LandmarkDocument::from_toml(&content)?;
    history.set_document(doc);
    let id = commit_or_rollback(history, "opened document")?;
    history.set_filesystem_path(Some(path.to_path_buf()));
    history.mark_saved();
    info!(path = %path.display(), "opened document");
    Ok(id)
}

/// Write the current commit to `path` and remember `path` for later saves.
///
/// Uncommitted edits in scratch are not written, so a dirty history stays
/// out of date with what is on disk.
pub fn save_document_as(history: &mut LandmarkHistory, path: &Path) -> Result<(), ActionError> {
    let content = match history.latest_commit() {
        Some(commit) => commit.document().to_toml()?,
        None => history.document().to_toml()?,
    };
    std::fs::write(path, content).map_err(LandmarkError::from)?;

    history.set_filesystem_path(Some(path.to_path_buf()));
    history.mark_saved();
    info!(path = %path.display(), commit = %history.head(), "saved document");
    Ok(())
}

/// Save to the remembered path. Returns false if there isn't one yet.
pub fn save_document(history: &mut LandmarkHistory) -> Result<bool, ActionError> {
    let Some(path) = history.filesystem_path().map(Path::to_path_buf) else {
        return Ok(false);
    };
    save_document_as(history, &path)?;
    Ok(true)
}
