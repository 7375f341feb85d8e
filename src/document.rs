use std::fmt;

/// Capabilities a document needs to be versioned by [`crate::history::History`]
pub trait Document: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produce a fully independent copy. The copy must not share any mutable
    /// state with `self`.
    fn deep_copy(&self) -> Result<Self, Self::Error>;

    /// Normalize pending edits into the document's canonical form. Called on a
    /// copy of scratch right before it becomes a commit.
    fn reconcile(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Whether `path` names something that exists in this document
    fn contains_element(&self, _path: &ElementPath) -> bool {
        true
    }
}

/// Stable, name-based reference to an element inside a document.
///
/// Documents are replaced wholesale on every checkout, so UI state refers to
/// elements by path and re-resolves them against whatever is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPath(String);

impl ElementPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, ignoring leading/trailing slashes
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ElementPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Non-versioned UI state that survives undo/redo/checkout
#[derive(Debug, Clone, PartialEq)]
pub struct StickyState {
    pub selected: Option<ElementPath>,
    pub hovered: Option<ElementPath>,
    pub isolated: Option<ElementPath>,
    /// Scales decorations up/down, e.g. for extremely small models
    pub scale_factor: f32,
}

impl Default for StickyState {
    fn default() -> Self {
        Self {
            selected: None,
            hovered: None,
            isolated: None,
            scale_factor: 1.0,
        }
    }
}

impl StickyState {
    /// All element references currently held (may contain duplicates)
    pub fn references(&self) -> impl Iterator<Item = &ElementPath> {
        [&self.selected, &self.hovered, &self.isolated]
            .into_iter()
            .flatten()
    }

    /// Forget every reference to `path`. Returns true if anything was cleared.
    pub fn on_element_removed(&mut self, path: &ElementPath) -> bool {
        let mut cleared = false;
        for slot in [&mut self.selected, &mut self.hovered, &mut self.isolated] {
            if slot.as_ref() == Some(path) {
                *slot = None;
                cleared = true;
            }
        }
        cleared
    }

    /// Paths that no longer resolve against `doc`
    pub fn dangling_in<D: Document>(&self, doc: &D) -> Vec<ElementPath> {
        let mut dead: Vec<ElementPath> = self
            .references()
            .filter(|p| !doc.contains_element(p))
            .cloned()
            .collect();
        dead.sort();
        dead.dedup();
        dead
    }
}
