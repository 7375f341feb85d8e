//! A landmark-pairing document, as used by mesh warping tools.
//!
//! Each landmark pair has a location on a source mesh and/or a destination
//! mesh. Non-participating landmarks are carried along by the warp but do not
//! influence it.

pub mod actions;
pub mod csvio;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Document, ElementPath};

pub const LANDMARKS_ROOT: &str = "landmarks";
pub const NON_PARTICIPATING_ROOT: &str = "non_participating";

#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("invalid element name '{0}'")]
    InvalidName(String),
    #[error("more than one element is named '{0}'")]
    DuplicateName(String),
    #[error("blending factor {0} is outside [0, 1]")]
    BlendFactorOutOfRange(f32),
    #[error("location of '{0}' is not finite")]
    NonFiniteLocation(String),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write document: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to read document: {0}")]
    Deserialize(#[from] toml::de::Error),
}

fn name_regex() -> &'static Regex {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap())
}

/// Whether `name` can be used for a landmark
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Which of the two meshes a landmark location belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    pub fn path_segment(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "src" | "source" => Ok(Side::Source),
            "dst" | "dest" | "destination" => Ok(Side::Destination),
            _ => Err(format!("unknown side '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPair {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec3>,
}

impl LandmarkPair {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            destination: None,
        }
    }

    pub fn location(&self, side: Side) -> Option<Vec3> {
        match side {
            Side::Source => self.source,
            Side::Destination => self.destination,
        }
    }

    pub fn location_mut(&mut self, side: Side) -> &mut Option<Vec3> {
        match side {
            Side::Source => &mut self.source,
            Side::Destination => &mut self.destination,
        }
    }

    pub fn is_fully_paired(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.destination.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonParticipatingLandmark {
    pub name: String,
    pub location: Vec3,
}

/// An element named by an [`ElementPath`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRef<'a> {
    Pair(&'a str),
    PairSide(&'a str, Side),
    NonParticipating(&'a str),
}

impl<'a> ElementRef<'a> {
    pub fn parse(path: &'a ElementPath) -> Option<Self> {
        let mut segments = path.segments();
        let root = segments.next()?;
        let name = segments.next()?;
        let side = segments.next();
        if segments.next().is_some() {
            return None;
        }

        match (root, side) {
            (LANDMARKS_ROOT, None) => Some(ElementRef::Pair(name)),
            (LANDMARKS_ROOT, Some("source")) => Some(ElementRef::PairSide(name, Side::Source)),
            (LANDMARKS_ROOT, Some("destination")) => {
                Some(ElementRef::PairSide(name, Side::Destination))
            }
            (NON_PARTICIPATING_ROOT, None) => Some(ElementRef::NonParticipating(name)),
            _ => None,
        }
    }
}

/// Saved to disk as TOML. Scalars come first so they stay above the
/// `[[pairs]]` and `[[non_participating]]` tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkDocument {
    /// How far to blend from the source towards the warped result
    pub blending_factor: f32,
    pub recalculate_normals: bool,
    pub pairs: Vec<LandmarkPair>,
    pub non_participating: Vec<NonParticipatingLandmark>,
}

impl Default for LandmarkDocument {
    fn default() -> Self {
        Self {
            blending_factor: 1.0,
            recalculate_normals: false,
            pairs: Vec::new(),
            non_participating: Vec::new(),
        }
    }
}

impl LandmarkDocument {
    /// Parse a saved document. The result is validated like a commit would be.
    pub fn from_toml(content: &str) -> Result<Self, LandmarkError> {
        let mut doc: LandmarkDocument = toml::from_str(content)?;
        doc.reconcile()?;
        Ok(doc)
    }

    pub fn to_toml(&self) -> Result<String, LandmarkError> {
        Ok(toml::to_string(self)?)
    }

    pub fn pair_path(name: &str) -> ElementPath {
        ElementPath::new(format!("/{}/{}", LANDMARKS_ROOT, name))
    }

    pub fn pair_side_path(name: &str, side: Side) -> ElementPath {
        ElementPath::new(format!("/{}/{}/{}", LANDMARKS_ROOT, name, side.path_segment()))
    }

    pub fn non_participating_path(name: &str) -> ElementPath {
        ElementPath::new(format!("/{}/{}", NON_PARTICIPATING_ROOT, name))
    }

    pub fn find_pair(&self, name: &str) -> Option<&LandmarkPair> {
        self.pairs.iter().find(|p| p.name == name)
    }

    pub fn find_pair_mut(&mut self, name: &str) -> Option<&mut LandmarkPair> {
        self.pairs.iter_mut().find(|p| p.name == name)
    }

    pub fn find_non_participating(&self, name: &str) -> Option<&NonParticipatingLandmark> {
        self.non_participating.iter().find(|l| l.name == name)
    }

    pub fn find_non_participating_mut(&mut self, name: &str) -> Option<&mut NonParticipatingLandmark> {
        self.non_participating.iter_mut().find(|l| l.name == name)
    }

    /// Whether any element (pair or non-participating) uses `name`
    pub fn contains_name(&self, name: &str) -> bool {
        self.find_pair(name).is_some() || self.find_non_participating(name).is_some()
    }

    pub fn count_fully_paired(&self) -> usize {
        self.pairs.iter().filter(|p| p.is_fully_paired()).count()
    }

    /// First `<prefix><n>` that no element uses yet
    pub fn next_unique_name(&self, prefix: &str) -> String {
        (0..)
            .map(|i: u64| format!("{}{}", prefix, i))
            .find(|name| !self.contains_name(name))
            .unwrap_or_else(|| prefix.to_string())
    }

    /// Place a landmark on one side.
    ///
    /// With a name, the named pair is created or updated. Without one, the
    /// location fills the first pair that is missing this side, so landmarks
    /// added in order pair up in order. Returns the pair's name.
    pub fn add_landmark(&mut self, side: Side, position: Vec3, name: Option<&str>) -> String {
        if let Some(name) = name {
            match self.find_pair_mut(name) {
                Some(pair) => *pair.location_mut(side) = Some(position),
                None => {
                    let mut pair = LandmarkPair::new(name);
                    *pair.location_mut(side) = Some(position);
                    self.pairs.push(pair);
                }
            }
            return name.to_string();
        }

        if let Some(pair) = self.pairs.iter_mut().find(|p| p.location(side).is_none()) {
            *pair.location_mut(side) = Some(position);
            return pair.name.clone();
        }

        let name = self.next_unique_name("landmark_");
        let mut pair = LandmarkPair::new(name.clone());
        *pair.location_mut(side) = Some(position);
        self.pairs.push(pair);
        name
    }

    /// Add or move a non-participating landmark. Returns its name.
    pub fn add_non_participating(&mut self, position: Vec3, name: Option<&str>) -> String {
        if let Some(name) = name {
            match self.find_non_participating_mut(name) {
                Some(lm) => lm.location = position,
                None => self.non_participating.push(NonParticipatingLandmark {
                    name: name.to_string(),
                    location: position,
                }),
            }
            return name.to_string();
        }

        let name = self.next_unique_name("datapoint_");
        self.non_participating.push(NonParticipatingLandmark {
            name: name.clone(),
            location: position,
        });
        name
    }

    /// Remove the element at `path`. Deleting one side of a pair drops the
    /// whole pair once neither side has a location.
    pub fn delete_element(&mut self, path: &ElementPath) -> bool {
        match ElementRef::parse(path) {
            Some(ElementRef::Pair(name)) => {
                let before = self.pairs.len();
                self.pairs.retain(|p| p.name != name);
                self.pairs.len() != before
            }
            Some(ElementRef::PairSide(name, side)) => {
                let Some(idx) = self.pairs.iter().position(|p| p.name == name) else {
                    return false;
                };
                if self.pairs[idx].location_mut(side).take().is_none() {
                    return false;
                }
                if self.pairs[idx].is_empty() {
                    self.pairs.remove(idx);
                }
                true
            }
            Some(ElementRef::NonParticipating(name)) => {
                let before = self.non_participating.len();
                self.non_participating.retain(|l| l.name != name);
                self.non_participating.len() != before
            }
            None => false,
        }
    }

    fn validate(&self) -> Result<(), LandmarkError> {
        if !(0.0..=1.0).contains(&self.blending_factor) {
            return Err(LandmarkError::BlendFactorOutOfRange(self.blending_factor));
        }

        let mut seen = HashSet::new();
        let names = self
            .pairs
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.non_participating.iter().map(|l| l.name.as_str()));
        for name in names {
            if !is_valid_name(name) {
                return Err(LandmarkError::InvalidName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(LandmarkError::DuplicateName(name.to_string()));
            }
        }

        for pair in &self.pairs {
            let finite = [pair.source, pair.destination]
                .iter()
                .flatten()
                .all(Vec3::is_finite);
            if !finite {
                return Err(LandmarkError::NonFiniteLocation(pair.name.clone()));
            }
        }
        for lm in &self.non_participating {
            if !lm.location.is_finite() {
                return Err(LandmarkError::NonFiniteLocation(lm.name.clone()));
            }
        }

        Ok(())
    }
}

impl Document for LandmarkDocument {
    type Error = LandmarkError;

    fn deep_copy(&self) -> Result<Self, LandmarkError> {
        Ok(self.clone())
    }

    /// Drops pairs left without any location, then validates
    fn reconcile(&mut self) -> Result<(), LandmarkError> {
        self.pairs.retain(|p| !p.is_empty());
        self.validate()
    }

    fn contains_element(&self, path: &ElementPath) -> bool {
        match ElementRef::parse(path) {
            Some(ElementRef::Pair(name)) => self.find_pair(name).is_some(),
            Some(ElementRef::PairSide(name, side)) => self
                .find_pair(name)
                .is_some_and(|p| p.location(side).is_some()),
            Some(ElementRef::NonParticipating(name)) => self.find_non_participating(name).is_some(),
            None => false,
        }
    }
}
