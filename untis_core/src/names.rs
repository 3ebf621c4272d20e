//! Resolution of teacher identifiers to display names.

use std::{collections::HashMap, str::FromStr};

use crate::{error::FeedError, lesson::TeacherId};

/// Names to fall back to when the account may not read the teacher list.
pub static DEFAULT_FALLBACK_TEACHERS: [(TeacherId, &str); 12] = [
    (32, "gri"),
    (106, "sma"),
    (31, "grä"),
    (308, "lie"),
    (372, "ned"),
    (41, "höl"),
    (430, "spe"),
    (167, "uhr"),
    (117, "tei"),
    (412, "flo"),
    (46, "jel"),
    (110, "std"),
];

/// Mapping from teacher identifiers to display names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherDirectory(HashMap<TeacherId, String>);

impl TeacherDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TeacherId, name: impl Into<String>) {
        self.0.insert(id, name.into());
    }

    pub fn get(&self, id: TeacherId) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TeacherId, &str)> {
        self.0.iter().map(|(id, name)| (*id, name.as_str()))
    }

    /// The directory built from [`DEFAULT_FALLBACK_TEACHERS`].
    pub fn default_fallback() -> Self {
        DEFAULT_FALLBACK_TEACHERS
            .iter()
            .map(|(id, name)| (*id, String::from(*name)))
            .collect()
    }
}

impl FromIterator<(TeacherId, String)> for TeacherDirectory {
    fn from_iter<I: IntoIterator<Item = (TeacherId, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse a directory written as `id=name` pairs separated by commas, e.g. `32=gri,106=sma`.
impl FromStr for TeacherDirectory {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (id, name) = pair.split_once('=').ok_or_else(|| {
                    FeedError::Configuration(format!("teacher entry '{pair}' lacks '='"))
                })?;
                let id = id.trim().parse::<TeacherId>().map_err(|err| {
                    FeedError::Configuration(format!("teacher id in '{pair}': {err}"))
                })?;
                Ok((id, String::from(name.trim())))
            })
            .collect()
    }
}

/// Resolves teacher identifiers, preferring the live directory over the bundled fallback.
///
/// Names the timetable sent along with its lessons rank between the two.
#[derive(Debug, Clone)]
pub struct NameResolver {
    fallback: TeacherDirectory,
}

impl NameResolver {
    pub fn new(fallback: TeacherDirectory) -> Self {
        Self { fallback }
    }

    /// The display name of one teacher. Unknown teachers are shown by their identifier.
    pub fn name_of(
        &self,
        id: TeacherId,
        live: Option<&TeacherDirectory>,
        labels: Option<&TeacherDirectory>,
    ) -> String {
        live.and_then(|directory| directory.get(id))
            .or_else(|| labels.and_then(|directory| directory.get(id)))
            .or_else(|| self.fallback.get(id))
            .map(String::from)
            .unwrap_or_else(|| id.to_string())
    }

    /// Build a directory covering every given identifier.
    pub fn resolve<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a TeacherId>,
        live: Option<&TeacherDirectory>,
        labels: Option<&TeacherDirectory>,
    ) -> TeacherDirectory {
        ids.into_iter()
            .map(|id| (*id, self.name_of(*id, live, labels)))
            .collect()
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(TeacherDirectory::default_fallback())
    }
}
