//! The capability of fetching lessons from a timetable service.

use std::{fmt, future::Future, pin::Pin};

use crate::{error::FeedResult, lesson::RawLesson, names::TeacherDirectory, window::DateWindow};

/// A boxed future, keeping [`LessonSource`] object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whose timetable to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimetableTarget {
    /// The timetable of the logged in account.
    Mine,
    /// The timetable of a class, by its exact name.
    Class(String),
}

impl fmt::Display for TimetableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mine => write!(f, "me"),
            Self::Class(name) => write!(f, "class {name}"),
        }
    }
}

/// A service lessons can be fetched from.
pub trait LessonSource: Send + Sync {
    /// Fetch the lessons of `target` inside `window`.
    ///
    /// # Errors
    ///
    /// Fails when the service cannot be reached, rejects the request or does not know the class.
    fn fetch(
        &self,
        target: TimetableTarget,
        window: DateWindow,
    ) -> BoxFuture<'_, FeedResult<Vec<RawLesson>>>;

    /// Fetch the teacher names the account may read, `None` without the rights to do so.
    fn fetch_rights_directory(&self) -> BoxFuture<'_, Option<TeacherDirectory>>;
}

/// Outcome of fetching the class timetable. Failing to fetch it does not fail the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassTimetable {
    Available(Vec<RawLesson>),
    Unavailable,
}

impl ClassTimetable {
    pub fn lessons(&self) -> Option<&[RawLesson]> {
        match self {
            Self::Available(lessons) => Some(lessons.as_slice()),
            Self::Unavailable => None,
        }
    }
}

impl From<Option<Vec<RawLesson>>> for ClassTimetable {
    fn from(lessons: Option<Vec<RawLesson>>) -> Self {
        lessons.map_or(Self::Unavailable, Self::Available)
    }
}
