//! Lesson records as delivered by the timetable service and as published in the feed.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Deserialize;

use crate::names::TeacherDirectory;

/// Identifier of a teacher on the timetable service.
pub type TeacherId = u64;

/// Teacher identifier the timetable service uses for "no teacher assigned".
///
/// A lesson carrying it does not take place.
pub const NO_TEACHER: TeacherId = 0;

/// Provider status code of a cancelled lesson.
const CODE_CANCELLED: &str = "cancelled";
/// Provider status code of a lesson deviating from the regular timetable.
const CODE_IRREGULAR: &str = "irregular";

/// Cell state of a lesson. Depending on the endpoint it is numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CellState {
    Code(i64),
    Name(String),
}

impl CellState {
    /// Whether the cell state marks the lesson as cancelled.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Code(code) => *code == 3,
            Self::Name(name) => name.eq_ignore_ascii_case("CANCEL"),
        }
    }
}

/// A lesson as the timetable service describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLesson {
    /// Lesson identifier, if the service sent one.
    pub id: Option<u64>,
    pub subject: String,
    /// Start in school local time.
    pub start: NaiveDateTime,
    /// End in school local time.
    pub end: NaiveDateTime,
    pub room: Option<String>,
    /// Teacher identifiers in the order the service listed them.
    pub teachers: Vec<TeacherId>,
    /// Teacher names the service sent along with the lesson.
    pub teacher_labels: TeacherDirectory,
    /// Provider status code, e.g. `cancelled` or `irregular`.
    pub code: Option<String>,
    pub cell_state: Option<CellState>,
}

impl RawLesson {
    pub fn new(subject: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            id: None,
            subject: subject.into(),
            start,
            end,
            room: None,
            teachers: Vec::new(),
            teacher_labels: TeacherDirectory::new(),
            code: None,
            cell_state: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn with_teachers(mut self, teachers: Vec<TeacherId>) -> Self {
        self.teachers = teachers;
        self
    }

    pub fn with_teacher_label(mut self, id: TeacherId, name: impl Into<String>) -> Self {
        self.teacher_labels.insert(id, name);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_cell_state(mut self, cell_state: CellState) -> Self {
        self.cell_state = Some(cell_state);
        self
    }

    /// Classify whether the lesson is held, cancelled or substituted.
    pub fn status(&self) -> LessonStatus {
        let code = self.code.as_deref().unwrap_or_default();
        let cancelled = code.eq_ignore_ascii_case(CODE_CANCELLED)
            || self
                .cell_state
                .as_ref()
                .is_some_and(CellState::is_cancellation)
            || self.teachers.contains(&NO_TEACHER);
        if cancelled {
            LessonStatus::Cancelled
        } else if code.eq_ignore_ascii_case(CODE_IRREGULAR) {
            LessonStatus::Substituted
        } else {
            LessonStatus::Held
        }
    }

    /// The key two records of the same lesson share.
    pub fn key(&self) -> LessonKey {
        match self.id {
            Some(id) => LessonKey::Id(id),
            None => LessonKey::Composite {
                start: self.start,
                end: self.end,
                subject: self.subject.clone(),
                room: self.room.clone(),
            },
        }
    }
}

/// Whether a lesson takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LessonStatus {
    Held,
    Cancelled,
    /// Held, but deviating from the regular timetable (other teacher, room or subject).
    Substituted,
}

impl LessonStatus {
    /// The calendar category of lessons with this status.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Held => "Lesson",
            Self::Cancelled => "Cancelled",
            Self::Substituted => "Substitution",
        }
    }
}

/// Identity of a lesson across the personal and the class timetable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LessonKey {
    Id(u64),
    Composite {
        start: NaiveDateTime,
        end: NaiveDateTime,
        subject: String,
        room: Option<String>,
    },
}

impl LessonKey {
    /// Get a unique id for the calendar event of this lesson.
    ///
    /// Changing this function is a breaking change!
    pub fn uid(&self) -> String {
        match self {
            Self::Id(id) => format!("{id}@untis"),
            Self::Composite {
                start,
                end,
                subject,
                room,
            } => {
                static WHITESPACE: OnceLock<Regex> = OnceLock::new();
                let whitespace_regex =
                    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
                let subject = whitespace_regex.replace_all(subject, "-");
                let room = whitespace_regex.replace_all(room.as_deref().unwrap_or_default(), "-");
                format!(
                    "{}_{}_{subject}_{room}@untis",
                    start.format("%Y%m%dT%H%M"),
                    end.format("%Y%m%dT%H%M"),
                )
            }
        }
    }
}

/// A lesson ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledLesson {
    pub subject: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub room: Option<String>,
    /// Teacher names in the order the service listed the teachers.
    pub teacher_names: Vec<String>,
    pub status: LessonStatus,
    pub uid: String,
}
