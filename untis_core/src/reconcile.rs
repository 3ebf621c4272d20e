//! Merging the personal and the class timetable into the lessons of the feed.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::{
    lesson::{LessonKey, RawLesson, ReconciledLesson, NO_TEACHER},
    names::{NameResolver, TeacherDirectory},
    source::ClassTimetable,
    window::DateWindow,
};

/// Turns raw lessons into the ordered, deduplicated lessons of a feed.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    resolver: NameResolver,
    teachers_from_class: bool,
}

impl Reconciler {
    pub fn new(resolver: NameResolver) -> Self {
        Self {
            resolver,
            teachers_from_class: false,
        }
    }

    /// Take the teachers of a personal lesson without any from the matching class lesson.
    pub fn with_teachers_from_class(mut self, teachers_from_class: bool) -> Self {
        self.teachers_from_class = teachers_from_class;
        self
    }

    /// Reconcile the lessons of `window`.
    ///
    /// A personal lesson always wins over the class lesson with the same key. Class lessons
    /// only fill days the personal timetable has no lesson on.
    pub fn reconcile(
        &self,
        window: &DateWindow,
        personal: Vec<RawLesson>,
        class: ClassTimetable,
        live_directory: Option<&TeacherDirectory>,
    ) -> Vec<ReconciledLesson> {
        let lessons: Vec<RawLesson> = self
            .merge(personal, class)
            .into_iter()
            .filter(|lesson| {
                let inside = window.contains(&lesson.start);
                if !inside {
                    debug!(subject = %lesson.subject, start = %lesson.start, "lesson outside of window");
                }
                inside
            })
            .collect();
        let labels: TeacherDirectory = lessons
            .iter()
            .flat_map(|lesson| lesson.teacher_labels.iter())
            .map(|(id, name)| (id, String::from(name)))
            .collect();
        let directory = self.resolver.resolve(
            lessons.iter().flat_map(|lesson| lesson.teachers.iter()),
            live_directory,
            Some(&labels),
        );
        let mut reconciled: Vec<ReconciledLesson> = lessons
            .into_iter()
            .map(|lesson| reconciled_lesson(lesson, &directory))
            .collect();
        reconciled.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.subject.cmp(&b.subject))
                .then_with(|| a.uid.cmp(&b.uid))
        });
        let mut uids = HashSet::new();
        reconciled.retain(|lesson| uids.insert(lesson.uid.clone()));
        reconciled
    }

    /// Merge both timetables, keyed by [`LessonKey`].
    ///
    /// Lessons without a duration are dropped before they can claim their key.
    fn merge(&self, personal: Vec<RawLesson>, class: ClassTimetable) -> Vec<RawLesson> {
        let mut merged: Vec<RawLesson> = Vec::with_capacity(personal.len());
        let mut positions: HashMap<LessonKey, usize> = HashMap::new();
        for lesson in personal.into_iter().filter(has_duration) {
            let key = lesson.key();
            if positions.contains_key(&key) {
                debug!(uid = %key.uid(), "duplicate lesson in personal timetable");
                continue;
            }
            positions.insert(key, merged.len());
            merged.push(lesson);
        }
        let ClassTimetable::Available(class_lessons) = class else {
            return merged;
        };
        let covered_days: HashSet<NaiveDate> =
            merged.iter().map(|lesson| lesson.start.date()).collect();
        for lesson in class_lessons.into_iter().filter(has_duration) {
            let key = lesson.key();
            if let Some(&position) = positions.get(&key) {
                let own = &mut merged[position];
                if self.teachers_from_class && own.teachers.is_empty() {
                    own.teachers = lesson.teachers;
                    own.teacher_labels = lesson.teacher_labels;
                }
                continue;
            }
            if covered_days.contains(&lesson.start.date()) {
                continue;
            }
            positions.insert(key, merged.len());
            merged.push(lesson);
        }
        merged
    }
}

fn has_duration(lesson: &RawLesson) -> bool {
    let valid = lesson.start < lesson.end;
    if !valid {
        debug!(subject = %lesson.subject, start = %lesson.start, "lesson without duration");
    }
    valid
}

/// `directory` covers every teacher of `lesson`.
fn reconciled_lesson(lesson: RawLesson, directory: &TeacherDirectory) -> ReconciledLesson {
    let status = lesson.status();
    let uid = lesson.key().uid();
    let teacher_names = lesson
        .teachers
        .iter()
        .filter(|id| **id != NO_TEACHER)
        .filter_map(|id| directory.get(*id))
        .map(String::from)
        .collect();
    ReconciledLesson {
        subject: lesson.subject,
        start: lesson.start,
        end: lesson.end,
        room: lesson.room,
        teacher_names,
        status,
        uid,
    }
}
