//! The feed pipeline: fetch, reconcile and serialize.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::{
    calendar::{get_document, CalendarDocument, CalendarMeta},
    config::Config,
    error::FeedResult,
    names::{NameResolver, TeacherDirectory},
    reconcile::Reconciler,
    source::{ClassTimetable, LessonSource, TimetableTarget},
    window::DateWindow,
};

/// Content type of the serialized feed.
pub static CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// What shapes a feed apart from the request.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub timezone: Tz,
    /// Name of the school, part of the document identifier.
    pub school: String,
    pub teachers_from_class: bool,
    pub fallback_teachers: TeacherDirectory,
}

impl From<&Config> for FeedSettings {
    fn from(config: &Config) -> Self {
        Self {
            timezone: config.timezone,
            school: config.untis.school.clone(),
            teachers_from_class: config.teachers_from_class,
            fallback_teachers: config.fallback_teachers.clone(),
        }
    }
}

/// Build the calendar of `window`, merging in the timetable of class `klasse` if given.
///
/// Failing to fetch the personal timetable fails the feed, failing to fetch the class
/// timetable does not.
pub async fn build_calendar<S: LessonSource + ?Sized>(
    source: &S,
    settings: &FeedSettings,
    window: DateWindow,
    klasse: Option<&str>,
    generated_at: DateTime<Utc>,
) -> FeedResult<CalendarDocument> {
    let personal = source.fetch(TimetableTarget::Mine, window).await?;
    let class = match klasse {
        Some(name) => fetch_class(source, name, window).await,
        None => ClassTimetable::Unavailable,
    };
    let live_directory = source.fetch_rights_directory().await;
    let reconciler = Reconciler::new(NameResolver::new(settings.fallback_teachers.clone()))
        .with_teachers_from_class(settings.teachers_from_class);
    let lessons = reconciler.reconcile(&window, personal, class, live_directory.as_ref());
    info!(
        start = %window.start(),
        end = %window.end(),
        klasse = klasse.unwrap_or_default(),
        lessons = lessons.len(),
        "built timetable feed"
    );
    let meta = CalendarMeta {
        uid: calendar_uid(&settings.school, klasse),
        timezone: settings.timezone,
        generated_at,
    };
    Ok(get_document(&lessons, &meta))
}

/// Build the feed and serialize it to an iCalendar document.
pub async fn reconcile_and_serialize<S: LessonSource + ?Sized>(
    source: &S,
    settings: &FeedSettings,
    window: DateWindow,
    klasse: Option<&str>,
    generated_at: DateTime<Utc>,
) -> FeedResult<String> {
    let document = build_calendar(source, settings, window, klasse, generated_at).await?;
    Ok(document.serialize())
}

async fn fetch_class<S: LessonSource + ?Sized>(
    source: &S,
    name: &str,
    window: DateWindow,
) -> ClassTimetable {
    match source
        .fetch(TimetableTarget::Class(String::from(name)), window)
        .await
    {
        Ok(lessons) => ClassTimetable::Available(lessons),
        Err(err) => {
            warn!(klasse = name, error = %err, "class timetable unavailable, using personal timetable only");
            ClassTimetable::Unavailable
        }
    }
}

/// Identifier of the document, the same for every regeneration of a feed.
fn calendar_uid(school: &str, klasse: Option<&str>) -> String {
    format!("untis-{school}-{}", klasse.unwrap_or("me"))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, str::FromStr};

    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    use crate::{
        error::{FeedError, FeedResult},
        feed::{reconcile_and_serialize, FeedSettings},
        lesson::RawLesson,
        names::TeacherDirectory,
        source::{BoxFuture, LessonSource, TimetableTarget},
        window::DateWindow,
    };

    /// A timetable service answering from memory. `None` fails the fetch.
    #[derive(Default)]
    struct FakeSource {
        personal: Option<Vec<RawLesson>>,
        class: Option<Vec<RawLesson>>,
        directory: Option<TeacherDirectory>,
    }

    impl LessonSource for FakeSource {
        fn fetch(
            &self,
            target: TimetableTarget,
            _window: DateWindow,
        ) -> BoxFuture<'_, FeedResult<Vec<RawLesson>>> {
            let lessons = match &target {
                TimetableTarget::Mine => self.personal.clone(),
                TimetableTarget::Class(_) => self.class.clone(),
            };
            Box::pin(async move {
                lessons.ok_or_else(|| FeedError::Rpc {
                    method: String::from("getTimetable"),
                    code: -7004,
                    message: format!("no timetable for {target}"),
                })
            })
        }

        fn fetch_rights_directory(&self) -> BoxFuture<'_, Option<TeacherDirectory>> {
            let directory = self.directory.clone();
            Box::pin(async move { directory })
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::from_str(s).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_str("2024-01-01").unwrap(),
            NaiveDate::from_str("2024-01-08").unwrap(),
        )
        .unwrap()
    }

    fn settings() -> FeedSettings {
        FeedSettings {
            timezone: chrono_tz::Europe::Berlin,
            school: String::from("demo"),
            teachers_from_class: false,
            fallback_teachers: TeacherDirectory::from_iter([(3, String::from("J. Smith"))]),
        }
    }

    fn generated_at() -> DateTime<Utc> {
        DateTime::<Utc>::from_str("2024-01-01T06:00:00Z").unwrap()
    }

    fn personal_lessons() -> Vec<RawLesson> {
        vec![
            RawLesson::new("English", at("2024-01-02T08:50:00"), at("2024-01-02T09:35:00"))
                .with_id(2)
                .with_code("cancelled")
                .with_teachers(vec![7]),
            RawLesson::new("Maths", at("2024-01-02T08:00:00"), at("2024-01-02T08:45:00"))
                .with_id(1)
                .with_room("R101")
                .with_teachers(vec![3]),
        ]
    }

    fn unfold(generated: &str) -> String {
        generated.replace("\r\n ", "")
    }

    async fn serialize(source: &FakeSource, klasse: Option<&str>) -> FeedResult<String> {
        reconcile_and_serialize(source, &settings(), window(), klasse, generated_at()).await
    }

    #[tokio::test]
    async fn test_cancelled_and_normal_lesson() {
        let source = FakeSource {
            personal: Some(personal_lessons()),
            ..Default::default()
        };
        let generated = unfold(&serialize(&source, None).await.unwrap());
        assert_eq!(generated.matches("BEGIN:VEVENT").count(), 2);
        assert_eq!(generated.matches("STATUS:CANCELLED\r\n").count(), 1);
        assert_eq!(generated.matches("CATEGORIES:Cancelled\r\n").count(), 1);
        assert!(generated.contains("SUMMARY:CANCELLED: English\r\n"));
        assert!(generated.contains("SUMMARY:Maths\r\n"));
        assert!(generated.contains("J. Smith"));
        assert!(generated.contains("UID:untis-demo-me\r\n"));
        // ordered by start
        let maths = generated.find("UID:1@untis").unwrap();
        let english = generated.find("UID:2@untis").unwrap();
        assert!(maths < english);
    }

    #[tokio::test]
    async fn test_output_is_reproducible() {
        let source = FakeSource {
            personal: Some(personal_lessons()),
            class: Some(vec![RawLesson::new(
                "Biology",
                at("2024-01-03T08:00:00"),
                at("2024-01-03T08:45:00"),
            )]),
            ..Default::default()
        };
        let first = serialize(&source, Some("5a")).await.unwrap();
        let second = serialize(&source, Some("5a")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_uids_are_unique() {
        let mut personal = personal_lessons();
        personal.extend(personal_lessons());
        let source = FakeSource {
            personal: Some(personal),
            class: Some(personal_lessons()),
            ..Default::default()
        };
        let generated = unfold(&serialize(&source, Some("5a")).await.unwrap());
        let uids: Vec<&str> = generated
            .split("\r\n")
            .filter(|line| line.starts_with("UID:") && line.ends_with("@untis"))
            .collect();
        assert_eq!(uids.len(), 2);
        assert_eq!(uids.iter().collect::<HashSet<_>>().len(), 2);
    }

    #[tokio::test]
    async fn test_class_failure_degrades() {
        let source = FakeSource {
            personal: Some(personal_lessons()),
            class: None,
            ..Default::default()
        };
        let generated = unfold(&serialize(&source, Some("5a")).await.unwrap());
        assert_eq!(generated.matches("BEGIN:VEVENT").count(), 2);
        assert!(generated.contains("UID:untis-demo-5a\r\n"));
    }

    #[tokio::test]
    async fn test_personal_failure_is_fatal() {
        let source = FakeSource {
            personal: None,
            class: Some(personal_lessons()),
            ..Default::default()
        };
        let result = serialize(&source, Some("5a")).await;
        assert!(matches!(result, Err(FeedError::Rpc { code: -7004, .. })));
    }

    #[tokio::test]
    async fn test_non_ascii_text_is_served() {
        let source = FakeSource {
            personal: Some(vec![RawLesson::new(
                format!("{}{}", "Erdkunde ".repeat(6), "ä".repeat(12)),
                at("2024-01-02T08:00:00"),
                at("2024-01-02T08:45:00"),
            )
            .with_id(1)
            .with_teachers(vec![31, 41])]),
            ..Default::default()
        };
        let mut settings = settings();
        settings.fallback_teachers = TeacherDirectory::default_fallback();
        let generated = reconcile_and_serialize(&source, &settings, window(), None, generated_at())
            .await
            .unwrap();
        assert!(generated.split("\r\n").all(|line| line.len() <= 75));
        assert!(unfold(&generated).contains("Teachers: grä\\, höl\\n"));
    }

    #[tokio::test]
    async fn test_empty_timetables() {
        let source = FakeSource {
            personal: Some(vec![]),
            class: Some(vec![]),
            ..Default::default()
        };
        let generated = serialize(&source, Some("5a")).await.unwrap();
        assert!(generated.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(generated.ends_with("END:VCALENDAR\r\n"));
        assert!(!generated.contains("BEGIN:VEVENT"));
    }

    #[tokio::test]
    async fn test_live_directory_is_used() {
        let source = FakeSource {
            personal: Some(personal_lessons()),
            directory: Some(TeacherDirectory::from_iter([(3, String::from("Jane Smith"))])),
            ..Default::default()
        };
        let generated = unfold(&serialize(&source, None).await.unwrap());
        assert!(generated.contains("Teachers: Jane Smith\\n"));
        // teacher 7 is unknown everywhere and shown by identifier
        assert!(generated.contains("Teachers: 7\\n"));
    }
}
