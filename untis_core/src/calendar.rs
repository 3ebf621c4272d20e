//! Building the iCalendar document from reconciled lessons.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, Property},
    ical_param, ical_property,
};

use crate::{
    lesson::{LessonStatus, ReconciledLesson},
    timezone::TimeZoneDefinition,
};

static PROD_ID: &str = "-//Untis ICS Bridge//";
static CALENDAR_NAME: &str = "School Timetable";
static REFRESH_INTERVAL: &str = "PT1H";
static LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
static UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

static CANCELLED_PREFIX: &str = "CANCELLED: ";
static COLOR_HELD: &str = "#1976d2";
static COLOR_SUBSTITUTED: &str = "#f57c00";
static COLOR_CANCELLED: &str = "#9e9e9e";

/// Longest content line in octets, without the line break.
const MAX_LINE_OCTETS: usize = 75;

/// Document level data of a feed.
#[derive(Debug, Clone)]
pub struct CalendarMeta {
    /// Identifier of the document, stable across regenerations.
    pub uid: String,
    /// Time zone the lesson times are given in.
    pub timezone: Tz,
    /// When the document was generated; also used as the stamp of every event.
    pub generated_at: DateTime<Utc>,
}

/// A calendar together with the definition of the time zone its events refer to.
#[derive(Debug, Clone)]
pub struct CalendarDocument {
    pub calendar: IcalCalendar,
    pub timezone: TimeZoneDefinition,
}

impl CalendarDocument {
    /// Serialize with CRLF line breaks, folding lines longer than 75 octets.
    pub fn serialize(&self) -> String {
        let mut writer = ContentWriter::default();
        writer.begin("VCALENDAR");
        writer.properties(&self.calendar.properties);
        writer.begin("VTIMEZONE");
        writer.properties(&self.timezone.properties);
        for observance in &self.timezone.observances {
            writer.begin(observance.kind.component_name());
            writer.properties(&observance.properties);
            writer.end(observance.kind.component_name());
        }
        writer.end("VTIMEZONE");
        for event in &self.calendar.events {
            writer.begin("VEVENT");
            writer.properties(&event.properties);
            writer.end("VEVENT");
        }
        writer.end("VCALENDAR");
        writer.0
    }
}

/// Build the document of `lessons`, with a time zone definition covering all of them.
pub fn get_document(lessons: &[ReconciledLesson], meta: &CalendarMeta) -> CalendarDocument {
    let generated_at = meta.generated_at.naive_utc();
    // local times are at most a day away from UTC
    let from = lessons
        .iter()
        .map(|lesson| lesson.start)
        .min()
        .unwrap_or(generated_at)
        - Duration::days(1);
    let to = lessons
        .iter()
        .map(|lesson| lesson.end)
        .max()
        .unwrap_or(generated_at)
        + Duration::days(1);
    CalendarDocument {
        calendar: get_calendar(lessons, meta),
        timezone: TimeZoneDefinition::new(meta.timezone, from, to),
    }
}

/// Build the calendar with one event per lesson, in the order given.
pub fn get_calendar(lessons: &[ReconciledLesson], meta: &CalendarMeta) -> IcalCalendar {
    let generated_at = meta.generated_at.format(UTC_FORMAT).to_string();
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(PROD_ID)
        .build();
    calendar.properties.extend([
        ical_property!("UID", escape_text(&meta.uid)),
        ical_property!("LAST-MODIFIED", generated_at.clone()),
        ical_property!("NAME", String::from(CALENDAR_NAME)),
        ical_property!("X-WR-CALNAME", String::from(CALENDAR_NAME)),
        ical_property!("X-WR-TIMEZONE", String::from(meta.timezone.name())),
        ical_property!(
            "REFRESH-INTERVAL",
            String::from(REFRESH_INTERVAL),
            ical_param!("VALUE", "DURATION")
        ),
        ical_property!("X-PUBLISHED-TTL", String::from(REFRESH_INTERVAL)),
    ]);
    for lesson in lessons {
        calendar
            .events
            .push(get_event(lesson, meta.timezone, &generated_at));
    }
    calendar
}

/// Build the event of a single lesson.
fn get_event(lesson: &ReconciledLesson, timezone: Tz, stamp: &str) -> IcalEvent {
    let mut event = IcalEvent::new();
    let summary = match lesson.status {
        LessonStatus::Cancelled => format!("{CANCELLED_PREFIX}{}", lesson.subject),
        LessonStatus::Held | LessonStatus::Substituted => lesson.subject.clone(),
    };
    let (status, color) = match lesson.status {
        LessonStatus::Held => ("CONFIRMED", COLOR_HELD),
        LessonStatus::Substituted => ("CONFIRMED", COLOR_SUBSTITUTED),
        LessonStatus::Cancelled => ("CANCELLED", COLOR_CANCELLED),
    };
    event.properties.extend([
        ical_property!("UID", escape_text(&lesson.uid)),
        ical_property!("DTSTAMP", String::from(stamp)),
        local_time_property("DTSTART", &lesson.start, timezone),
        local_time_property("DTEND", &lesson.end, timezone),
        ical_property!("SUMMARY", escape_text(&summary)),
    ]);
    if let Some(room) = &lesson.room {
        event
            .properties
            .push(ical_property!("LOCATION", escape_text(room)));
    }
    event.properties.extend([
        ical_property!("DESCRIPTION", escape_text(&description(lesson))),
        ical_property!("STATUS", String::from(status)),
        ical_property!("CATEGORIES", String::from(lesson.status.category())),
        ical_property!("X-GOOGLE-CALENDAR-COLOR", String::from(color)),
    ]);
    event
}

fn local_time_property(name: &str, date_time: &NaiveDateTime, timezone: Tz) -> Property {
    Property {
        name: String::from(name),
        params: Some(vec![ical_param!("TZID", timezone.name())]),
        value: Some(date_time.format(LOCAL_FORMAT).to_string()),
    }
}

/// The human readable details of a lesson.
fn description(lesson: &ReconciledLesson) -> String {
    let teachers = if lesson.teacher_names.is_empty() {
        String::from("n/a")
    } else {
        lesson.teacher_names.join(", ")
    };
    let mut description = format!(
        "Subject: {}\nTeachers: {}\nRoom: {}",
        lesson.subject,
        teachers,
        lesson.room.as_deref().unwrap_or("n/a")
    );
    match lesson.status {
        LessonStatus::Substituted => description.push_str("\nSubstitution"),
        LessonStatus::Cancelled => description.push_str("\nCancelled"),
        LessonStatus::Held => {}
    }
    description
}

/// Writes content lines.
#[derive(Debug, Default)]
struct ContentWriter(String);

impl ContentWriter {
    fn begin(&mut self, component: &str) {
        self.line(&format!("BEGIN:{component}"));
    }

    fn end(&mut self, component: &str) {
        self.line(&format!("END:{component}"));
    }

    fn properties(&mut self, properties: &[Property]) {
        for property in properties {
            let mut line = property.name.clone();
            for (name, values) in property.params.iter().flatten() {
                let values: Vec<String> = values.iter().map(|value| param_value(value)).collect();
                line.push_str(&format!(";{name}={}", values.join(",")));
            }
            line.push(':');
            line.push_str(property.value.as_deref().unwrap_or_default());
            self.line(&line);
        }
    }

    /// Append `line`, folded so no physical line exceeds [`MAX_LINE_OCTETS`].
    ///
    /// Folds never split a character.
    fn line(&mut self, line: &str) {
        let mut width = 0;
        for c in line.chars() {
            if width + c.len_utf8() > MAX_LINE_OCTETS {
                self.0.push_str("\r\n ");
                width = 1;
            }
            self.0.push(c);
            width += c.len_utf8();
        }
        self.0.push_str("\r\n");
    }
}

/// Quote a parameter value containing a separator. Quotes themselves are not allowed.
fn param_value(value: &str) -> String {
    let value = value.replace('"', "");
    if value.contains(&[':', ';', ','][..]) {
        format!("\"{value}\"")
    } else {
        value
    }
}

/// Escape a TEXT value: backslashes, semicolons, commas and line breaks.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
