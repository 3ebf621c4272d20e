//! This crate turns a WebUntis timetable into an iCalendar feed.
//!
//! The personal timetable of the configured account is fetched, optionally merged with the
//! timetable of a class, classified into held, cancelled and substituted lessons and serialized
//! as one event per lesson.

pub use chrono_tz;
pub use ical;

pub mod calendar;
pub mod config;
pub mod error;
pub mod feed;
pub mod lesson;
pub mod names;
pub mod reconcile;
pub mod source;
pub mod timezone;
pub mod webuntis;
pub mod window;

pub use config::Config;
pub use error::{FeedError, FeedResult};
pub use feed::{build_calendar, reconcile_and_serialize, FeedSettings, CONTENT_TYPE};
pub use source::{ClassTimetable, LessonSource, TimetableTarget};
pub use webuntis::WebUntisClient;
pub use window::DateWindow;
