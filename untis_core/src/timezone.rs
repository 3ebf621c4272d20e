//! The `VTIMEZONE` component the local lesson times refer to.

use chrono::{Duration, NaiveDateTime, Offset, TimeZone};
use chrono_tz::{OffsetComponents, OffsetName, Tz};
use ical::{generator::Property, ical_property};

type TzOffset = <Tz as TimeZone>::Offset;

static LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Whether an observance is standard or daylight saving time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservanceKind {
    Standard,
    Daylight,
}

impl ObservanceKind {
    pub fn component_name(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
        }
    }
}

/// One `STANDARD` or `DAYLIGHT` sub-component.
#[derive(Debug, Clone)]
pub struct Observance {
    pub kind: ObservanceKind,
    pub properties: Vec<Property>,
}

/// Definition of a time zone for a span of time.
#[derive(Debug, Clone)]
pub struct TimeZoneDefinition {
    pub properties: Vec<Property>,
    pub observances: Vec<Observance>,
}

impl TimeZoneDefinition {
    /// Describe `timezone` between the UTC instants `from` and `to`.
    ///
    /// The first observance starts at `from`, every offset change after it adds another.
    pub fn new(timezone: Tz, from: NaiveDateTime, to: NaiveDateTime) -> Self {
        let mut offset = timezone.offset_from_utc_datetime(&from);
        let mut observances = vec![observance(&offset, &offset, from)];
        let mut at = from;
        while at < to {
            let next = at + Duration::hours(1);
            let next_offset = timezone.offset_from_utc_datetime(&next);
            if !same_offset(&offset, &next_offset) {
                let change = find_change(timezone, &offset, at, next);
                let new_offset = timezone.offset_from_utc_datetime(&change);
                observances.push(observance(&offset, &new_offset, change));
                offset = new_offset;
            }
            at = next;
        }
        Self {
            properties: vec![ical_property!("TZID", String::from(timezone.name()))],
            observances,
        }
    }
}

/// The first instant in `(before, after]` whose offset differs from `offset`.
fn find_change(
    timezone: Tz,
    offset: &TzOffset,
    mut before: NaiveDateTime,
    mut after: NaiveDateTime,
) -> NaiveDateTime {
    while after - before > Duration::seconds(1) {
        let middle = before + (after - before) / 2;
        if same_offset(offset, &timezone.offset_from_utc_datetime(&middle)) {
            before = middle;
        } else {
            after = middle;
        }
    }
    after
}

fn same_offset(a: &TzOffset, b: &TzOffset) -> bool {
    a.fix() == b.fix() && a.dst_offset() == b.dst_offset()
}

/// The observance starting at the UTC instant `start`, when `from` is replaced by `to`.
fn observance(from: &TzOffset, to: &TzOffset, start: NaiveDateTime) -> Observance {
    let kind = if to.dst_offset().is_zero() {
        ObservanceKind::Standard
    } else {
        ObservanceKind::Daylight
    };
    // DTSTART is given in the local time in effect before the change
    let local_start = start + Duration::seconds(i64::from(from.fix().local_minus_utc()));
    Observance {
        kind,
        properties: vec![
            ical_property!("DTSTART", local_start.format(LOCAL_FORMAT).to_string()),
            ical_property!("TZOFFSETFROM", utc_offset(from.fix().local_minus_utc())),
            ical_property!("TZOFFSETTO", utc_offset(to.fix().local_minus_utc())),
            ical_property!("TZNAME", String::from(to.abbreviation())),
        ],
    }
}

/// Format an offset in seconds as `+HHMM`, or `+HHMMSS` if it has seconds.
fn utc_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    let (hours, minutes, rest) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    if rest == 0 {
        format!("{sign}{hours:02}{minutes:02}")
    } else {
        format!("{sign}{hours:02}{minutes:02}{rest:02}")
    }
}
