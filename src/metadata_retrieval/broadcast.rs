//! Broadcast slot conversion
//!
//! MyAnimeList publishes the weekly slot in the broadcaster's timezone
//! ("Saturdays at 01:00", Asia/Tokyo). Converting it can move the slot to
//! the previous or next weekday.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use std::fmt;

/// A weekly broadcast slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSlot {
    /// Plural weekday, e.g. "Fridays"
    pub day: String,
    /// Time of day as "HH:MM"
    pub time: String,
}

impl fmt::Display for BroadcastSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.day, self.time)
    }
}

/// Converts a weekly slot from the `from` timezone into `to`
///
/// The slot is anchored at its next occurrence on or after `reference` so
/// daylight saving time is applied as it will be for the coming broadcast.
/// Returns None when the day, time or source timezone cannot be parsed.
pub fn convert_broadcast(day: &str, time: &str, from: &str, to: Tz, reference: NaiveDate) -> Option<BroadcastSlot> {
    let weekday: Weekday = day.trim().trim_end_matches('s').parse().ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
    let from: Tz = from.trim().parse().ok()?;

    let days_ahead = (weekday.num_days_from_monday() + 7 - reference.weekday().num_days_from_monday()) % 7;
    let date = reference.checked_add_days(Days::new(u64::from(days_ahead)))?;

    let local = from.from_local_datetime(&date.and_time(time)).earliest()?;
    let converted = local.with_timezone(&to);

    Some(BroadcastSlot {
        day: format!("{}s", converted.format("%A")),
        time: converted.format("%H:%M").to_string(),
    })
}
