//! Time normalization and calendar export. Time strings arrive as whatever
//! the model lifted off a printed bulletin ("7:00 PM", "12:30 am", "noon"),
//! so everything here degrades to a safe default instead of failing: these
//! values feed sorting and export, neither of which may crash on bad input.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::models::EventRecord;

const DEFAULT_TIME: &str = "00:00:00";

fn time_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("valid regex"))
}

/// Normalize a loose 12-hour time string to canonical `HH:MM:SS` 24-hour
/// form. `12 PM` stays 12, `12 AM` becomes 0, any other PM hour gains 12.
/// A token with no AM/PM marker is taken as already 24-hour. Anything
/// unparseable yields `00:00:00`.
pub fn normalize_time(raw: &str) -> String {
    let Some(caps) = time_token_re().captures(raw) else {
        return DEFAULT_TIME.to_string();
    };

    let hour: u32 = match caps[1].parse() {
        Ok(h) => h,
        Err(_) => return DEFAULT_TIME.to_string(),
    };
    let minute: u32 = match caps[2].parse() {
        Ok(m) => m,
        Err(_) => return DEFAULT_TIME.to_string(),
    };
    if minute > 59 {
        return DEFAULT_TIME.to_string();
    }

    let upper = raw.to_uppercase();
    let hour = if upper.contains("PM") {
        if hour == 12 {
            12
        } else {
            hour + 12
        }
    } else if upper.contains("AM") {
        if hour == 12 {
            0
        } else {
            hour
        }
    } else {
        hour
    };

    if hour > 23 {
        return DEFAULT_TIME.to_string();
    }

    format!("{:02}:{:02}:00", hour, minute)
}

/// Chronological sort key: ISO date plus normalized time.
pub fn event_sort_key(event: &EventRecord) -> String {
    format!("{}T{}", event.date, normalize_time(&event.time))
}

pub fn sort_events_chronologically(events: &mut [EventRecord]) {
    events.sort_by_key(event_sort_key);
}

/// Render a single event as an iCalendar VEVENT byte stream, suitable for
/// handing to any calendar application.
pub fn event_to_ics(event: &EventRecord) -> String {
    let date_compact: String = event.date.chars().filter(|c| c.is_ascii_digit()).collect();
    let time_compact: String = normalize_time(&event.time)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ");

    let mut ics = String::new();
    ics.push_str("BEGIN:VCALENDAR\r\n");
    ics.push_str("VERSION:2.0\r\n");
    ics.push_str("PRODID:-//sermon-scribe//EN\r\n");
    ics.push_str("BEGIN:VEVENT\r\n");
    ics.push_str(&format!("UID:{}\r\n", event.id));
    ics.push_str(&format!("DTSTAMP:{}\r\n", dtstamp));
    ics.push_str(&format!("DTSTART:{}T{}\r\n", date_compact, time_compact));
    ics.push_str(&format!("SUMMARY:{}\r\n", escape_text(&event.title)));
    ics.push_str(&format!(
        "DESCRIPTION:{}\r\n",
        escape_text(&event.description)
    ));
    ics.push_str(&format!("LOCATION:{}\r\n", escape_text(&event.location)));
    ics.push_str(&format!("URL:sermonscribe://event/{}\r\n", event.id));
    ics.push_str("END:VEVENT\r\n");
    ics.push_str("END:VCALENDAR\r\n");
    ics
}

/// RFC 5545 text escaping.
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
