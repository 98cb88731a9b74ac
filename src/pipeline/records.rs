//! Record assembly: stamps identity, ownership, and timestamps onto
//! validated generation output, and filters bulletin events that collide
//! with history. Nothing the model returned is trusted for any of these
//! fields.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::ai::{ParsedBulletin, ParsedPlan};
use crate::models::{Bulletin, DayEntry, EventRecord, StudyPlan};
use crate::session::UserSession;

/// Turn a validated plan payload into an owned domain record. Days are
/// renumbered contiguously from 1, supporting references are capped, and
/// every completion flag starts false no matter what the model said.
pub fn assemble_study_plan(
    parsed: ParsedPlan,
    session: &UserSession,
    audio_duration_secs: u32,
) -> StudyPlan {
    let max_refs = session.settings.capped_refs() as usize;

    let days = parsed
        .days
        .into_iter()
        .enumerate()
        .map(|(idx, day)| {
            let mut supporting_refs = day.supporting_refs;
            supporting_refs.truncate(max_refs);
            DayEntry {
                day_number: idx as u32 + 1,
                topic: day.topic,
                scripture: day.scripture,
                supporting_refs,
                body: day.body,
                reflection: day.reflection,
                prayer: day.prayer,
                is_completed: false,
            }
        })
        .collect();

    let title = if parsed.title.trim().is_empty() {
        "Untitled Study".to_string()
    } else {
        parsed.title
    };

    StudyPlan {
        id: Uuid::new_v4(),
        user_id: session.user_id.clone(),
        title,
        speaker: parsed.speaker.filter(|s| !s.trim().is_empty()),
        created_at: Utc::now(),
        audio_duration_secs,
        is_completed: false,
        days,
    }
}

/// Turn a validated bulletin payload into an owned domain record. Events
/// with no usable title or date are dropped here; they can never be
/// deduplicated or exported.
pub fn assemble_bulletin(parsed: ParsedBulletin, session: &UserSession) -> Bulletin {
    let bulletin_id = Uuid::new_v4();

    let events = parsed
        .events
        .into_iter()
        .filter(|e| !e.title.trim().is_empty() && !e.date.trim().is_empty())
        .map(|e| EventRecord {
            id: Uuid::new_v4(),
            bulletin_id,
            user_id: session.user_id.clone(),
            title: e.title,
            date: e.date,
            time: e.time,
            location: e.location,
            description: e.description,
        })
        .collect();

    let title = if parsed.title.trim().is_empty() {
        "Church Bulletin".to_string()
    } else {
        parsed.title
    };

    Bulletin {
        id: bulletin_id,
        user_id: session.user_id.clone(),
        scanned_at: Utc::now(),
        title,
        summary: parsed.summary,
        events,
    }
}

/// Dedup key: case-insensitively-trimmed title plus the exact date string.
/// Deliberately exact-match only; near-duplicates both surviving beats two
/// distinct events being merged.
fn dedup_key(title: &str, date: &str) -> (String, String) {
    (title.trim().to_lowercase(), date.to_string())
}

/// Drop candidates that collide with any previously stored event (across
/// all bulletins ever ingested). Also collapses collisions within the
/// batch itself, keeping the first occurrence.
pub fn filter_new_events(
    candidates: Vec<EventRecord>,
    prior: &[EventRecord],
) -> Vec<EventRecord> {
    let mut seen: HashSet<(String, String)> = prior
        .iter()
        .map(|e| dedup_key(&e.title, &e.date))
        .collect();

    candidates
        .into_iter()
        .filter(|candidate| {
            let key = dedup_key(&candidate.title, &candidate.date);
            if seen.contains(&key) {
                tracing::debug!(
                    "Dropping duplicate event '{}' on {}",
                    candidate.title,
                    candidate.date
                );
                false
            } else {
                seen.insert(key);
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ParsedDay, ParsedEvent};
    use crate::models::GenerationSettings;

    fn session() -> UserSession {
        UserSession::new("u1", GenerationSettings::default())
    }

    fn parsed_day(day: u32, refs: usize) -> ParsedDay {
        ParsedDay {
            day,
            topic: format!("Topic {}", day),
            scripture: "John 3:16".to_string(),
            supporting_refs: (0..refs).map(|i| format!("Ref {}", i)).collect(),
            body: "…".to_string(),
            reflection: "…".to_string(),
            prayer: "…".to_string(),
        }
    }

    fn candidate(title: &str, date: &str) -> EventRecord {
        EventRecord {
            id: Uuid::new_v4(),
            bulletin_id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            title: title.to_string(),
            date: date.to_string(),
            time: "7:00 PM".to_string(),
            location: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn days_are_renumbered_and_never_completed() {
        // The model numbered days 0, 7, 7 — contiguity is restored here.
        let parsed = ParsedPlan {
            title: "Study".to_string(),
            speaker: None,
            days: vec![parsed_day(0, 1), parsed_day(7, 1), parsed_day(7, 1)],
        };
        let plan = assemble_study_plan(parsed, &session(), 0);

        let numbers: Vec<u32> = plan.days.iter().map(|d| d.day_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(plan.days.iter().all(|d| !d.is_completed));
        assert!(!plan.is_completed);
    }

    #[test]
    fn ownership_comes_from_the_session() {
        let parsed = ParsedPlan {
            title: "Study".to_string(),
            speaker: Some("Pastor Kim".to_string()),
            days: vec![parsed_day(1, 1)],
        };
        let plan = assemble_study_plan(parsed, &session(), 1800);
        assert_eq!(plan.user_id, "u1");
        assert_eq!(plan.audio_duration_secs, 1800);
    }

    #[test]
    fn oversupplied_refs_are_capped() {
        let parsed = ParsedPlan {
            title: "Study".to_string(),
            speaker: None,
            days: vec![parsed_day(1, 12)],
        };
        let plan = assemble_study_plan(parsed, &session(), 0);
        assert_eq!(
            plan.days[0].supporting_refs.len(),
            session().settings.capped_refs() as usize
        );
    }

    #[test]
    fn blank_title_gets_a_default() {
        let parsed = ParsedPlan {
            title: "  ".to_string(),
            speaker: Some("".to_string()),
            days: vec![parsed_day(1, 1)],
        };
        let plan = assemble_study_plan(parsed, &session(), 0);
        assert_eq!(plan.title, "Untitled Study");
        assert!(plan.speaker.is_none());
    }

    #[test]
    fn undated_events_are_dropped_at_assembly() {
        let parsed = ParsedBulletin {
            title: "This Week".to_string(),
            summary: "Announcements".to_string(),
            events: vec![
                ParsedEvent {
                    title: "Fall Picnic".to_string(),
                    date: "2024-10-05".to_string(),
                    time: "12:00 PM".to_string(),
                    location: String::new(),
                    description: String::new(),
                },
                ParsedEvent {
                    title: "Sometime soon".to_string(),
                    date: "".to_string(),
                    time: String::new(),
                    location: String::new(),
                    description: String::new(),
                },
            ],
        };
        let bulletin = assemble_bulletin(parsed, &session());
        assert_eq!(bulletin.events.len(), 1);
        assert_eq!(bulletin.events[0].bulletin_id, bulletin.id);
    }

    #[test]
    fn dedup_is_case_insensitive_on_title_exact_on_date() {
        let prior = vec![candidate("Fall Picnic", "2024-10-05")];
        let incoming = vec![
            candidate("  fall picnic ", "2024-10-05"), // same title, same date
            candidate("Fall Picnic", "2024-10-12"),    // same title, later date
            candidate("Harvest Dinner", "2024-10-05"), // same date, other title
        ];
        let kept = filter_new_events(incoming, &prior);
        let titles: Vec<_> = kept.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Fall Picnic", "Harvest Dinner"]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let batch = vec![
            candidate("Fall Picnic", "2024-10-05"),
            candidate("Harvest Dinner", "2024-10-05"),
        ];
        let first = filter_new_events(batch.clone(), &[]);
        assert_eq!(first.len(), 2);

        // Same bulletin ingested again: zero net new events.
        let second = filter_new_events(batch, &first);
        assert!(second.is_empty());
    }

    #[test]
    fn within_batch_collisions_keep_first() {
        let batch = vec![
            candidate("Fall Picnic", "2024-10-05"),
            candidate("FALL PICNIC", "2024-10-05"),
        ];
        let kept = filter_new_events(batch, &[]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Fall Picnic");
    }
}
