use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Bulletin, DayEntry, EventRecord, StudyPlan};

use super::schema::SCHEMA;

/// Upsert-by-id / append / scoped-query store for generated artifacts. The
/// pipeline is the only writer within one user session; cross-user
/// concurrency is not this layer's concern.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Study plan operations

    /// Upsert a plan by id, replacing its day rows wholesale.
    pub async fn save_plan(&self, plan: StudyPlan) -> Result<()> {
        let refs_json: Vec<String> = plan
            .days
            .iter()
            .map(|d| serde_json::to_string(&d.supporting_refs))
            .collect::<std::result::Result<_, _>>()?;

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO plans (id, user_id, title, speaker, created_at, audio_duration_secs, is_completed)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                       ON CONFLICT(id) DO UPDATE SET
                           title = excluded.title,
                           speaker = excluded.speaker,
                           audio_duration_secs = excluded.audio_duration_secs,
                           is_completed = excluded.is_completed"#,
                    params![
                        plan.id.to_string(),
                        plan.user_id,
                        plan.title,
                        plan.speaker,
                        plan.created_at.to_rfc3339(),
                        plan.audio_duration_secs,
                        plan.is_completed,
                    ],
                )?;

                tx.execute(
                    "DELETE FROM plan_days WHERE plan_id = ?1",
                    params![plan.id.to_string()],
                )?;

                for (day, refs) in plan.days.iter().zip(refs_json) {
                    tx.execute(
                        r#"INSERT INTO plan_days (plan_id, day_number, topic, scripture, supporting_refs, body, reflection, prayer, is_completed)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                        params![
                            plan.id.to_string(),
                            day.day_number,
                            day.topic,
                            day.scripture,
                            refs,
                            day.body,
                            day.reflection,
                            day.prayer,
                            day.is_completed,
                        ],
                    )?;
                }

                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_plan(&self, id: Uuid) -> Result<Option<StudyPlan>> {
        let plan = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, title, speaker, created_at, audio_duration_secs, is_completed FROM plans WHERE id = ?1",
                )?;
                let mut plan = stmt
                    .query_row(params![id.to_string()], |row| Ok(plan_from_row(row)))
                    .optional()?;

                if let Some(plan) = plan.as_mut() {
                    plan.days = load_days(conn, id)?;
                }
                Ok(plan)
            })
            .await?;
        Ok(plan)
    }

    pub async fn list_plans(&self, user_id: &str) -> Result<Vec<StudyPlan>> {
        let user_id = user_id.to_string();
        let plans = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, title, speaker, created_at, audio_duration_secs, is_completed
                     FROM plans WHERE user_id = ?1 ORDER BY created_at DESC",
                )?;
                let mut plans = stmt
                    .query_map(params![user_id], |row| Ok(plan_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                for plan in plans.iter_mut() {
                    plan.days = load_days(conn, plan.id)?;
                }
                Ok(plans)
            })
            .await?;
        Ok(plans)
    }

    pub async fn set_day_completed(
        &self,
        plan_id: Uuid,
        day_number: u32,
        is_completed: bool,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE plan_days SET is_completed = ?1 WHERE plan_id = ?2 AND day_number = ?3",
                    params![is_completed, plan_id.to_string(), day_number],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Bulletin operations

    /// Upsert a bulletin by id and append its events.
    pub async fn save_bulletin(&self, bulletin: Bulletin) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO bulletins (id, user_id, scanned_at, title, summary)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(id) DO UPDATE SET
                           title = excluded.title,
                           summary = excluded.summary"#,
                    params![
                        bulletin.id.to_string(),
                        bulletin.user_id,
                        bulletin.scanned_at.to_rfc3339(),
                        bulletin.title,
                        bulletin.summary,
                    ],
                )?;

                for event in &bulletin.events {
                    tx.execute(
                        r#"INSERT OR REPLACE INTO events (id, bulletin_id, user_id, title, date, time, location, description)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                        params![
                            event.id.to_string(),
                            event.bulletin_id.to_string(),
                            event.user_id,
                            event.title,
                            event.date,
                            event.time,
                            event.location,
                            event.description,
                        ],
                    )?;
                }

                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Full event history for a user, the deduplication baseline.
    pub async fn list_events(&self, user_id: &str) -> Result<Vec<EventRecord>> {
        let user_id = user_id.to_string();
        let events = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, bulletin_id, user_id, title, date, time, location, description
                     FROM events WHERE user_id = ?1 ORDER BY date, time",
                )?;
                let events = stmt
                    .query_map(params![user_id], |row| Ok(event_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await?;
        Ok(events)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<EventRecord>> {
        let event = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, bulletin_id, user_id, title, date, time, location, description
                     FROM events WHERE id = ?1",
                )?;
                let event = stmt
                    .query_row(params![id.to_string()], |row| Ok(event_from_row(row)))
                    .optional()?;
                Ok(event)
            })
            .await?;
        Ok(event)
    }

    pub async fn delete_event(&self, id: Uuid) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM events WHERE id = ?1", params![id.to_string()])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete a bulletin record. Its events keep their own identity and
    /// stay behind, individually deletable.
    #[allow(dead_code)]
    pub async fn delete_bulletin(&self, id: Uuid) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM bulletins WHERE id = ?1",
                    params![id.to_string()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn load_days(conn: &rusqlite::Connection, plan_id: Uuid) -> rusqlite::Result<Vec<DayEntry>> {
    let mut stmt = conn.prepare(
        "SELECT day_number, topic, scripture, supporting_refs, body, reflection, prayer, is_completed
         FROM plan_days WHERE plan_id = ?1 ORDER BY day_number",
    )?;
    let days = stmt
        .query_map(params![plan_id.to_string()], |row| Ok(day_from_row(row)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(days)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn plan_from_row(row: &Row) -> StudyPlan {
    StudyPlan {
        id: parse_uuid(row.get(0).unwrap()),
        user_id: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        speaker: row.get(3).unwrap(),
        created_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        audio_duration_secs: row.get(5).unwrap(),
        is_completed: row.get::<_, i64>(6).unwrap() != 0,
        days: Vec::new(),
    }
}

fn day_from_row(row: &Row) -> DayEntry {
    DayEntry {
        day_number: row.get(0).unwrap(),
        topic: row.get(1).unwrap(),
        scripture: row.get(2).unwrap(),
        supporting_refs: row
            .get::<_, String>(3)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        body: row.get(4).unwrap(),
        reflection: row.get(5).unwrap(),
        prayer: row.get(6).unwrap(),
        is_completed: row.get::<_, i64>(7).unwrap() != 0,
    }
}

fn event_from_row(row: &Row) -> EventRecord {
    EventRecord {
        id: parse_uuid(row.get(0).unwrap()),
        bulletin_id: parse_uuid(row.get(1).unwrap()),
        user_id: row.get(2).unwrap(),
        title: row.get(3).unwrap(),
        date: row.get(4).unwrap(),
        time: row.get(5).unwrap(),
        location: row.get(6).unwrap(),
        description: row.get(7).unwrap(),
    }
}
