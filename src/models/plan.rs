use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated multi-day devotional study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlan {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub speaker: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Length of the source recording in seconds, 0 if not audio-derived.
    pub audio_duration_secs: u32,
    pub is_completed: bool,
    pub days: Vec<DayEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayEntry {
    /// Contiguous from 1.
    pub day_number: u32,
    pub topic: String,
    pub scripture: String,
    pub supporting_refs: Vec<String>,
    pub body: String,
    pub reflection: String,
    pub prayer: String,
    pub is_completed: bool,
}
