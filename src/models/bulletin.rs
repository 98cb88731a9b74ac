use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scanned church bulletin: a summary plus whatever datable events the
/// model could lift out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bulletin {
    pub id: Uuid,
    pub user_id: String,
    pub scanned_at: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub events: Vec<EventRecord>,
}

/// One calendar-worthy event lifted from a bulletin. The id is assigned at
/// record-assembly time and outlives the bulletin that introduced it, so an
/// event can be deleted on its own even after its parent bulletin is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub bulletin_id: Uuid,
    pub user_id: String,
    pub title: String,
    /// ISO calendar date, `yyyy-mm-dd`.
    pub date: String,
    /// Free-text time as printed in the bulletin, e.g. "7:00 PM".
    pub time: String,
    pub location: String,
    pub description: String,
}
