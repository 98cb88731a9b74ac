pub const SCHEMA: &str = r#"
-- study plans
CREATE TABLE IF NOT EXISTS plans (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    speaker TEXT,
    created_at TEXT NOT NULL,
    audio_duration_secs INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_plans_user_id ON plans(user_id);

-- one row per study day, replaced wholesale on plan upsert
CREATE TABLE IF NOT EXISTS plan_days (
    plan_id TEXT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
    day_number INTEGER NOT NULL,
    topic TEXT NOT NULL,
    scripture TEXT NOT NULL,
    supporting_refs TEXT NOT NULL DEFAULT '[]',
    body TEXT NOT NULL,
    reflection TEXT NOT NULL,
    prayer TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (plan_id, day_number)
);

-- scanned bulletins
CREATE TABLE IF NOT EXISTS bulletins (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    scanned_at TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_bulletins_user_id ON bulletins(user_id);

-- events are NOT cascaded from bulletins: an event keeps its identity and
-- remains individually deletable after its parent bulletin is gone
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    bulletin_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    date TEXT NOT NULL,
    time TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_events_user_id ON events(user_id);
CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
"#;
