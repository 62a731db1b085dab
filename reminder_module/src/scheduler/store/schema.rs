pub(super) const JOB_STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    callback TEXT NOT NULL,
    args_json TEXT NOT NULL,
    trigger_type TEXT NOT NULL,
    fire_time TEXT,
    start_time TEXT,
    recurrence TEXT,
    next_fire_time TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_fired_at TEXT,
    fire_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_jobs_next_fire_time ON jobs (next_fire_time);
"#;
