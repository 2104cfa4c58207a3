//! SQL schema for the Vigil SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id      TEXT PRIMARY KEY,
    display_name    TEXT NOT NULL,
    code            TEXT UNIQUE,     -- 6-char share code, assigned on demand
    cadence_days    INTEGER NOT NULL DEFAULT 1,
    last_check_in   TEXT,            -- ISO 8601 UTC; NULL = never checked in
    streak          INTEGER NOT NULL DEFAULT 0,
    total_check_ins INTEGER NOT NULL DEFAULT 0,
    watchers_count  INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS squad_members (
    member_id  TEXT PRIMARY KEY,
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    email      TEXT NOT NULL,        -- lowercased; unique per subject
    added_at   TEXT NOT NULL,
    UNIQUE (subject_id, email)
);

-- One row per (watcher, target) pair. The watcher side carries no foreign
-- key: a watcher may exist only as a device identifier.
CREATE TABLE IF NOT EXISTS watches (
    watch_id    TEXT PRIMARY KEY,
    watcher_id  TEXT NOT NULL,
    target_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    target_code TEXT NOT NULL,
    label       TEXT NOT NULL,
    added_at    TEXT NOT NULL,
    UNIQUE (watcher_id, target_id)
);

-- Check-in audit trail; strictly append-only.
CREATE TABLE IF NOT EXISTS check_in_events (
    event_id        TEXT PRIMARY KEY,
    subject_id      TEXT NOT NULL,
    checked_in_at   TEXT NOT NULL,
    streak          INTEGER NOT NULL,
    total_check_ins INTEGER NOT NULL
);

-- Alert idempotency ledger. The primary key on alert_key is the sole guard
-- against re-notifying for the same overdue episode; rows are only ever
-- inserted (OR IGNORE) and only deleted by the account-deletion cascade.
CREATE TABLE IF NOT EXISTS missed_check_in_alerts (
    alert_key     TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL,
    display_name  TEXT NOT NULL,
    last_check_in TEXT NOT NULL,
    notified      TEXT NOT NULL DEFAULT '[]',  -- JSON array of emails
    overdue_ms    INTEGER NOT NULL,
    cadence_days  INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS squad_subject_idx   ON squad_members(subject_id);
CREATE INDEX IF NOT EXISTS watches_watcher_idx ON watches(watcher_id);
CREATE INDEX IF NOT EXISTS watches_target_idx  ON watches(target_id);
CREATE INDEX IF NOT EXISTS events_subject_idx  ON check_in_events(subject_id);
CREATE INDEX IF NOT EXISTS alerts_subject_idx  ON missed_check_in_alerts(subject_id);

PRAGMA user_version = 1;
";
