//! SQL schema for the funnel SQLite store.
//!
//! Descriptive metadata lives in a JSON column; only the fields that are
//! filtered, grouped or joined on get their own column.

/// Applied on every open; each statement is a no-op once the table exists.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS events (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    event        TEXT NOT NULL,   -- 'page_visit' | 'button_click' | 'registration' | ...
    timestamp    TEXT NOT NULL,   -- RFC 3339 UTC, fixed width so it sorts as text
    page         TEXT,
    visitor_id   TEXT,
    variant      TEXT,
    referred_by  INTEGER,         -- registrations(id), not enforced
    details_json TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS registrations (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    email        TEXT NOT NULL,
    timestamp    TEXT NOT NULL,
    visitor_id   TEXT,
    variant      TEXT,
    referred_by  INTEGER,
    country      TEXT,
    details_json TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE (email, timestamp)
);

CREATE TABLE IF NOT EXISTS waitlist (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    email        TEXT NOT NULL UNIQUE,
    timestamp    TEXT NOT NULL,
    details_json TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS events_event_idx        ON events(event);
CREATE INDEX IF NOT EXISTS events_timestamp_idx    ON events(timestamp);
CREATE INDEX IF NOT EXISTS events_referred_idx     ON events(referred_by);
CREATE INDEX IF NOT EXISTS registrations_ts_idx    ON registrations(timestamp);
CREATE INDEX IF NOT EXISTS registrations_ref_idx   ON registrations(referred_by);

PRAGMA user_version = 1;
";
