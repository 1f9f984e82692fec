//! SQL schema for the Carewatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Fact tables are loaded by ingestion and only read by scoring.
CREATE TABLE IF NOT EXISTS facilities (
    facility_id      TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    state            TEXT NOT NULL,      -- two-letter code, upper case
    certified_beds   INTEGER NOT NULL,
    ownership_type   TEXT,
    overall_rating   INTEGER,
    health_rating    INTEGER,
    staffing_rating  INTEGER,
    qm_rating        INTEGER,
    special_focus    INTEGER NOT NULL DEFAULT 0,
    fine_count       INTEGER NOT NULL DEFAULT 0,
    fine_total       REAL    NOT NULL DEFAULT 0,
    staffing_hours   REAL,
    staff_turnover   REAL,
    occupancy_rate   REAL
);

CREATE TABLE IF NOT EXISTS deficiencies (
    deficiency_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    facility_id    TEXT NOT NULL REFERENCES facilities(facility_id),
    survey_date    TEXT NOT NULL,        -- YYYY-MM-DD
    citation_code  TEXT NOT NULL,
    severity       TEXT,                 -- A..L
    is_standard    INTEGER NOT NULL,
    is_complaint   INTEGER NOT NULL,
    text           TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS audit_items (
    item_id      TEXT PRIMARY KEY,
    facility_id  TEXT NOT NULL REFERENCES facilities(facility_id),
    category_id  TEXT NOT NULL,
    title        TEXT NOT NULL,
    score        REAL
);

-- Snapshots are additive history; (facility_id, calculated_at) is the
-- upsert key.
CREATE TABLE IF NOT EXISTS facility_risk_snapshots (
    facility_id        TEXT NOT NULL REFERENCES facilities(facility_id),
    calculated_at      TEXT NOT NULL,    -- RFC 3339 UTC
    model_version      TEXT NOT NULL,
    overall_score      INTEGER NOT NULL CHECK (overall_score BETWEEN 0 AND 100),
    overall_tier       TEXT NOT NULL,
    key_metrics        TEXT NOT NULL,    -- JSON
    ranked_categories  TEXT NOT NULL,    -- JSON array of focus areas
    data_as_of         TEXT,
    UNIQUE (facility_id, calculated_at)
);

CREATE TABLE IF NOT EXISTS category_scores (
    facility_id              TEXT NOT NULL REFERENCES facilities(facility_id),
    category_id              TEXT NOT NULL,
    calculated_at            TEXT NOT NULL,
    rank                     INTEGER NOT NULL,
    citation_count           INTEGER NOT NULL,
    severity_weighted_count  INTEGER NOT NULL,
    repeat_count             INTEGER NOT NULL,
    had_immediate_jeopardy   INTEGER NOT NULL,
    had_harm                 INTEGER NOT NULL,
    citation_factor          REAL NOT NULL,
    peer_factor              REAL NOT NULL,
    quality_level_factor     REAL NOT NULL,
    quality_trend_factor     REAL NOT NULL,
    staffing_factor          REAL NOT NULL,
    composite_score          REAL NOT NULL CHECK (composite_score BETWEEN 0 AND 100),
    UNIQUE (facility_id, category_id, calculated_at)
);

CREATE INDEX IF NOT EXISTS facilities_state_idx       ON facilities(state, certified_beds);
CREATE INDEX IF NOT EXISTS deficiencies_facility_idx  ON deficiencies(facility_id, survey_date);
CREATE INDEX IF NOT EXISTS deficiencies_date_idx      ON deficiencies(survey_date);
CREATE INDEX IF NOT EXISTS audit_items_facility_idx   ON audit_items(facility_id);

PRAGMA user_version = 1;
";
