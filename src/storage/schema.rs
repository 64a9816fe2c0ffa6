//! Database schema definitions for AthleTest.
//!
//! T008: Define database schema SQL

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Subtypes table (named test groupings within a category)
CREATE TABLE IF NOT EXISTS subtypes (
    id TEXT PRIMARY KEY,
    test_type TEXT NOT NULL,
    subtype_name TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subtypes_type ON subtypes(test_type, is_deleted);

-- Test definitions table
CREATE TABLE IF NOT EXISTS tests (
    id TEXT PRIMARY KEY,
    subtype_id TEXT NOT NULL REFERENCES subtypes(id),
    test_name TEXT NOT NULL,
    metric TEXT NOT NULL,
    direction TEXT NOT NULL,
    media TEXT,
    description TEXT,
    table_description TEXT,
    references_json TEXT,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tests_subtype ON tests(subtype_id, is_deleted);
CREATE INDEX IF NOT EXISTS idx_tests_name ON tests(test_name);

-- Reference curves table (one lookup table per test and gender)
CREATE TABLE IF NOT EXISTS reference_curves (
    id TEXT PRIMARY KEY,
    test_name TEXT NOT NULL,
    gender TEXT NOT NULL,
    unit TEXT NOT NULL,
    direction TEXT NOT NULL,
    values_json TEXT NOT NULL,
    points_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(test_name, gender)
);

-- User test results table
CREATE TABLE IF NOT EXISTS user_test_results (
    id TEXT PRIMARY KEY,
    subtype_id TEXT NOT NULL REFERENCES subtypes(id),
    test_id TEXT NOT NULL REFERENCES tests(id),
    user_id TEXT NOT NULL,
    controller_id TEXT,
    value REAL NOT NULL,
    metric TEXT NOT NULL,
    point REAL NOT NULL,
    level TEXT NOT NULL,
    executed_at TEXT NOT NULL,
    is_public INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER NOT NULL DEFAULT 0,
    is_confirmed INTEGER NOT NULL DEFAULT 0,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_results_test ON user_test_results(test_id, is_verified, is_deleted, executed_at);
CREATE INDEX IF NOT EXISTS idx_results_user ON user_test_results(user_id, is_deleted);

-- Result snapshots table (one overwritten rollup per user and category)
CREATE TABLE IF NOT EXISTS result_snapshots (
    id TEXT PRIMARY KEY,
    test_type TEXT NOT NULL,
    user_id TEXT NOT NULL,
    avg_point REAL NOT NULL,
    level TEXT NOT NULL,
    entries_json TEXT NOT NULL,
    verified_at TEXT NOT NULL,
    UNIQUE(user_id, test_type)
);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;
