//! Database operations using rusqlite.
//!
//! T009: Implement Database struct with connection and migration
//! T020: Implement catalog CRUD operations
//! T021: Implement result CRUD and window queries
//! T022: Implement snapshot upsert

use crate::catalog::types::{Direction, TestCategory, TestDefinition};
use crate::curves::types::{Gender, ReferenceCurve};
use crate::results::types::UserTestResult;
use crate::scoring::classifier::Level;
use crate::snapshot::types::{ResultSnapshot, SnapshotEntry};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

/// Subtype row without its test listing; services assemble the full
/// [`crate::catalog::types::Subtype`] from this plus the tests table.
#[derive(Debug, Clone)]
pub struct SubtypeRecord {
    pub id: Uuid,
    pub test_type: TestCategory,
    pub subtype_name: String,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &PathBuf) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        // Future migrations would go here:
        // if from_version < 2 { ... }

        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========== Subtype operations (T020) ==========

    /// Insert a new subtype.
    pub fn insert_subtype(&self, rec: &SubtypeRecord) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO subtypes (id, test_type, subtype_name, is_deleted, created_by,
                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rec.id.to_string(),
                    rec.test_type.as_str(),
                    rec.subtype_name,
                    rec.is_deleted as i32,
                    rec.created_by.map(|id| id.to_string()),
                    rec.created_at.to_rfc3339(),
                    rec.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a subtype by ID.
    pub fn get_subtype(&self, id: &Uuid) -> Result<Option<SubtypeRecord>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, test_type, subtype_name, is_deleted, created_by, created_at, updated_at
                 FROM subtypes WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_subtype_row);

        match result {
            Ok(row) => Ok(Some(row.into_record()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Find an active subtype by name within a category.
    pub fn find_subtype_by_name(
        &self,
        test_type: TestCategory,
        name: &str,
    ) -> Result<Option<SubtypeRecord>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, test_type, subtype_name, is_deleted, created_by, created_at, updated_at
                 FROM subtypes WHERE test_type = ?1 AND subtype_name = ?2 AND is_deleted = 0",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![test_type.as_str(), name], map_subtype_row);

        match result {
            Ok(row) => Ok(Some(row.into_record()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// List subtypes, optionally filtered by category.
    pub fn list_subtypes(
        &self,
        test_type: Option<TestCategory>,
        include_deleted: bool,
    ) -> Result<Vec<SubtypeRecord>, DatabaseError> {
        let deleted_clause = if include_deleted { "1" } else { "is_deleted = 0" };
        let sql = match test_type {
            Some(_) => format!(
                "SELECT id, test_type, subtype_name, is_deleted, created_by, created_at, updated_at
                 FROM subtypes WHERE test_type = ?1 AND {} ORDER BY subtype_name",
                deleted_clause
            ),
            None => format!(
                "SELECT id, test_type, subtype_name, is_deleted, created_by, created_at, updated_at
                 FROM subtypes WHERE {} ORDER BY test_type, subtype_name",
                deleted_clause
            ),
        };

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut records = Vec::new();
        if let Some(test_type) = test_type {
            let rows = stmt
                .query_map(params![test_type.as_str()], map_subtype_row)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            for row in rows {
                let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
                records.push(row.into_record()?);
            }
        } else {
            let rows = stmt
                .query_map([], map_subtype_row)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            for row in rows {
                let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
                records.push(row.into_record()?);
            }
        }

        Ok(records)
    }

    /// Rename a subtype.
    pub fn rename_subtype(
        &self,
        id: &Uuid,
        name: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE subtypes SET subtype_name = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), name, updated_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Subtype {}", id)));
        }

        Ok(())
    }

    /// Soft-delete a subtype.
    pub fn soft_delete_subtype(
        &self,
        id: &Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE subtypes SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), updated_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Subtype {}", id)));
        }

        Ok(())
    }

    // ========== Test definition operations (T020) ==========

    /// Insert a new test definition.
    pub fn insert_test(&self, test: &TestDefinition) -> Result<(), DatabaseError> {
        let references_json = if test.references.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&test.references)
                    .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
            )
        };

        self.conn
            .execute(
                "INSERT INTO tests (id, subtype_id, test_name, metric, direction, media,
                 description, table_description, references_json, is_deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    test.id.to_string(),
                    test.subtype_id.to_string(),
                    test.test_name,
                    test.metric,
                    test.direction.as_str(),
                    test.media,
                    test.description,
                    test.table_description,
                    references_json,
                    test.is_deleted as i32,
                    test.created_at.to_rfc3339(),
                    test.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a test definition by ID.
    pub fn get_test(&self, id: &Uuid) -> Result<Option<TestDefinition>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, subtype_id, test_name, metric, direction, media, description,
                 table_description, references_json, is_deleted, created_at, updated_at
                 FROM tests WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_test_row);

        match result {
            Ok(row) => Ok(Some(row.into_test()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Find an active test by name within a subtype.
    pub fn find_test_by_name(
        &self,
        subtype_id: &Uuid,
        name: &str,
    ) -> Result<Option<TestDefinition>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, subtype_id, test_name, metric, direction, media, description,
                 table_description, references_json, is_deleted, created_at, updated_at
                 FROM tests WHERE subtype_id = ?1 AND test_name = ?2 AND is_deleted = 0",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![subtype_id.to_string(), name], map_test_row);

        match result {
            Ok(row) => Ok(Some(row.into_test()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// List tests in a subtype.
    pub fn list_tests(
        &self,
        subtype_id: &Uuid,
        include_deleted: bool,
    ) -> Result<Vec<TestDefinition>, DatabaseError> {
        let sql = if include_deleted {
            "SELECT id, subtype_id, test_name, metric, direction, media, description,
             table_description, references_json, is_deleted, created_at, updated_at
             FROM tests WHERE subtype_id = ?1 ORDER BY test_name"
        } else {
            "SELECT id, subtype_id, test_name, metric, direction, media, description,
             table_description, references_json, is_deleted, created_at, updated_at
             FROM tests WHERE subtype_id = ?1 AND is_deleted = 0 ORDER BY test_name"
        };

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![subtype_id.to_string()], map_test_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut tests = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            tests.push(row.into_test()?);
        }

        Ok(tests)
    }

    /// Update a test's metadata. Direction is deliberately not touched here;
    /// it only changes together with its curve via [`set_test_direction`].
    ///
    /// [`set_test_direction`]: Database::set_test_direction
    pub fn update_test_metadata(&self, test: &TestDefinition) -> Result<(), DatabaseError> {
        let references_json = if test.references.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&test.references)
                    .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
            )
        };

        let rows_affected = self
            .conn
            .execute(
                "UPDATE tests SET test_name = ?2, metric = ?3, media = ?4, description = ?5,
                 table_description = ?6, references_json = ?7, updated_at = ?8 WHERE id = ?1",
                params![
                    test.id.to_string(),
                    test.test_name,
                    test.metric,
                    test.media,
                    test.description,
                    test.table_description,
                    references_json,
                    test.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Test {}", test.id)));
        }

        Ok(())
    }

    /// Re-derive a test's direction after a curve replacement.
    pub fn set_test_direction(
        &self,
        id: &Uuid,
        direction: Direction,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE tests SET direction = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), direction.as_str(), updated_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Test {}", id)));
        }

        Ok(())
    }

    /// Soft-delete a test.
    pub fn soft_delete_test(
        &self,
        id: &Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE tests SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), updated_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Test {}", id)));
        }

        Ok(())
    }

    /// Category a test belongs to, via its subtype.
    pub fn test_category(&self, test_id: &Uuid) -> Result<Option<TestCategory>, DatabaseError> {
        let result: SqliteResult<String> = self.conn.query_row(
            "SELECT s.test_type FROM tests t JOIN subtypes s ON t.subtype_id = s.id
             WHERE t.id = ?1",
            params![test_id.to_string()],
            |row| row.get(0),
        );

        match result {
            Ok(s) => Ok(TestCategory::from_str(&s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    // ========== Reference curve operations ==========

    /// Insert or replace the curve for `(test_name, gender)`.
    pub fn upsert_curve(&self, curve: &ReferenceCurve) -> Result<(), DatabaseError> {
        let values_json = serde_json::to_string(&curve.values)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let points_json = serde_json::to_string(&curve.points)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO reference_curves (id, test_name, gender, unit, direction,
                 values_json, points_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(test_name, gender) DO UPDATE SET
                 unit = excluded.unit, direction = excluded.direction,
                 values_json = excluded.values_json, points_json = excluded.points_json,
                 updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    curve.test_name,
                    curve.gender.as_str(),
                    curve.unit,
                    curve.direction.as_str(),
                    values_json,
                    points_json,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get the curve for `(test_name, gender)`.
    pub fn get_curve(
        &self,
        test_name: &str,
        gender: Gender,
    ) -> Result<Option<ReferenceCurve>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT test_name, gender, unit, direction, values_json, points_json
                 FROM reference_curves WHERE test_name = ?1 AND gender = ?2",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![test_name, gender.as_str()], |row| {
            Ok(CurveRow {
                test_name: row.get(0)?,
                gender: row.get(1)?,
                unit: row.get(2)?,
                direction: row.get(3)?,
                values_json: row.get(4)?,
                points_json: row.get(5)?,
            })
        });

        match result {
            Ok(row) => Ok(Some(row.into_curve()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    // ========== User test result operations (T021) ==========

    /// Insert a new result.
    pub fn insert_result(&self, result: &UserTestResult) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO user_test_results (id, subtype_id, test_id, user_id, controller_id,
                 value, metric, point, level, executed_at, is_public, is_verified, is_confirmed,
                 is_deleted, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    result.id.to_string(),
                    result.subtype_id.to_string(),
                    result.test_id.to_string(),
                    result.user_id.to_string(),
                    result.controller_id.map(|id| id.to_string()),
                    result.value,
                    result.metric,
                    result.point,
                    result.level.as_str(),
                    result.executed_at.to_rfc3339(),
                    result.is_public as i32,
                    result.is_verified as i32,
                    result.is_confirmed as i32,
                    result.is_deleted as i32,
                    result.created_at.to_rfc3339(),
                    result.updated_at.to_rfc3339(),
                    result.deleted_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a result by ID.
    pub fn get_result(&self, id: &Uuid) -> Result<Option<UserTestResult>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM user_test_results WHERE id = ?1",
                RESULT_COLUMNS
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_result_row);

        match result {
            Ok(row) => Ok(Some(row.into_result()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Rewrite an unverified result's measurement and derived score.
    pub fn update_result_measurement(
        &self,
        id: &Uuid,
        value: f64,
        point: f64,
        level: Level,
        executed_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE user_test_results SET value = ?2, point = ?3, level = ?4,
                 executed_at = ?5, updated_at = ?6 WHERE id = ?1",
                params![
                    id.to_string(),
                    value,
                    point,
                    level.as_str(),
                    executed_at.to_rfc3339(),
                    updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Result {}", id)));
        }

        Ok(())
    }

    /// Record the one-and-only verification decision.
    ///
    /// Conditional on `is_confirmed = 0` so that concurrent attempts cannot
    /// both get through; returns the number of rows updated (0 when the lock
    /// was already taken).
    pub fn confirm_result(
        &self,
        id: &Uuid,
        verified: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        self.conn
            .execute(
                "UPDATE user_test_results SET is_confirmed = 1, is_verified = ?2, updated_at = ?3
                 WHERE id = ?1 AND is_confirmed = 0",
                params![id.to_string(), verified as i32, updated_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// Soft-delete a result.
    pub fn soft_delete_result(
        &self,
        id: &Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE user_test_results SET is_deleted = 1, deleted_at = ?2, updated_at = ?2
                 WHERE id = ?1",
                params![id.to_string(), deleted_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Result {}", id)));
        }

        Ok(())
    }

    /// Verified, live results for a test inside `[start, end)`.
    pub fn results_for_test_in_window(
        &self,
        test_id: &Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserTestResult>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM user_test_results
                 WHERE test_id = ?1 AND is_verified = 1 AND is_deleted = 0
                 AND executed_at >= ?2 AND executed_at < ?3
                 ORDER BY executed_at DESC",
                RESULT_COLUMNS
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    test_id.to_string(),
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ],
                map_result_row,
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_results(rows)
    }

    /// Verified, live results for one user and test inside `[start, end)`.
    pub fn user_results_for_test_in_window(
        &self,
        user_id: &Uuid,
        test_id: &Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserTestResult>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM user_test_results
                 WHERE user_id = ?1 AND test_id = ?2 AND is_verified = 1 AND is_deleted = 0
                 AND executed_at >= ?3 AND executed_at < ?4
                 ORDER BY executed_at DESC",
                RESULT_COLUMNS
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    user_id.to_string(),
                    test_id.to_string(),
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ],
                map_result_row,
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_results(rows)
    }

    /// Verified, live results for one user across a category inside `[start, end)`.
    pub fn user_results_for_category_in_window(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserTestResult>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM user_test_results r
                 JOIN tests t ON r.test_id = t.id
                 JOIN subtypes s ON t.subtype_id = s.id
                 WHERE r.user_id = ?1 AND s.test_type = ?2
                 AND r.is_verified = 1 AND r.is_deleted = 0
                 AND r.executed_at >= ?3 AND r.executed_at < ?4
                 ORDER BY r.executed_at DESC",
                RESULT_COLUMNS_QUALIFIED
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    user_id.to_string(),
                    test_type.as_str(),
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ],
                map_result_row,
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_results(rows)
    }

    /// All verified, live results in a category executed before `until`.
    pub fn results_for_category_until(
        &self,
        test_type: TestCategory,
        until: DateTime<Utc>,
    ) -> Result<Vec<UserTestResult>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM user_test_results r
                 JOIN tests t ON r.test_id = t.id
                 JOIN subtypes s ON t.subtype_id = s.id
                 WHERE s.test_type = ?1 AND r.is_verified = 1 AND r.is_deleted = 0
                 AND r.executed_at < ?2
                 ORDER BY r.executed_at ASC",
                RESULT_COLUMNS_QUALIFIED
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![test_type.as_str(), until.to_rfc3339()],
                map_result_row,
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_results(rows)
    }

    /// Best verified point for a user within a subtype, if any.
    pub fn best_verified_point(
        &self,
        user_id: &Uuid,
        subtype_id: &Uuid,
    ) -> Result<Option<f64>, DatabaseError> {
        let result: SqliteResult<Option<f64>> = self.conn.query_row(
            "SELECT MAX(r.point) FROM user_test_results r
             WHERE r.user_id = ?1 AND r.subtype_id = ?2
             AND r.is_verified = 1 AND r.is_deleted = 0",
            params![user_id.to_string(), subtype_id.to_string()],
            |row| row.get(0),
        );

        match result {
            Ok(point) => Ok(point),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    // ========== Snapshot operations (T022) ==========

    /// Insert or overwrite the snapshot for `(user_id, test_type)`.
    pub fn upsert_snapshot(&self, snapshot: &ResultSnapshot) -> Result<(), DatabaseError> {
        let entries_json = serde_json::to_string(&snapshot.entries)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO result_snapshots (id, test_type, user_id, avg_point, level,
                 entries_json, verified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(user_id, test_type) DO UPDATE SET
                 avg_point = excluded.avg_point, level = excluded.level,
                 entries_json = excluded.entries_json, verified_at = excluded.verified_at",
                params![
                    snapshot.id.to_string(),
                    snapshot.test_type.as_str(),
                    snapshot.user_id.to_string(),
                    snapshot.avg_point,
                    snapshot.level.as_str(),
                    entries_json,
                    snapshot.verified_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get the snapshot for `(user_id, test_type)`.
    pub fn get_snapshot(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
    ) -> Result<Option<ResultSnapshot>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, test_type, user_id, avg_point, level, entries_json, verified_at
                 FROM result_snapshots WHERE user_id = ?1 AND test_type = ?2",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(
            params![user_id.to_string(), test_type.as_str()],
            |row| {
                Ok(SnapshotRow {
                    id: row.get(0)?,
                    test_type: row.get(1)?,
                    user_id: row.get(2)?,
                    avg_point: row.get(3)?,
                    level: row.get(4)?,
                    entries_json: row.get(5)?,
                    verified_at: row.get(6)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row.into_snapshot()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Count snapshots for a user and category (tests use this to check the
    /// overwrite-not-append contract).
    pub fn count_snapshots(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
    ) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM result_snapshots WHERE user_id = ?1 AND test_type = ?2",
                params![user_id.to_string(), test_type.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count as usize)
    }
}

const RESULT_COLUMNS: &str = "id, subtype_id, test_id, user_id, controller_id, value, metric, \
     point, level, executed_at, is_public, is_verified, is_confirmed, is_deleted, created_at, \
     updated_at, deleted_at";

const RESULT_COLUMNS_QUALIFIED: &str = "r.id, r.subtype_id, r.test_id, r.user_id, \
     r.controller_id, r.value, r.metric, r.point, r.level, r.executed_at, r.is_public, \
     r.is_verified, r.is_confirmed, r.is_deleted, r.created_at, r.updated_at, r.deleted_at";

fn collect_results(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<ResultRow>>,
) -> Result<Vec<UserTestResult>, DatabaseError> {
    let mut results = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        results.push(row.into_result()?);
    }
    Ok(results)
}

fn map_subtype_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubtypeRow> {
    Ok(SubtypeRow {
        id: row.get(0)?,
        test_type: row.get(1)?,
        subtype_name: row.get(2)?,
        is_deleted: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_test_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestRow> {
    Ok(TestRow {
        id: row.get(0)?,
        subtype_id: row.get(1)?,
        test_name: row.get(2)?,
        metric: row.get(3)?,
        direction: row.get(4)?,
        media: row.get(5)?,
        description: row.get(6)?,
        table_description: row.get(7)?,
        references_json: row.get(8)?,
        is_deleted: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_result_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get(0)?,
        subtype_id: row.get(1)?,
        test_id: row.get(2)?,
        user_id: row.get(3)?,
        controller_id: row.get(4)?,
        value: row.get(5)?,
        metric: row.get(6)?,
        point: row.get(7)?,
        level: row.get(8)?,
        executed_at: row.get(9)?,
        is_public: row.get(10)?,
        is_verified: row.get(11)?,
        is_confirmed: row.get(12)?,
        is_deleted: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        deleted_at: row.get(16)?,
    })
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s)
        .map_err(|e| DatabaseError::DeserializationError(format!("Invalid {} UUID: {}", what, e)))
}

fn parse_datetime(s: &str, what: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::DeserializationError(format!("Invalid {} date: {}", what, e)))
}

/// Intermediate struct for reading subtype rows from database.
struct SubtypeRow {
    id: String,
    test_type: String,
    subtype_name: String,
    is_deleted: i32,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SubtypeRow {
    fn into_record(self) -> Result<SubtypeRecord, DatabaseError> {
        let test_type = TestCategory::from_str(&self.test_type).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown category: {}", self.test_type))
        })?;

        let created_by = self
            .created_by
            .map(|s| parse_uuid(&s, "created_by"))
            .transpose()?;

        Ok(SubtypeRecord {
            id: parse_uuid(&self.id, "subtype")?,
            test_type,
            subtype_name: self.subtype_name,
            is_deleted: self.is_deleted != 0,
            created_by,
            created_at: parse_datetime(&self.created_at, "created")?,
            updated_at: parse_datetime(&self.updated_at, "updated")?,
        })
    }
}

/// Intermediate struct for reading test rows from database.
struct TestRow {
    id: String,
    subtype_id: String,
    test_name: String,
    metric: String,
    direction: String,
    media: Option<String>,
    description: Option<String>,
    table_description: Option<String>,
    references_json: Option<String>,
    is_deleted: i32,
    created_at: String,
    updated_at: String,
}

impl TestRow {
    fn into_test(self) -> Result<TestDefinition, DatabaseError> {
        let direction = Direction::from_str(&self.direction).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown direction: {}", self.direction))
        })?;

        let references: Vec<Uuid> = match self.references_json {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid references JSON: {}", e))
            })?,
            None => Vec::new(),
        };

        Ok(TestDefinition {
            id: parse_uuid(&self.id, "test")?,
            subtype_id: parse_uuid(&self.subtype_id, "subtype")?,
            test_name: self.test_name,
            metric: self.metric,
            direction,
            media: self.media,
            description: self.description,
            table_description: self.table_description,
            references,
            is_deleted: self.is_deleted != 0,
            created_at: parse_datetime(&self.created_at, "created")?,
            updated_at: parse_datetime(&self.updated_at, "updated")?,
        })
    }
}

/// Intermediate struct for reading curve rows from database.
struct CurveRow {
    test_name: String,
    gender: String,
    unit: String,
    direction: String,
    values_json: String,
    points_json: String,
}

impl CurveRow {
    fn into_curve(self) -> Result<ReferenceCurve, DatabaseError> {
        let gender = Gender::from_str(&self.gender).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown gender: {}", self.gender))
        })?;

        let direction = Direction::from_str(&self.direction).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown direction: {}", self.direction))
        })?;

        let values: Vec<Option<f64>> = serde_json::from_str(&self.values_json).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid values JSON: {}", e))
        })?;

        let points: Vec<f64> = serde_json::from_str(&self.points_json).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid points JSON: {}", e))
        })?;

        Ok(ReferenceCurve {
            test_name: self.test_name,
            gender,
            unit: self.unit,
            direction,
            values,
            points,
        })
    }
}

/// Intermediate struct for reading result rows from database.
struct ResultRow {
    id: String,
    subtype_id: String,
    test_id: String,
    user_id: String,
    controller_id: Option<String>,
    value: f64,
    metric: String,
    point: f64,
    level: String,
    executed_at: String,
    is_public: i32,
    is_verified: i32,
    is_confirmed: i32,
    is_deleted: i32,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl ResultRow {
    fn into_result(self) -> Result<UserTestResult, DatabaseError> {
        let level = Level::from_str(&self.level).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown level: {}", self.level))
        })?;

        let controller_id = self
            .controller_id
            .map(|s| parse_uuid(&s, "controller"))
            .transpose()?;

        let deleted_at = self
            .deleted_at
            .map(|s| parse_datetime(&s, "deleted"))
            .transpose()?;

        Ok(UserTestResult {
            id: parse_uuid(&self.id, "result")?,
            subtype_id: parse_uuid(&self.subtype_id, "subtype")?,
            test_id: parse_uuid(&self.test_id, "test")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            controller_id,
            value: self.value,
            metric: self.metric,
            point: self.point,
            level,
            executed_at: parse_datetime(&self.executed_at, "executed")?,
            is_public: self.is_public != 0,
            is_verified: self.is_verified != 0,
            is_confirmed: self.is_confirmed != 0,
            is_deleted: self.is_deleted != 0,
            created_at: parse_datetime(&self.created_at, "created")?,
            updated_at: parse_datetime(&self.updated_at, "updated")?,
            deleted_at,
        })
    }
}

/// Intermediate struct for reading snapshot rows from database.
struct SnapshotRow {
    id: String,
    test_type: String,
    user_id: String,
    avg_point: f64,
    level: String,
    entries_json: String,
    verified_at: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<ResultSnapshot, DatabaseError> {
        let test_type = TestCategory::from_str(&self.test_type).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown category: {}", self.test_type))
        })?;

        let level = Level::from_str(&self.level).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown level: {}", self.level))
        })?;

        let entries: Vec<SnapshotEntry> = serde_json::from_str(&self.entries_json)
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid entries JSON: {}", e))
            })?;

        Ok(ResultSnapshot {
            id: parse_uuid(&self.id, "snapshot")?,
            test_type,
            user_id: parse_uuid(&self.user_id, "user")?,
            avg_point: self.avg_point,
            level,
            entries,
            verified_at: parse_datetime(&self.verified_at, "verified")?,
        })
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl DatabaseError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => "DB_CONNECTION",
            DatabaseError::IoError(_) => "DB_IO",
            DatabaseError::MigrationFailed(_) => "DB_MIGRATION",
            DatabaseError::QueryFailed(_) => "DB_QUERY",
            DatabaseError::NotFound(_) => "DB_NOT_FOUND",
            DatabaseError::SerializationError(_) => "DB_SERIALIZE",
            DatabaseError::DeserializationError(_) => "DB_DESERIALIZE",
        }
    }
}
