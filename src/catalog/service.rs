//! Test catalog administration.
//!
//! T007: Subtype and test CRUD with duplicate-name guards
//! T011: Curve replacement with direction re-derivation

use crate::catalog::types::{Direction, Subtype, TestCategory, TestDefinition};
use crate::curves::cache::CurveCache;
use crate::curves::types::{CurveError, CurveTable, ReferenceCurve};
use crate::storage::database::{Database, SubtypeRecord};
use crate::storage::DatabaseError;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A test definition to be created, with its raw lookup tables.
#[derive(Debug, Clone)]
pub struct NewTest {
    pub test_name: String,
    pub media: Option<String>,
    pub description: Option<String>,
    pub table_description: Option<String>,
    pub references: Vec<Uuid>,
    /// One raw table per gender. Unit and direction come from the tables.
    pub tables: Vec<CurveTable>,
}

/// Catalog administration over subtypes, tests and their curves.
pub struct CatalogService {
    db: Arc<Database>,
    curves: Arc<CurveCache>,
}

impl CatalogService {
    pub fn new(db: Arc<Database>, curves: Arc<CurveCache>) -> Self {
        Self { db, curves }
    }

    /// Create a subtype in a category. Names are unique among active
    /// subtypes of the same category.
    pub fn create_subtype(
        &self,
        test_type: TestCategory,
        name: &str,
        created_by: Option<Uuid>,
    ) -> Result<SubtypeRecord, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }

        if self.db.find_subtype_by_name(test_type, name)?.is_some() {
            return Err(CatalogError::DuplicateSubtypeName(name.to_string()));
        }

        let now = Utc::now();
        let record = SubtypeRecord {
            id: Uuid::new_v4(),
            test_type,
            subtype_name: name.to_string(),
            is_deleted: false,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_subtype(&record)?;

        tracing::info!(subtype = %record.id, %test_type, name, "subtype created");
        Ok(record)
    }

    /// Rename a subtype, keeping names unique within its category.
    pub fn rename_subtype(&self, id: &Uuid, name: &str) -> Result<(), CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }

        let record = self
            .db
            .get_subtype(id)?
            .filter(|r| !r.is_deleted)
            .ok_or(CatalogError::SubtypeNotFound(*id))?;

        if let Some(existing) = self.db.find_subtype_by_name(record.test_type, name)? {
            if existing.id != *id {
                return Err(CatalogError::DuplicateSubtypeName(name.to_string()));
            }
        }

        self.db.rename_subtype(id, name, Utc::now())?;
        Ok(())
    }

    /// Soft-delete a subtype and every active test underneath it.
    pub fn delete_subtype(&self, id: &Uuid) -> Result<(), CatalogError> {
        let record = self
            .db
            .get_subtype(id)?
            .filter(|r| !r.is_deleted)
            .ok_or(CatalogError::SubtypeNotFound(*id))?;

        let now = Utc::now();
        for test in self.db.list_tests(id, false)? {
            self.db.soft_delete_test(&test.id, now)?;
        }
        self.db.soft_delete_subtype(id, now)?;

        tracing::info!(subtype = %record.id, "subtype deleted");
        Ok(())
    }

    /// A subtype with its active tests and the ids of deleted ones.
    pub fn get_subtype(&self, id: &Uuid) -> Result<Subtype, CatalogError> {
        let record = self
            .db
            .get_subtype(id)?
            .ok_or(CatalogError::SubtypeNotFound(*id))?;

        self.assemble(record)
    }

    /// Subtypes, optionally narrowed to a category; deleted ones only when
    /// asked for.
    pub fn list_subtypes(
        &self,
        test_type: Option<TestCategory>,
        include_deleted: bool,
    ) -> Result<Vec<Subtype>, CatalogError> {
        let records = self.db.list_subtypes(test_type, include_deleted)?;
        records.into_iter().map(|r| self.assemble(r)).collect()
    }

    fn assemble(&self, record: SubtypeRecord) -> Result<Subtype, CatalogError> {
        let all_tests = self.db.list_tests(&record.id, true)?;
        let (active, deleted): (Vec<_>, Vec<_>) =
            all_tests.into_iter().partition(|t| !t.is_deleted);

        Ok(Subtype {
            id: record.id,
            test_type: record.test_type,
            subtype_name: record.subtype_name,
            tests: active,
            deleted_tests: deleted.into_iter().map(|t| t.id).collect(),
            is_deleted: record.is_deleted,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Create a test inside a subtype, parsing and storing its curves.
    ///
    /// The test's unit and direction are taken from the tables; all tables
    /// must agree on the direction marker.
    pub fn add_test(&self, subtype_id: &Uuid, new: NewTest) -> Result<TestDefinition, CatalogError> {
        let name = new.test_name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }

        self.db
            .get_subtype(subtype_id)?
            .filter(|r| !r.is_deleted)
            .ok_or(CatalogError::SubtypeNotFound(*subtype_id))?;

        if self.db.find_test_by_name(subtype_id, name)?.is_some() {
            return Err(CatalogError::DuplicateTestName(name.to_string()));
        }

        if new.tables.is_empty() {
            return Err(CatalogError::Curve(CurveError::Malformed(
                "a test needs at least one lookup table".to_string(),
            )));
        }

        let curves = new
            .tables
            .iter()
            .map(|t| ReferenceCurve::from_table(name, t))
            .collect::<Result<Vec<_>, _>>()?;

        let direction = curves[0].direction;
        let metric = curves[0].unit.clone();
        for curve in &curves[1..] {
            if curve.direction != direction {
                return Err(CatalogError::InconsistentDirection(name.to_string()));
            }
        }

        let now = Utc::now();
        let test = TestDefinition {
            id: Uuid::new_v4(),
            subtype_id: *subtype_id,
            test_name: name.to_string(),
            metric,
            direction,
            media: new.media,
            description: new.description,
            table_description: new.table_description,
            references: new.references,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_test(&test)?;
        for curve in &curves {
            self.db.upsert_curve(curve)?;
        }

        tracing::info!(test = %test.id, name, %direction, "test created");
        Ok(test)
    }

    /// Replace one gender's curve for a test. The test's direction follows
    /// the new table's marker, and cached entries for the test are dropped.
    pub fn replace_curve(&self, test_id: &Uuid, table: &CurveTable) -> Result<(), CatalogError> {
        let test = self
            .db
            .get_test(test_id)?
            .filter(|t| !t.is_deleted)
            .ok_or(CatalogError::TestNotFound(*test_id))?;

        let curve = ReferenceCurve::from_table(&test.test_name, table)?;

        self.db.upsert_curve(&curve)?;
        if curve.direction != test.direction {
            self.db
                .set_test_direction(test_id, curve.direction, Utc::now())?;
            tracing::info!(
                test = %test_id,
                from = %test.direction,
                to = %curve.direction,
                "test direction re-derived from replaced curve"
            );
        }
        self.curves.invalidate(&test.test_name);

        Ok(())
    }

    /// Update a test's descriptive metadata. Unit and direction are bound to
    /// the curve and cannot be edited here.
    pub fn update_test(
        &self,
        test_id: &Uuid,
        test_name: &str,
        media: Option<String>,
        description: Option<String>,
        table_description: Option<String>,
        references: Vec<Uuid>,
    ) -> Result<TestDefinition, CatalogError> {
        let name = test_name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }

        let mut test = self
            .db
            .get_test(test_id)?
            .filter(|t| !t.is_deleted)
            .ok_or(CatalogError::TestNotFound(*test_id))?;

        if let Some(existing) = self.db.find_test_by_name(&test.subtype_id, name)? {
            if existing.id != *test_id {
                return Err(CatalogError::DuplicateTestName(name.to_string()));
            }
        }

        test.test_name = name.to_string();
        test.media = media;
        test.description = description;
        test.table_description = table_description;
        test.references = references;
        test.updated_at = Utc::now();

        self.db.update_test_metadata(&test)?;
        Ok(test)
    }

    /// Soft-delete a test. Its results stay in place for history.
    pub fn delete_test(&self, test_id: &Uuid) -> Result<(), CatalogError> {
        self.db
            .get_test(test_id)?
            .filter(|t| !t.is_deleted)
            .ok_or(CatalogError::TestNotFound(*test_id))?;

        self.db.soft_delete_test(test_id, Utc::now())?;
        Ok(())
    }

    /// A single test definition.
    pub fn get_test(&self, test_id: &Uuid) -> Result<TestDefinition, CatalogError> {
        self.db
            .get_test(test_id)?
            .ok_or(CatalogError::TestNotFound(*test_id))
    }

    /// Look an active test up by name within a subtype.
    pub fn find_test_by_name(
        &self,
        subtype_id: &Uuid,
        name: &str,
    ) -> Result<Option<TestDefinition>, CatalogError> {
        Ok(self.db.find_test_by_name(subtype_id, name.trim())?)
    }
}

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Name must not be empty")]
    EmptyName,

    #[error("Subtype '{0}' already exists in this category")]
    DuplicateSubtypeName(String),

    #[error("Test '{0}' already exists in this subtype")]
    DuplicateTestName(String),

    #[error("Subtype {0} not found")]
    SubtypeNotFound(Uuid),

    #[error("Test {0} not found")]
    TestNotFound(Uuid),

    #[error("Lookup tables for '{0}' disagree on direction")]
    InconsistentDirection(String),

    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl CatalogError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::EmptyName => "CATALOG_EMPTY_NAME",
            CatalogError::DuplicateSubtypeName(_) => "CATALOG_DUPLICATE_SUBTYPE",
            CatalogError::DuplicateTestName(_) => "CATALOG_DUPLICATE_TEST",
            CatalogError::SubtypeNotFound(_) => "CATALOG_SUBTYPE_NOT_FOUND",
            CatalogError::TestNotFound(_) => "CATALOG_TEST_NOT_FOUND",
            CatalogError::InconsistentDirection(_) => "CATALOG_DIRECTION_MISMATCH",
            CatalogError::Curve(e) => e.code(),
            CatalogError::Database(e) => e.code(),
        }
    }
}
