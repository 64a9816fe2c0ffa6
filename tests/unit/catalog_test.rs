//! Unit tests for catalog administration.

use std::sync::Arc;

use athletest::catalog::service::{CatalogError, CatalogService, NewTest};
use athletest::catalog::types::{Direction, TestCategory};
use athletest::curves::store::SqliteCurveStore;
use athletest::curves::types::{CurveTable, Gender};
use athletest::{CurveCache, Database};

fn catalog() -> CatalogService {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(SqliteCurveStore::new(db.clone()));
    CatalogService::new(db, Arc::new(CurveCache::new(store)))
}

fn jump_table(gender: Gender) -> CurveTable {
    CurveTable {
        gender,
        rows: vec![
            Some("Standing Jump".to_string()),
            Some("cm".to_string()),
            Some("<".to_string()),
            Some("60".to_string()),
            Some("50".to_string()),
            Some("40".to_string()),
        ],
        index_column: vec![90.0, 70.0, 40.0],
    }
}

fn jump_test(tables: Vec<CurveTable>) -> NewTest {
    NewTest {
        test_name: "Standing Jump".to_string(),
        media: None,
        description: None,
        table_description: None,
        references: Vec::new(),
        tables,
    }
}

#[test]
fn test_list_subtypes_filters_by_category() {
    let svc = catalog();
    svc.create_subtype(TestCategory::Physical, "Jumping", None)
        .unwrap();
    svc.create_subtype(TestCategory::Physical, "Sprinting", None)
        .unwrap();
    svc.create_subtype(TestCategory::Mental, "Focus", None)
        .unwrap();

    let physical = svc
        .list_subtypes(Some(TestCategory::Physical), false)
        .unwrap();
    assert_eq!(physical.len(), 2);

    let all = svc.list_subtypes(None, false).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn test_rename_subtype_respects_uniqueness() {
    let svc = catalog();
    let a = svc
        .create_subtype(TestCategory::Physical, "Jumping", None)
        .unwrap();
    svc.create_subtype(TestCategory::Physical, "Sprinting", None)
        .unwrap();

    let err = svc.rename_subtype(&a.id, "Sprinting").unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateSubtypeName(_)));

    // Renaming to its own current name is a no-op, not a clash.
    svc.rename_subtype(&a.id, "Jumping").unwrap();
    svc.rename_subtype(&a.id, "Plyometrics").unwrap();

    let loaded = svc.get_subtype(&a.id).unwrap();
    assert_eq!(loaded.subtype_name, "Plyometrics");
}

#[test]
fn test_gender_specific_curves_are_stored_separately() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(SqliteCurveStore::new(db.clone()));
    let cache = Arc::new(CurveCache::new(store));
    let svc = CatalogService::new(db.clone(), cache.clone());

    let subtype = svc
        .create_subtype(TestCategory::Physical, "Jumping", None)
        .unwrap();

    let mut female = jump_table(Gender::Female);
    female.rows[3] = Some("55".to_string());
    female.rows[4] = Some("45".to_string());
    female.rows[5] = Some("35".to_string());

    let test = svc
        .add_test(
            &subtype.id,
            jump_test(vec![jump_table(Gender::Male), female]),
        )
        .unwrap();
    assert_eq!(test.direction, Direction::Increasing);

    let male = cache.get("Standing Jump", Gender::Male).unwrap();
    let female = cache.get("Standing Jump", Gender::Female).unwrap();
    assert_eq!(male.values[0], Some(60.0));
    assert_eq!(female.values[0], Some(55.0));
}

#[test]
fn test_update_test_keeps_unit_and_direction() {
    let svc = catalog();
    let subtype = svc
        .create_subtype(TestCategory::Physical, "Jumping", None)
        .unwrap();
    let test = svc
        .add_test(&subtype.id, jump_test(vec![jump_table(Gender::Male)]))
        .unwrap();

    let updated = svc
        .update_test(
            &test.id,
            "Broad Jump",
            Some("https://cdn.example/broad-jump.mp4".to_string()),
            Some("Two-footed jump for distance".to_string()),
            None,
            Vec::new(),
        )
        .unwrap();

    assert_eq!(updated.test_name, "Broad Jump");
    assert_eq!(updated.metric, "cm");
    assert_eq!(updated.direction, Direction::Increasing);
}

#[test]
fn test_deleting_subtype_deletes_its_tests() {
    let svc = catalog();
    let subtype = svc
        .create_subtype(TestCategory::Physical, "Jumping", None)
        .unwrap();
    let test = svc
        .add_test(&subtype.id, jump_test(vec![jump_table(Gender::Male)]))
        .unwrap();

    svc.delete_subtype(&subtype.id).unwrap();

    let loaded = svc.get_subtype(&subtype.id).unwrap();
    assert!(loaded.is_deleted);
    assert!(loaded.tests.is_empty());
    assert_eq!(loaded.deleted_tests, vec![test.id]);
}

#[test]
fn test_empty_names_rejected() {
    let svc = catalog();
    assert!(matches!(
        svc.create_subtype(TestCategory::Physical, "   ", None),
        Err(CatalogError::EmptyName)
    ));
}
