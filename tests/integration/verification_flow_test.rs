//! End-to-end flow: seed a catalog, submit results, verify them, then read
//! the snapshot, leaderboard and trend chart that fall out.

use std::sync::Arc;

use athletest::catalog::service::{CatalogService, NewTest};
use athletest::catalog::types::TestCategory;
use athletest::collaborators::notifier::{ChannelNotifier, NotificationEvent};
use athletest::collaborators::{EmptyDirectory, NullFeed, PopulationFilter};
use athletest::curves::store::SqliteCurveStore;
use athletest::curves::types::{CurveTable, Gender};
use athletest::leaderboard::types::TimeWindow;
use athletest::results::types::{Origin, SubmitRequest, VerificationDecision};
use athletest::scoring::Level;
use athletest::trends::NUMBER_OF_POINTS_IN_CHART;
use athletest::{
    ChartService, CurveCache, Database, LeaderboardService, ResultService, SnapshotService,
};
use chrono::Utc;
use crossbeam::channel::Receiver;
use uuid::Uuid;

struct Engine {
    db: Arc<Database>,
    catalog: CatalogService,
    results: ResultService,
    snapshots: Arc<SnapshotService>,
    events: Receiver<NotificationEvent>,
}

fn engine(db: Arc<Database>) -> Engine {
    let store = Arc::new(SqliteCurveStore::new(db.clone()));
    let curves = Arc::new(CurveCache::new(store));
    let catalog = CatalogService::new(db.clone(), curves.clone());
    let snapshots = Arc::new(SnapshotService::new(db.clone()));
    let (notifier, events) = ChannelNotifier::new();
    let results = ResultService::new(
        db.clone(),
        curves,
        snapshots.clone(),
        Arc::new(notifier),
        Arc::new(NullFeed),
    );

    Engine {
        db,
        catalog,
        results,
        snapshots,
        events,
    }
}

fn sprint_table() -> CurveTable {
    CurveTable {
        gender: Gender::Male,
        rows: vec![
            Some("40m Sprint".to_string()),
            Some("sec".to_string()),
            Some(">".to_string()),
            Some("5.0".to_string()),
            Some("5.5".to_string()),
            Some("6.0".to_string()),
        ],
        index_column: vec![90.0, 70.0, 40.0],
    }
}

fn submit(
    engine: &Engine,
    subtype_id: Uuid,
    test_id: Uuid,
    user: Uuid,
    controller: Option<Uuid>,
    value: f64,
) -> athletest::results::types::UserTestResult {
    engine
        .results
        .submit(SubmitRequest {
            subtype_id,
            test_id,
            user_id: user,
            origin: Origin::Athlete {
                controller_id: controller,
            },
            value,
            body_weight: None,
            gender: Gender::Male,
            executed_at: Utc::now(),
            is_public: true,
        })
        .unwrap()
}

#[test]
fn test_full_verification_flow() {
    let eng = engine(Arc::new(Database::open_in_memory().unwrap()));

    let subtype = eng
        .catalog
        .create_subtype(TestCategory::Physical, "Sprinting", None)
        .unwrap();
    let test = eng
        .catalog
        .add_test(
            &subtype.id,
            NewTest {
                test_name: "40m Sprint".to_string(),
                media: None,
                description: None,
                table_description: None,
                references: Vec::new(),
                tables: vec![sprint_table()],
            },
        )
        .unwrap();

    let controller = Uuid::new_v4();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    // Alice runs 5.2s, Bob 5.8s; the controller verifies both.
    let a = submit(&eng, subtype.id, test.id, alice, Some(controller), 5.2);
    let b = submit(&eng, subtype.id, test.id, bob, Some(controller), 5.8);

    assert!(matches!(
        eng.events.try_recv().unwrap(),
        NotificationEvent::VerificationRequested { .. }
    ));

    eng.results
        .verify(&a.id, &controller, VerificationDecision::Verified)
        .unwrap();
    eng.results
        .verify(&b.id, &controller, VerificationDecision::Verified)
        .unwrap();

    // Snapshot reflects Alice's verified 70-point sprint.
    let snapshot = eng
        .snapshots
        .get(&alice, TestCategory::Physical)
        .unwrap()
        .expect("snapshot missing");
    assert_eq!(snapshot.avg_point, 70.0);
    assert_eq!(snapshot.level, Level::Pro);

    // Alice outranks Bob on the lower-is-better board.
    let boards = LeaderboardService::new(eng.db.clone(), Arc::new(EmptyDirectory));
    let board = boards
        .rank(
            &test.id,
            TimeWindow::last_days(30),
            &PopulationFilter::default(),
            1,
            10,
        )
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].user_id, alice);
    assert_eq!(board[0].point, 70.0);
    assert_eq!(board[1].user_id, bob);
    assert_eq!(board[1].point, 40.0);

    // Alice's trend chart ends on her verified sprint.
    let charts = ChartService::new(
        eng.db.clone(),
        eng.snapshots.clone(),
        Arc::new(EmptyDirectory),
    );
    let nodes = charts.test_chart(&alice, &test.id).unwrap();
    assert_eq!(nodes.len(), NUMBER_OF_POINTS_IN_CHART);
    assert_eq!(nodes[NUMBER_OF_POINTS_IN_CHART - 1].point, 70.0);
    assert!(nodes[..NUMBER_OF_POINTS_IN_CHART - 1]
        .iter()
        .all(|n| n.point == 0.0));
}

#[test]
fn test_rejected_results_never_surface() {
    let eng = engine(Arc::new(Database::open_in_memory().unwrap()));

    let subtype = eng
        .catalog
        .create_subtype(TestCategory::Physical, "Sprinting", None)
        .unwrap();
    let test = eng
        .catalog
        .add_test(
            &subtype.id,
            NewTest {
                test_name: "40m Sprint".to_string(),
                media: None,
                description: None,
                table_description: None,
                references: Vec::new(),
                tables: vec![sprint_table()],
            },
        )
        .unwrap();

    let controller = Uuid::new_v4();
    let athlete = Uuid::new_v4();
    let result = submit(&eng, subtype.id, test.id, athlete, Some(controller), 4.8);

    eng.results
        .verify(&result.id, &controller, VerificationDecision::Rejected)
        .unwrap();

    let boards = LeaderboardService::new(eng.db.clone(), Arc::new(EmptyDirectory));
    let board = boards
        .rank(
            &test.id,
            TimeWindow::last_days(30),
            &PopulationFilter::default(),
            1,
            10,
        )
        .unwrap();
    assert!(board.is_empty());

    assert!(eng
        .snapshots
        .get(&athlete, TestCategory::Physical)
        .unwrap()
        .is_none());
}

#[test]
fn test_catalog_and_results_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.db");

    let subtype_id;
    let test_id;
    {
        let eng = engine(Arc::new(Database::open(&path).unwrap()));
        let subtype = eng
            .catalog
            .create_subtype(TestCategory::Physical, "Sprinting", None)
            .unwrap();
        let test = eng
            .catalog
            .add_test(
                &subtype.id,
                NewTest {
                    test_name: "40m Sprint".to_string(),
                    media: None,
                    description: None,
                    table_description: None,
                    references: Vec::new(),
                    tables: vec![sprint_table()],
                },
            )
            .unwrap();
        subtype_id = subtype.id;
        test_id = test.id;

        let controller = Uuid::new_v4();
        let result = submit(&eng, subtype_id, test_id, Uuid::new_v4(), Some(controller), 5.2);
        eng.results
            .verify(&result.id, &controller, VerificationDecision::Verified)
            .unwrap();
    }

    let eng = engine(Arc::new(Database::open(&path).unwrap()));
    let subtype = eng.catalog.get_subtype(&subtype_id).unwrap();
    assert_eq!(subtype.tests.len(), 1);

    let boards = LeaderboardService::new(eng.db.clone(), Arc::new(EmptyDirectory));
    let board = boards
        .rank(
            &test_id,
            TimeWindow::last_days(30),
            &PopulationFilter::default(),
            1,
            10,
        )
        .unwrap();
    assert_eq!(board.len(), 1);
}
