//! Unit tests for leaderboard windowing and paired rankings.

use std::sync::Arc;

use athletest::catalog::types::{Direction, TestCategory, TestDefinition};
use athletest::collaborators::{EmptyDirectory, PopulationFilter};
use athletest::leaderboard::types::TimeWindow;
use athletest::leaderboard::LeaderboardService;
use athletest::results::types::UserTestResult;
use athletest::scoring::{classify, Level};
use athletest::storage::database::SubtypeRecord;
use athletest::Database;
use chrono::{Duration, Utc};
use uuid::Uuid;

fn seed_test(db: &Database, name: &str, direction: Direction) -> TestDefinition {
    let now = Utc::now();
    let subtype = SubtypeRecord {
        id: Uuid::new_v4(),
        test_type: TestCategory::Physical,
        subtype_name: format!("{} group", name),
        is_deleted: false,
        created_by: None,
        created_at: now,
        updated_at: now,
    };
    db.insert_subtype(&subtype).unwrap();

    let test = TestDefinition {
        id: Uuid::new_v4(),
        subtype_id: subtype.id,
        test_name: name.to_string(),
        metric: "cm".to_string(),
        direction,
        media: None,
        description: None,
        table_description: None,
        references: Vec::new(),
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };
    db.insert_test(&test).unwrap();
    test
}

fn seed_result(db: &Database, test: &TestDefinition, user: Uuid, value: f64, days_ago: i64) {
    let now = Utc::now();
    let point = 60.0;
    db.insert_result(&UserTestResult {
        id: Uuid::new_v4(),
        subtype_id: test.subtype_id,
        test_id: test.id,
        user_id: user,
        controller_id: None,
        value,
        metric: test.metric.clone(),
        point,
        level: classify(point),
        executed_at: now - Duration::days(days_ago),
        is_public: true,
        is_verified: true,
        is_confirmed: true,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
    .unwrap();
}

#[test]
fn test_results_outside_the_window_do_not_rank() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let test = seed_test(&db, "Standing Jump", Direction::Increasing);
    let (recent, stale) = (Uuid::new_v4(), Uuid::new_v4());
    seed_result(&db, &test, recent, 50.0, 5);
    seed_result(&db, &test, stale, 80.0, 45);

    let svc = LeaderboardService::new(db, Arc::new(EmptyDirectory));
    let board = svc
        .rank(
            &test.id,
            TimeWindow::last_days(30),
            &PopulationFilter::default(),
            1,
            10,
        )
        .unwrap();

    assert_eq!(board.len(), 1);
    assert_eq!(board[0].user_id, recent);
    assert_eq!(board[0].level, Level::SemiPro);
}

#[test]
fn test_team_dual_rank_orders_each_side_by_its_own_direction() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let left = seed_test(&db, "Slalom Left", Direction::Decreasing);
    let right = seed_test(&db, "Slalom Right", Direction::Decreasing);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    seed_result(&db, &left, a, 8.1, 2);
    seed_result(&db, &left, b, 7.6, 2);
    seed_result(&db, &right, a, 7.2, 2);
    seed_result(&db, &right, b, 7.9, 2);

    let svc = LeaderboardService::new(db, Arc::new(EmptyDirectory));
    // EmptyDirectory cannot resolve the team, so the pair ranks everyone.
    let (left_board, right_board) = svc
        .team_dual_rank(
            &Uuid::new_v4(),
            &left.id,
            &right.id,
            TimeWindow::last_days(30),
            1,
            10,
        )
        .unwrap();

    assert_eq!(left_board[0].user_id, b);
    assert_eq!(right_board[0].user_id, a);
}

#[test]
fn test_soft_deleted_results_do_not_rank() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let test = seed_test(&db, "Standing Jump", Direction::Increasing);
    let user = Uuid::new_v4();
    seed_result(&db, &test, user, 50.0, 5);

    // Delete the only result and the board empties.
    let rows = db
        .results_for_test_in_window(
            &test.id,
            Utc::now() - Duration::days(30),
            Utc::now(),
        )
        .unwrap();
    db.soft_delete_result(&rows[0].id, Utc::now()).unwrap();

    let svc = LeaderboardService::new(db, Arc::new(EmptyDirectory));
    let board = svc
        .rank(
            &test.id,
            TimeWindow::last_days(30),
            &PopulationFilter::default(),
            1,
            10,
        )
        .unwrap();
    assert!(board.is_empty());
}
