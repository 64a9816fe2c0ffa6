//! AthleTest - Test Measurement, Verification and Leaderboard Engine
//!
//! Demo entry point: seeds a small catalog, runs a couple of results
//! through the verification workflow and prints the resulting leaderboard
//! and trend chart.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use athletest::catalog::service::{CatalogService, NewTest};
use athletest::catalog::types::TestCategory;
use athletest::collaborators::notifier::{NotificationEvent, NotificationSink, ThreadedNotifier};
use athletest::collaborators::{EmptyDirectory, NullFeed, PopulationFilter};
use athletest::curves::store::SqliteCurveStore;
use athletest::curves::types::{CurveTable, Gender};
use athletest::leaderboard::types::TimeWindow;
use athletest::results::types::{Origin, SubmitRequest, VerificationDecision};
use athletest::storage::config;
use athletest::{
    ChartService, CurveCache, Database, LeaderboardService, ResultService, SnapshotService,
};

fn main() -> Result<()> {
    // T024: Configure tracing subscriber
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AthleTest v{}", env!("CARGO_PKG_VERSION"));

    let cfg = config::load_config()?;
    if !config::get_config_path().exists() {
        config::save_config(&cfg)?;
    }

    // The demo reseeds the catalog on every run, so it works on a scratch
    // database rather than the configured one.
    tracing::info!(
        "Configured database at {}; demo runs in memory",
        cfg.database_path().display()
    );
    let db = Arc::new(Database::open_in_memory()?);

    let store = Arc::new(SqliteCurveStore::new(db.clone()));
    let curves = Arc::new(CurveCache::new(store));
    let catalog = CatalogService::new(db.clone(), curves.clone());
    let snapshots = Arc::new(SnapshotService::new(db.clone()));

    struct LogSink;
    impl NotificationSink for LogSink {
        fn notify(&self, event: NotificationEvent) {
            tracing::info!(?event, "notification");
        }
    }

    let results = ResultService::new(
        db.clone(),
        curves,
        snapshots.clone(),
        Arc::new(ThreadedNotifier::spawn(Arc::new(LogSink))),
        Arc::new(NullFeed),
    );

    // Seed a sprint test with a decreasing (lower-is-better) curve.
    let subtype = catalog.create_subtype(TestCategory::Physical, "Sprinting", None)?;
    let test = catalog.add_test(
        &subtype.id,
        NewTest {
            test_name: "40m Sprint".to_string(),
            media: None,
            description: Some("Sprint over 40 meters from a standing start".to_string()),
            table_description: None,
            references: Vec::new(),
            tables: vec![CurveTable {
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
            }],
        },
    )?;

    // Two athletes submit, a controller verifies both.
    let controller = Uuid::new_v4();
    for value in [5.2, 5.8] {
        let submitted = results.submit(SubmitRequest {
            subtype_id: subtype.id,
            test_id: test.id,
            user_id: Uuid::new_v4(),
            origin: Origin::Athlete {
                controller_id: Some(controller),
            },
            value,
            body_weight: None,
            gender: Gender::Male,
            executed_at: Utc::now(),
            is_public: true,
        })?;
        results.verify(&submitted.id, &controller, VerificationDecision::Verified)?;
    }

    let directory = Arc::new(EmptyDirectory);
    let boards = LeaderboardService::new(db.clone(), directory.clone())
        .with_display_batch_size(cfg.leaderboard.display_batch_size);
    let board = boards.rank(
        &test.id,
        TimeWindow::last_days(30),
        &PopulationFilter::default(),
        1,
        cfg.leaderboard.default_page_size,
    )?;

    println!("Leaderboard: {}", test.test_name);
    for entry in &board {
        println!(
            "  #{} {:.2} {} -> {:.0} pts ({})",
            entry.rank, entry.value, entry.metric, entry.point, entry.level
        );
    }

    let charts = ChartService::new(db, snapshots, directory).with_bucket_days(cfg.charts.bucket_days);
    if let Some(entry) = board.first() {
        println!("Trend: {}", test.test_name);
        for node in charts.test_chart(&entry.user_id, &test.id)? {
            println!("  [{}] {:>5.1} pts  {}", node.index, node.point, node.day);
        }
    }

    Ok(())
}
