#![allow(missing_docs)]

use std::path::PathBuf;

use affinity::data_generator::{demo_ratings, DataGenerator, SyntheticOptions};
use affinity::{
    AffinityError, ItemPerformance, Rating, RatingsSource, Recommender, SqliteRatingsStore,
};
use rusqlite::{params, Connection};
use tempfile::TempDir;

fn setup_db(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.db"));
    let store = SqliteRatingsStore::create(&path).expect("create store");
    store.replace_ratings(&demo_ratings()).expect("seed demo data");
    (dir, path)
}

#[test]
fn create_makes_parent_directories() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("data").join("nested").join("ratings.db");
    let store = SqliteRatingsStore::create(&path).expect("create store");
    assert!(path.exists());
    assert_eq!(store.rating_count().expect("count"), 0);
    assert!(store.fetch_ratings().expect("fetch").is_empty());
}

#[test]
fn append_keeps_existing_rows() {
    let (_dir, path) = setup_db("append");
    let store = SqliteRatingsStore::new(&path);
    let before = store.rating_count().expect("count");
    let extra = vec![Rating::new(9, 106, 2.5).expect("valid")];
    assert_eq!(store.append_ratings(&extra).expect("append"), 1);
    assert_eq!(store.rating_count().expect("count"), before + 1);
    assert_eq!(store.fetch_ratings().expect("fetch").last(), extra.last());
}

#[test]
fn metrics_group_by_item_busiest_first() {
    let dir = TempDir::new().expect("tempdir");
    let store = SqliteRatingsStore::create(dir.path().join("metrics.db")).expect("create");
    let rows: Vec<Rating> = [
        (1, 102, 4.0),
        (2, 102, 2.0),
        (3, 102, 3.0),
        (1, 101, 5.0),
        (2, 103, 1.0),
        (3, 103, 2.0),
    ]
    .iter()
    .map(|&(u, i, r)| Rating::new(u, i, r).expect("valid"))
    .collect();
    store.replace_ratings(&rows).expect("replace");

    let metrics = store.performance_metrics().expect("metrics");
    assert_eq!(
        metrics,
        vec![
            ItemPerformance {
                item_id: 102,
                total_interactions: 3,
                avg_score: 3.0
            },
            ItemPerformance {
                item_id: 103,
                total_interactions: 2,
                avg_score: 1.5
            },
            ItemPerformance {
                item_id: 101,
                total_interactions: 1,
                avg_score: 5.0
            },
        ]
    );
}

#[test]
fn recommender_trains_from_sqlite() {
    let (_dir, path) = setup_db("train");
    let recommender = Recommender::new(SqliteRatingsStore::new(&path));
    let report = recommender.try_train().expect("train");
    assert_eq!(report.ratings, demo_ratings().len());
    assert_eq!(report.users, 5);
    assert_eq!(report.items, 5);
    assert_eq!(recommender.item_ids(), vec![101, 102, 103, 104, 105]);
    let recs = recommender.recommend(101, 3);
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].item_id, 102);
}

#[test]
fn missing_database_fails_training() {
    let dir = TempDir::new().expect("tempdir");
    let recommender = Recommender::new(SqliteRatingsStore::new(dir.path().join("missing.db")));
    assert!(!recommender.train());
    assert!(!recommender.is_trained());
    assert!(recommender.recommend(101, 3).is_empty());
}

#[test]
fn out_of_bounds_row_fails_training_and_keeps_matrix() {
    let (_dir, path) = setup_db("corrupt");
    let recommender = Recommender::new(SqliteRatingsStore::new(&path));
    assert!(recommender.train());
    let before = recommender.recommend(104, 3);

    let conn = Connection::open(&path).expect("open");
    conn.execute(
        "INSERT INTO ratings (user_id, item_id, rating) VALUES (?1, ?2, ?3)",
        params![7_i64, 101_i64, 9.5_f64],
    )
    .expect("insert");
    drop(conn);

    assert!(matches!(
        recommender.try_train(),
        Err(AffinityError::InvalidRating(_))
    ));
    assert_eq!(recommender.recommend(104, 3), before);
}

#[test]
fn synthetic_dataset_round_trips_through_store() {
    let dir = TempDir::new().expect("tempdir");
    let store = SqliteRatingsStore::create(dir.path().join("synthetic.db")).expect("create");
    let ratings = DataGenerator::new(SyntheticOptions::default())
        .expect("options")
        .generate_ratings()
        .expect("generate");
    store.replace_ratings(&ratings).expect("replace");
    assert_eq!(store.fetch_ratings().expect("fetch"), ratings);
}
