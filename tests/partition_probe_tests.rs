//! Partition existence checks against an in-memory object store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use lakeq_core::config::EngineConfig;
use lakeq_core::dataset::{DatasetCatalog, EVENT_CAPTURE, TUTOR_ACTIVITY};
use lakeq_core::date::DateRange;
use lakeq_io::{ObjectStoreProbe, PartitionFilter};
use lakeq_planner::resolve_paths;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

const ROOT: &str = "s3://learning-analytics";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seed(store: &InMemory, keys: &[&str]) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    for key in keys {
        rt.block_on(store.put(&ObjectPath::from(*key), Bytes::from_static(b"PAR1")))
            .unwrap();
    }
}

fn probe(store: Arc<InMemory>) -> ObjectStoreProbe {
    ObjectStoreProbe::new(store, ROOT).unwrap()
}

#[test]
fn test_missing_day_partition_is_dropped() {
    let store = Arc::new(InMemory::new());
    seed(
        &store,
        &[
            "event-capture/page_view/year=2024/month=01/day=30/part-0.parquet",
            "event-capture/page_view/year=2024/month=02/day=01/part-0.parquet",
            "event-capture/page_view/year=2024/month=02/day=01/part-1.parquet",
        ],
    );

    let catalog = DatasetCatalog::standard(ROOT);
    let descriptor = catalog.get(EVENT_CAPTURE).unwrap().with_table("page_view");
    let range = DateRange::new(d(2024, 1, 30), d(2024, 2, 1)).unwrap();
    let paths = resolve_paths(&descriptor, Some(&range)).unwrap();
    assert_eq!(paths.len(), 3);

    let kept = probe(store).retain_existing(&paths).unwrap();
    assert_eq!(kept, vec![paths[0].clone(), paths[2].clone()]);
}

#[test]
fn test_concrete_year_file_checked_by_head() {
    let store = Arc::new(InMemory::new());
    seed(
        &store,
        &["tutor-activity/tutor_activity_2024-01-01__2024-12-31.parquet"],
    );

    let catalog = DatasetCatalog::standard(ROOT);
    let descriptor = catalog.get(TUTOR_ACTIVITY).unwrap();
    let range = DateRange::new(d(2023, 6, 1), d(2024, 6, 1)).unwrap();
    let paths = resolve_paths(descriptor, Some(&range)).unwrap();

    let kept = probe(store).retain_existing(&paths).unwrap();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].ends_with("tutor_activity_2024-01-01__2024-12-31.parquet"));
}

#[test]
fn test_paths_outside_bucket_are_kept() {
    let store = Arc::new(InMemory::new());
    let paths = vec!["s3://another-bucket/x/y.parquet".to_string()];
    let kept = probe(store).retain_existing(&paths).unwrap();
    assert_eq!(kept, paths);
}

#[test]
fn test_empty_store_keeps_nothing() {
    let store = Arc::new(InMemory::new());
    let cfg = EngineConfig::default();
    let catalog = DatasetCatalog::standard(&cfg.data_root);
    let descriptor = catalog.get(EVENT_CAPTURE).unwrap().with_table("click");
    let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 2)).unwrap();
    let paths = resolve_paths(&descriptor, Some(&range)).unwrap();

    let kept = probe(store).retain_existing(&paths).unwrap();
    assert!(kept.is_empty());
}
