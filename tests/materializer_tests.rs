//! Paged collection: page order, the memory-pressure abort, and fetch faults.

use lakeq_core::config::EngineConfig;
use lakeq_core::{Column, RowBatch, Scalar};
use lakeq_exec::{ExecError, ExecWarning, Materializer, Session};
use lakeq_io::{EngineError, MemoryConnector};
use lakeq_mem::{MemoryMonitor, MemoryThresholds, ProbeReading, ScriptedProbe};
use lakeq_planner::SizeClass;

const PAGE_ROWS: usize = 100_000;

fn events(n: usize) -> RowBatch {
    RowBatch::new(vec![
        Column::new("event_id", (0..n as i64).map(Scalar::I64).collect()),
        Column::new(
            "kind",
            (0..n)
                .map(|i| {
                    let kind = if i % 2 == 0 { "view" } else { "click" };
                    Scalar::Str(kind.to_string())
                })
                .collect(),
        ),
    ])
}

fn cfg() -> EngineConfig {
    EngineConfig {
        probe_row_count: false,
        ..EngineConfig::default()
    }
}

fn scripted(readings_gb: Vec<f64>) -> MemoryMonitor {
    MemoryMonitor::new(
        Box::new(ScriptedProbe::from_gb(readings_gb)),
        MemoryThresholds::default(),
    )
}

fn open(conn: &MemoryConnector) -> Session<lakeq_io::MemoryHandle> {
    let paths = vec!["s3://learning-analytics/event-capture/page_view/*".to_string()];
    Session::open(conn, &cfg(), &paths, "page_view").unwrap()
}

#[test]
fn test_three_pages_concatenate_in_order() {
    let conn = MemoryConnector::new().with_table("page_view", events(200_037));
    let monitor = scripted(vec![1.0, 1.5, 2.0]);
    let mut session = open(&conn);

    let out = Materializer::new(&monitor, PAGE_ROWS)
        .run(&mut session, "SELECT * FROM page_view", SizeClass::Large, "page_view")
        .unwrap();

    assert_eq!(out.pages, 3);
    assert_eq!(out.num_rows(), 200_037);
    let ids = &out.batch.column("event_id").unwrap().values;
    assert_eq!(ids[0], Scalar::I64(0));
    assert_eq!(ids[100_000], Scalar::I64(100_000));
    assert_eq!(ids[200_036], Scalar::I64(200_036));
    assert!(out.warnings.is_empty());
    assert_eq!(out.size_class, SizeClass::Large);
}

#[test]
fn test_abort_after_second_page_keeps_fetched_rows() {
    let conn = MemoryConnector::new().with_table("page_view", events(250_000));
    let monitor = scripted(vec![1.0, 7.5]);
    let mut session = open(&conn);

    let out = Materializer::new(&monitor, PAGE_ROWS)
        .run(&mut session, "SELECT * FROM page_view", SizeClass::Large, "page_view")
        .unwrap();

    assert_eq!(out.pages, 2);
    assert_eq!(out.num_rows(), 200_000);
    assert!(out.aborted());
    match &out.warnings[..] {
        [ExecWarning::MemoryPressureAbort {
            pages,
            rows,
            resident_gb,
            abort_gb,
        }] => {
            assert_eq!(*pages, 2);
            assert_eq!(*rows, 200_000);
            assert!(*resident_gb > 7.0);
            assert_eq!(*abort_gb, 7.0);
        }
        other => panic!("unexpected warnings: {other:?}"),
    }
}

#[test]
fn test_reading_over_warning_only_does_not_abort() {
    let conn = MemoryConnector::new().with_table("page_view", events(30));
    let monitor = scripted(vec![6.5, 6.9, 6.8]);
    let mut session = open(&conn);

    let out = Materializer::new(&monitor, 10)
        .run(&mut session, "SELECT * FROM page_view", SizeClass::Large, "page_view")
        .unwrap();
    assert_eq!(out.pages, 3);
    assert!(!out.aborted());
}

#[test]
fn test_unavailable_readings_never_abort() {
    let conn = MemoryConnector::new().with_table("page_view", events(50));
    let monitor = MemoryMonitor::new(
        Box::new(ScriptedProbe::new(vec![
            ProbeReading::Estimate(64 * 1024 * 1024 * 1024),
            ProbeReading::Unavailable,
        ])),
        MemoryThresholds::default(),
    );
    let mut session = open(&conn);

    let out = Materializer::new(&monitor, 10)
        .run(&mut session, "SELECT * FROM page_view", SizeClass::Large, "page_view")
        .unwrap();
    assert_eq!(out.pages, 5);
    assert_eq!(out.num_rows(), 50);
    assert!(out.warnings.is_empty());
}

#[test]
fn test_fetch_fault_is_query_execution_error() {
    let conn = MemoryConnector::new()
        .with_table("page_view", events(40))
        .fail_after_pages(2);
    let monitor = scripted(vec![]);
    let mut session = open(&conn);

    let err = Materializer::new(&monitor, 10)
        .run(&mut session, "SELECT * FROM page_view", SizeClass::Large, "page_view")
        .unwrap_err();
    match err {
        ExecError::QueryExecution { table, source } => {
            assert_eq!(table, "page_view");
            assert!(matches!(source, EngineError::Fetch { rows_fetched: 20, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    drop(session);
    assert_eq!(conn.releases(), 1);
}

#[test]
fn test_small_query_is_one_direct_fetch() {
    let conn = MemoryConnector::new().with_table("page_view", events(500));
    let monitor = scripted(vec![9.0, 9.0]);
    let mut session = open(&conn);

    let out = Materializer::new(&monitor, PAGE_ROWS)
        .run(
            &mut session,
            "SELECT * FROM page_view LIMIT 500",
            SizeClass::Small,
            "page_view",
        )
        .unwrap();
    assert_eq!(out.pages, 1);
    assert_eq!(out.num_rows(), 500);
    assert!(out.warnings.is_empty());
    assert_eq!(monitor.peak_gb().map(|gb| gb.round()), Some(9.0));
}
