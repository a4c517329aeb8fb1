use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lakeq_core::dataset::{DatasetCatalog, EVENT_CAPTURE};
use lakeq_core::{Column, DateRange, RowBatch, Scalar};
use lakeq_planner::{classify, extract_range, resolve_paths};

const WIDE_QUERY: &str = "SELECT t.book_id, t.user_id, t.minutes \
    FROM tutor_activity t \
    WHERE t.created_at >= '2023-02-01' AND t.created_at <= '2024-11-30' \
      AND (t.last_graded_at BETWEEN '2023-01-01' AND '2023-06-30' \
           OR t.first_paid_at > '2022-12-01') \
    ORDER BY t.created_at";

fn make_page(rows: usize) -> RowBatch {
    RowBatch::new(vec![
        Column::new("id", (0..rows as i64).map(Scalar::I64).collect()),
        Column::new(
            "kind",
            (0..rows).map(|i| Scalar::Str(format!("kind-{}", i % 8))).collect(),
        ),
    ])
}

fn bench_heuristics(c: &mut Criterion) {
    c.bench_function("extract_range", |b| {
        b.iter(|| extract_range(black_box(WIDE_QUERY)))
    });
    c.bench_function("classify", |b| b.iter(|| classify(black_box(WIDE_QUERY))));
}

fn bench_resolve(c: &mut Criterion) {
    let catalog = DatasetCatalog::standard("s3://learning-analytics");
    let descriptor = catalog
        .get(EVENT_CAPTURE)
        .unwrap()
        .with_table("page_view");
    let range = DateRange::new(
        chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    )
    .unwrap();
    c.bench_function("resolve_paths_two_years_by_day", |b| {
        b.iter(|| resolve_paths(&descriptor, Some(black_box(&range))).unwrap())
    });
}

fn bench_concat(c: &mut Criterion) {
    let pages: Vec<RowBatch> = (0..8).map(|_| make_page(10_000)).collect();
    c.bench_function("concat_pages", |b| {
        b.iter(|| RowBatch::concat_pages(black_box(pages.clone())).unwrap())
    });
}

criterion_group!(heuristics, bench_heuristics, bench_resolve, bench_concat);
criterion_main!(heuristics);
