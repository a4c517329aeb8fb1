//! In-process DuckDB engine.
//!
//! Each handle is its own in-memory database; remote parquet is reached
//! through the `httpfs` extension the session installs. Result rows are
//! converted to `Scalar` column by column.

use std::ops::ControlFlow;

use ::duckdb::types::{TimeUnit, ValueRef};
use ::duckdb::Connection;
use lakeq_core::types::{Column, RowBatch, Scalar};
use tracing::debug;

use crate::engine::{Connector, EngineError, EngineHandle, PageSink};

#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbConnector;

impl DuckDbConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for DuckDbConnector {
    type Handle = DuckDbHandle;

    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn open(&self) -> Result<DuckDbHandle, EngineError> {
        let conn = Connection::open_in_memory().map_err(|e| EngineError::Open(e.to_string()))?;
        Ok(DuckDbHandle { conn })
    }
}

pub struct DuckDbHandle {
    conn: Connection,
}

impl DuckDbHandle {
    /// Run `sql` and stream its rows into pages of `page_rows`.
    fn fetch(
        &mut self,
        sql: &str,
        page_rows: usize,
        on_page: &mut PageSink<'_>,
    ) -> Result<Vec<String>, EngineError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| EngineError::statement(sql, e))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| EngineError::statement(sql, e))?;

        let names: Vec<String> = match rows.as_ref() {
            Some(stmt) => (0..stmt.column_count())
                .map(|i| {
                    stmt.column_name(i)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| format!("column{i}"))
                })
                .collect(),
            None => Vec::new(),
        };

        let page_rows = page_rows.max(1);
        let mut page = empty_columns(&names, page_rows);
        let mut in_page = 0usize;
        let mut fetched = 0usize;

        loop {
            let row = rows.next().map_err(|e| EngineError::Fetch {
                rows_fetched: fetched,
                message: e.to_string(),
            })?;
            let Some(row) = row else { break };
            for (i, values) in page.iter_mut().enumerate() {
                let value = row.get_ref(i).map_err(|e| EngineError::Fetch {
                    rows_fetched: fetched,
                    message: e.to_string(),
                })?;
                values.push(to_scalar(value));
            }
            in_page += 1;
            fetched += 1;

            if in_page == page_rows {
                let full = std::mem::replace(&mut page, empty_columns(&names, page_rows));
                in_page = 0;
                if let ControlFlow::Break(()) = on_page(into_batch(&names, full)) {
                    debug!(rows = fetched, "page consumer stopped fetch early");
                    return Ok(names);
                }
            }
        }
        if in_page > 0 && on_page(into_batch(&names, page)).is_break() {
            debug!(rows = fetched, "page consumer stopped on final page");
        }
        Ok(names)
    }
}

impl EngineHandle for DuckDbHandle {
    fn execute(&mut self, sql: &str) -> Result<(), EngineError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| EngineError::statement(sql, e))
    }

    fn query_all(&mut self, sql: &str) -> Result<RowBatch, EngineError> {
        let mut out = None;
        let names = self.fetch(sql, usize::MAX, &mut |batch| {
            out = Some(batch);
            ControlFlow::Continue(())
        })?;
        Ok(out.unwrap_or_else(|| RowBatch::empty(names)))
    }

    fn query_pages(
        &mut self,
        sql: &str,
        page_rows: usize,
        on_page: &mut PageSink<'_>,
    ) -> Result<Vec<String>, EngineError> {
        self.fetch(sql, page_rows, on_page)
    }

    fn release(self) -> Result<(), EngineError> {
        self.conn
            .close()
            .map_err(|(_, e)| EngineError::Release(e.to_string()))
    }
}

fn empty_columns(names: &[String], page_rows: usize) -> Vec<Vec<Scalar>> {
    // `query_all` passes usize::MAX; don't try to reserve that.
    let reserve = page_rows.min(4096);
    names.iter().map(|_| Vec::with_capacity(reserve)).collect()
}

fn into_batch(names: &[String], values: Vec<Vec<Scalar>>) -> RowBatch {
    RowBatch::new(
        names
            .iter()
            .zip(values)
            .map(|(name, values)| Column::new(name.clone(), values))
            .collect(),
    )
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

fn to_scalar(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Boolean(v) => Scalar::Bool(v),
        ValueRef::TinyInt(v) => Scalar::I32(i32::from(v)),
        ValueRef::SmallInt(v) => Scalar::I32(i32::from(v)),
        ValueRef::Int(v) => Scalar::I32(v),
        ValueRef::BigInt(v) => Scalar::I64(v),
        ValueRef::UTinyInt(v) => Scalar::I32(i32::from(v)),
        ValueRef::USmallInt(v) => Scalar::I32(i32::from(v)),
        ValueRef::UInt(v) => Scalar::I64(i64::from(v)),
        ValueRef::UBigInt(v) => i64::try_from(v)
            .map(Scalar::I64)
            .unwrap_or_else(|_| Scalar::Str(v.to_string())),
        ValueRef::HugeInt(v) => i64::try_from(v)
            .map(Scalar::I64)
            .unwrap_or_else(|_| Scalar::Str(v.to_string())),
        ValueRef::Float(v) => Scalar::F32(v),
        ValueRef::Double(v) => Scalar::F64(v),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(Scalar::F64).unwrap_or(Scalar::Str(text))
        }
        ValueRef::Text(bytes) => Scalar::Str(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Scalar::Bin(bytes.to_vec()),
        ValueRef::Date32(days) => Scalar::Date32(days),
        ValueRef::Timestamp(unit, v) => Scalar::TimestampMicros(to_micros(unit, v)),
        // Nested and interval types are rendered through DuckDB's own value.
        other => Scalar::Str(format!("{:?}", other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_and_names_from_real_engine() {
        let mut handle = DuckDbConnector::new().open().unwrap();
        handle
            .execute("CREATE TABLE t AS SELECT range AS id FROM range(25)")
            .unwrap();
        let mut sizes = Vec::new();
        let names = handle
            .query_pages("SELECT id FROM t ORDER BY id", 10, &mut |page| {
                sizes.push(page.num_rows());
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(names, vec!["id"]);
        assert_eq!(sizes, vec![10, 10, 5]);
        handle.release().unwrap();
    }

    #[test]
    fn stopping_consumer_sees_one_page() {
        let mut handle = DuckDbConnector::new().open().unwrap();
        for (n, expected) in [(25, 10), (5, 5)] {
            let mut sizes = Vec::new();
            let names = handle
                .query_pages(&format!("SELECT range AS id FROM range({n})"), 10, &mut |page| {
                    sizes.push(page.num_rows());
                    ControlFlow::Break(())
                })
                .unwrap();
            assert_eq!(names, vec!["id"]);
            assert_eq!(sizes, vec![expected]);
        }
        handle.release().unwrap();
    }

    #[test]
    fn empty_result_keeps_projection() {
        let mut handle = DuckDbConnector::new().open().unwrap();
        let out = handle
            .query_all("SELECT 1 AS a, 'x' AS b WHERE false")
            .unwrap();
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn dates_and_timestamps_convert() {
        let mut handle = DuckDbConnector::new().open().unwrap();
        let out = handle
            .query_all("SELECT DATE '1970-01-02' AS d, TIMESTAMP '1970-01-01 00:00:01' AS ts")
            .unwrap();
        assert_eq!(out.columns[0].values[0], Scalar::Date32(1));
        assert_eq!(out.columns[1].values[0], Scalar::TimestampMicros(1_000_000));
    }
}
