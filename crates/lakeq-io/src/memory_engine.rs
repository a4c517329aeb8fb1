//! Scripted in-process engine for tests.
//!
//! Tables are matched by substring ("needle") against the SQL text, so a test
//! can register `tutor_activity` and any statement mentioning that view gets
//! its rows. Every statement is logged and handle open/release are counted,
//! which lets tests assert the session lifecycle without a network.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lakeq_core::types::RowBatch;

use crate::engine::{Connector, EngineError, EngineHandle, PageSink};

/// Prefix of the row-count probe statement; answered with the table's size.
const ROW_COUNT_PREFIX: &str = "select count(*) as row_count from";

#[derive(Debug, Default)]
pub struct MemoryEngineState {
    pub tables: Vec<(String, RowBatch)>,
    pub statements: Vec<String>,
    pub opens: usize,
    pub releases: usize,
    pub fail_open: bool,
    pub fail_on: Option<String>,
    pub fail_after_pages: Option<usize>,
    pub release_error: bool,
}

impl MemoryEngineState {
    fn lookup(&self, sql: &str) -> Option<&RowBatch> {
        self.tables
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, batch)| batch)
    }

    fn check_fault(&self, sql: &str) -> Result<(), EngineError> {
        match &self.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => Err(EngineError::statement(
                sql,
                format!("injected fault on '{needle}'"),
            )),
            _ => Ok(()),
        }
    }
}

/// Cheap to clone; clones share one state.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryEngineState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, needle: impl Into<String>, batch: RowBatch) -> Self {
        self.state().tables.push((needle.into(), batch));
        self
    }

    /// Any statement containing `needle` fails.
    pub fn fail_on(self, needle: impl Into<String>) -> Self {
        self.state().fail_on = Some(needle.into());
        self
    }

    /// Paged fetches fail once `pages` pages have been delivered.
    pub fn fail_after_pages(self, pages: usize) -> Self {
        self.state().fail_after_pages = Some(pages);
        self
    }

    pub fn fail_open(self) -> Self {
        self.state().fail_open = true;
        self
    }

    pub fn fail_release(self) -> Self {
        self.state().release_error = true;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryEngineState> {
        lock(&self.state)
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn releases(&self) -> usize {
        self.state().releases
    }

    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }
}

impl Connector for MemoryConnector {
    type Handle = MemoryHandle;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self) -> Result<MemoryHandle, EngineError> {
        let mut state = self.state();
        if state.fail_open {
            return Err(EngineError::Open("injected open fault".into()));
        }
        state.opens += 1;
        Ok(MemoryHandle {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MemoryHandle {
    state: Arc<Mutex<MemoryEngineState>>,
}

impl MemoryHandle {
    fn run(&self, sql: &str) -> Result<RowBatch, EngineError> {
        let mut state = lock(&self.state);
        state.statements.push(sql.to_string());
        state.check_fault(sql)?;
        let batch = state
            .lookup(sql)
            .cloned()
            .ok_or_else(|| EngineError::statement(sql, "no table registered for query"))?;
        if sql.trim_start().to_lowercase().starts_with(ROW_COUNT_PREFIX) {
            return Ok(RowBatch::new(vec![lakeq_core::Column::new(
                "row_count",
                vec![lakeq_core::Scalar::I64(batch.num_rows() as i64)],
            )]));
        }
        Ok(batch)
    }
}

impl EngineHandle for MemoryHandle {
    fn execute(&mut self, sql: &str) -> Result<(), EngineError> {
        let mut state = lock(&self.state);
        state.statements.push(sql.to_string());
        state.check_fault(sql)
    }

    fn query_all(&mut self, sql: &str) -> Result<RowBatch, EngineError> {
        self.run(sql)
    }

    fn query_pages(
        &mut self,
        sql: &str,
        page_rows: usize,
        on_page: &mut PageSink<'_>,
    ) -> Result<Vec<String>, EngineError> {
        let batch = self.run(sql)?;
        let fail_after = lock(&self.state).fail_after_pages;
        let names = batch.column_names();
        let page_rows = page_rows.max(1);

        let mut offset = 0;
        let mut delivered = 0;
        while offset < batch.num_rows() {
            if fail_after.is_some_and(|n| delivered >= n) {
                return Err(EngineError::Fetch {
                    rows_fetched: offset,
                    message: "injected fetch fault".into(),
                });
            }
            let page = batch.slice(offset, page_rows);
            offset += page.num_rows();
            delivered += 1;
            if let ControlFlow::Break(()) = on_page(page) {
                break;
            }
        }
        Ok(names)
    }

    fn release(self) -> Result<(), EngineError> {
        let mut state = lock(&self.state);
        state.releases += 1;
        if state.release_error {
            return Err(EngineError::Release("injected release fault".into()));
        }
        Ok(())
    }
}

fn lock(state: &Mutex<MemoryEngineState>) -> MutexGuard<'_, MemoryEngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeq_core::{Column, Scalar};

    fn rows(n: i64) -> RowBatch {
        RowBatch::new(vec![Column::new("id", (0..n).map(Scalar::I64).collect())])
    }

    #[test]
    fn pages_are_rechunked() {
        let conn = MemoryConnector::new().with_table("t", rows(25));
        let mut handle = conn.open().unwrap();
        let mut sizes = Vec::new();
        let names = handle
            .query_pages("select * from t", 10, &mut |page| {
                sizes.push(page.num_rows());
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(names, vec!["id"]);
    }

    #[test]
    fn break_stops_fetching() {
        let conn = MemoryConnector::new().with_table("t", rows(25));
        let mut handle = conn.open().unwrap();
        let mut seen = 0;
        handle
            .query_pages("select * from t", 10, &mut |_| {
                seen += 1;
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn row_count_probe_reports_size() {
        let conn = MemoryConnector::new().with_table("\"t\"", rows(7));
        let mut handle = conn.open().unwrap();
        let out = handle
            .query_all("SELECT COUNT(*) AS row_count FROM \"t\"")
            .unwrap();
        assert_eq!(out.columns[0].values[0], Scalar::I64(7));
    }

    #[test]
    fn faults_and_counters() {
        let conn = MemoryConnector::new().fail_on("VIEW").fail_release();
        let mut handle = conn.open().unwrap();
        assert!(handle.execute("SET threads = 4").is_ok());
        assert!(handle.execute("CREATE VIEW v AS SELECT 1").is_err());
        assert!(handle.release().is_err());
        assert_eq!(conn.opens(), 1);
        assert_eq!(conn.releases(), 1);
        assert_eq!(conn.statements().len(), 2);
    }
}
