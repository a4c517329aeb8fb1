//! Result collection under a resident-memory bound.
//!
//! Small results come back in one call. Large results are pulled page by
//! page; after each page the process is sampled and collection stops once
//! the abort threshold is crossed. Stopping early is a warning, not an error:
//! the pages already fetched are returned.

use std::ops::ControlFlow;

use lakeq_core::date::DateRange;
use lakeq_core::types::RowBatch;
use lakeq_io::{EngineError, EngineHandle};
use lakeq_mem::MemoryMonitor;
use lakeq_planner::SizeClass;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ExecError, ExecWarning};
use crate::session::Session;

/// Where the page loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    Fetching,
    Exhausted,
    Aborted { resident_gb: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub batch: RowBatch,
    pub size_class: SizeClass,
    /// Pages fetched; 1 for a direct fetch.
    pub pages: usize,
    pub warnings: Vec<ExecWarning>,
    pub resolved_paths: Vec<String>,
    pub range: Option<DateRange>,
    /// Rows behind the view per the count probe.
    pub source_rows: Option<u64>,
    pub peak_resident_gb: Option<f64>,
}

impl QueryOutput {
    pub fn new(batch: RowBatch, size_class: SizeClass) -> Self {
        Self {
            batch,
            size_class,
            pages: 0,
            warnings: Vec::new(),
            resolved_paths: Vec::new(),
            range: None,
            source_rows: None,
            peak_resident_gb: None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// True when collection stopped on memory pressure.
    pub fn aborted(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ExecWarning::MemoryPressureAbort { .. }))
    }
}

pub struct Materializer<'m> {
    monitor: &'m MemoryMonitor,
    page_rows: usize,
}

impl<'m> Materializer<'m> {
    pub fn new(monitor: &'m MemoryMonitor, page_rows: usize) -> Self {
        Self {
            monitor,
            page_rows: page_rows.max(1),
        }
    }

    /// Run `sql` on the session's view. `table` labels errors and logs.
    pub fn run<H: EngineHandle>(
        &self,
        session: &mut Session<H>,
        sql: &str,
        size_class: SizeClass,
        table: &str,
    ) -> Result<QueryOutput, ExecError> {
        let mut out = match size_class {
            SizeClass::Small => self.direct(session, sql, table)?,
            SizeClass::Large => self.chunked(session, sql, table)?,
        };
        out.source_rows = session.row_count();
        info!(
            table,
            rows = out.num_rows(),
            pages = out.pages,
            size_class = ?size_class,
            "query materialized"
        );
        Ok(out)
    }

    fn direct<H: EngineHandle>(
        &self,
        session: &mut Session<H>,
        sql: &str,
        table: &str,
    ) -> Result<QueryOutput, ExecError> {
        self.monitor.sample("before direct fetch");
        let batch = session
            .query_all(sql)
            .map_err(|source| query_failed(table, source))?;
        self.monitor.sample("after direct fetch");

        let mut out = QueryOutput::new(batch, SizeClass::Small);
        out.pages = 1;
        Ok(out)
    }

    fn chunked<H: EngineHandle>(
        &self,
        session: &mut Session<H>,
        sql: &str,
        table: &str,
    ) -> Result<QueryOutput, ExecError> {
        let mut pages: Vec<RowBatch> = Vec::new();
        let mut rows = 0usize;
        let mut state = ChunkState::Fetching;

        let names = session
            .query_pages(sql, self.page_rows, &mut |mut page| {
                page.shrink_to_fit();
                rows += page.num_rows();
                pages.push(page);
                debug!(table, page = pages.len(), rows, "page fetched");

                let sample = self.monitor.sample(&format!("page {}", pages.len()));
                if sample.should_abort() {
                    state = ChunkState::Aborted {
                        resident_gb: sample.resident_gb().unwrap_or_default(),
                    };
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .map_err(|source| query_failed(table, source))?;
        if state == ChunkState::Fetching {
            state = ChunkState::Exhausted;
        }

        let page_count = pages.len();
        let mut warnings = Vec::new();
        match state {
            ChunkState::Aborted { resident_gb } => {
                let abort_gb = self.monitor.thresholds().abort_gb;
                warn!(
                    table,
                    pages = page_count,
                    rows,
                    resident_gb,
                    abort_gb,
                    "memory pressure abort, returning partial result"
                );
                warnings.push(ExecWarning::MemoryPressureAbort {
                    pages: page_count,
                    rows,
                    resident_gb,
                    abort_gb,
                });
            }
            ChunkState::Fetching | ChunkState::Exhausted => {}
        }

        let batch = if pages.is_empty() {
            RowBatch::empty(names)
        } else {
            RowBatch::concat_pages(pages).map_err(|e| {
                query_failed(
                    table,
                    EngineError::Fetch {
                        rows_fetched: rows,
                        message: e.to_string(),
                    },
                )
            })?
        };

        let mut out = QueryOutput::new(batch, SizeClass::Large);
        out.pages = page_count;
        out.warnings = warnings;
        Ok(out)
    }
}

fn query_failed(table: &str, source: EngineError) -> ExecError {
    ExecError::QueryExecution {
        table: table.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeq_core::config::EngineConfig;
    use lakeq_core::{Column, Scalar};
    use lakeq_io::MemoryConnector;
    use lakeq_mem::{MemoryThresholds, ScriptedProbe};

    fn ids(n: i64) -> RowBatch {
        RowBatch::new(vec![Column::new("id", (0..n).map(Scalar::I64).collect())])
    }

    fn quiet_cfg() -> EngineConfig {
        EngineConfig {
            probe_row_count: false,
            ..EngineConfig::default()
        }
    }

    fn monitor(readings: Vec<f64>) -> MemoryMonitor {
        MemoryMonitor::new(
            Box::new(ScriptedProbe::from_gb(readings)),
            MemoryThresholds::default(),
        )
    }

    #[test]
    fn chunked_fetch_concatenates_in_order() {
        let conn = MemoryConnector::new().with_table("t", ids(25));
        let cfg = quiet_cfg();
        let mon = monitor(vec![]);
        let mut session = Session::open(&conn, &cfg, &["s3://b/t".to_string()], "t").unwrap();
        let out = Materializer::new(&mon, 10)
            .run(&mut session, "select * from t", SizeClass::Large, "t")
            .unwrap();
        assert_eq!(out.pages, 3);
        assert_eq!(out.num_rows(), 25);
        assert_eq!(out.batch.columns[0].values[24], Scalar::I64(24));
        assert!(!out.aborted());
    }

    #[test]
    fn empty_large_result_keeps_columns() {
        let conn = MemoryConnector::new().with_table("t", RowBatch::empty(["a", "b"]));
        let cfg = quiet_cfg();
        let mon = monitor(vec![]);
        let mut session = Session::open(&conn, &cfg, &["s3://b/t".to_string()], "t").unwrap();
        let out = Materializer::new(&mon, 10)
            .run(&mut session, "select * from t", SizeClass::Large, "t")
            .unwrap();
        assert_eq!(out.pages, 0);
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.batch.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn direct_fetch_never_aborts() {
        let conn = MemoryConnector::new().with_table("t", ids(3));
        let cfg = quiet_cfg();
        let mon = monitor(vec![9.0, 9.0]);
        let mut session = Session::open(&conn, &cfg, &["s3://b/t".to_string()], "t").unwrap();
        let out = Materializer::new(&mon, 10)
            .run(&mut session, "select * from t limit 3", SizeClass::Small, "t")
            .unwrap();
        assert_eq!(out.pages, 1);
        assert_eq!(out.num_rows(), 3);
        assert!(out.warnings.is_empty());
    }
}
