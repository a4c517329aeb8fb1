//! The analytic-engine seam.
//!
//! A `Connector` opens independent handles; a handle runs statements and
//! queries until it is released. Handles are never shared between calls.

use std::ops::ControlFlow;

use lakeq_core::types::RowBatch;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine open failed: {0}")]
    Open(String),

    #[error("statement failed: {message} (sql: {sql})")]
    Statement { sql: String, message: String },

    #[error("fetch failed after {rows_fetched} rows: {message}")]
    Fetch { rows_fetched: usize, message: String },

    #[error("engine release failed: {0}")]
    Release(String),

    #[error("{0}")]
    Unsupported(String),
}

impl EngineError {
    pub fn statement(sql: &str, message: impl ToString) -> Self {
        EngineError::Statement {
            sql: sql.to_string(),
            message: message.to_string(),
        }
    }
}

/// Receives each page of a streamed result; `Break` stops the fetch loop.
pub type PageSink<'a> = dyn FnMut(RowBatch) -> ControlFlow<()> + 'a;

pub trait EngineHandle {
    /// Run statements that return no rows (settings, DDL).
    fn execute(&mut self, sql: &str) -> Result<(), EngineError>;

    /// Run a query and fetch the full result in one call.
    fn query_all(&mut self, sql: &str) -> Result<RowBatch, EngineError>;

    /// Run a query and hand its rows to `on_page` in pages of at most
    /// `page_rows` rows. Empty pages are never delivered. Returns the
    /// result's column names. The underlying cursor is closed before return
    /// on every path.
    fn query_pages(
        &mut self,
        sql: &str,
        page_rows: usize,
        on_page: &mut PageSink<'_>,
    ) -> Result<Vec<String>, EngineError>;

    /// Close the handle.
    fn release(self) -> Result<(), EngineError>
    where
        Self: Sized;
}

pub trait Connector {
    type Handle: EngineHandle;

    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Open a fresh handle.
    fn open(&self) -> Result<Self::Handle, EngineError>;
}
