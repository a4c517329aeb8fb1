//! Engine session lifecycle.
//!
//! Every query gets its own handle: open, enable remote storage, configure
//! credentials and the resource profile, register one view over the resolved
//! paths. The handle is released exactly once when the `Session` drops,
//! whether the call succeeded or not.

use std::fmt;

use lakeq_core::config::{EngineConfig, StorageConfig};
use lakeq_core::types::RowBatch;
use lakeq_io::sql::{ident, literal, read_parquet};
use lakeq_io::{Connector, EngineError, EngineHandle, PageSink};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ExecError;

/// Name of the storage secret the session creates.
const SECRET_NAME: &str = "lakeq_s3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Open,
    Extensions,
    Credentials,
    Settings,
    RegisterView,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStage::Open => "opening engine",
            SessionStage::Extensions => "loading storage extensions",
            SessionStage::Credentials => "configuring credentials",
            SessionStage::Settings => "applying resource settings",
            SessionStage::RegisterView => "registering view",
        };
        f.write_str(s)
    }
}

/// Statements run on a fresh handle before the view is registered.
pub fn setup_statements(cfg: &EngineConfig) -> Vec<(SessionStage, String)> {
    let mut out = vec![
        (SessionStage::Extensions, "INSTALL httpfs".to_string()),
        (SessionStage::Extensions, "LOAD httpfs".to_string()),
    ];
    let storage = cfg.storage_config();
    if storage.explicit_credentials().is_none() {
        out.push((SessionStage::Extensions, "INSTALL aws".to_string()));
        out.push((SessionStage::Extensions, "LOAD aws".to_string()));
    }
    out.push((SessionStage::Credentials, secret_statement(&storage)));

    let settings = [
        format!("SET memory_limit = {}", literal(&cfg.mem_cap_setting())),
        format!("SET max_memory = {}", literal(&cfg.mem_cap_setting())),
        format!("SET temp_directory = {}", literal(&cfg.spill_dir)),
        format!("SET threads = {}", cfg.threads),
        format!(
            "SET preserve_insertion_order = {}",
            cfg.preserve_insertion_order
        ),
        format!("SET enable_progress_bar = {}", cfg.enable_progress_bar),
    ];
    out.extend(settings.into_iter().map(|s| (SessionStage::Settings, s)));
    out
}

fn secret_statement(storage: &StorageConfig) -> String {
    let mut parts = vec!["TYPE S3".to_string()];
    match storage.explicit_credentials() {
        Some((key, secret)) => {
            parts.push(format!("KEY_ID {}", literal(key)));
            parts.push(format!("SECRET {}", literal(secret)));
            if let Some(token) = storage.session_token.as_deref().filter(|t| !t.is_empty()) {
                parts.push(format!("SESSION_TOKEN {}", literal(token)));
            }
        }
        None => parts.push("PROVIDER CREDENTIAL_CHAIN".to_string()),
    }
    parts.push(format!("REGION {}", literal(&storage.region)));
    if let Some(endpoint) = storage.endpoint.as_deref().filter(|e| !e.is_empty()) {
        // The engine wants host[:port]; the scheme only decides TLS.
        let (host, use_ssl) = match endpoint.split_once("://") {
            Some((scheme, rest)) => (rest, !scheme.eq_ignore_ascii_case("http")),
            None => (endpoint, true),
        };
        parts.push(format!("ENDPOINT {}", literal(host.trim_end_matches('/'))));
        parts.push("URL_STYLE 'path'".to_string());
        parts.push(format!("USE_SSL {use_ssl}"));
    }
    format!(
        "CREATE OR REPLACE SECRET {SECRET_NAME} ({})",
        parts.join(", ")
    )
}

pub struct Session<H: EngineHandle> {
    handle: Option<H>,
    view_name: String,
    paths: Vec<String>,
    row_count: Option<u64>,
}

impl<H: EngineHandle> Session<H> {
    /// Open a handle and bind `view_name` to `paths`.
    ///
    /// Any failure after the handle exists releases it before returning.
    pub fn open<C>(
        connector: &C,
        cfg: &EngineConfig,
        paths: &[String],
        view_name: &str,
    ) -> Result<Self, ExecError>
    where
        C: Connector<Handle = H>,
    {
        if paths.is_empty() {
            return Err(lakeq_core::Error::Config(format!(
                "no partition paths to register for view '{view_name}'"
            ))
            .into());
        }
        let fail = |stage: SessionStage| {
            move |source: EngineError| ExecError::Session {
                stage,
                paths: paths.to_vec(),
                source,
            }
        };

        let handle = connector.open().map_err(fail(SessionStage::Open))?;
        info!(
            engine = connector.name(),
            view = view_name,
            paths = paths.len(),
            "session opened"
        );
        let mut session = Session {
            handle: Some(handle),
            view_name: view_name.to_string(),
            paths: paths.to_vec(),
            row_count: None,
        };

        for (stage, sql) in setup_statements(cfg) {
            session.execute(&sql).map_err(fail(stage))?;
        }

        let create_view = format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM {}",
            ident(view_name),
            read_parquet(paths)
        );
        session
            .execute(&create_view)
            .map_err(fail(SessionStage::RegisterView))?;
        info!(view = view_name, paths = ?paths, "view registered");

        if cfg.probe_row_count {
            session.probe_row_count();
        }
        Ok(session)
    }

    pub fn view_name(&self) -> &str {
        &self.view_name
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Rows behind the view, when the count probe ran and succeeded.
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    fn handle(&mut self) -> Result<&mut H, EngineError> {
        self.handle
            .as_mut()
            .ok_or_else(|| EngineError::Release("session already released".into()))
    }

    pub fn execute(&mut self, sql: &str) -> Result<(), EngineError> {
        self.handle()?.execute(sql)
    }

    pub fn query_all(&mut self, sql: &str) -> Result<RowBatch, EngineError> {
        self.handle()?.query_all(sql)
    }

    pub fn query_pages(
        &mut self,
        sql: &str,
        page_rows: usize,
        on_page: &mut PageSink<'_>,
    ) -> Result<Vec<String>, EngineError> {
        self.handle()?.query_pages(sql, page_rows, on_page)
    }

    fn probe_row_count(&mut self) {
        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM {}",
            ident(&self.view_name)
        );
        match self.query_all(&sql) {
            Ok(batch) => {
                let count = batch
                    .columns
                    .first()
                    .and_then(|c| c.values.first())
                    .and_then(|v| v.as_i64())
                    .and_then(|n| u64::try_from(n).ok());
                self.row_count = count;
                info!(view = %self.view_name, rows = ?count, "row count probe");
            }
            Err(e) => warn!(view = %self.view_name, error = %e, "row count probe failed"),
        }
    }

    /// Release now instead of at scope end.
    pub fn close(self) {
        drop(self);
    }
}

impl<H: EngineHandle> Drop for Session<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.release() {
                warn!(view = %self.view_name, error = %e, "engine release failed");
            }
        }
    }
}

/// Run `f` inside a session; the session is released before this returns.
pub fn with_session<C, T, F>(
    connector: &C,
    cfg: &EngineConfig,
    paths: &[String],
    view_name: &str,
    f: F,
) -> Result<T, ExecError>
where
    C: Connector,
    F: FnOnce(&mut Session<C::Handle>) -> Result<T, ExecError>,
{
    let mut session = Session::open(connector, cfg, paths, view_name)?;
    f(&mut session)
}
