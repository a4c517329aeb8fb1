//! Engine configuration that downstream crates can serialize/deserialize.
//!
//! Built once at process start (usually via [`EngineConfig::from_env`]) and
//! passed by reference. Library code never reads the environment itself.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Memory ceiling handed to the analytic engine (both soft and hard cap).
    pub mem_cap_bytes: usize,

    /// Directory where the engine spills intermediate state.
    pub spill_dir: String,

    /// Engine worker threads.
    pub threads: usize,

    /// Keep source row order. Off trades determinism for throughput.
    pub preserve_insertion_order: bool,

    pub enable_progress_bar: bool,

    /// Rows per page when a large result is streamed.
    pub page_rows: usize,

    /// `LIMIT` values at or below this mark a query as small.
    pub large_limit_threshold: u64,

    /// Resident memory (GB) above which a warning is logged.
    pub mem_warn_gb: f64,

    /// Resident memory (GB) above which chunked collection stops.
    pub mem_abort_gb: f64,

    /// Run a `COUNT(*)` over the view right after registration.
    pub probe_row_count: bool,

    /// Drop resolved partitions that have no objects in storage.
    pub probe_partitions: bool,

    /// Root URI under which the standard datasets live.
    pub data_root: String,

    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 4 * 1024 * 1024 * 1024, // 4 GiB default
            spill_dir: "/tmp/lakeq-spill".to_string(),
            threads: 4,
            preserve_insertion_order: false,
            enable_progress_bar: false,
            page_rows: 100_000,
            large_limit_threshold: 1_000_000,
            mem_warn_gb: 6.0,
            mem_abort_gb: 7.0,
            probe_row_count: true,
            probe_partitions: false,
            data_root: "s3://learning-analytics".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

/// Remote object-storage access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Custom S3-compatible endpoint URL, if any.
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint: None,
        }
    }
}

impl StorageConfig {
    /// Explicit key pair, only when both halves are present.
    pub fn explicit_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`
    /// - `AWS_REGION` / `AWS_DEFAULT_REGION`: storage region
    /// - `AWS_ENDPOINT_URL`: custom S3 endpoint
    /// - `LAKEQ_DATA_ROOT`: dataset root URI
    /// - `LAKEQ_MEM_CAP_BYTES`: engine memory ceiling in bytes
    /// - `LAKEQ_SPILL_DIR`: spill directory
    /// - `LAKEQ_THREADS`: engine threads
    /// - `LAKEQ_PAGE_ROWS`: rows per page for chunked results
    /// - `LAKEQ_LARGE_LIMIT`: LIMIT threshold for the size heuristic
    /// - `LAKEQ_MEM_WARN_GB`, `LAKEQ_MEM_ABORT_GB`: resident memory thresholds
    /// - `LAKEQ_PROBE_ROW_COUNT`, `LAKEQ_PROBE_PARTITIONS`: `true`/`false`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = parsed(&lookup, "LAKEQ_MEM_CAP_BYTES") {
            cfg.mem_cap_bytes = v;
        }
        if let Some(s) = lookup("LAKEQ_SPILL_DIR") {
            cfg.spill_dir = s;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_THREADS") {
            cfg.threads = v;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_PAGE_ROWS") {
            cfg.page_rows = v;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_LARGE_LIMIT") {
            cfg.large_limit_threshold = v;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_MEM_WARN_GB") {
            cfg.mem_warn_gb = v;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_MEM_ABORT_GB") {
            cfg.mem_abort_gb = v;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_PROBE_ROW_COUNT") {
            cfg.probe_row_count = v;
        }
        if let Some(v) = parsed(&lookup, "LAKEQ_PROBE_PARTITIONS") {
            cfg.probe_partitions = v;
        }
        if let Some(s) = lookup("LAKEQ_DATA_ROOT") {
            cfg.data_root = s;
        }

        if let Some(s) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            if !s.is_empty() {
                cfg.storage.region = s;
            }
        }
        cfg.storage.access_key_id = lookup("AWS_ACCESS_KEY_ID");
        cfg.storage.secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        cfg.storage.session_token = lookup("AWS_SESSION_TOKEN");
        cfg.storage.endpoint = lookup("AWS_ENDPOINT_URL");

        cfg
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_rows == 0 {
            return Err(Error::Config("page_rows must be positive".into()));
        }
        if self.threads == 0 {
            return Err(Error::Config("threads must be positive".into()));
        }
        if self.mem_cap_bytes < 1024 * 1024 {
            return Err(Error::Config(format!(
                "mem_cap_bytes {} is below 1 MiB",
                self.mem_cap_bytes
            )));
        }
        if self.mem_warn_gb > self.mem_abort_gb {
            return Err(Error::Config(format!(
                "warning threshold {} GB exceeds abort threshold {} GB",
                self.mem_warn_gb, self.mem_abort_gb
            )));
        }
        if !self.data_root.contains("://") {
            return Err(Error::Config(format!(
                "data root '{}' is not a URI",
                self.data_root
            )));
        }
        Ok(())
    }

    /// Memory ceiling rendered for the engine (whole MiB).
    pub fn mem_cap_setting(&self) -> String {
        format!("{}MiB", (self.mem_cap_bytes / (1024 * 1024)).max(1))
    }

    /// Produce a storage configuration snapshot used by the IO layer.
    pub fn storage_config(&self) -> StorageConfig {
        self.storage.clone()
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|s| s.trim().parse::<T>().ok())
}
