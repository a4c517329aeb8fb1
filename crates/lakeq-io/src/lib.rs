#![forbid(unsafe_code)]
//! lakeq-io: everything that touches an engine, object storage, or a file.
//!
//! - `engine`: the `Connector`/`EngineHandle` seam the executor drives
//! - `duckdb` (feature `duckdb`): in-process DuckDB reading parquet over httpfs
//! - `memory_engine`: scripted engine for tests (no network)
//! - `probe`: object-store existence checks for resolved partitions
//! - `writers`: JSONL/CSV result files

pub mod engine;
pub mod error;
pub mod memory_engine;
pub mod probe;
pub mod sql;
pub mod writers;

#[cfg(feature = "duckdb")]
pub mod duckdb;

pub use engine::{Connector, EngineError, EngineHandle, PageSink};
pub use error::{Error, Result};
pub use memory_engine::{MemoryConnector, MemoryEngineState, MemoryHandle};
pub use probe::{ObjectStoreProbe, PartitionFilter};
pub use writers::{CsvWriter, JsonlWriter, OutputFormat};

#[cfg(feature = "duckdb")]
pub use self::duckdb::{DuckDbConnector, DuckDbHandle};
