#![forbid(unsafe_code)]
//! lakeq-core: shared vocabulary for the lakeq engine.
//!
//! Everything here is pure data: engine configuration, the dataset catalog,
//! date ranges, and the row-batch result type. No I/O lives in this crate.

pub mod config;
pub mod dataset;
pub mod date;
pub mod error;
pub mod schema;
pub mod types;

pub use config::{EngineConfig, StorageConfig};
pub use dataset::{DatasetCatalog, DatasetDescriptor, PartitionScheme};
pub use date::{DateBounds, DateRange};
pub use error::{Error, Result};
pub use types::{Column, RowBatch, Scalar};
