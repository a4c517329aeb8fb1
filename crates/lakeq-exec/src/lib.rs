#![forbid(unsafe_code)]
//! lakeq-exec: runs one query against a remote dataset under a memory bound.
//!
//! A call resolves partition paths, opens a fresh engine session with a view
//! over them, runs the query directly or page by page, and tears the session
//! down on every exit path.

pub mod error;
pub mod materialize;
pub mod metrics;
pub mod runtime;
pub mod session;

pub use error::{ExecError, ExecWarning};
pub use materialize::{ChunkState, Materializer, QueryOutput};
pub use runtime::{QueryPlan, QueryPlanner, QueryRunner};
pub use session::{setup_statements, with_session, Session, SessionStage};
