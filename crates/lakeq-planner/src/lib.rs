#![forbid(unsafe_code)]
//! lakeq-planner: everything decided about a query before an engine is opened.
//!
//! - `paths`: dataset descriptor + date range → remote path patterns
//! - `extract`: implicit date bounds scraped from the SQL text
//! - `classify`: large/small result prediction
//! - `inspect`: the narrow trait the executor consumes, so a real SQL parser
//!   can replace the textual heuristics without touching callers
//!
//! NOTE: The heuristics are deliberately textual. They never parse SQL.

pub mod classify;
pub mod extract;
pub mod inspect;
pub mod paths;

pub use classify::{classify, is_large, SizeClass};
pub use extract::{extract_bounds, extract_range};
pub use inspect::{HeuristicInspector, QueryInspector};
pub use paths::resolve_paths;
