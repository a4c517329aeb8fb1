//! Query runner: the caller-facing surface.
//!
//! `query` drives one call end to end: date range → partition paths →
//! optional existence probe → session → direct or chunked fetch → release.
//! The per-dataset wrappers are thin parameterizations of it.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use lakeq_core::config::EngineConfig;
use lakeq_core::dataset::{
    DatasetCatalog, DatasetDescriptor, PartitionScheme, EVENT_CAPTURE, EXERCISES,
    NOTES_HIGHLIGHTS, TUTOR_ACTIVITY,
};
use lakeq_core::date::{DateBounds, DateRange};
use lakeq_core::types::RowBatch;
use lakeq_io::{Connector, PartitionFilter};
use lakeq_mem::MemoryMonitor;
use lakeq_planner::{resolve_paths, HeuristicInspector, QueryInspector, SizeClass};

use crate::error::{ExecError, ExecWarning};
use crate::materialize::{Materializer, QueryOutput};
use crate::metrics;
use crate::session::with_session;

/// Everything decided about a query before an engine is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub dataset: String,
    pub view_name: String,
    pub scheme: PartitionScheme,
    pub range: Option<DateRange>,
    pub paths: Vec<String>,
    pub size_class: SizeClass,
}

/// Dataset lookup, date-range resolution, and path/size decisions.
pub struct QueryPlanner {
    catalog: DatasetCatalog,
    inspector: Box<dyn QueryInspector>,
}

impl QueryPlanner {
    /// Standard catalog rooted at `cfg.data_root`, textual heuristics.
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            catalog: DatasetCatalog::standard(&cfg.data_root),
            inspector: Box::new(HeuristicInspector::new(cfg.large_limit_threshold)),
        }
    }

    pub fn with_catalog(mut self, catalog: DatasetCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_inspector(mut self, inspector: Box<dyn QueryInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    /// Date range for a dated dataset.
    ///
    /// Explicit bounds win over bounds found in the SQL; both explicit and
    /// inverted is a configuration error. An extracted bound on the wrong
    /// side of an explicit one is ignored, never swapped in.
    fn date_range(
        &self,
        descriptor: &DatasetDescriptor,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Option<DateRange>, ExecError> {
        match descriptor.scheme() {
            PartitionScheme::None | PartitionScheme::Wildcard => Ok(None),
            PartitionScheme::ByYear | PartitionScheme::ByDay => {
                if let (Some(start), Some(end)) = (start, end) {
                    return Ok(Some(DateRange::new(start, end)?));
                }
                let explicit = DateBounds {
                    lower: start,
                    upper: end,
                };
                let mut found = self.inspector.date_bounds(sql);
                if matches!((start, found.upper), (Some(s), Some(u)) if u < s) {
                    found.upper = None;
                }
                if matches!((end, found.lower), (Some(e), Some(l)) if l > e) {
                    found.lower = None;
                }
                Ok(Some(explicit.or(found).resolve()))
            }
        }
    }

    pub fn plan_descriptor(
        &self,
        descriptor: &DatasetDescriptor,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<QueryPlan, ExecError> {
        let range = self.date_range(descriptor, sql, start, end)?;
        let paths = resolve_paths(descriptor, range.as_ref())?;
        Ok(QueryPlan {
            dataset: descriptor.id().to_string(),
            view_name: descriptor.view_name().to_string(),
            scheme: descriptor.scheme(),
            range,
            paths,
            size_class: self.inspector.size_class(sql),
        })
    }

    /// Plan against a catalog dataset, optionally bound to `table`.
    pub fn plan(
        &self,
        dataset: &str,
        table: Option<&str>,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<QueryPlan, ExecError> {
        let descriptor = self.catalog.get(dataset)?;
        match table {
            Some(table) => self.plan_descriptor(&descriptor.with_table(table), sql, start, end),
            None => self.plan_descriptor(descriptor, sql, start, end),
        }
    }

    pub fn size_class(&self, sql: &str) -> SizeClass {
        self.inspector.size_class(sql)
    }

    pub fn date_bounds(&self, sql: &str) -> DateBounds {
        self.inspector.date_bounds(sql)
    }
}

pub struct QueryRunner<C: Connector> {
    cfg: EngineConfig,
    planner: QueryPlanner,
    connector: C,
    monitor: MemoryMonitor,
    partitions: Option<Box<dyn PartitionFilter>>,
}

impl<C: Connector> QueryRunner<C> {
    /// Runner over the standard catalog rooted at `cfg.data_root`.
    pub fn new(cfg: EngineConfig, connector: C) -> Result<Self, ExecError> {
        cfg.validate()?;
        Ok(Self {
            planner: QueryPlanner::new(&cfg),
            monitor: MemoryMonitor::from_config(&cfg),
            partitions: None,
            connector,
            cfg,
        })
    }

    pub fn with_catalog(mut self, catalog: DatasetCatalog) -> Self {
        self.planner = self.planner.with_catalog(catalog);
        self
    }

    pub fn with_monitor(mut self, monitor: MemoryMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_inspector(mut self, inspector: Box<dyn QueryInspector>) -> Self {
        self.planner = self.planner.with_inspector(inspector);
        self
    }

    /// Drop resolved partitions that do not exist before opening a session.
    pub fn with_partition_filter(mut self, filter: Box<dyn PartitionFilter>) -> Self {
        self.partitions = Some(filter);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        self.planner.catalog()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn plan(
        &self,
        dataset: &str,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<QueryPlan, ExecError> {
        self.planner.plan(dataset, None, sql, start, end)
    }

    pub fn query(
        &self,
        dataset: &str,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<QueryOutput, ExecError> {
        let descriptor = self.planner.catalog().get(dataset)?;
        self.query_descriptor(descriptor, sql, start, end)
    }

    pub fn query_descriptor(
        &self,
        descriptor: &DatasetDescriptor,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<QueryOutput, ExecError> {
        let plan = self.planner.plan_descriptor(descriptor, sql, start, end)?;
        info!(
            dataset = %plan.dataset,
            view = %plan.view_name,
            partitions = plan.paths.len(),
            range = ?plan.range,
            size_class = ?plan.size_class,
            "query planned"
        );
        if plan.scheme == PartitionScheme::ByDay {
            warn!(
                dataset = %plan.dataset,
                partitions = plan.paths.len(),
                "day-partitioned execution not implemented, returning resolved paths only"
            );
            return Ok(Self::not_executed(plan));
        }
        self.execute_plan(plan, sql)
    }

    /// Empty output for a plan that is resolved but never run.
    fn not_executed(plan: QueryPlan) -> QueryOutput {
        let mut out = QueryOutput::new(RowBatch::default(), plan.size_class);
        out.pages = 0;
        out.warnings.push(ExecWarning::ExecutionNotImplemented {
            dataset: plan.dataset,
        });
        out.resolved_paths = plan.paths;
        out.range = plan.range;
        out
    }

    fn execute_plan(&self, plan: QueryPlan, sql: &str) -> Result<QueryOutput, ExecError> {
        let paths = match &self.partitions {
            Some(filter) => {
                let kept = filter.retain_existing(&plan.paths)?;
                if kept.is_empty() {
                    warn!(
                        dataset = %plan.dataset,
                        checked = plan.paths.len(),
                        "no resolved partitions exist"
                    );
                    let mut out = QueryOutput::new(RowBatch::default(), plan.size_class);
                    out.warnings.push(ExecWarning::NoPartitions {
                        dataset: plan.dataset.clone(),
                        checked: plan.paths.len(),
                    });
                    out.resolved_paths = plan.paths;
                    out.range = plan.range;
                    return Ok(out);
                }
                kept
            }
            None => plan.paths,
        };

        self.monitor.reset_peak();
        let materializer = Materializer::new(&self.monitor, self.cfg.page_rows);
        let mut out = with_session(
            &self.connector,
            &self.cfg,
            &paths,
            &plan.view_name,
            |session| materializer.run(session, sql, plan.size_class, &plan.view_name),
        )?;
        out.resolved_paths = paths;
        out.range = plan.range;
        out.peak_resident_gb = self.monitor.peak_gb();
        metrics::emit_query(&plan.dataset, &out);
        Ok(out)
    }

    pub fn query_tutor_activity(
        &self,
        sql: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<QueryOutput, ExecError> {
        self.query(TUTOR_ACTIVITY, sql, start, end)
    }

    pub fn query_exercises(&self, sql: &str) -> Result<QueryOutput, ExecError> {
        self.query(EXERCISES, sql, None, None)
    }

    /// `table` picks the notes/highlights table and is the view name.
    pub fn query_notes_highlights(&self, table: &str, sql: &str) -> Result<QueryOutput, ExecError> {
        let descriptor = self.planner.catalog().get(NOTES_HIGHLIGHTS)?.with_table(table);
        self.query_descriptor(&descriptor, sql, None, None)
    }

    /// Resolves the day partitions for `event_type` over `start..=end` but
    /// does not run `sql`: the output is empty and carries an
    /// `ExecutionNotImplemented` warning alongside the resolved paths.
    pub fn query_event_capture(
        &self,
        event_type: &str,
        start: NaiveDate,
        end: NaiveDate,
        sql: &str,
    ) -> Result<QueryOutput, ExecError> {
        let plan = self
            .planner
            .plan(EVENT_CAPTURE, Some(event_type), sql, Some(start), Some(end))?;
        warn!(
            dataset = %plan.dataset,
            event_type,
            partitions = plan.paths.len(),
            "event capture execution not implemented, returning resolved paths only"
        );
        Ok(Self::not_executed(plan))
    }
}

#[cfg(feature = "duckdb")]
impl QueryRunner<lakeq_io::DuckDbConnector> {
    /// Runner over in-process DuckDB.
    pub fn duckdb(cfg: EngineConfig) -> Result<Self, ExecError> {
        Self::new(cfg, lakeq_io::DuckDbConnector::new())
    }
}
