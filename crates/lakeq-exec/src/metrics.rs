//! Metrics hook.
//!
//! Key/value events on the `lakeq::metrics` target; the binary decides where
//! they go through its subscriber filter.

use crate::materialize::QueryOutput;

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "lakeq", event);
    let _enter = span.enter();
    for (k, v) in key_values {
        tracing::trace!(target: "lakeq::metrics", %event, %k, %v, "metric");
    }
}

/// Standard metric set for a finished query.
pub fn emit_query(dataset: &str, out: &QueryOutput) {
    let mut kv = vec![
        ("dataset", dataset.to_string()),
        ("rows", out.num_rows().to_string()),
        ("pages", out.pages.to_string()),
        ("partitions", out.resolved_paths.len().to_string()),
        ("warnings", out.warnings.len().to_string()),
    ];
    if let Some(gb) = out.peak_resident_gb {
        kv.push(("peak_resident_gb", format!("{gb:.2}")));
    }
    emit_span("query", &kv);
}
