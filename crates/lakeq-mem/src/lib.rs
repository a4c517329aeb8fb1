#![forbid(unsafe_code)]
//! lakeq-mem: resident-memory sampling for the chunked materializer.
//!
//! The analytic engine enforces its own memory ceiling. This crate watches
//! the whole process from the outside so result collection can stop before
//! the container is killed.

pub mod monitor;
pub mod tracking;

pub use monitor::{
    DefaultProbe, MemoryMonitor, MemoryReading, MemorySample, MemoryThresholds, ProbeReading,
    ProcStatusProbe, ResidentProbe, ScriptedProbe, SysinfoProbe,
};
pub use tracking::PeakTracker;
