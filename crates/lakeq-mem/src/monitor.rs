//! Resident-memory sampling and threshold classification.
//!
//! Precise readings come from `/proc/self/status` (`VmRSS`). Where that file
//! does not exist a coarse `sysinfo` estimate is reported as
//! [`MemorySample::Unavailable`]: callers must treat it as "do not abort".

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use lakeq_core::config::EngineConfig;

use crate::tracking::PeakTracker;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// What a probe could observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReading {
    /// Resident set size read directly from the OS.
    Precise(u64),
    /// Rough figure, not trusted for thresholds.
    Estimate(u64),
    Unavailable,
}

pub trait ResidentProbe: Send + Sync {
    fn read(&self) -> ProbeReading;
}

/// Reads `VmRSS` from a proc status file.
#[derive(Debug, Clone)]
pub struct ProcStatusProbe {
    path: PathBuf,
}

impl ProcStatusProbe {
    pub fn new() -> Self {
        Self::with_path("/proc/self/status")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_available(&self) -> bool {
        self.path.exists()
    }
}

impl Default for ProcStatusProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResidentProbe for ProcStatusProbe {
    fn read(&self) -> ProbeReading {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| parse_vm_rss_kb(&text))
            .map(|kb| ProbeReading::Precise(kb.saturating_mul(1024)))
            .unwrap_or(ProbeReading::Unavailable)
    }
}

/// `VmRSS:   123456 kB` → `123456`.
pub fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

/// Process memory as reported by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl ResidentProbe for SysinfoProbe {
    fn read(&self) -> ProbeReading {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return ProbeReading::Unavailable;
        };
        let mut sys = sysinfo::System::new();
        if !sys.refresh_process(pid) {
            return ProbeReading::Unavailable;
        }
        sys.process(pid)
            .map(|p| ProbeReading::Estimate(p.memory()))
            .unwrap_or(ProbeReading::Unavailable)
    }
}

/// `/proc` when present, `sysinfo` otherwise.
#[derive(Debug, Clone)]
pub struct DefaultProbe {
    proc_status: ProcStatusProbe,
}

impl DefaultProbe {
    pub fn new() -> Self {
        Self {
            proc_status: ProcStatusProbe::new(),
        }
    }
}

impl Default for DefaultProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResidentProbe for DefaultProbe {
    fn read(&self) -> ProbeReading {
        if self.proc_status.is_available() {
            match self.proc_status.read() {
                ProbeReading::Unavailable => {}
                reading => return reading,
            }
        }
        SysinfoProbe.read()
    }
}

/// Replays a fixed sequence of readings; `Unavailable` once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    readings: Mutex<VecDeque<ProbeReading>>,
}

impl ScriptedProbe {
    pub fn new(readings: impl IntoIterator<Item = ProbeReading>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
        }
    }

    /// Convenience: precise readings given in GB.
    pub fn from_gb(readings_gb: impl IntoIterator<Item = f64>) -> Self {
        Self::new(
            readings_gb
                .into_iter()
                .map(|gb| ProbeReading::Precise((gb * BYTES_PER_GB) as u64)),
        )
    }

    pub fn remaining(&self) -> usize {
        self.readings.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl ResidentProbe for ScriptedProbe {
    fn read(&self) -> ProbeReading {
        self.readings
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or(ProbeReading::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryThresholds {
    pub warn_gb: f64,
    pub abort_gb: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            warn_gb: 6.0,
            abort_gb: 7.0,
        }
    }
}

impl MemoryThresholds {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            warn_gb: cfg.mem_warn_gb,
            abort_gb: cfg.mem_abort_gb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub stage: String,
    pub resident_gb: f64,
    pub over_warning: bool,
    pub over_abort: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemorySample {
    Measured(MemoryReading),
    /// No precise figure; thresholds were not evaluated.
    Unavailable {
        stage: String,
        estimate_gb: Option<f64>,
    },
}

impl MemorySample {
    /// Only a precise reading over the abort threshold stops collection.
    pub fn should_abort(&self) -> bool {
        matches!(self, MemorySample::Measured(r) if r.over_abort)
    }

    pub fn resident_gb(&self) -> Option<f64> {
        match self {
            MemorySample::Measured(r) => Some(r.resident_gb),
            MemorySample::Unavailable { estimate_gb, .. } => *estimate_gb,
        }
    }
}

pub struct MemoryMonitor {
    probe: Box<dyn ResidentProbe>,
    thresholds: MemoryThresholds,
    peak: PeakTracker,
}

impl MemoryMonitor {
    pub fn new(probe: Box<dyn ResidentProbe>, thresholds: MemoryThresholds) -> Self {
        Self {
            probe,
            thresholds,
            peak: PeakTracker::new(),
        }
    }

    /// Platform probe with thresholds taken from `cfg`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(Box::new(DefaultProbe::new()), MemoryThresholds::from_config(cfg))
    }

    pub fn thresholds(&self) -> MemoryThresholds {
        self.thresholds
    }

    /// Peak precise reading in GB since construction or the last reset.
    pub fn peak_gb(&self) -> Option<f64> {
        self.peak.peak().map(to_gb)
    }

    pub fn reset_peak(&self) {
        self.peak.reset();
    }

    pub fn sample(&self, stage: &str) -> MemorySample {
        match self.probe.read() {
            ProbeReading::Precise(bytes) => {
                self.peak.record(bytes);
                let resident_gb = to_gb(bytes);
                let reading = MemoryReading {
                    stage: stage.to_string(),
                    resident_gb,
                    over_warning: resident_gb > self.thresholds.warn_gb,
                    over_abort: resident_gb > self.thresholds.abort_gb,
                };
                if reading.over_warning {
                    tracing::warn!(
                        stage,
                        resident_gb,
                        warn_gb = self.thresholds.warn_gb,
                        "resident memory above warning threshold"
                    );
                } else {
                    tracing::debug!(stage, resident_gb, "memory sample");
                }
                MemorySample::Measured(reading)
            }
            ProbeReading::Estimate(bytes) => {
                let estimate_gb = to_gb(bytes);
                tracing::debug!(stage, estimate_gb, "coarse memory estimate");
                MemorySample::Unavailable {
                    stage: stage.to_string(),
                    estimate_gb: Some(estimate_gb),
                }
            }
            ProbeReading::Unavailable => MemorySample::Unavailable {
                stage: stage.to_string(),
                estimate_gb: None,
            },
        }
    }
}

/// Bytes → GB rounded to two decimals.
fn to_gb(bytes: u64) -> f64 {
    ((bytes as f64 / BYTES_PER_GB) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(probe: ScriptedProbe) -> MemoryMonitor {
        MemoryMonitor::new(Box::new(probe), MemoryThresholds::default())
    }

    #[test]
    fn parses_vm_rss_line() {
        let status = "Name:\tlakeq\nVmPeak:\t  900 kB\nVmRSS:\t  2048 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss_kb(status), Some(2048));
        assert_eq!(parse_vm_rss_kb("Name:\tx\n"), None);
    }

    #[test]
    fn proc_probe_reads_file() {
        let dir = std::env::temp_dir().join("lakeq-mem-proc-probe");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("status");
        std::fs::write(&path, "VmRSS:\t 1024 kB\n").unwrap();
        let probe = ProcStatusProbe::with_path(&path);
        assert_eq!(probe.read(), ProbeReading::Precise(1024 * 1024));

        let missing = ProcStatusProbe::with_path(dir.join("nope"));
        assert!(!missing.is_available());
        assert_eq!(missing.read(), ProbeReading::Unavailable);
    }

    #[test]
    fn classifies_against_thresholds() {
        let m = monitor(ScriptedProbe::from_gb([1.0, 6.5, 7.25]));

        let MemorySample::Measured(low) = m.sample("a") else {
            panic!("expected measured");
        };
        assert!(!low.over_warning && !low.over_abort);

        let MemorySample::Measured(warn) = m.sample("b") else {
            panic!("expected measured");
        };
        assert!(warn.over_warning && !warn.over_abort);

        let high = m.sample("c");
        assert!(high.should_abort());
        assert_eq!(high.resident_gb(), Some(7.25));
        assert_eq!(m.peak_gb(), Some(7.25));
    }

    #[test]
    fn estimates_never_abort() {
        let huge = 64 * 1024 * 1024 * 1024u64;
        let m = monitor(ScriptedProbe::new([ProbeReading::Estimate(huge), ProbeReading::Unavailable]));
        let est = m.sample("est");
        assert!(!est.should_abort());
        assert_eq!(est.resident_gb(), Some(64.0));
        assert!(!m.sample("none").should_abort());
        assert_eq!(m.peak_gb(), None);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(to_gb(1_610_612_736), 1.5);
        assert_eq!(to_gb(1_073_741_824 + 5_000_000), 1.0);
    }
}
