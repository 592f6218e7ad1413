//! Host capacity probes reported with registration and status updates.

use std::path::{Path, PathBuf};
use taskweave_core::ResourceMetrics;
use tracing::warn;

pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> ResourceMetrics;
}

/// Reads `/proc/meminfo` and `/proc/loadavg`. Sources that can't be read
/// report zero; `unavailable_sources` lists them so startup can say so.
pub struct SystemProbe {
    meminfo: PathBuf,
    loadavg: PathBuf,
    gpu_fraction: f64,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::with_proc_root("/proc")
    }
}

impl SystemProbe {
    pub fn with_proc_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            meminfo: root.join("meminfo"),
            loadavg: root.join("loadavg"),
            gpu_fraction: 0.0,
        }
    }

    pub fn with_gpu_fraction(mut self, fraction: f64) -> Self {
        self.gpu_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    fn memory(&self) -> Option<u64> {
        std::fs::read_to_string(&self.meminfo)
            .ok()
            .and_then(|s| parse_mem_available(&s))
    }

    fn cpu(&self) -> Option<f64> {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        std::fs::read_to_string(&self.loadavg)
            .ok()
            .and_then(|s| parse_cpu_available(&s, cpus))
    }

    /// Paths that can't currently be read or parsed.
    pub fn unavailable_sources(&self) -> Vec<&Path> {
        let mut missing = Vec::new();
        if self.memory().is_none() {
            missing.push(self.meminfo.as_path());
        }
        if self.cpu().is_none() {
            missing.push(self.loadavg.as_path());
        }
        missing
    }

    /// Warn once if any source is unreadable, since the registry would see
    /// zero capacity.
    pub fn warn_if_unavailable(&self) -> bool {
        let missing = self.unavailable_sources();
        if missing.is_empty() {
            return false;
        }
        for path in missing {
            warn!("Capacity source {} unavailable, reporting zero", path.display());
        }
        true
    }
}

impl ResourceProbe for SystemProbe {
    fn sample(&self) -> ResourceMetrics {
        ResourceMetrics {
            available_memory: self.memory().unwrap_or(0),
            available_cpu: self.cpu().unwrap_or(0.0),
            available_gpu: self.gpu_fraction,
        }
    }
}

/// Fixed values, for tests and hosts without procfs.
pub struct FixedProbe(pub ResourceMetrics);

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> ResourceMetrics {
        self.0
    }
}

/// `MemAvailable` in bytes.
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// `1 - load1 / cpus`, clamped to [0, 1].
fn parse_cpu_available(loadavg: &str, cpus: usize) -> Option<f64> {
    let load1: f64 = loadavg.split_whitespace().next()?.parse().ok()?;
    Some((1.0 - load1 / cpus.max(1) as f64).clamp(0.0, 1.0))
}
