//! System resource monitoring during long-running operations
//!
//! A [`PerfMonitor`] samples CPU and memory usage on a background thread at a
//! fixed interval. It is owned by the caller and passed where needed; there is
//! no global monitor instance. Sampling problems are logged and never fail the
//! monitored operation.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, warn};

/// A single resource usage sample
#[derive(Debug, Clone)]
pub struct Sample {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Global CPU utilization in percent
    pub cpu_percent: f32,
    /// Used memory in bytes
    pub mem_used_bytes: u64,
    /// Total memory in bytes
    pub mem_total_bytes: u64,
}

/// Background CPU/memory sampler
#[derive(Debug)]
pub struct PerfMonitor {
    interval: Duration,
    running: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<Sample>>>,
    handle: Option<JoinHandle<()>>,
}

impl PerfMonitor {
    /// Create a monitor sampling at the given interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Arc::new(AtomicBool::new(false)),
            samples: Arc::new(Mutex::new(Vec::new())),
            handle: None,
        }
    }

    /// Start sampling. Calling `start` on a running monitor is a no-op.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let running = Arc::clone(&self.running);
        let samples = Arc::clone(&self.samples);
        let interval = self.interval;

        self.handle = Some(std::thread::spawn(move || {
            let mut system = System::new();
            while running.load(Ordering::SeqCst) {
                system.refresh_cpu_usage();
                system.refresh_memory();
                let sample = Sample {
                    timestamp: Utc::now(),
                    cpu_percent: system.global_cpu_usage(),
                    mem_used_bytes: system.used_memory(),
                    mem_total_bytes: system.total_memory(),
                };
                match samples.lock() {
                    Ok(mut collected) => collected.push(sample),
                    Err(poisoned) => poisoned.into_inner().push(sample),
                }
                std::thread::sleep(interval);
            }
        }));
        debug!("Performance monitoring started");
    }

    /// Stop sampling and return everything collected since `start`.
    pub fn stop(&mut self) -> Vec<Sample> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Vec::new();
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Performance monitor thread panicked");
        }
        let mut collected = match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let samples = std::mem::take(&mut *collected);
        debug!("Performance monitoring stopped, collected {} samples", samples.len());
        samples
    }
}

impl Drop for PerfMonitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Average CPU and memory utilization over a sample set, if any
#[must_use]
pub fn averages(samples: &[Sample]) -> Option<(f32, f64)> {
    if samples.is_empty() {
        return None;
    }
    let cpu: f32 = samples.iter().map(|s| s.cpu_percent).sum::<f32>() / samples.len() as f32;
    let mem: f64 = samples
        .iter()
        .map(|s| {
            if s.mem_total_bytes == 0 {
                0.0
            } else {
                s.mem_used_bytes as f64 / s.mem_total_bytes as f64 * 100.0
            }
        })
        .sum::<f64>()
        / samples.len() as f64;
    Some((cpu, mem))
}

/// Pick a parallel job count from CPU count and available memory.
///
/// Assumes roughly 2 GiB per job, clamps to `cap` when given, never returns 0.
#[must_use]
pub fn optimal_parallel_jobs(cap: Option<u32>) -> u32 {
    let mut system = System::new();
    system.refresh_cpu_list(sysinfo::CpuRefreshKind::nothing());
    system.refresh_memory();

    let cpus = u32::try_from(system.cpus().len()).unwrap_or(1).max(1);
    let mem_jobs = (system.total_memory() / (2 * 1024 * 1024 * 1024)).max(1);
    let mem_jobs = u32::try_from(mem_jobs).unwrap_or(u32::MAX);

    let mut jobs = cpus.min(mem_jobs);
    if let Some(cap) = cap {
        jobs = jobs.min(cap);
    }
    jobs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_collects_samples() {
        let mut monitor = PerfMonitor::new(Duration::from_millis(20));
        monitor.start();
        std::thread::sleep(Duration::from_millis(120));
        let samples = monitor.stop();
        assert!(!samples.is_empty());
        for sample in &samples {
            assert!(sample.mem_total_bytes > 0);
        }
    }

    #[test]
    fn stop_without_start_is_empty() {
        let mut monitor = PerfMonitor::new(Duration::from_millis(20));
        assert!(monitor.stop().is_empty());
    }

    #[test]
    fn double_start_is_harmless() {
        let mut monitor = PerfMonitor::new(Duration::from_millis(20));
        monitor.start();
        monitor.start();
        std::thread::sleep(Duration::from_millis(50));
        let samples = monitor.stop();
        assert!(!samples.is_empty());
    }

    #[test]
    fn averages_of_empty_is_none() {
        assert!(averages(&[]).is_none());
    }

    #[test]
    fn averages_are_computed_over_all_samples() {
        let make = |cpu, used| Sample {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            mem_used_bytes: used,
            mem_total_bytes: 100,
        };
        let (cpu, mem) = averages(&[make(10.0, 50), make(30.0, 70)]).unwrap();
        assert!((cpu - 20.0).abs() < f32::EPSILON);
        assert!((mem - 60.0).abs() < 1e-9);
    }

    #[test]
    fn optimal_jobs_is_at_least_one_and_respects_cap() {
        assert!(optimal_parallel_jobs(None) >= 1);
        assert_eq!(optimal_parallel_jobs(Some(1)), 1);
    }
}
