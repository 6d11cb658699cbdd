use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::error::ZiriError;

const WARNING_RATIO: f64 = 0.80;
const CRITICAL_RATIO: f64 = 0.95;

/// A threshold-crossing event the monitor raises (spec §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEvent {
    Warning,
    Critical,
    Normal,
}

/// Samples resident memory and gates processing when over threshold
/// (spec §4.I). `max_memory_mb` is the configured budget for the whole
/// process; `warning`/`critical` are 80%/95% of it.
pub struct MemoryMonitor {
    max_memory_bytes: u64,
    check_interval: Duration,
    system: Mutex<System>,
    pid: Pid,
    last_sample_bytes: AtomicU64,
}

impl MemoryMonitor {
    pub fn new(max_memory_mb: u64) -> Self {
        Self::with_interval(max_memory_mb, Duration::from_millis(1000))
    }

    pub fn with_interval(max_memory_mb: u64, check_interval: Duration) -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());
        system.refresh_process(pid);
        Self {
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            check_interval,
            system: Mutex::new(system),
            pid,
            last_sample_bytes: AtomicU64::new(0),
        }
    }

    fn sample_bytes(&self) -> u64 {
        let mut system = self.system.lock().unwrap();
        system.refresh_process(self.pid);
        let bytes = system.process(self.pid).map(|p| p.memory()).unwrap_or(0);
        self.last_sample_bytes.store(bytes, Ordering::Relaxed);
        bytes
    }

    pub fn usage_percent(&self) -> f64 {
        if self.max_memory_bytes == 0 {
            return 0.0;
        }
        (self.sample_bytes() as f64 / self.max_memory_bytes as f64) * 100.0
    }

    pub fn is_within_limits(&self) -> bool {
        self.sample_bytes() < (self.max_memory_bytes as f64 * CRITICAL_RATIO) as u64
    }

    pub fn event(&self) -> MemoryEvent {
        let bytes = self.sample_bytes();
        if bytes as f64 >= self.max_memory_bytes as f64 * CRITICAL_RATIO {
            MemoryEvent::Critical
        } else if bytes as f64 >= self.max_memory_bytes as f64 * WARNING_RATIO {
            MemoryEvent::Warning
        } else {
            MemoryEvent::Normal
        }
    }

    /// Loops, cooperatively yielding, until usage drops below critical or
    /// `timeout` expires. Fails with `MemoryLimitExceeded` on timeout.
    pub async fn wait_for_available(&self, timeout: Duration) -> Result<(), ZiriError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.event() {
                MemoryEvent::Critical => {
                    warn!(usage_percent = self.usage_percent(), "memory critical, pausing dispatch");
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ZiriError::MemoryLimitExceeded(format!(
                            "usage stayed above critical threshold for {:?}",
                            timeout
                        )));
                    }
                    sleep(self.check_interval).await;
                }
                MemoryEvent::Warning => {
                    debug!(usage_percent = self.usage_percent(), "memory warning");
                    return Ok(());
                }
                MemoryEvent::Normal => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_limits_when_budget_is_generous() {
        let monitor = MemoryMonitor::new(100_000);
        assert!(monitor.is_within_limits());
        assert_eq!(monitor.event(), MemoryEvent::Normal);
    }

    #[tokio::test]
    async fn wait_for_available_returns_immediately_when_not_critical() {
        let monitor = MemoryMonitor::new(100_000);
        let result = monitor.wait_for_available(Duration::from_millis(50)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_for_available_times_out_under_tiny_budget() {
        let monitor = MemoryMonitor::with_interval(1, Duration::from_millis(10));
        let result = monitor.wait_for_available(Duration::from_millis(30)).await;
        assert!(result.is_err());
    }
}
