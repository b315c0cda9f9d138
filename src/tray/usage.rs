//! CPU usage accounting for Physics handlers.

use std::time::Duration;

/// Modules below this much total CPU time are not reported at shutdown.
pub const MIN_REPORT_TIME: Duration = Duration::from_secs(10);

/// Accumulated cost of a module's Physics handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysicsUsage {
    pub ncall: u64,
    pub user_time: Duration,
    pub system_time: Duration,
}

impl PhysicsUsage {
    pub fn total_time(&self) -> Duration {
        self.user_time + self.system_time
    }

    /// Whether this module used enough CPU to be worth reporting.
    pub fn is_reportable(&self) -> bool {
        self.total_time() > MIN_REPORT_TIME
    }
}

/// Process CPU times at one instant.
#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    user: Duration,
    system: Duration,
}

#[cfg(unix)]
fn cpu_times() -> Option<CpuTimes> {
    fn to_duration(tv: libc::timeval) -> Duration {
        Duration::from_secs(tv.tv_sec.max(0) as u64)
            + Duration::from_micros(tv.tv_usec.max(0) as u64)
    }

    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: getrusage fully initializes `usage` when it returns 0.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let usage = unsafe { usage.assume_init() };
    Some(CpuTimes {
        user: to_duration(usage.ru_utime),
        system: to_duration(usage.ru_stime),
    })
}

#[cfg(not(unix))]
fn cpu_times() -> Option<CpuTimes> {
    None
}

/// Measures the CPU time spent between `start` and `stop`.
///
/// If either reading fails the measurement is dropped and the counters are
/// left untouched.
pub struct UsageTimer {
    start: Option<CpuTimes>,
}

impl UsageTimer {
    pub fn start() -> Self {
        Self { start: cpu_times() }
    }

    /// Add the elapsed CPU time to `usage`.
    pub fn stop(self, usage: &mut PhysicsUsage) {
        let (Some(start), Some(end)) = (self.start, cpu_times()) else {
            return;
        };
        usage.user_time += end.user.saturating_sub(start.user);
        usage.system_time += end.system.saturating_sub(start.system);
    }
}
