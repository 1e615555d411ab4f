//! Portable concurrency primitives (spec component 1): a `Mutex`/`Condvar`
//! pair built on `parking_lot` (no poisoning, a timed `wait_for` the
//! blocking/timed operations elsewhere in the crate need), a lock-free
//! counter, and CPU-count detection.

pub mod pool;

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

pub use parking_lot::{Condvar, Mutex, MutexGuard};

/// Outcome of a condition-variable wait with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Notified,
    TimedOut,
}

/// Wait on `condvar` (guarding `guard`) until `predicate` holds or `timeout`
/// elapses. `timeout == None` waits indefinitely.
pub fn wait_while<'a, T, F>(
    condvar: &Condvar,
    mut guard: MutexGuard<'a, T>,
    timeout: Option<Duration>,
    mut predicate: F,
) -> (MutexGuard<'a, T>, WaitResult)
where
    F: FnMut(&mut T) -> bool,
{
    match timeout {
        None => {
            while predicate(&mut guard) {
                condvar.wait(&mut guard);
            }
            (guard, WaitResult::Notified)
        }
        Some(timeout) => {
            let deadline = std::time::Instant::now() + timeout;
            while predicate(&mut guard) {
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                if remaining.is_zero() {
                    return (guard, WaitResult::TimedOut);
                }
                let timed_out = condvar.wait_for(&mut guard, remaining).timed_out();
                if timed_out && predicate(&mut guard) {
                    return (guard, WaitResult::TimedOut);
                }
            }
            (guard, WaitResult::Notified)
        }
    }
}

/// A simple `i64` counter read and mutated without holding the owning
/// component's mutex (used for task/agent statistics and the worker pool's
/// active-task count).
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicI64);

impl AtomicCounter {
    pub const fn new(value: i64) -> Self {
        Self(AtomicI64::new(value))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn increment(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn decrement(&self) -> i64 {
        self.0.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

/// Blocking sleep, used by the polling loops the spec explicitly sanctions
/// as an implementation choice (registry `wait`, coordinator `wait_all`).
pub fn sleep(duration: Duration) {
    std::thread::sleep(duration);
}

/// Detected logical CPU count, falling back to
/// [`crate::constants::FALLBACK_WORKER_COUNT`] if detection somehow yields
/// zero.
pub fn cpu_count() -> usize {
    let n = num_cpus::get();
    if n == 0 {
        crate::constants::FALLBACK_WORKER_COUNT
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_round_trips() {
        let c = AtomicCounter::new(0);
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert_eq!(c.decrement(), 1);
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn cpu_count_is_nonzero() {
        assert!(cpu_count() >= 1);
    }

    #[test]
    fn wait_while_times_out() {
        let mutex = Mutex::new(0);
        let condvar = Condvar::new();
        let guard = mutex.lock();
        let (_, result) = wait_while(&condvar, guard, Some(Duration::from_millis(20)), |v| {
            *v == 0
        });
        assert_eq!(result, WaitResult::TimedOut);
    }
}
