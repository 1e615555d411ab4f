//! Fixed-size worker thread pool feeding every other component (spec §4.1).

use super::{wait_while, AtomicCounter, Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    not_empty: Condvar,
    idle: Condvar,
    active: AtomicCounter,
}

/// A fixed pool of `N` worker threads consuming a FIFO job list.
///
/// Created with [`WorkerPool::create`], torn down with [`WorkerPool::free`].
/// Jobs never return a value to the caller; pair [`WorkerPool::submit`] with
/// a closure over a completion channel/flag, or use
/// [`WorkerPool::submit_with_callback`] when a notification after
/// completion is enough.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool of `n` worker threads. `n == 0` detects the CPU count,
    /// falling back to [`crate::constants::FALLBACK_WORKER_COUNT`], and
    /// never goes below [`crate::constants::MIN_WORKER_COUNT`].
    pub fn create(n: usize) -> Self {
        let n = if n == 0 { super::cpu_count() } else { n };
        let n = n.max(crate::constants::MIN_WORKER_COUNT);

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
            active: AtomicCounter::new(0),
        });

        let mut workers = Vec::with_capacity(n);
        for id in 0..n {
            let shared = shared.clone();
            workers.push(
                std::thread::Builder::new()
                    .name(format!("forgemesh-worker-{id}"))
                    .spawn(move || Self::worker_loop(id, shared))
                    .expect("failed to spawn worker thread"),
            );
        }

        info!("worker pool started with {} threads", n);
        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    fn worker_loop(id: usize, shared: Arc<Shared>) {
        loop {
            let job = {
                let guard = shared.queue.lock();
                let (mut guard, _) = wait_while(&shared.not_empty, guard, None, |q| {
                    q.jobs.is_empty() && !q.shutdown
                });
                if guard.jobs.is_empty() && guard.shutdown {
                    return;
                }
                guard.jobs.pop_front()
            };

            let Some(job) = job else { continue };

            shared.active.increment();
            job();
            let remaining = shared.active.decrement();

            let guard = shared.queue.lock();
            if remaining == 0 && guard.jobs.is_empty() {
                shared.idle.notify_all();
            }
            drop(guard);
            debug!("worker {id} finished a job, {remaining} still active");
        }
    }

    /// Enqueue a job. The completion is silent; use
    /// [`WorkerPool::submit_with_callback`] to be notified.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = self.shared.queue.lock();
        guard.jobs.push_back(Box::new(job));
        self.shared.not_empty.notify_one();
    }

    /// Enqueue a job and invoke `callback` once it returns.
    pub fn submit_with_callback<F, C>(&self, job: F, callback: C)
    where
        F: FnOnce() + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.submit(move || {
            job();
            callback();
        });
    }

    /// Block until the job queue is empty and no worker is active.
    pub fn wait_all(&self) {
        let guard = self.shared.queue.lock();
        let (_, _) = wait_while(&self.shared.idle, guard, None, |q| {
            !q.jobs.is_empty() || self.shared.active.get() > 0
        });
    }

    /// Number of jobs queued but not yet claimed by a worker.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    pub fn thread_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Signal shutdown, wake every worker, and join all threads. Any jobs
    /// still queued are dropped without running — draining is the caller's
    /// responsibility via `wait_all` beforehand.
    pub fn free(&self) {
        {
            let mut guard = self.shared.queue.lock();
            guard.shutdown = true;
        }
        self.shared.not_empty.notify_all();

        let mut workers = self.workers.lock();
        let dropped = self.shared.queue.lock().jobs.len();
        if dropped > 0 {
            warn!("worker pool shutting down with {dropped} unclaimed jobs");
        }
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.free();
    }
}
