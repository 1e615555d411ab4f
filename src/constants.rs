//! System-wide default values for forgemesh-core.

/// Worker pool size used when `PoolConfig::worker_count == 0` and CPU
/// detection itself fails.
pub const FALLBACK_WORKER_COUNT: usize = 2;

/// Minimum worker pool size regardless of detected CPU count.
pub const MIN_WORKER_COUNT: usize = 2;

/// Default number of hash buckets in the shared K/V store.
pub const DEFAULT_KV_BUCKET_COUNT: usize = 64;

/// Soft cap on concurrently-running agents before `create_agent` starts
/// logging a warning (creation still proceeds).
pub const DEFAULT_MAX_CONCURRENT_AGENTS: usize = 8;

/// Default per-task timeout when a task does not specify its own.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Poll interval used by the polling forms of `wait`/`wait_children`/
/// `wait_all` (spec §4.5, §4.6 — a documented implementation choice, not a
/// contract).
pub const WAIT_POLL_INTERVAL_MS: u64 = 50;

/// Interval the coordinator's `wait_all` polls the registry at.
pub const COORDINATOR_WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Grace period `Agent::terminate` waits for a running worker thread to
/// cooperatively observe termination.
pub const TERMINATE_GRACE_MS: u64 = 100;

/// Slice size `MessageBus::request` re-polls the sender's mailbox at while
/// waiting for a correlated response.
pub const REQUEST_POLL_SLICE_MS: u64 = 50;

/// Initial capacity of the task queue's backing heap array.
pub const INITIAL_HEAP_CAPACITY: usize = 16;
