//! # forgemesh-core
//!
//! A multi-agent orchestration runtime: a priority task queue with
//! dependency tracking, an agent registry with a lifecycle state machine, a
//! coordinator performing capability-based dispatch and resource-conflict
//! arbitration, a message bus, a locked shared key/value store, and the
//! worker thread pool underlying all of it.
//!
//! ## Architecture
//!
//! - **Concurrency primitives** (`concurrency`) — portable Mutex/Condvar/
//!   atomic-counter wrappers and the worker pool (`concurrency::pool`).
//! - **Shared K/V store** (`kv_store`) — locked string map with optional
//!   JSON persistence.
//! - **Message bus** (`bus`) — mailboxes, broadcast, subscriptions,
//!   request/response correlation.
//! - **Task queue** (`queue`) — priority max-heap with dependency edges.
//! - **Agent registry** (`agent`) — named agents, lifecycle state machine,
//!   parent/child spawning.
//! - **Coordinator** (`coordinator`) — dispatch, resource locks, conflict
//!   resolution, result aggregation.
//!
//! [`Runtime`] wires these together, mirroring how the teacher's
//! `AgentOrchestrator` composes its constituent services.

pub mod agent;
pub mod bus;
pub mod capabilities;
pub mod config;
pub mod constants;
pub mod concurrency;
pub mod coordinator;
pub mod error;
pub mod kv_store;
pub mod queue;

pub use error::{ForgeError, Result};

use agent::{AgentRegistry, Executors};
use bus::MessageBus;
use concurrency::pool::WorkerPool;
use config::ForgeConfig;
use coordinator::{Coordinator, PromptCallback};
use kv_store::KvStore;
use queue::TaskQueue;
use std::sync::Arc;

/// Top-level handle bundling every component (spec §2 "integration glue").
/// Created with [`Runtime::new`], every component's lifetime is tied to
/// this struct's (each is dropped, and tears itself down, when `Runtime`
/// is dropped).
pub struct Runtime {
    pub pool: Arc<WorkerPool>,
    pub kv_store: Arc<KvStore>,
    pub bus: Arc<MessageBus>,
    pub queue: Arc<TaskQueue>,
    pub registry: Arc<AgentRegistry>,
    pub coordinator: Arc<Coordinator>,
}

impl Runtime {
    /// Wire every component from a loaded [`ForgeConfig`]. Executors default
    /// to [`Executors::mock`]; pass real adapters via
    /// [`Runtime::with_executors`] when wiring a production deployment.
    pub fn new(config: ForgeConfig) -> Self {
        Self::with_executors(config, Executors::mock(), None)
    }

    pub fn with_executors(
        config: ForgeConfig,
        executors: Executors,
        prompt: Option<PromptCallback>,
    ) -> Self {
        let pool = Arc::new(WorkerPool::create(config.pool.worker_count));
        let kv_store = Arc::new(KvStore::new(config.kv_store.bucket_count));
        if let Some(path) = &config.kv_store.persistence_path {
            kv_store.set_persistence(path);
        }
        let bus = Arc::new(MessageBus::new());
        let queue = Arc::new(TaskQueue::new());
        let registry = Arc::new(AgentRegistry::new(
            config.registry.clone(),
            executors,
            Some(kv_store.clone()),
            Some(pool.clone()),
        ));
        let coordinator = Arc::new(Coordinator::new(config.coordinator.clone(), prompt));

        tracing::info!("forgemesh-core runtime initialized");
        Self {
            pool,
            kv_store,
            bus,
            queue,
            registry,
            coordinator,
        }
    }

    /// Signal shutdown on the bus, the queue, and the worker pool, in that
    /// order (matching the lock-ordering convention of spec §5: leaves
    /// before the pool).
    pub fn shutdown(&self) {
        self.bus.shutdown();
        self.queue.shutdown();
        self.pool.wait_all();
        self.pool.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_wires_every_component_and_shuts_down_cleanly() {
        let runtime = Runtime::new(ForgeConfig::default());
        assert!(runtime.pool.thread_count() >= constants::MIN_WORKER_COUNT);
        assert_eq!(runtime.queue.count(), 0);
        assert_eq!(runtime.registry.count(), 0);
        runtime.shutdown();
    }
}
