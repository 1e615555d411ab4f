//! Priority task queue with dependency tracking (spec §4.4): a dynamically
//! grown array-backed max-heap ordered by `(priority DESC, created_at ASC)`,
//! with O(log n) removal at an arbitrary position via a heap-index
//! back-pointer on each task.

mod task;

pub use task::{Priority, Task, TaskCallbacks, TaskSnapshot, TaskState, TaskType};

use crate::capabilities::Capabilities;
use crate::concurrency::{wait_while, Condvar, Mutex};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

struct State {
    heap: Vec<Task>,
    index_of: HashMap<String, usize>,
    shutdown: bool,
}

fn precedes(a: &Task, b: &Task) -> bool {
    (a.priority, std::cmp::Reverse(a.created_at)) > (b.priority, std::cmp::Reverse(b.created_at))
}

impl State {
    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.heap[i].heap_index = i as i64;
        self.heap[j].heap_index = j as i64;
        self.index_of.insert(self.heap[i].id.clone(), i);
        self.index_of.insert(self.heap[j].id.clone(), j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if precedes(&self.heap[i], &self.heap[parent]) {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut best = i;
            if left < len && precedes(&self.heap[left], &self.heap[best]) {
                best = left;
            }
            if right < len && precedes(&self.heap[right], &self.heap[best]) {
                best = right;
            }
            if best == i {
                break;
            }
            self.swap(i, best);
            i = best;
        }
    }

    fn push(&mut self, mut task: Task) {
        let idx = self.heap.len();
        task.heap_index = idx as i64;
        self.index_of.insert(task.id.clone(), idx);
        self.heap.push(task);
        self.sift_up(idx);
    }

    fn remove_at(&mut self, index: usize) -> Task {
        let last = self.heap.len() - 1;
        self.swap(index, last);
        let mut removed = self.heap.pop().unwrap();
        self.index_of.remove(&removed.id);
        removed.heap_index = -1;
        if index < self.heap.len() {
            self.sift_down(index);
            self.sift_up(index);
        }
        removed
    }
}

/// The priority task queue. Created with [`TaskQueue::new`].
pub struct TaskQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: Vec::with_capacity(crate::constants::INITIAL_HEAP_CAPACITY),
                index_of: HashMap::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, task: Task) {
        let mut state = self.state.lock();
        state.push(task);
        drop(state);
        self.available.notify_all();
    }

    /// Block until a task is available or the queue shuts down.
    pub fn pop(&self) -> Option<Task> {
        self.pop_inner(None)
    }

    pub fn pop_timeout(&self, timeout: Duration) -> Option<Task> {
        self.pop_inner(Some(timeout))
    }

    fn pop_inner(&self, timeout: Option<Duration>) -> Option<Task> {
        let guard = self.state.lock();
        let (mut guard, _) =
            wait_while(&self.available, guard, timeout, |s| s.heap.is_empty() && !s.shutdown);
        if guard.heap.is_empty() {
            return None;
        }
        Some(guard.remove_at(0))
    }

    pub fn try_pop(&self) -> Option<Task> {
        let mut state = self.state.lock();
        if state.heap.is_empty() {
            None
        } else {
            Some(state.remove_at(0))
        }
    }

    /// Scan the heap in array order (index 0 first — not a fully sorted
    /// traversal, per spec §4.4), returning the first task whose required
    /// capabilities `agent_caps` is a superset of, whose `preferred_agent`
    /// (if any) matches `agent_name`, and whose dependencies are met.
    pub fn pop_for_agent(&self, agent_caps: Capabilities, agent_name: &str) -> Option<Task> {
        let mut state = self.state.lock();
        let mut found = None;
        for (idx, task) in state.heap.iter().enumerate() {
            if !agent_caps.contains(task.required_capabilities) {
                continue;
            }
            if let Some(preferred) = &task.preferred_agent {
                if preferred != agent_name {
                    continue;
                }
            }
            if !task.dependencies_met {
                continue;
            }
            found = Some(idx);
            break;
        }
        found.map(|idx| state.remove_at(idx))
    }

    pub fn peek(&self) -> Option<TaskSnapshot> {
        let state = self.state.lock();
        state.heap.first().map(Task::snapshot)
    }

    pub fn get(&self, id: &str) -> Option<TaskSnapshot> {
        let state = self.state.lock();
        state.index_of.get(id).map(|&idx| state.heap[idx].snapshot())
    }

    /// Remove and return the task at an arbitrary position, if present.
    pub fn remove(&self, id: &str) -> Option<Task> {
        let mut state = self.state.lock();
        let idx = *state.index_of.get(id)?;
        Some(state.remove_at(idx))
    }

    /// Remove `id`, transition it to `Cancelled`, and stamp completion. A
    /// no-op returning `false` if the task is no longer in the queue
    /// (already popped/running) — cooperative cancellation of executing
    /// tasks is out of scope.
    pub fn cancel(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let Some(&idx) = state.index_of.get(id) else {
            return false;
        };
        let mut task = state.remove_at(idx);
        task.state = TaskState::Cancelled;
        task.completed_at = Some(chrono::Utc::now());
        true
    }

    /// Recompute `dependencies_met` for every remaining task: a dependency
    /// is met once its predecessor is no longer present in the queue
    /// (spec §4.4 — this conflates cancellation with completion by
    /// design, per spec §9).
    pub fn update_dependencies(&self, _completed_id: &str) {
        let mut state = self.state.lock();
        let still_queued: std::collections::HashSet<String> = state.index_of.keys().cloned().collect();
        for task in state.heap.iter_mut() {
            task.dependencies_met = task
                .dependencies
                .iter()
                .all(|dep| !still_queued.contains(dep));
        }
    }

    pub fn get_blocked_by(&self, id: &str) -> Vec<TaskSnapshot> {
        let state = self.state.lock();
        state
            .heap
            .iter()
            .filter(|t| t.dependencies.iter().any(|d| d == id))
            .map(Task::snapshot)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    /// Wake every blocked consumer; subsequent pops on an empty queue
    /// return `None` immediately.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        drop(state);
        self.available.notify_all();
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.heap.len();
        state.heap.clear();
        state.index_of.clear();
        if dropped > 0 {
            info!("cleared {dropped} tasks from queue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: Priority) -> Task {
        Task::new(id, format!("task {id}"), TaskType::General, priority)
    }

    #[test]
    fn invariant_heap_index_matches_position_after_push_pop_remove() {
        let q = TaskQueue::new();
        for i in 0..10 {
            q.push(task(&format!("t{i}"), Priority::Normal));
        }
        let state = q.state.lock();
        for (idx, t) in state.heap.iter().enumerate() {
            assert_eq!(t.heap_index, idx as i64);
            assert_eq!(state.index_of[&t.id], idx);
        }
    }

    #[test]
    fn priority_ordering_scenario() {
        // spec §8 scenario 1
        let q = TaskQueue::new();
        let mut a = task("a", Priority::Low);
        a.created_at = chrono::Utc::now();
        std::thread::sleep(Duration::from_millis(2));
        let mut b = task("b", Priority::Critical);
        b.created_at = chrono::Utc::now();
        std::thread::sleep(Duration::from_millis(2));
        let mut c = task("c", Priority::High);
        c.created_at = chrono::Utc::now();
        std::thread::sleep(Duration::from_millis(2));
        let mut d = task("d", Priority::Critical);
        d.created_at = chrono::Utc::now();

        q.push(a);
        q.push(b);
        q.push(c);
        q.push(d);

        let order: Vec<String> = (0..4).map(|_| q.pop().unwrap().id).collect();
        assert_eq!(order, vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn dependencies_unblock_scenario() {
        // spec §8 scenario 2
        let q = TaskQueue::new();
        let t1 = task("T1", Priority::High);
        let t2 = task("T2", Priority::Critical).with_dependencies(vec!["T1".to_string()]);
        q.push(t1);
        q.push(t2);

        let caps = Capabilities::all();
        let popped = q.pop_for_agent(caps, "any").unwrap();
        assert_eq!(popped.id, "T1");

        assert!(q.pop_for_agent(caps, "any").is_none());

        q.update_dependencies("T1");
        let popped = q.pop_for_agent(caps, "any").unwrap();
        assert_eq!(popped.id, "T2");
    }

    #[test]
    fn cancel_removes_pending_task_and_is_noop_once_popped() {
        let q = TaskQueue::new();
        q.push(task("t1", Priority::Normal));
        assert!(q.cancel("t1"));
        assert_eq!(q.count(), 0);
        assert!(!q.cancel("t1"));
    }

    #[test]
    fn get_blocked_by_finds_dependents() {
        let q = TaskQueue::new();
        q.push(task("T1", Priority::Normal));
        q.push(task("T2", Priority::Normal).with_dependencies(vec!["T1".to_string()]));
        let blocked = q.get_blocked_by("T1");
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].id, "T2");
    }

    #[test]
    fn shutdown_unblocks_pop() {
        let q = std::sync::Arc::new(TaskQueue::new());
        let q2 = q.clone();
        let handle = std::thread::spawn(move || q2.pop());
        std::thread::sleep(Duration::from_millis(20));
        q.shutdown();
        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn pop_after_shutdown_on_empty_queue_returns_immediately() {
        let q = TaskQueue::new();
        q.shutdown();
        let start = std::time::Instant::now();
        assert!(q.pop().is_none());
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
