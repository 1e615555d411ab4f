//! Shared, thread-safe string→string key/value store with per-key advisory
//! locks and optional JSON persistence (spec §4.2).

use crate::concurrency::Mutex;
use crate::error::{ForgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct Entry {
    value: Option<String>,
    holder: Option<uuid::Uuid>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    locked_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            value: None,
            holder: None,
            created_at: now,
            modified_at: now,
            locked_at: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedStore {
    entries: HashMap<String, String>,
}

struct State {
    buckets: Vec<HashMap<String, Entry>>,
    dirty: bool,
    persistence_path: Option<PathBuf>,
}

/// Open hash table of `bucket_count` chained buckets (djb2-hashed keys),
/// guarded by a single store-wide mutex.
pub struct KvStore {
    bucket_count: usize,
    state: Mutex<State>,
}

fn djb2(key: &str) -> u64 {
    let mut hash: u64 = 5381;
    for b in key.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as u64);
    }
    hash
}

impl KvStore {
    pub fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            bucket_count,
            state: Mutex::new(State {
                buckets: (0..bucket_count).map(|_| HashMap::new()).collect(),
                dirty: false,
                persistence_path: None,
            }),
        }
    }

    fn bucket_index(&self, key: &str) -> usize {
        (djb2(key) % self.bucket_count as u64) as usize
    }

    /// Set `key` to `value`. Fails if the entry is currently locked by
    /// another agent.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        let idx = self.bucket_index(key);
        let entry = state.buckets[idx].entry(key.to_string()).or_insert_with(Entry::new);
        if entry.holder.is_some() {
            return Err(ForgeError::Contention(format!(
                "key '{key}' is locked"
            )));
        }
        entry.value = Some(value.to_string());
        entry.modified_at = Utc::now();
        state.dirty = true;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.lock();
        let idx = self.bucket_index(key);
        state.buckets[idx].get(key).and_then(|e| e.value.clone())
    }

    pub fn exists(&self, key: &str) -> bool {
        let state = self.state.lock();
        let idx = self.bucket_index(key);
        state.buckets[idx]
            .get(key)
            .is_some_and(|e| e.value.is_some())
    }

    /// Delete `key`. Fails if currently locked by another agent; a no-op
    /// success if the key is absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        let idx = self.bucket_index(key);
        if let Some(entry) = state.buckets[idx].get(key) {
            if entry.holder.is_some() {
                return Err(ForgeError::Contention(format!(
                    "key '{key}' is locked"
                )));
            }
        }
        state.buckets[idx].remove(key);
        state.dirty = true;
        Ok(())
    }

    /// Lock `key` for `agent`. Creates the entry if absent. Idempotent for
    /// the current holder.
    pub fn lock(&self, key: &str, agent: uuid::Uuid) -> bool {
        let mut state = self.state.lock();
        let idx = self.bucket_index(key);
        let entry = state.buckets[idx].entry(key.to_string()).or_insert_with(Entry::new);
        match entry.holder {
            None => {
                entry.holder = Some(agent);
                entry.locked_at = Some(Utc::now());
                true
            }
            Some(holder) => holder == agent,
        }
    }

    /// Equivalent to [`KvStore::lock`] — locks in this store are
    /// non-blocking, so "try" and "blocking" coincide.
    pub fn trylock(&self, key: &str, agent: uuid::Uuid) -> bool {
        self.lock(key, agent)
    }

    /// Release `key`, only if `agent` is the current holder.
    pub fn unlock(&self, key: &str, agent: uuid::Uuid) -> bool {
        let mut state = self.state.lock();
        let idx = self.bucket_index(key);
        match state.buckets[idx].get_mut(key) {
            Some(entry) if entry.holder == Some(agent) => {
                entry.holder = None;
                entry.locked_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn locked_by(&self, key: &str) -> Option<uuid::Uuid> {
        let state = self.state.lock();
        let idx = self.bucket_index(key);
        state.buckets[idx].get(key).and_then(|e| e.holder)
    }

    pub fn keys(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .buckets
            .iter()
            .flat_map(|b| b.iter())
            .filter(|(_, e)| e.value.is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn keys_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys().into_iter().filter(|k| k.starts_with(prefix)).collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        for bucket in state.buckets.iter_mut() {
            bucket.clear();
        }
        state.dirty = true;
    }

    pub fn set_persistence(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock();
        state.persistence_path = Some(path.into());
    }

    /// Serialize `{"entries": {k: v}}` (non-null values only) to the
    /// configured persistence path. Locks, timestamps, and holders are
    /// never persisted.
    pub fn save(&self) -> Result<()> {
        let mut state = self.state.lock();
        let Some(path) = state.persistence_path.clone() else {
            return Ok(());
        };
        let entries: HashMap<String, String> = state
            .buckets
            .iter()
            .flat_map(|b| b.iter())
            .filter_map(|(k, e)| e.value.clone().map(|v| (k.clone(), v)))
            .collect();
        let payload = PersistedStore { entries };
        let json = serde_json::to_string_pretty(&payload)?;
        std::fs::write(&path, json)?;
        state.dirty = false;
        Ok(())
    }

    /// Load from the configured persistence path. A missing file is a
    /// no-op success.
    pub fn load(&self) -> Result<()> {
        let path = {
            let state = self.state.lock();
            state.persistence_path.clone()
        };
        let Some(path) = path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let json = std::fs::read_to_string(&path)?;
        let payload: PersistedStore = serde_json::from_str(&json)?;
        for (k, v) in payload.entries {
            // Re-entrant call: releases and reacquires the store mutex, as
            // documented in the concurrency model (not recursive locking).
            let _ = self.set(&k, &v);
        }
        let mut state = self.state.lock();
        state.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }
}

impl Drop for KvStore {
    fn drop(&mut self) {
        let dirty_and_pathed = {
            let state = self.state.lock();
            state.dirty && state.persistence_path.is_some()
        };
        if dirty_and_pathed {
            if let Err(e) = self.save() {
                tracing::warn!("failed to persist KV store on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = KvStore::new(4);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a"), Some("1".to_string()));
    }

    #[test]
    fn lock_is_idempotent_for_holder() {
        let store = KvStore::new(4);
        let agent = uuid::Uuid::new_v4();
        assert!(store.lock("k", agent));
        assert!(store.lock("k", agent));
        assert!(store.unlock("k", agent));
        assert!(!store.unlock("k", agent));
    }

    #[test]
    fn locked_entry_rejects_set_and_delete_from_anyone() {
        let store = KvStore::new(4);
        let a = uuid::Uuid::new_v4();
        assert!(store.lock("k", a));
        assert!(store.set("k", "v").is_err());
        assert!(store.delete("k").is_err());
        assert!(store.unlock("k", a));
        assert!(store.set("k", "v").is_ok());
    }

    #[test]
    fn keys_and_keys_prefix() {
        let store = KvStore::new(4);
        store.set("agent.status", "running").unwrap();
        store.set("agent.task", "build").unwrap();
        store.set("other", "x").unwrap();
        let mut prefixed = store.keys_prefix("agent.");
        prefixed.sort();
        assert_eq!(prefixed, vec!["agent.status".to_string(), "agent.task".to_string()]);
        assert_eq!(store.keys().len(), 3);
    }

    #[test]
    fn persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = KvStore::new(4);
        store.set_persistence(&path);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        let agent = uuid::Uuid::new_v4();
        store.lock("c", agent);
        store.save().unwrap();
        drop(store);

        let reloaded = KvStore::new(4);
        reloaded.set_persistence(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.get("a"), Some("1".to_string()));
        assert_eq!(reloaded.get("b"), Some("2".to_string()));
        assert_eq!(reloaded.locked_by("c"), None);
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn load_missing_file_is_noop_success() {
        let store = KvStore::new(4);
        store.set_persistence("/nonexistent/path/store.json");
        assert!(store.load().is_ok());
    }
}
