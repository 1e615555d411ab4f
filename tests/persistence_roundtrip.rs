use forgemesh_core::kv_store::KvStore;
use uuid::Uuid;

/// spec §8 scenario 6: set three entries, lock one, save, drop, reload —
/// all three values survive, the lock does not, and the store reloads
/// clean.
#[test]
fn store_survives_a_save_drop_reload_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forgemesh-store.json");

    let store = KvStore::new(8);
    store.set_persistence(&path);
    store.set("a", "1").unwrap();
    store.set("b", "2").unwrap();
    store.set("c", "3").unwrap();

    let holder = Uuid::new_v4();
    assert!(store.lock("b", holder));

    store.save().unwrap();
    assert!(!store.is_dirty());
    drop(store);

    let reloaded = KvStore::new(8);
    reloaded.set_persistence(&path);
    reloaded.load().unwrap();

    assert_eq!(reloaded.get("a"), Some("1".to_string()));
    assert_eq!(reloaded.get("b"), Some("2".to_string()));
    assert_eq!(reloaded.get("c"), Some("3".to_string()));
    assert_eq!(reloaded.locked_by("b"), None);
    assert!(!reloaded.is_dirty());
}

/// A dirty, persistence-configured store flushes automatically on drop.
#[test]
fn dirty_store_persists_on_drop_without_explicit_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forgemesh-store-autosave.json");

    {
        let store = KvStore::new(4);
        store.set_persistence(&path);
        store.set("k", "v").unwrap();
    }

    let reloaded = KvStore::new(4);
    reloaded.set_persistence(&path);
    reloaded.load().unwrap();
    assert_eq!(reloaded.get("k"), Some("v".to_string()));
}
