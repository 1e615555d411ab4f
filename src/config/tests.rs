use super::*;

#[test]
fn defaults_are_internally_consistent() {
    let cfg = ForgeConfig::default();
    assert_eq!(
        cfg.registry.max_concurrent,
        crate::constants::DEFAULT_MAX_CONCURRENT_AGENTS
    );
    assert_eq!(cfg.pool.worker_count, 0);
    assert_eq!(
        cfg.kv_store.bucket_count,
        crate::constants::DEFAULT_KV_BUCKET_COUNT
    );
    assert!(cfg.kv_store.persistence_path.is_none());
    assert_eq!(cfg.coordinator.default_resolution, DefaultResolution::Agent1);
}

#[test]
fn load_with_missing_file_falls_back_to_defaults() {
    let cfg = ForgeConfig::load(Some("/nonexistent/forgemesh.toml")).unwrap();
    assert_eq!(
        cfg.registry.max_concurrent,
        crate::constants::DEFAULT_MAX_CONCURRENT_AGENTS
    );
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence() {
    std::env::set_var("FORGEMESH__REGISTRY__MAX_CONCURRENT", "42");
    let cfg = ForgeConfig::load(None).unwrap();
    std::env::remove_var("FORGEMESH__REGISTRY__MAX_CONCURRENT");
    assert_eq!(cfg.registry.max_concurrent, 42);
}
