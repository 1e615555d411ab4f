use forgemesh_core::agent::{AgentConfig, AgentType};
use forgemesh_core::config::ForgeConfig;
use forgemesh_core::Runtime;
use std::time::{Duration, Instant};

/// spec §8 scenario 5: async dispatch must publish status to the shared
/// K/V store promptly, and settle to a terminal status by the deadline.
#[test]
fn async_run_publishes_kv_status_within_deadline() {
    let mut config = ForgeConfig::default();
    config.pool.worker_count = 2;
    let runtime = Runtime::new(config);

    let mut agent_config = AgentConfig::default();
    agent_config.mock_mode = true;
    let agent = runtime
        .registry
        .create_agent("builder", AgentType::Autonomous, agent_config)
        .unwrap();
    runtime.registry.start(agent).unwrap();

    let submitted = Instant::now();
    assert!(runtime.registry.run_async(agent, "build").unwrap());

    // within 500ms of submission, status/task must already be visible
    let deadline = submitted + Duration::from_millis(500);
    loop {
        if runtime.kv_store.get("builder.status").as_deref() == Some("running")
            && runtime.kv_store.get("builder.task").as_deref() == Some("build")
        {
            break;
        }
        assert!(Instant::now() < deadline, "status/task not published in time");
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(runtime.registry.wait(agent, 2_000));
    let status = runtime.kv_store.get("builder.status");
    assert!(matches!(status.as_deref(), Some("completed") | Some("failed")));
    assert!(runtime.kv_store.get("builder.result").is_some());

    runtime.shutdown();
}
