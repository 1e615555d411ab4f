use forgemesh_core::config::{CoordinatorConfig, DefaultResolution};
use forgemesh_core::coordinator::{Coordinator, Resolution};
use uuid::Uuid;

/// spec §8 scenario 3.
#[test]
fn conflicting_resource_request_resolves_to_agent2() {
    let coordinator = Coordinator::new(
        CoordinatorConfig {
            default_resolution: DefaultResolution::Agent1,
        },
        Some(Box::new(|_conflict, _message, _options| 1)),
    );

    let agent_a = Uuid::new_v4();
    let agent_b = Uuid::new_v4();

    assert!(coordinator.request_resource(agent_a, "agent-a", "file.x", "write"));
    assert!(!coordinator.request_resource(agent_b, "agent-b", "file.x", "read"));

    let conflict = coordinator.detect_conflict().expect("conflict logged");
    let resolution = coordinator.resolve_conflict(conflict.id).unwrap();
    assert_eq!(resolution, Resolution::Agent2);

    assert!(coordinator.detect_conflict().is_none());
    assert!(!coordinator.request_resource(agent_a, "agent-a", "file.x", "write"));
    assert!(coordinator.request_resource(agent_b, "agent-b", "file.x", "read"));
}
