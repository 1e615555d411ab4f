use forgemesh_core::capabilities::Capabilities;
use forgemesh_core::queue::{Priority, Task, TaskQueue, TaskType};

/// spec §8 scenario 2.
#[test]
fn dependent_task_unblocks_after_predecessor_leaves_queue() {
    let queue = TaskQueue::new();
    let t1 = Task::new("T1", "first", TaskType::General, Priority::High);
    let t2 = Task::new("T2", "second", TaskType::General, Priority::Critical)
        .with_dependencies(vec!["T1".to_string()]);

    queue.push(t1);
    queue.push(t2);

    let any = Capabilities::all();
    let first = queue.pop_for_agent(any, "any").unwrap();
    assert_eq!(first.id, "T1");
    assert!(queue.pop_for_agent(any, "any").is_none());

    queue.update_dependencies("T1");
    let second = queue.pop_for_agent(any, "any").unwrap();
    assert_eq!(second.id, "T2");
}
