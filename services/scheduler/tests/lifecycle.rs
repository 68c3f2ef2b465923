//! Integration tests for the node lifecycle.
//!
//! These drive a `SchedulerCore` through whole event sequences:
//! 1. Nodes are placed on matching offers
//! 2. Status updates confirm, fail or end their tasks
//! 3. Failed nodes back off, retry, and are eventually given up on
//!
//! Commands are captured with `RecordingDriver`, state with `MemoryStore`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hdfs_events::{MasterInfo, Resources, SchedulerEvent, TaskState, TaskStatus};
use hdfs_id::{FrameworkId, NodeId, TaskId};
use hdfs_reconcile::{BackoffCurve, Failover};
use hdfs_scheduler::constraint::Constraint;
use hdfs_scheduler::node::{Node, NodeState, HOSTNAME_ATTRIBUTE};
use hdfs_scheduler::status::Decision;
use hdfs_scheduler::store::{JsonFileStore, MemoryStore, NodeStore};
use hdfs_scheduler::{SchedulerCore, SchedulerSettings};
use hdfs_testing::{at, init_tracing, offer, RecordingDriver};

type Core = SchedulerCore<MemoryStore, RecordingDriver>;

fn id(s: &str) -> NodeId {
    NodeId::parse(s).unwrap()
}

fn node(name: &str, max_tries: Option<u32>) -> Node {
    Node::new(id(name), Resources { cpus: 1.0, mem: 1024 }).with_failover(Failover::new(
        BackoffCurve::Fixed {
            delay: Duration::from_secs(60),
        },
        max_tries,
    ))
}

fn started(nodes: Vec<Node>) -> (Core, MemoryStore, RecordingDriver) {
    init_tracing();
    let store = MemoryStore::new();
    let driver = RecordingDriver::new();
    let mut core = SchedulerCore::new(store.clone(), driver.clone(), SchedulerSettings::default()).unwrap();
    for n in nodes {
        let node_id = n.id.clone();
        core.add_node(n).unwrap();
        core.start_node(&node_id).unwrap();
    }
    (core, store, driver)
}

fn status(task_id: TaskId, state: TaskState, now: DateTime<Utc>) -> TaskStatus {
    TaskStatus {
        task_id,
        state,
        message: None,
        timestamp: now,
    }
}

fn task_of(core: &Core, name: &str) -> TaskId {
    core.registry().get(&id(name)).unwrap().task_id().unwrap()
}

#[test]
fn test_matching_offer_launches_node() {
    let (mut core, store, driver) = started(vec![node("nn", None)]);

    core.on_offers(&[offer("O1", "h1").build()], at(0));

    let n = core.registry().get(&id("nn")).unwrap();
    let runtime = n.runtime.as_ref().unwrap();
    assert_eq!(n.state, NodeState::Starting);
    assert!(!runtime.kill_sent);
    assert_eq!(runtime.host, "h1");

    let launches = driver.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].0.as_str(), "O1");
    assert_eq!(launches[0].1.task_id, runtime.task_id);
    assert_eq!(launches[0].1.name, "hdfs-nn");
    assert_eq!(store.snapshot().get(&id("nn")).unwrap().task_id(), Some(runtime.task_id));
}

#[test]
fn test_running_confirms_start() {
    let (mut core, _, _) = started(vec![node("nn", None)]);
    core.on_offers(&[offer("O1", "h1").build()], at(0));
    let task_id = task_of(&core, "nn");

    assert_eq!(
        core.on_status(&status(task_id, TaskState::Starting, at(1)), at(1)),
        Decision::Ignore
    );
    assert_eq!(core.registry().get(&id("nn")).unwrap().state, NodeState::Starting);

    core.on_status(&status(task_id, TaskState::Running, at(2)), at(2));
    assert_eq!(core.registry().get(&id("nn")).unwrap().state, NodeState::Running);
}

#[test]
fn test_failure_backs_off_then_relaunches() {
    let (mut core, _, driver) = started(vec![node("nn", None)]);
    core.on_offers(&[offer("O1", "h1").build()], at(0));
    let first = task_of(&core, "nn");
    core.on_status(&status(first, TaskState::Running, at(1)), at(1));

    core.on_status(&status(first, TaskState::Failed, at(10)), at(10));
    let n = core.registry().get(&id("nn")).unwrap();
    assert_eq!(n.state, NodeState::Starting);
    assert!(n.runtime.is_none());
    assert_eq!(n.failover.failures, 1);

    driver.take();
    core.on_offers(&[offer("O2", "h1").build()], at(30));
    assert!(driver.launches().is_empty());
    assert_eq!(driver.declines().len(), 1);

    core.on_offers(&[offer("O3", "h1").build()], at(70));
    let launches = driver.launches();
    assert_eq!(launches.len(), 1);
    assert_ne!(launches[0].1.task_id, first);

    core.on_status(&status(launches[0].1.task_id, TaskState::Running, at(71)), at(71));
    assert_eq!(core.registry().get(&id("nn")).unwrap().failover.failures, 0);
}

#[test]
fn test_failure_limit_parks_node() {
    let (mut core, _, driver) = started(vec![node("nn", Some(2))]);

    for round in 0..3i64 {
        let now = round * 100;
        core.on_offers(&[offer(&format!("O{round}"), "h1").build()], at(now));
        let task_id = task_of(&core, "nn");
        core.on_status(&status(task_id, TaskState::Lost, at(now + 1)), at(now + 1));
    }

    let n = core.registry().get(&id("nn")).unwrap();
    assert_eq!(n.state, NodeState::Idle);
    assert!(n.runtime.is_none());
    assert_eq!(n.failover.failures, 3);
    assert_eq!(driver.launches().len(), 3);

    core.on_offers(&[offer("O9", "h1").build()], at(1000));
    assert_eq!(driver.launches().len(), 3);

    core.start_node(&id("nn")).unwrap();
    assert_eq!(core.registry().get(&id("nn")).unwrap().failover.failures, 0);
}

#[test]
fn test_finished_and_killed_are_not_failures() {
    let (mut core, _, _) = started(vec![node("nn", Some(0))]);

    core.on_offers(&[offer("O1", "h1").build()], at(0));
    core.on_status(&status(task_of(&core, "nn"), TaskState::Finished, at(1)), at(1));
    assert_eq!(core.registry().get(&id("nn")).unwrap().state, NodeState::Starting);

    core.on_offers(&[offer("O2", "h1").build()], at(2));
    core.on_status(&status(task_of(&core, "nn"), TaskState::Killed, at(3)), at(3));

    let n = core.registry().get(&id("nn")).unwrap();
    assert_eq!(n.state, NodeState::Starting);
    assert_eq!(n.failover.failures, 0);
}

#[test]
fn test_orphan_running_task_is_killed() {
    let (mut core, store, driver) = started(vec![node("nn", None)]);
    let before = store.snapshot();
    let stray = TaskId::new();

    assert_eq!(
        core.on_status(&status(stray, TaskState::Running, at(0)), at(0)),
        Decision::KillOrphan
    );
    assert_eq!(driver.kills(), vec![stray]);
    assert_eq!(store.snapshot(), before);
}

#[test]
fn test_unknown_terminal_status_ignored() {
    let (mut core, _, driver) = started(vec![node("nn", None)]);
    assert_eq!(
        core.on_status(&status(TaskId::new(), TaskState::Failed, at(0)), at(0)),
        Decision::Ignore
    );
    assert!(driver.commands().is_empty());
}

#[test]
fn test_unique_hostname_spreads_nodes() {
    let (mut core, _, driver) = started(vec![
        node("dn0", None).with_constraint(HOSTNAME_ATTRIBUTE, Constraint::Unique),
        node("dn1", None).with_constraint(HOSTNAME_ATTRIBUTE, Constraint::Unique),
    ]);

    core.on_offers(&[offer("O1", "h1").build()], at(0));
    core.on_offers(&[offer("O2", "h1").build()], at(1));
    core.on_offers(&[offer("O3", "h2").build()], at(2));

    let hosts: Vec<String> = driver.launches().into_iter().map(|(_, t)| t.host).collect();
    assert_eq!(hosts, vec!["h1", "h2"]);
}

#[test]
fn test_state_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let fw = FrameworkId::parse("fw-7").unwrap();

    let task_id = {
        let driver = RecordingDriver::new();
        let mut core = SchedulerCore::new(JsonFileStore::new(&path), driver, SchedulerSettings::default()).unwrap();
        core.add_node(node("nn", None)).unwrap();
        core.start_node(&id("nn")).unwrap();
        core.handle(
            SchedulerEvent::Subscribed {
                framework_id: fw.clone(),
                master: Some(MasterInfo {
                    hostname: "m1".to_string(),
                    version: Some("1.0.0".parse().unwrap()),
                }),
            },
            at(0),
        );
        core.on_offers(&[offer("O1", "h1").build()], at(1));
        core.on_status(&status(task_of_json(&path), TaskState::Running, at(2)), at(2));
        task_of_json(&path)
    };

    let driver = RecordingDriver::new();
    let mut core = SchedulerCore::new(JsonFileStore::new(&path), driver.clone(), SchedulerSettings::default()).unwrap();
    assert_eq!(core.registry().framework_id, Some(fw.clone()));
    assert_eq!(core.registry().get(&id("nn")).unwrap().state, NodeState::Running);

    core.handle(
        SchedulerEvent::Subscribed {
            framework_id: fw,
            master: Some(MasterInfo {
                hostname: "m1".to_string(),
                version: Some("1.0.0".parse().unwrap()),
            }),
        },
        at(100),
    );
    assert_eq!(core.registry().get(&id("nn")).unwrap().state, NodeState::Reconciling);

    core.on_status(&status(task_id, TaskState::Running, at(101)), at(101));
    assert_eq!(core.registry().get(&id("nn")).unwrap().state, NodeState::Running);
}

fn task_of_json(path: &std::path::Path) -> TaskId {
    JsonFileStore::new(path)
        .load()
        .unwrap()
        .get(&id("nn"))
        .unwrap()
        .task_id()
        .unwrap()
}
