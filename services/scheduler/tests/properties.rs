//! Property tests for the scheduler's safety guarantees.

use std::collections::HashSet;
use std::time::Duration;

use hdfs_events::{Offer, Resources};
use hdfs_id::{NodeId, TaskId};
use hdfs_reconcile::{BackoffCurve, Failover};
use hdfs_scheduler::node::{Node, NodeState, Runtime};
use hdfs_scheduler::reconciler::Reconciler;
use hdfs_scheduler::registry::NodeRegistry;
use hdfs_scheduler::store::MemoryStore;
use hdfs_scheduler::{SchedulerCore, SchedulerSettings};
use hdfs_testing::{at, offer, RecordingDriver};
use proptest::prelude::*;

fn node(idx: usize, cpus: f64) -> Node {
    Node::new(
        NodeId::parse(format!("dn{idx}")).unwrap(),
        Resources { cpus, mem: 256 },
    )
}

fn with_task(mut node: Node, state: NodeState) -> Node {
    node.state = state;
    node.runtime = Some(Runtime {
        task_id: TaskId::new(),
        host: "h0".to_string(),
        reservation: node.resources,
        attributes: Default::default(),
        kill_sent: false,
    });
    node
}

fn core(registry: NodeRegistry) -> (SchedulerCore<MemoryStore, RecordingDriver>, RecordingDriver) {
    let driver = RecordingDriver::new();
    let core = SchedulerCore::new(
        MemoryStore::with_registry(registry),
        driver.clone(),
        SchedulerSettings::default(),
    )
    .unwrap();
    (core, driver)
}

fn batch(cpus: &[f64], first: usize) -> Vec<Offer> {
    cpus.iter()
        .enumerate()
        .map(|(i, c)| offer(&format!("O{}", first + i), &format!("h{i}")).cpus(*c).build())
        .collect()
}

proptest! {
    #[test]
    fn prop_single_launch_per_offer(
        node_cpus in prop::collection::vec(0.5f64..4.0, 1..6),
        batches in prop::collection::vec(prop::collection::vec(0.5f64..4.0, 0..5), 1..6),
    ) {
        let mut registry = NodeRegistry::new();
        for (i, cpus) in node_cpus.iter().enumerate() {
            let mut n = node(i, *cpus);
            n.state = NodeState::Starting;
            registry.insert(n).unwrap();
        }
        let (mut core, driver) = core(registry);

        let mut launched_nodes = HashSet::new();
        let mut offer_no = 0;
        for (t, cpus) in batches.iter().enumerate() {
            driver.take();
            core.on_offers(&batch(cpus, offer_no), at(t as i64));
            offer_no += cpus.len();

            let launches = driver.launches();
            let declines = driver.declines();
            prop_assert!(launches.len() <= 1);
            prop_assert_eq!(launches.len() + declines.len(), cpus.len());

            for (_, task) in launches {
                prop_assert!(launched_nodes.insert(task.node_id));
            }
        }
    }

    #[test]
    fn prop_no_launch_while_reconciling(
        waiting in 1usize..5,
        batches in prop::collection::vec(prop::collection::vec(0.5f64..8.0, 0..5), 1..5),
    ) {
        let mut registry = NodeRegistry::new();
        registry.insert(with_task(node(99, 1.0), NodeState::Reconciling)).unwrap();
        for i in 0..waiting {
            let mut n = node(i, 0.5);
            n.state = NodeState::Starting;
            registry.insert(n).unwrap();
        }
        let (mut core, driver) = core(registry);

        let mut offer_no = 0;
        for (t, cpus) in batches.iter().enumerate() {
            core.on_offers(&batch(cpus, offer_no), at(t as i64));
            offer_no += cpus.len();
        }

        prop_assert!(driver.launches().is_empty());
        prop_assert_eq!(driver.declines().len(), offer_no);
    }

    #[test]
    fn prop_at_most_one_kill(ticks in 1usize..10, state in prop_oneof![
        Just(NodeState::Starting),
        Just(NodeState::Running),
    ]) {
        let mut registry = NodeRegistry::new();
        registry.insert(with_task(node(0, 1.0), state)).unwrap();
        let (mut core, driver) = core(registry);
        let id = NodeId::parse("dn0").unwrap();
        let task_id = core.registry().get(&id).unwrap().task_id().unwrap();

        core.stop_node(&id).unwrap();
        for t in 0..ticks {
            core.on_offers(&[], at(t as i64));
        }

        prop_assert_eq!(driver.kills(), vec![task_id]);
        let n = core.registry().get(&id).unwrap();
        prop_assert!(n.runtime.as_ref().unwrap().kill_sent);
    }

    #[test]
    fn prop_backoff_gates_placement(failures in 1u32..8, elapsed in 0i64..2000) {
        let mut n = node(0, 1.0).with_failover(Failover::new(
            BackoffCurve::Exponential {
                initial: Duration::from_secs(10),
                max: Duration::from_secs(600),
            },
            None,
        ));
        n.state = NodeState::Starting;
        for _ in 0..failures {
            n.failover.register_failure(at(0));
        }

        let expires = n.failover.delay_expires().unwrap();
        let now = at(elapsed);
        prop_assert_eq!(n.is_placement_candidate(now), now >= expires);

        let mut more = n.failover.clone();
        more.register_failure(at(0));
        prop_assert!(more.current_delay() >= n.failover.current_delay());
    }

    #[test]
    fn prop_reconcile_terminates(
        max_tries in 1u32..6,
        nodes in 1usize..5,
        extra in 0u32..4,
    ) {
        let mut registry = NodeRegistry::new();
        for i in 0..nodes {
            registry.insert(with_task(node(i, 1.0), NodeState::Running)).unwrap();
        }
        let mut driver = RecordingDriver::new();
        let mut reconciler = Reconciler::new(Duration::from_secs(30), max_tries).unwrap();

        reconciler.start(&mut registry, &mut driver, at(0));
        for i in 1..=(max_tries + extra) {
            reconciler.proceed(&mut registry, &mut driver, at(i64::from(i) * 30));
        }

        prop_assert!(!reconciler.is_active(&registry));
        prop_assert!(!reconciler.session().is_started());
        prop_assert_eq!(driver.kills().len(), nodes);
        for n in registry.nodes() {
            prop_assert_eq!(n.state, NodeState::Starting);
            prop_assert!(n.runtime.is_none());
        }
    }
}
