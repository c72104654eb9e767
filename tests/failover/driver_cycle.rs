use std::sync::Arc;
use std::time::Duration;

use lead_ha::CycleOutcome;
use lead_ha::CycleTarget;
use lead_ha::FailoverConfig;
use lead_ha::FailoverTestDriver;
use lead_ha::LeadState;
use lead_ha::MemLockService;
use lead_ha::MemRegistry;
use lead_ha::NodeIdentity;
use tempfile::tempdir;
use tracing_test::traced_test;

use crate::common::lead_member;
use crate::common::running_count;
use crate::common::InProcessLauncher;

/// # Case: driver cycles the primary lead
///
/// ## Validation Criterias:
/// 1. start_role_once launches the lead group exactly once
/// 2. cycle() takes down the current primary and restarts it
/// 3. A different lead becomes primary; the restarted node waits in STANDBY
/// 4. An immediate second cycle is rate limited
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_cycle_lead_moves_the_primary() {
    let dir = tempdir().unwrap();
    let lock = Arc::new(MemLockService::new());
    let registry = Arc::new(MemRegistry::new());
    let members: Vec<_> = (1..=3).map(|n| lead_member(n, dir.path())).collect();
    let launcher = Arc::new(InProcessLauncher::new(lock.clone(), registry.clone(), members.clone()));
    let config = FailoverConfig {
        cycle_vms: true,
        conf_dir: dir.path().join("conf"),
        oracle_poll_interval_ms: 20,
        ..Default::default()
    };
    let driver = FailoverTestDriver::new(
        NodeIdentity::new("10.0.9.1", 9, "client", "client1"),
        members.clone(),
        registry.clone(),
        launcher.clone(),
        config,
    );

    // 1. Launch the lead group once
    let args = vec!["start".to_string()];
    assert!(driver.start_role_once("lead", args.clone()).await.unwrap());
    assert!(!driver.start_role_once("lead", args).await.unwrap());
    assert_eq!(launcher.nodes().len(), 3);
    assert_eq!(running_count(&launcher.nodes()), 1);

    let previous = driver
        .oracle()
        .current_primary(&members, "lead")
        .await
        .unwrap()
        .expect("a primary is published");

    // 2. Cycle the primary
    let outcome = driver.cycle(CycleTarget::Lead).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Cycled(vec![previous.clone()]));
    let fragment = std::fs::read_to_string(dir.path().join("conf").join("leads")).unwrap();
    assert_eq!(fragment, format!("{}\n", previous.config_fragment));

    // 3. Someone else is primary now
    let next = driver
        .wait_for_new_primary(Some(&previous), Duration::from_secs(10))
        .await
        .unwrap()
        .expect("a new primary within 10s");
    assert_ne!(next, previous);
    assert_eq!(launcher.nodes().len(), 3);
    assert_eq!(running_count(&launcher.nodes()), 1);
    assert_eq!(launcher.node(&next).unwrap().status(), LeadState::Running);
    assert_eq!(launcher.node(&previous).unwrap().status(), LeadState::Standby);

    // 4. Too soon for another cycle
    assert_eq!(driver.cycle(CycleTarget::Lead).await.unwrap(), CycleOutcome::RateLimited);

    for node in launcher.nodes() {
        node.stop().await.unwrap();
    }
}
