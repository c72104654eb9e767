use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use lead_ha::FailoverConfig;
use lead_ha::FailoverTestDriver;
use lead_ha::LeadState;
use lead_ha::MemLockService;
use lead_ha::MemRegistry;
use lead_ha::NodeIdentity;
use lead_ha::PrimaryRecord;
use tempfile::tempdir;
use tracing::info;
use tracing::Instrument;
use tracing::Span;
use tracing_test::traced_test;

use crate::common::election_config;
use crate::common::elector_for;
use crate::common::eventually;
use crate::common::lead_member;
use crate::common::running_count;
use crate::common::InProcessLauncher;
use crate::common::MemElector;

/// # Case: A/B/C lead failover
///
/// ## Validation Criterias:
/// 1. Started concurrently, exactly one lead is RUNNING and two are STANDBY
/// 2. STANDBY nodes block in wait_until_primary()
/// 3. After the RUNNING node dies, exactly one survivor is RUNNING within 10s
/// 4. Its callback fires exactly once; the other survivor's never does
/// 5. No further RUNNING transitions follow
/// 6. The failover driver observes the new primary through the registry
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_three_leads_fail_over_to_exactly_one() {
    let dir = tempdir().unwrap();
    let lock = Arc::new(MemLockService::new());
    let registry = Arc::new(MemRegistry::new());
    let members: Vec<_> = (1..=3).map(|n| lead_member(n, dir.path())).collect();

    // 1. Start A, B and C concurrently
    let mut nodes: Vec<Arc<MemElector>> = Vec::new();
    let mut fired: Vec<Arc<AtomicUsize>> = Vec::new();
    for member in &members {
        let node = Arc::new(elector_for(member, &lock, &registry));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        node.notify_when_primary(move |_: &NodeIdentity| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        nodes.push(node);
        fired.push(counter);
    }

    let mut starts = Vec::new();
    for node in &nodes {
        let node = node.clone();
        // keep the test span so waiter logs are captured
        starts.push(tokio::spawn(
            async move { node.start(&election_config(), false).await }.instrument(Span::current()),
        ));
    }
    let mut states = Vec::new();
    for start in starts {
        states.push(start.await.unwrap().unwrap());
    }
    assert_eq!(states.iter().filter(|s| **s == LeadState::Running).count(), 1);
    assert_eq!(states.iter().filter(|s| **s == LeadState::Standby).count(), 2);

    let primary_idx = nodes
        .iter()
        .position(|n| n.status() == LeadState::Running)
        .unwrap();
    assert_eq!(fired[primary_idx].load(Ordering::SeqCst), 1);

    // 2. Standbys block
    let mut waiters = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if i == primary_idx {
            continue;
        }
        let node = node.clone();
        waiters.push((i, tokio::spawn(async move { node.wait_until_primary().await })));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(waiters.iter().all(|(_, w)| !w.is_finished()));

    // 3. Kill the primary: the process disappears and its lock session expires
    let dead = nodes.remove(primary_idx);
    let dead_fired = fired.remove(primary_idx);
    let dead_owner = dead.owner().to_string();
    drop(dead);
    assert!(lock.evict(&dead_owner));
    info!("primary {} killed", members[primary_idx].identity);

    let survivors = &nodes;
    assert!(
        eventually(Duration::from_secs(10), move || async move { running_count(survivors) == 1 }).await,
        "no survivor was promoted within 10s"
    );

    // 4. Exactly one callback fired among the survivors
    let new_idx = nodes
        .iter()
        .position(|n| n.status() == LeadState::Running)
        .unwrap();
    assert_eq!(fired[new_idx].load(Ordering::SeqCst), 1);
    assert_eq!(fired[1 - new_idx].load(Ordering::SeqCst), 0);
    assert_eq!(nodes[1 - new_idx].status(), LeadState::Standby);
    assert_eq!(dead_fired.load(Ordering::SeqCst), 1);
    assert!(logs_contain("Resuming startup sequence from STANDBY"));

    // 5. No further transitions
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(running_count(&nodes), 1);
        assert_eq!(nodes[new_idx].status(), LeadState::Running);
    }

    // 6. The promoted node published itself; the driver sees the takeover
    let new_identity = nodes[new_idx].identity().clone();
    let new_member = members.iter().find(|m| m.identity == new_identity).unwrap();
    assert_eq!(
        PrimaryRecord::load(registry.as_ref()).await.unwrap(),
        Some(PrimaryRecord::new(new_member.identity.host.clone(), new_member.port))
    );

    let launcher = Arc::new(InProcessLauncher::new(lock.clone(), registry.clone(), members.clone()));
    let driver = FailoverTestDriver::new(
        NodeIdentity::new("10.0.9.1", 9, "client", "client1"),
        members.clone(),
        registry.clone(),
        launcher,
        FailoverConfig::default(),
    );
    let observed = driver
        .wait_for_new_primary(Some(&members[primary_idx]), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(observed.as_ref(), Some(new_member));

    // The pending waiter of the promoted node resolved with RUNNING, the
    // other one is still blocked.
    for (i, waiter) in waiters {
        let original_new_idx = if new_idx >= primary_idx { new_idx + 1 } else { new_idx };
        if i == original_new_idx {
            assert_eq!(waiter.await.unwrap(), LeadState::Running);
        } else {
            assert!(!waiter.is_finished());
            waiter.abort();
        }
    }

    for node in &nodes {
        node.stop().await.unwrap();
    }
    assert_eq!(lock.holder(), None);
}
