use std::future::Future;
use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::ClusterMember;
use crate::ElectionConfig;
use crate::LeadElector;
use crate::LockService;
use crate::MemLockService;
use crate::MemRegistry;
use crate::NodeIdentity;

pub(crate) const MEM_COORDINATOR: &str = "mem://lead-group";

pub(crate) type MemElector = LeadElector<MemLockService, MemRegistry>;

pub(crate) fn lead_identity(n: u32) -> NodeIdentity {
    NodeIdentity::new(format!("10.0.0.{}", n), 1000 + n, "lead", format!("lead{}", n))
}

pub(crate) fn server_identity(n: u32) -> NodeIdentity {
    NodeIdentity::new(format!("10.0.1.{}", n), 2000 + n, "server", format!("server{}", n))
}

/// Lead member `n` with its node directory under `root`. Same endpoint as
/// [`mem_elector`] `n`.
pub(crate) fn lead_member(
    n: u32,
    root: &Path,
) -> ClusterMember {
    ClusterMember::new(lead_identity(n), root.join(format!("lead{}", n)), 8090 + n as u16)
}

pub(crate) fn server_member(
    n: u32,
    root: &Path,
) -> ClusterMember {
    ClusterMember::new(server_identity(n), root.join(format!("server{}", n)), 1527 + n as u16)
}

pub(crate) fn election_config() -> ElectionConfig {
    ElectionConfig::with_coordinator(MEM_COORDINATOR)
}

pub(crate) fn mem_cluster() -> (Arc<MemLockService>, Arc<MemRegistry>) {
    (Arc::new(MemLockService::new()), Arc::new(MemRegistry::new()))
}

pub(crate) fn mem_elector(
    n: u32,
    lock: &Arc<MemLockService>,
    registry: &Arc<MemRegistry>,
) -> MemElector {
    LeadElector::new(lead_identity(n), 8090 + n as u16, lock.clone(), registry.clone())
}

/// Callback that counts its invocations.
pub(crate) fn counting_callback() -> (Arc<AtomicUsize>, impl FnOnce(&NodeIdentity) + Send + 'static) {
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    (fired, move |_: &NodeIdentity| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    })
}

/// Polls `check` until it holds or `timeout` elapses.
pub(crate) async fn eventually<F, Fut>(
    timeout: Duration,
    mut check: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub(crate) async fn connected_lock() -> Arc<MemLockService> {
    let lock = Arc::new(MemLockService::new());
    lock.connect(MEM_COORDINATOR).await.expect("connect should succeed");
    lock
}
