use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lead_ha::ClusterMember;
use lead_ha::ElectionConfig;
use lead_ha::LeadElector;
use lead_ha::LeadState;
use lead_ha::MemLockService;
use lead_ha::MemRegistry;
use lead_ha::NodeIdentity;
use lead_ha::NodeLauncher;
use lead_ha::Result;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

pub const MEM_COORDINATOR: &str = "mem://lead-group";

pub type MemElector = LeadElector<MemLockService, MemRegistry>;

pub fn lead_identity(n: u32) -> NodeIdentity {
    NodeIdentity::new(format!("10.0.0.{n}"), 1000 + n, "lead", format!("lead{n}"))
}

pub fn lead_member(
    n: u32,
    root: &Path,
) -> ClusterMember {
    ClusterMember::new(lead_identity(n), root.join(format!("lead{n}")), 8090 + n as u16)
}

pub fn election_config() -> ElectionConfig {
    ElectionConfig::with_coordinator(MEM_COORDINATOR)
}

pub fn elector_for(
    member: &ClusterMember,
    lock: &Arc<MemLockService>,
    registry: &Arc<MemRegistry>,
) -> MemElector {
    LeadElector::new(member.identity.clone(), member.port, lock.clone(), registry.clone())
        .with_node_dir(member.node_dir.clone())
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(
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

pub fn running_count(nodes: &[Arc<MemElector>]) -> usize {
    nodes.iter().filter(|n| n.status() == LeadState::Running).count()
}

/// Runs lead "processes" as electors inside the test process.
///
/// Terminating a node drops its elector and evicts its lock session, which is
/// what the coordinator does when a holder dies.
pub struct InProcessLauncher {
    lock: Arc<MemLockService>,
    registry: Arc<MemRegistry>,
    members: Vec<ClusterMember>,
    nodes: Mutex<HashMap<PathBuf, Arc<MemElector>>>,
    restarts: Mutex<Vec<ClusterMember>>,
}

impl InProcessLauncher {
    pub fn new(
        lock: Arc<MemLockService>,
        registry: Arc<MemRegistry>,
        members: Vec<ClusterMember>,
    ) -> Self {
        Self {
            lock,
            registry,
            members,
            nodes: Mutex::new(HashMap::new()),
            restarts: Mutex::new(Vec::new()),
        }
    }

    pub fn nodes(&self) -> Vec<Arc<MemElector>> {
        self.nodes.lock().values().cloned().collect()
    }

    pub fn node(
        &self,
        member: &ClusterMember,
    ) -> Option<Arc<MemElector>> {
        self.nodes.lock().get(&member.node_dir).cloned()
    }

    async fn start_member(
        &self,
        member: &ClusterMember,
    ) -> Result<()> {
        let elector = Arc::new(elector_for(member, &self.lock, &self.registry));
        let state = elector.start(&election_config(), false).await?;
        info!("{} launched in {}", member.identity, state);
        self.nodes.lock().insert(member.node_dir.clone(), elector);
        Ok(())
    }
}

#[async_trait]
impl NodeLauncher for InProcessLauncher {
    /// Restarts terminated members of `role`, or starts the whole role when
    /// nothing was terminated.
    async fn launch(
        &self,
        role: &str,
        _args: Vec<String>,
    ) -> Result<i32> {
        let pending: Vec<ClusterMember> = {
            let mut restarts = self.restarts.lock();
            let (mine, others): (Vec<_>, Vec<_>) = restarts.drain(..).partition(|m| m.role() == role);
            *restarts = others;
            mine
        };
        let to_start = if pending.is_empty() {
            self.members.iter().filter(|m| m.role() == role).cloned().collect()
        } else {
            pending
        };
        for member in &to_start {
            self.start_member(member).await?;
        }
        Ok(0)
    }

    async fn terminate(
        &self,
        _role: &str,
        node_dir: &Path,
    ) -> Result<()> {
        let removed = self.nodes.lock().remove(node_dir);
        let Some(elector) = removed else {
            return Ok(());
        };
        let was_primary = elector.status() == LeadState::Running;
        let owner = elector.owner().to_string();
        drop(elector);
        self.lock.evict(&owner);

        if let Some(member) = self.members.iter().find(|m| m.node_dir == node_dir) {
            self.restarts.lock().push(member.clone());
        }

        // like a stop script, return once the survivors have taken over
        if was_primary {
            let this = self;
            eventually(Duration::from_secs(5), move || async move {
                running_count(&this.nodes()) == 1
            })
            .await;
        }
        Ok(())
    }
}
