//! Stops and restarts randomly chosen cluster nodes while a workload runs.
//!
//! ## Key Responsibilities
//! - Single-flight cycling per target through registry counters
//! - Rate limiting between cycles of the same target
//! - Victim selection; for leads only the current primary is eligible
//! - Run-once role start and observation of lead failover
//!
//! Any number of harness clients may call [`FailoverTestDriver::cycle`]
//! concurrently; the registry decides which one acts.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::CycleOutcome;
use super::CycleTarget;
use super::NodeLauncher;
use super::PrimaryOracle;
use crate::registry::get_i64;
use crate::registry::is_first_writer;
use crate::registry::keys;
use crate::utils::time::millis_since;
use crate::utils::time::now_millis;
use crate::ClusterMember;
use crate::ClusterRegistry;
use crate::FailoverConfig;
use crate::FailoverError;
use crate::NodeIdentity;
use crate::PrimaryRecord;
use crate::Result;

pub struct FailoverTestDriver<R, N>
where
    R: ClusterRegistry,
    N: NodeLauncher,
{
    local: NodeIdentity,
    roster: Vec<ClusterMember>,
    registry: Arc<R>,
    launcher: Arc<N>,
    oracle: PrimaryOracle<R>,
    config: FailoverConfig,
}

impl<R, N> FailoverTestDriver<R, N>
where
    R: ClusterRegistry,
    N: NodeLauncher,
{
    pub fn new(
        local: NodeIdentity,
        roster: Vec<ClusterMember>,
        registry: Arc<R>,
        launcher: Arc<N>,
        config: FailoverConfig,
    ) -> Self {
        Self {
            local,
            roster,
            oracle: PrimaryOracle::new(registry.clone()),
            registry,
            launcher,
            config,
        }
    }

    pub fn roster(&self) -> &[ClusterMember] {
        &self.roster
    }

    pub fn oracle(&self) -> &PrimaryOracle<R> {
        &self.oracle
    }

    fn target_role(
        &self,
        target: CycleTarget,
    ) -> &str {
        match target {
            CycleTarget::Lead => &self.config.lead_target,
            CycleTarget::Store => &self.config.store_target,
        }
    }

    fn target_count(
        &self,
        target: CycleTarget,
    ) -> usize {
        match target {
            CycleTarget::Lead => self.config.num_leads_to_stop,
            CycleTarget::Store => self.config.num_vms_to_stop,
        }
    }

    /// Picks up to `n` members of `role_filter` at random.
    ///
    /// The local process is never chosen. For the lead role only the current
    /// primary is eligible.
    pub async fn select_victims(
        &self,
        n: usize,
        role_filter: &str,
    ) -> Result<Vec<ClusterMember>> {
        let mut pool: Vec<ClusterMember> = self
            .roster
            .iter()
            .filter(|m| m.role() == role_filter && !m.identity.is_same_process(&self.local))
            .cloned()
            .collect();

        if role_filter == self.config.lead_target {
            let primary = self.oracle.current_primary(&self.roster, role_filter).await?;
            pool.retain(|m| primary.as_ref() == Some(m));
            debug!("primary lead eligible for cycling: {:?}", primary.map(|m| m.identity));
        }

        Ok(draw(pool, n))
    }

    /// Stop hook, optional config rewrite, then start hook.
    pub async fn kill_and_restart(
        &self,
        member: &ClusterMember,
    ) -> Result<()> {
        let role = member.role();
        info!("stopping {} in {:?}", member.identity, member.node_dir);
        self.launcher.terminate(role, &member.node_dir).await?;

        if self.config.regenerate_config {
            self.regenerate_config(member).await?;
        }

        let exit_code = self.launcher.launch(role, member.launch_args.clone()).await?;
        if exit_code != 0 {
            return Err(FailoverError::LaunchFailed {
                role: role.to_string(),
                exit_code,
            }
            .into());
        }
        info!("{} restarted successfully", member.identity);
        Ok(())
    }

    async fn regenerate_config(
        &self,
        member: &ClusterMember,
    ) -> Result<()> {
        let path = self.config.conf_dir.join(format!("{}s", member.role()));
        let io_err = |source: std::io::Error| FailoverError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.config.conf_dir).await.map_err(io_err)?;
        tokio::fs::write(&path, format!("{}\n", member.config_fragment))
            .await
            .map_err(io_err)?;
        debug!("wrote {:?}: {}", path, member.config_fragment);
        Ok(())
    }

    /// Brings down and restarts nodes of `target` if this caller wins the
    /// single-flight gate and the previous cycle is old enough.
    pub async fn cycle(
        &self,
        target: CycleTarget,
    ) -> Result<CycleOutcome> {
        if !self.config.cycle_vms {
            warn!("cycle_vms is false, no node will be brought down");
            return Ok(CycleOutcome::Disabled);
        }

        let counter = target.gate_counter();
        if !is_first_writer(self.registry.as_ref(), counter).await? {
            debug!("another client is cycling {:?}", target);
            return Ok(CycleOutcome::NotMyTurn);
        }

        let outcome = self.cycle_gated(target).await;
        // the gate reopens on every exit, including errors
        if let Err(e) = self.registry.zero(counter).await {
            warn!("failed to reopen the {:?} cycle gate: {:?}", target, e);
            if outcome.is_ok() {
                return Err(e);
            }
        }
        outcome
    }

    /// Body of [`Self::cycle`] run while this caller holds the gate.
    async fn cycle_gated(
        &self,
        target: CycleTarget,
    ) -> Result<CycleOutcome> {
        let first_cycle = self.registry.get(target.cycled_marker()).await?.is_none();
        if !first_cycle {
            match get_i64(self.registry.as_ref(), target.last_cycled_key()).await? {
                None => {
                    let grace = self.config.first_cycle_grace();
                    info!("allow {:?} before cycling {:?} again", grace, target);
                    tokio::time::sleep(grace).await;
                }
                Some(last) => {
                    let elapsed = Duration::from_millis(millis_since(last));
                    if elapsed < self.config.min_cycle_interval() {
                        debug!("{:?} cycled {:?} ago, skipping", target, elapsed);
                        return Ok(CycleOutcome::RateLimited);
                    }
                }
            }
        }

        info!("cycle {:?} starts at: {}", target, now_millis());
        let victims = self.stop_start(target).await?;
        if victims.is_empty() {
            info!("no {:?} node chosen to be stopped", target);
            return Ok(CycleOutcome::NoVictims);
        }

        let finished = now_millis();
        info!("cycle {:?} finishes at: {}", target, finished);
        self.registry.put(target.last_cycled_key(), finished.to_string()).await?;
        self.registry.put(target.cycled_marker(), "true".to_string()).await?;
        Ok(CycleOutcome::Cycled(victims))
    }

    async fn stop_start(
        &self,
        target: CycleTarget,
    ) -> Result<Vec<ClusterMember>> {
        let victims = self
            .select_victims(self.target_count(target), self.target_role(target))
            .await?;
        for member in &victims {
            self.kill_and_restart(member).await?;
        }
        Ok(victims)
    }

    /// Re-derives the primary of `role` from node logs and republishes it.
    pub async fn refresh_primary_record(
        &self,
        role: &str,
    ) -> Result<Option<PrimaryRecord>> {
        let Some(primary) = self.oracle.primary_from_logs(&self.roster, role).await? else {
            warn!("no {} node logged a promotion", role);
            return Ok(None);
        };
        let record = PrimaryRecord::new(primary.identity.host.clone(), primary.port);
        record.publish(self.registry.as_ref()).await?;
        info!("primary record refreshed to {}:{}", record.host, record.port);
        Ok(Some(record))
    }

    /// Polls the oracle until a lead other than `previous` is primary.
    ///
    /// Returns `None` if none appears within `timeout`.
    pub async fn wait_for_new_primary(
        &self,
        previous: Option<&ClusterMember>,
        timeout: Duration,
    ) -> Result<Option<ClusterMember>> {
        let deadline = Instant::now() + timeout;
        let role = self.config.lead_target.as_str();
        loop {
            if let Some(primary) = self.oracle.current_primary(&self.roster, role).await? {
                if previous != Some(&primary) {
                    info!("new primary lead: {}", primary.identity);
                    return Ok(Some(primary));
                }
            }
            if Instant::now() >= deadline {
                warn!("no new primary lead within {:?}", timeout);
                return Ok(None);
            }
            tokio::time::sleep(self.config.oracle_poll_interval()).await;
        }
    }

    /// Launches `role` unless another client already did.
    pub async fn start_role_once(
        &self,
        role: &str,
        args: Vec<String>,
    ) -> Result<bool> {
        let counter = keys::started_counter(role);
        if !is_first_writer(self.registry.as_ref(), &counter).await? {
            debug!("{} already started by another client", role);
            return Ok(false);
        }
        let exit_code = self.launcher.launch(role, args).await?;
        if exit_code != 0 {
            return Err(FailoverError::LaunchFailed {
                role: role.to_string(),
                exit_code,
            }
            .into());
        }
        info!("{} started", role);
        Ok(true)
    }

    /// Terminates `member` and reopens its role's start gate.
    pub async fn stop_role(
        &self,
        member: &ClusterMember,
    ) -> Result<()> {
        self.launcher.terminate(member.role(), &member.node_dir).await?;
        self.registry.zero(&keys::started_counter(member.role())).await?;
        info!("{} stopped", member.identity);
        Ok(())
    }
}

/// Uniform draws without replacement.
fn draw(
    mut pool: Vec<ClusterMember>,
    n: usize,
) -> Vec<ClusterMember> {
    let mut rng = rand::thread_rng();
    let mut chosen = Vec::with_capacity(n.min(pool.len()));
    while chosen.len() < n && !pool.is_empty() {
        let i = rng.gen_range(0..pool.len());
        chosen.push(pool.swap_remove(i));
    }
    chosen
}
