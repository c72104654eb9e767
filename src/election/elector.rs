//! Per-node lead election state machine.
//!
//! ## Key Responsibilities
//! - Competes for the role group's lock through an injected [`LockService`]
//! - Moves the node between STANDBY and RUNNING, never back
//! - Broadcasts promotion to `wait_until_primary()` callers and one callback
//! - Publishes endpoints and the primary record to the [`ClusterRegistry`]
//!
//! ## Example Usage
//! ```rust,ignore
//! let elector = LeadElector::new(identity, 8090, lock, registry);
//! match elector.start(&config.election, false).await? {
//!     LeadState::Running => serve().await,
//!     _ => {
//!         elector.wait_until_primary().await;
//!         serve().await
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::waiter::PromotionWaiter;
use super::waiter::WaiterHandle;
use super::CallbackSlot;
use super::GateStatus;
use super::LeadState;
use super::PromotionGate;
use crate::registry::keys;
use crate::ClusterRegistry;
use crate::ElectionConfig;
use crate::ElectionError;
use crate::LockService;
use crate::NodeIdentity;
use crate::PrimaryRecord;
use crate::Result;
use crate::StateTransitionError;
use crate::PRIMARY_LOCK_ACQUIRED;
use crate::RESUMING_FROM_STANDBY;

/// Result of one promotion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Promotion {
    Promoted,
    /// The state machine refused RUNNING; the caller still owns the lock
    Refused,
    /// `stop()` raced the promotion and releases the lock itself
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromotionKind {
    /// `start()` won the lock
    Immediate,
    /// The standby waiter won the lock
    Deferred,
}

pub(crate) struct ElectorInner<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    pub(crate) identity: NodeIdentity,
    pub(crate) owner: String,
    advertised_port: u16,
    node_dir: Mutex<Option<PathBuf>>,

    pub(crate) lock: Arc<L>,
    registry: Arc<R>,

    state: Mutex<LeadState>,
    gate: PromotionGate,
    callback: CallbackSlot,

    /// Serializes start() initialization against stop()
    init_lock: AsyncMutex<()>,
    started: Mutex<bool>,
    shutdown: CancellationToken,
    waiter: Mutex<Option<WaiterHandle>>,
    waiter_failure: Mutex<Option<String>>,
}

impl<L, R> ElectorInner<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    pub(crate) fn status(&self) -> LeadState {
        *self.state.lock()
    }

    fn transition(
        &self,
        next: LeadState,
    ) -> Result<LeadState> {
        let mut state = self.state.lock();
        let prev = *state;
        if !prev.can_transition_to(next) {
            return Err(ElectionError::from(StateTransitionError::InvalidTransition {
                from: prev.as_str(),
                to: next.as_str(),
            })
            .into());
        }
        *state = next;
        debug!("{}: {} -> {}", self.identity, prev, next);
        Ok(prev)
    }

    fn force_stop(&self) -> LeadState {
        std::mem::replace(&mut *self.state.lock(), LeadState::Stopped)
    }

    /// Runs promotion once.
    ///
    /// The primary record is written before the gate opens, so callers woken
    /// by `wait_until_primary()` read a complete record.
    pub(crate) async fn promote(
        &self,
        kind: PromotionKind,
    ) -> Promotion {
        if let Err(e) = self.transition(LeadState::Running) {
            warn!("{} refused promotion: {}", self.identity, e);
            return Promotion::Refused;
        }
        // RUNNING is now visible to stop(), which owns the unlock from here
        if self.shutdown.is_cancelled() {
            debug!("{} stop requested during promotion", self.identity);
            return Promotion::Superseded;
        }

        let record = PrimaryRecord::new(self.identity.host.clone(), self.advertised_port);
        if let Err(e) = record.publish(self.registry.as_ref()).await {
            warn!("{} could not publish primary record: {:?}", self.identity, e);
        }

        if !self.gate.release() {
            debug!("{} promotion gate already settled", self.identity);
            return Promotion::Superseded;
        }

        match kind {
            PromotionKind::Immediate => info!("{} ({})", PRIMARY_LOCK_ACQUIRED, self.identity),
            PromotionKind::Deferred => info!("{} ({})", RESUMING_FROM_STANDBY, self.identity),
        }

        self.fire_callback();
        Promotion::Promoted
    }

    fn fire_callback(&self) {
        let callback = self.callback.take();
        if let Some(callback) = callback {
            debug!("{} firing promotion callback", self.identity);
            callback(&self.identity);
        }
    }

    pub(crate) fn record_waiter_failure(
        &self,
        reason: String,
    ) {
        *self.waiter_failure.lock() = Some(reason);
    }

    /// Registry writes are observability only; a failing registry never
    /// blocks the election.
    async fn publish_endpoints(&self) {
        let mut writes = vec![
            (keys::host_key(&self.identity), self.identity.host.clone()),
            (keys::port_key(&self.identity), self.advertised_port.to_string()),
        ];
        let node_dir = self.node_dir.lock().clone();
        if let Some(dir) = node_dir {
            writes.push((keys::log_dir_key(&self.identity), dir.display().to_string()));
        }
        for (key, value) in writes {
            if let Err(e) = self.registry.put(&key, value).await {
                warn!("{} failed to publish {}: {:?}", self.identity, key, e);
            }
        }
    }

    async fn release_lock(&self) {
        if let Err(e) = self.lock.unlock(&self.owner).await {
            warn!("{} failed to release lock: {:?}", self.identity, e);
        }
    }
}

/// Lead election handle owned by one node.
///
/// Dropping the elector cancels its standby waiter.
pub struct LeadElector<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    inner: Arc<ElectorInner<L, R>>,
}

impl<L, R> LeadElector<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    pub fn new(
        identity: NodeIdentity,
        advertised_port: u16,
        lock: Arc<L>,
        registry: Arc<R>,
    ) -> Self {
        // a restarted process may reuse a pid, so every elector gets its own session
        let owner = format!("{}#{}", identity.owner_token(), nanoid::nanoid!(8));
        Self {
            inner: Arc::new(ElectorInner {
                identity,
                owner,
                advertised_port,
                node_dir: Mutex::new(None),
                lock,
                registry,
                state: Mutex::new(LeadState::Uninitialized),
                gate: PromotionGate::new(),
                callback: CallbackSlot::default(),
                init_lock: AsyncMutex::new(()),
                started: Mutex::new(false),
                shutdown: CancellationToken::new(),
                waiter: Mutex::new(None),
                waiter_failure: Mutex::new(None),
            }),
        }
    }

    /// Publishes `dir` as this node's log directory when the elector starts.
    pub fn with_node_dir(
        self,
        dir: impl Into<PathBuf>,
    ) -> Self {
        *self.inner.node_dir.lock() = Some(dir.into());
        self
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.inner.identity
    }

    /// Name this elector uses as lock owner.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn status(&self) -> LeadState {
        self.inner.status()
    }

    #[cfg(test)]
    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Error that ended the standby waiter, if it failed.
    pub fn waiter_failure(&self) -> Option<String> {
        self.inner.waiter_failure.lock().clone()
    }

    /// Competes for the lock.
    ///
    /// Non-blocking start returns RUNNING or STANDBY at once; a STANDBY node
    /// keeps competing in the background. Blocking start suspends until the
    /// lock is granted, or returns STOPPED if `stop()` interrupts it.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if no coordinator address is configured
    /// - `LockError::Unavailable` if the lock service cannot be reached
    /// - `StateTransitionError::AlreadyStarted` on a second start
    pub async fn start(
        &self,
        config: &ElectionConfig,
        blocking: bool,
    ) -> Result<LeadState> {
        let coordinator = config.coordinator()?;

        let guard = self.inner.init_lock.lock().await;
        {
            let started = self.inner.started.lock();
            let current = self.status();
            if *started || current != LeadState::Uninitialized {
                return Err(ElectionError::from(StateTransitionError::AlreadyStarted(current.as_str())).into());
            }
        }

        if let Err(e) = self.inner.lock.connect(coordinator).await {
            error!(
                "{} cannot reach lock coordinator {}: {:?}",
                self.inner.identity, coordinator, e
            );
            return Err(e);
        }
        debug!("{} connected to lock coordinator {}", self.inner.identity, coordinator);
        // a failed connect leaves the elector startable
        *self.inner.started.lock() = true;

        self.inner.publish_endpoints().await;

        if blocking {
            // The init guard must not be held while suspended on the lock.
            drop(guard);
            return self.start_blocking().await;
        }
        let state = self.start_non_blocking().await;
        drop(guard);
        state
    }

    async fn start_non_blocking(&self) -> Result<LeadState> {
        let inner = &self.inner;
        if inner.lock.try_lock(&inner.owner).await? {
            if inner.promote(PromotionKind::Immediate).await == Promotion::Refused {
                inner.release_lock().await;
            }
            return Ok(inner.status());
        }

        inner.transition(LeadState::Standby)?;
        info!("{} did not get the primary lock, entering STANDBY", inner.identity);

        let handle = PromotionWaiter::spawn(inner.clone(), inner.shutdown.child_token());
        *inner.waiter.lock() = Some(handle);
        Ok(LeadState::Standby)
    }

    async fn start_blocking(&self) -> Result<LeadState> {
        let inner = &self.inner;
        info!("{} waiting for the primary lock", inner.identity);

        tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => {
                info!("{} stopped while waiting for the primary lock", inner.identity);
                return Ok(LeadState::Stopped);
            }
            res = inner.lock.lock(&inner.owner) => res?,
        }

        if inner.shutdown.is_cancelled() {
            inner.release_lock().await;
            return Ok(LeadState::Stopped);
        }
        match inner.promote(PromotionKind::Immediate).await {
            Promotion::Promoted => Ok(LeadState::Running),
            Promotion::Refused => {
                inner.release_lock().await;
                Ok(inner.status())
            }
            Promotion::Superseded => Ok(LeadState::Stopped),
        }
    }

    /// Stops the node. Idempotent.
    ///
    /// Cancels the standby waiter and waits for it to exit, wakes every
    /// `wait_until_primary()` caller, and releases the lock if held.
    pub async fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        inner.shutdown.cancel();
        let _guard = inner.init_lock.lock().await;

        let waiter = inner.waiter.lock().take();
        if let Some(waiter) = waiter {
            if let Err(e) = waiter.cancel_and_join().await {
                warn!("{} promotion waiter ended with error: {:?}", inner.identity, e);
            }
        }

        let prev = inner.force_stop();
        inner.gate.close();

        match prev {
            LeadState::Running => {
                inner.lock.unlock(&inner.owner).await?;
                info!("{} stopped, primary lock released", inner.identity);
            }
            LeadState::Stopped => debug!("{} already stopped", inner.identity),
            other => info!("{} stopped from {}", inner.identity, other),
        }
        Ok(())
    }

    /// Suspends the caller until this node is primary.
    ///
    /// Returns at once when RUNNING. A node that is STOPPED or was never
    /// started does not block; neither does one stopped while waiting.
    pub async fn wait_until_primary(&self) -> LeadState {
        match self.status() {
            LeadState::Running => return LeadState::Running,
            LeadState::Standby => {}
            other => {
                info!("{} is {}, not waiting for promotion", self.inner.identity, other);
                return other;
            }
        }

        match self.inner.gate.wait().await {
            GateStatus::Released => debug!("{} promoted", self.inner.identity),
            GateStatus::Closed => info!("{} stopped before promotion", self.inner.identity),
            GateStatus::Pending => {}
        }
        self.status()
    }

    /// Registers the promotion callback; a later registration replaces an
    /// earlier one. Fires immediately if the node is already primary.
    pub fn notify_when_primary<F>(
        &self,
        callback: F,
    ) where
        F: FnOnce(&NodeIdentity) + Send + 'static,
    {
        if self.inner.callback.replace(Box::new(callback)) {
            debug!("{} replaced a pending promotion callback", self.inner.identity);
        }
        // Promotion may have taken the slot before this registration landed.
        if self.inner.gate.status() == GateStatus::Released {
            self.inner.fire_callback();
        }
    }
}

impl<L, R> Drop for LeadElector<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
