//! In-process lock service.
//!
//! Every elector of a test cluster shares one `Arc<MemLockService>`. Holder
//! failure is simulated with [`MemLockService::evict`], which plays the part of
//! the lock service's failure detector.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use tracing::info;

use super::LockService;
use crate::LockError;
use crate::Result;

#[derive(Debug, Default)]
struct MemLockState {
    reachable: bool,
    coordinator: Option<String>,
    holder: Option<String>,
}

#[derive(Debug)]
pub struct MemLockService {
    state: Mutex<MemLockState>,
    released: Notify,
}

impl Default for MemLockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemLockService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemLockState {
                reachable: true,
                ..Default::default()
            }),
            released: Notify::new(),
        }
    }

    /// A service that refuses every connection.
    pub fn unreachable() -> Self {
        Self {
            state: Mutex::new(MemLockState::default()),
            released: Notify::new(),
        }
    }

    pub fn holder(&self) -> Option<String> {
        self.state.lock().holder.clone()
    }

    /// Releases the lock on behalf of a failed holder.
    ///
    /// Returns `false` if `owner` did not hold the lock.
    pub fn evict(
        &self,
        owner: &str,
    ) -> bool {
        let evicted = {
            let mut state = self.state.lock();
            if state.holder.as_deref() == Some(owner) {
                state.holder = None;
                true
            } else {
                false
            }
        };
        if evicted {
            info!("holder {} evicted, lock released", owner);
            self.released.notify_waiters();
        }
        evicted
    }

    fn try_acquire(
        &self,
        owner: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        if state.coordinator.is_none() {
            return Err(LockError::Unavailable("memory lock service is not connected".into()).into());
        }
        match state.holder.as_deref() {
            None => {
                state.holder = Some(owner.to_string());
                Ok(true)
            }
            Some(current) => Ok(current == owner),
        }
    }
}

#[async_trait]
impl LockService for MemLockService {
    async fn connect(
        &self,
        coordinator_address: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.reachable {
            return Err(LockError::Unavailable(format!("coordinator {} is unreachable", coordinator_address)).into());
        }
        if state.coordinator.is_none() {
            debug!("memory lock service bound to {}", coordinator_address);
            state.coordinator = Some(coordinator_address.to_string());
        }
        Ok(())
    }

    async fn try_lock(
        &self,
        owner: &str,
    ) -> Result<bool> {
        self.try_acquire(owner)
    }

    async fn lock(
        &self,
        owner: &str,
    ) -> Result<()> {
        loop {
            // Register interest before checking so a release between the check
            // and the await is not lost.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.try_acquire(owner)? {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn unlock(
        &self,
        owner: &str,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.holder.as_deref() != Some(owner) {
                return Err(LockError::NotHeld {
                    owner: owner.to_string(),
                }
                .into());
            }
            state.holder = None;
        }
        debug!("{} released the lock", owner);
        self.released.notify_waiters();
        Ok(())
    }
}
