mod file_lock_service;
mod mem_lock_service;
pub use file_lock_service::*;
pub use mem_lock_service::*;


///--------------------------------------
/// Trait Definition
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Exclusive, non-expiring lease shared by every node of a role group.
///
/// Semantics:
/// - At most one owner holds the lock at any instant.
/// - The lease never expires while the holder is alive; it is released by
///   `unlock()` or when the holder fails.
/// - No fairness among waiting owners is promised.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LockService: Send + Sync + 'static {
    /// Binds the handle to a coordinator. Must succeed before any lock call;
    /// calling it again with the same address is a no-op.
    async fn connect(
        &self,
        coordinator_address: &str,
    ) -> Result<()>;

    /// Non-blocking attempt. `Ok(false)` means another owner holds the lock.
    async fn try_lock(
        &self,
        owner: &str,
    ) -> Result<bool>;

    /// Suspends until the lock is granted to `owner`.
    ///
    /// Interruption is expressed by dropping the returned future. Implementations
    /// must be cancel-safe: a dropped future never leaves the lock held.
    async fn lock(
        &self,
        owner: &str,
    ) -> Result<()>;

    async fn unlock(
        &self,
        owner: &str,
    ) -> Result<()>;
}
