//! Shared registry ("blackboard") used for cross-process coordination and as a
//! test oracle.
//!
//! The registry is never the source of mutual-exclusion truth. Non-counter
//! writes are only correct because every key has a single intended writer,
//! which the naming helpers in [`keys`] guarantee.

mod file_registry;
mod mem_registry;
mod primary_record;
pub use file_registry::*;
pub use mem_registry::*;
pub use primary_record::*;


///--------------------------------------
/// Trait Definition
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::RegistryError;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterRegistry: Send + Sync + 'static {
    async fn put(
        &self,
        key: &str,
        value: String,
    ) -> Result<()>;

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>>;

    /// Atomically adds one and returns the new value.
    async fn increment(
        &self,
        counter: &str,
    ) -> Result<i64>;

    async fn zero(
        &self,
        counter: &str,
    ) -> Result<()>;
}

/// First-writer-wins gate: exactly one of any number of racing callers on a
/// fresh counter observes `true`.
pub async fn is_first_writer<R>(
    registry: &R,
    counter: &str,
) -> Result<bool>
where
    R: ClusterRegistry + ?Sized,
{
    let turn = registry.increment(counter).await?;
    debug!("counter {} incremented to {}", counter, turn);
    Ok(turn == 1)
}

/// Reads an integer entry, e.g. an epoch-millis timestamp.
pub async fn get_i64<R>(
    registry: &R,
    key: &str,
) -> Result<Option<i64>>
where
    R: ClusterRegistry + ?Sized,
{
    match registry.get(key).await? {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            RegistryError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }
            .into()
        }),
    }
}

/// Registry key naming.
pub mod keys {
    use crate::NodeIdentity;

    /// `<role>Host_<client>_<pid>`
    pub fn host_key(identity: &NodeIdentity) -> String {
        format!("{}Host_{}", identity.role, identity.registry_suffix())
    }

    /// `<role>Port_<client>_<pid>`
    pub fn port_key(identity: &NodeIdentity) -> String {
        format!("{}Port_{}", identity.role, identity.registry_suffix())
    }

    /// `logDir_<client>_<pid>`
    pub fn log_dir_key(identity: &NodeIdentity) -> String {
        format!("logDir_{}", identity.registry_suffix())
    }

    /// Run-once start gate for a role, e.g. `leadsStarted`.
    pub fn started_counter(role: &str) -> String {
        format!("{}sStarted", role)
    }
}
