//! Fault-injection harness that cycles cluster nodes and checks that a new
//! primary lead emerges.

mod driver;
mod oracle;
pub use driver::*;
pub use oracle::*;


use std::path::Path;

///--------------------------------------
/// Trait Definition
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::ClusterMember;
use crate::Result;
use crate::LAST_CYCLED_TIME;
use crate::LAST_CYCLED_TIME_FOR_LEAD;
use crate::LEAD_VM_CYCLED;
use crate::STOP_START_LEAD_VMS;
use crate::STOP_START_VMS;
use crate::STORE_VM_CYCLED;

/// Start and stop hooks for cluster roles. Process management lives behind
/// this trait; the driver only sequences the calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeLauncher: Send + Sync + 'static {
    /// Starts a node of `role`, returning the hook's exit code.
    async fn launch(
        &self,
        role: &str,
        args: Vec<String>,
    ) -> Result<i32>;

    /// Stops the node whose working directory is `node_dir`.
    async fn terminate(
        &self,
        role: &str,
        node_dir: &Path,
    ) -> Result<()>;
}

/// Which group of nodes a cycle brings down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTarget {
    Lead,
    Store,
}

impl CycleTarget {
    /// Single-flight counter
    pub fn gate_counter(&self) -> &'static str {
        match self {
            CycleTarget::Lead => STOP_START_LEAD_VMS,
            CycleTarget::Store => STOP_START_VMS,
        }
    }

    pub fn last_cycled_key(&self) -> &'static str {
        match self {
            CycleTarget::Lead => LAST_CYCLED_TIME_FOR_LEAD,
            CycleTarget::Store => LAST_CYCLED_TIME,
        }
    }

    /// Marker written once the target has been cycled at least once.
    pub fn cycled_marker(&self) -> &'static str {
        match self {
            CycleTarget::Lead => LEAD_VM_CYCLED,
            CycleTarget::Store => STORE_VM_CYCLED,
        }
    }
}

/// Result of one `cycle()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cycling is switched off in the config
    Disabled,
    /// Another caller holds the single-flight gate
    NotMyTurn,
    /// The previous cycle is too recent
    RateLimited,
    /// No eligible node was found
    NoVictims,
    Cycled(Vec<ClusterMember>),
}
