//! Lock-based lead node election with a fault-injection failover driver.
//!
//! Every node of a role group runs a [`LeadElector`]. The node that holds the
//! group's [`LockService`] lock is RUNNING (primary); the others wait in
//! STANDBY and take over when the holder stops or dies. The
//! [`FailoverTestDriver`] brings nodes down on purpose and checks that a new
//! primary emerges.

mod config;
mod constants;
mod election;
mod errors;
mod failover;
mod lock;
mod node;
mod registry;
pub mod utils;

pub use config::*;
pub use constants::*;
pub use election::*;
pub use errors::*;
pub use failover::*;
pub use lock::*;
pub use node::*;
pub use registry::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
