use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::LEAD_ROLE;
use crate::SERVER_ROLE;

/// VM cycling parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FailoverConfig {
    /// Master switch; when false no node is ever brought down
    #[serde(default)]
    pub cycle_vms: bool,

    #[serde(default = "default_num_to_stop")]
    pub num_leads_to_stop: usize,

    #[serde(default = "default_num_to_stop")]
    pub num_vms_to_stop: usize,

    /// Minimum time between two cycles of the same target
    #[serde(default = "default_min_cycle_interval_secs")]
    pub min_cycle_interval_secs: u64,

    /// Pause before the second cycle when no timestamp was ever published
    #[serde(default = "default_first_cycle_grace_secs")]
    pub first_cycle_grace_secs: u64,

    /// Rewrite the role's config fragment before restarting a node
    #[serde(default = "default_regenerate_config")]
    pub regenerate_config: bool,

    #[serde(default = "default_conf_dir")]
    pub conf_dir: PathBuf,

    #[serde(default = "default_lead_target")]
    pub lead_target: String,

    #[serde(default = "default_store_target")]
    pub store_target: String,

    #[serde(default = "default_oracle_poll_interval_ms")]
    pub oracle_poll_interval_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            cycle_vms: false,
            num_leads_to_stop: default_num_to_stop(),
            num_vms_to_stop: default_num_to_stop(),
            min_cycle_interval_secs: default_min_cycle_interval_secs(),
            first_cycle_grace_secs: default_first_cycle_grace_secs(),
            regenerate_config: default_regenerate_config(),
            conf_dir: default_conf_dir(),
            lead_target: default_lead_target(),
            store_target: default_store_target(),
            oracle_poll_interval_ms: default_oracle_poll_interval_ms(),
        }
    }
}

impl FailoverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lead_target.trim().is_empty() || self.store_target.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "failover.lead_target and failover.store_target cannot be empty".into(),
            ));
        }
        if self.oracle_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "failover.oracle_poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.regenerate_config && self.conf_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "failover.conf_dir is required when regenerate_config is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn min_cycle_interval(&self) -> Duration {
        Duration::from_secs(self.min_cycle_interval_secs)
    }

    pub fn first_cycle_grace(&self) -> Duration {
        Duration::from_secs(self.first_cycle_grace_secs)
    }

    pub fn oracle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.oracle_poll_interval_ms)
    }
}

fn default_num_to_stop() -> usize {
    1
}
fn default_min_cycle_interval_secs() -> u64 {
    20
}
fn default_first_cycle_grace_secs() -> u64 {
    20
}
fn default_regenerate_config() -> bool {
    true
}
fn default_conf_dir() -> PathBuf {
    PathBuf::from("./conf")
}
fn default_lead_target() -> String {
    LEAD_ROLE.to_string()
}
fn default_store_target() -> String {
    SERVER_ROLE.to_string()
}
fn default_oracle_poll_interval_ms() -> u64 {
    500
}
