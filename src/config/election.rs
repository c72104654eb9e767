use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElectionConfig {
    /// Where the lock service lives. For the file lock this is the lock file path.
    #[serde(default)]
    pub coordinator_address: Option<String>,

    /// Suspend `start()` until the lock is granted instead of going STANDBY
    #[serde(default)]
    pub blocking_start: bool,

    /// Poll interval of lock implementations without a wakeup channel
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,

    /// Shared registry document. `None` keeps the registry in memory.
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            coordinator_address: None,
            blocking_start: false,
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            registry_path: None,
        }
    }
}

impl ElectionConfig {
    pub fn with_coordinator(address: impl Into<String>) -> Self {
        Self {
            coordinator_address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "election.lock_poll_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The coordinator address, or the configuration error `start()` reports.
    pub fn coordinator(&self) -> Result<&str> {
        match self.coordinator_address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => Ok(address),
            _ => Err(Error::InvalidConfig(
                "election.coordinator_address is required to start the lead elector".into(),
            )),
        }
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }
}

fn default_lock_poll_interval_ms() -> u64 {
    100
}
