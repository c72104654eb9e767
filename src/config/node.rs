use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::NodeIdentity;
use crate::Result;
use crate::LEAD_ROLE;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Test-harness client name, e.g. `lead1`
    #[serde(default = "default_client_label")]
    pub client_label: String,

    #[serde(default = "default_role")]
    pub role: String,

    /// Port advertised in the primary record
    #[serde(default = "default_port")]
    pub port: u16,

    /// Working directory holding logs and the config fragment
    #[serde(default = "default_node_dir")]
    pub node_dir: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            client_label: default_client_label(),
            role: default_role(),
            port: default_port(),
            node_dir: default_node_dir(),
            log_file: default_log_file(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("node.host cannot be empty".into()));
        }
        if self.role.trim().is_empty() {
            return Err(Error::InvalidConfig("node.role cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(Error::InvalidConfig("node.port must be non-zero".into()));
        }
        if self.node_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("node.node_dir cannot be empty".into()));
        }
        if self.log_file.trim().is_empty() {
            return Err(Error::InvalidConfig("node.log_file cannot be empty".into()));
        }
        Ok(())
    }

    /// Identity of the current process under this configuration.
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(
            self.host.clone(),
            std::process::id(),
            self.role.clone(),
            self.client_label.clone(),
        )
    }

    pub fn log_path(&self) -> PathBuf {
        self.node_dir.join(&self.log_file)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_client_label() -> String {
    "lead1".to_string()
}
fn default_role() -> String {
    LEAD_ROLE.to_string()
}
fn default_port() -> u16 {
    8090
}
fn default_node_dir() -> PathBuf {
    PathBuf::from("./lead")
}
fn default_log_file() -> String {
    "lead.log".to_string()
}
