//! Who a node is, and where the failover driver finds it.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Assigned at process start; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub host: String,
    pub process_id: u32,
    pub role: String,
    pub client_label: String,
}

impl NodeIdentity {
    pub fn new(
        host: impl Into<String>,
        process_id: u32,
        role: impl Into<String>,
        client_label: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            process_id,
            role: role.into(),
            client_label: client_label.into(),
        }
    }

    /// Lock owner name. Unique per role, host and pid.
    pub fn owner_token(&self) -> String {
        format!("{}@{}:{}", self.role, self.host, self.process_id)
    }

    /// `<client>_<pid>`: the per-writer namespace used in registry keys.
    pub fn registry_suffix(&self) -> String {
        format!("{}_{}", self.client_label, self.process_id)
    }

    pub fn is_same_process(
        &self,
        other: &NodeIdentity,
    ) -> bool {
        self.host == other.host && self.process_id == other.process_id
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}:{}",
            self.client_label, self.role, self.host, self.process_id
        )
    }
}

/// A roster entry the failover driver is allowed to cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub identity: NodeIdentity,
    /// Holds the member's log files; passed to the stop hook.
    pub node_dir: PathBuf,
    pub port: u16,
    /// Line written into `<conf_dir>/<role>s` when the member is restarted.
    pub config_fragment: String,
    /// Arguments passed to the start hook.
    pub launch_args: Vec<String>,
}

impl ClusterMember {
    pub fn new(
        identity: NodeIdentity,
        node_dir: impl Into<PathBuf>,
        port: u16,
    ) -> Self {
        let node_dir = node_dir.into();
        let config_fragment = format!(
            "{} -dir={} -client-port={}",
            identity.host,
            node_dir.display(),
            port
        );
        Self {
            identity,
            node_dir,
            port,
            config_fragment,
            launch_args: vec!["start".to_string()],
        }
    }

    pub fn with_config_fragment(
        mut self,
        fragment: impl Into<String>,
    ) -> Self {
        self.config_fragment = fragment.into();
        self
    }

    pub fn with_launch_args(
        mut self,
        args: Vec<String>,
    ) -> Self {
        self.launch_args = args;
        self
    }

    pub fn role(&self) -> &str {
        &self.identity.role
    }

    pub fn matches_endpoint(
        &self,
        host: &str,
        port: u16,
    ) -> bool {
        self.identity.host == host && self.port == port
    }
}
