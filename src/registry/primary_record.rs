use super::ClusterRegistry;
use crate::RegistryError;
use crate::Result;
use crate::PRIMARY_LEAD_HOST;
use crate::PRIMARY_LEAD_PORT;

/// Where the primary lead node can be reached.
///
/// Eventually consistent with the true lock holder: written by the node that
/// owns the lock at write time, or by the failover driver after it re-derives
/// the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryRecord {
    pub host: String,
    pub port: u16,
}

impl PrimaryRecord {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub async fn publish<R>(
        &self,
        registry: &R,
    ) -> Result<()>
    where
        R: ClusterRegistry + ?Sized,
    {
        registry.put(PRIMARY_LEAD_HOST, self.host.clone()).await?;
        registry.put(PRIMARY_LEAD_PORT, self.port.to_string()).await?;
        Ok(())
    }

    /// `None` unless both halves of the record are present.
    pub async fn load<R>(registry: &R) -> Result<Option<Self>>
    where
        R: ClusterRegistry + ?Sized,
    {
        let host = registry.get(PRIMARY_LEAD_HOST).await?;
        let port = registry.get(PRIMARY_LEAD_PORT).await?;
        match (host, port) {
            (Some(host), Some(port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| RegistryError::InvalidValue {
                    key: PRIMARY_LEAD_PORT.to_string(),
                    value: port.clone(),
                })?;
                Ok(Some(Self { host, port }))
            }
            _ => Ok(None),
        }
    }
}
