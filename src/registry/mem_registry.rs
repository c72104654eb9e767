use async_trait::async_trait;
use dashmap::DashMap;

use super::ClusterRegistry;
use crate::Result;

/// In-process registry shared through an `Arc` by every node of a test cluster.
#[derive(Debug, Default)]
pub struct MemRegistry {
    entries: DashMap<String, String>,
    counters: DashMap<String, i64>,
}

impl MemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all entries, for assertions.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        all.sort();
        all
    }

    pub fn counter(
        &self,
        name: &str,
    ) -> i64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl ClusterRegistry for MemRegistry {
    async fn put(
        &self,
        key: &str,
        value: String,
    ) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn increment(
        &self,
        counter: &str,
    ) -> Result<i64> {
        // The shard lock is held across read-modify-write.
        let value = *self
            .counters
            .entry(counter.to_string())
            .and_modify(|v| *v += 1)
            .or_insert(1);
        Ok(value)
    }

    async fn zero(
        &self,
        counter: &str,
    ) -> Result<()> {
        self.counters.insert(counter.to_string(), 0);
        Ok(())
    }
}
