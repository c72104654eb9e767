//! Advisory answer to "which lead node is primary right now".
//!
//! The registry-published [`PrimaryRecord`] is preferred. When it is absent or
//! names no roster member, node logs are scanned for the promotion markers.
//! Logs keep markers from earlier terms, so among several marked members the
//! one whose marked log was written last wins.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;
use tracing::trace;

use crate::constants::PROMOTION_MARKERS;
use crate::utils::file_io::file_contains_any;
use crate::utils::file_io::files_with_extension;
use crate::ClusterMember;
use crate::ClusterRegistry;
use crate::FailoverError;
use crate::PrimaryRecord;
use crate::Result;

pub struct PrimaryOracle<R>
where
    R: ClusterRegistry,
{
    registry: Arc<R>,
}

impl<R> PrimaryOracle<R>
where
    R: ClusterRegistry,
{
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Primary among the `role` members of `roster`, if any can be found.
    pub async fn current_primary(
        &self,
        roster: &[ClusterMember],
        role: &str,
    ) -> Result<Option<ClusterMember>> {
        if let Some(record) = PrimaryRecord::load(self.registry.as_ref()).await? {
            let named = roster
                .iter()
                .find(|m| m.role() == role && m.matches_endpoint(&record.host, record.port));
            match named {
                Some(member) => {
                    debug!("primary {} taken from registry", member.identity);
                    return Ok(Some(member.clone()));
                }
                None => debug!(
                    "primary record {}:{} names no {} member, falling back to logs",
                    record.host, record.port, role
                ),
            }
        }
        self.primary_from_logs(roster, role).await
    }

    /// Primary according to node logs only.
    pub async fn primary_from_logs(
        &self,
        roster: &[ClusterMember],
        role: &str,
    ) -> Result<Option<ClusterMember>> {
        let mut best: Option<(SystemTime, &ClusterMember)> = None;
        for member in roster.iter().filter(|m| m.role() == role) {
            if let Some(written) = last_marked_write(&member.node_dir).await? {
                trace!("{} carries a promotion marker", member.identity);
                if best.map_or(true, |(seen, _)| written > seen) {
                    best = Some((written, member));
                }
            }
        }
        Ok(best.map(|(_, member)| member.clone()))
    }
}

/// Latest modification time among `*.log` files in `node_dir` that contain a
/// promotion marker.
async fn last_marked_write(node_dir: &Path) -> Result<Option<SystemTime>> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| FailoverError::Io { path, source }
    };

    let logs = files_with_extension(node_dir, "log").await.map_err(io_err(node_dir))?;

    let mut latest = None;
    for log in logs {
        if !file_contains_any(&log, &PROMOTION_MARKERS).await.map_err(io_err(&log))? {
            continue;
        }
        let modified = tokio::fs::metadata(&log)
            .await
            .and_then(|meta| meta.modified())
            .map_err(io_err(&log))?;
        if latest.map_or(true, |seen| modified > seen) {
            latest = Some(modified);
        }
    }
    Ok(latest)
}
