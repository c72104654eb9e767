use std::sync::Arc;
use std::time::Duration;

use lead_ha::ElectionConfig;
use lead_ha::FileLockService;
use lead_ha::FileRegistry;
use lead_ha::LeadElector;
use lead_ha::LeadState;
use lead_ha::PrimaryRecord;
use tempfile::tempdir;
use tokio::time::timeout;

use crate::common::lead_identity;

type FileElector = LeadElector<FileLockService, FileRegistry>;

/// Each node gets its own lock and registry handles, as separate processes
/// would.
fn file_elector(
    n: u32,
    registry_path: &std::path::Path,
) -> FileElector {
    LeadElector::new(
        lead_identity(n),
        8090 + n as u16,
        Arc::new(FileLockService::new(Duration::from_millis(20))),
        Arc::new(FileRegistry::open(registry_path).unwrap()),
    )
}

/// # Case: flock-backed election
///
/// ## Validation Criterias:
/// 1. Two handles on one lock file never both hold it
/// 2. Stopping the holder promotes the standby
/// 3. The promotion is visible through a third registry handle
#[tokio::test]
async fn test_file_lock_hands_over_on_stop() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("locks").join("lead.lock");
    let registry_path = dir.path().join("registry.json");
    let config = ElectionConfig::with_coordinator(lock_path.display().to_string());

    let first = file_elector(1, &registry_path);
    let second = file_elector(2, &registry_path);

    assert_eq!(first.start(&config, false).await.unwrap(), LeadState::Running);
    assert_eq!(second.start(&config, false).await.unwrap(), LeadState::Standby);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(second.status(), LeadState::Standby);

    first.stop().await.unwrap();

    let state = timeout(Duration::from_secs(5), second.wait_until_primary())
        .await
        .expect("standby should take the file lock");
    assert_eq!(state, LeadState::Running);

    let observer = FileRegistry::open(&registry_path).unwrap();
    assert_eq!(
        PrimaryRecord::load(&observer).await.unwrap(),
        Some(PrimaryRecord::new("10.0.0.2", 8092))
    );

    second.stop().await.unwrap();
}

#[tokio::test]
async fn test_blocking_start_on_free_file_lock() {
    let dir = tempdir().unwrap();
    let config = ElectionConfig::with_coordinator(dir.path().join("lead.lock").display().to_string());
    let elector = file_elector(1, &dir.path().join("registry.json"));

    let state = timeout(Duration::from_secs(2), elector.start(&config, true))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state, LeadState::Running);
    elector.stop().await.unwrap();
}
