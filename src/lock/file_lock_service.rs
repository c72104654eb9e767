//! Lock service backed by an OS advisory lock (`flock`) on a shared file.
//!
//! The coordinator address is the lock file path. Every process of a role
//! group points at the same file; the kernel drops the lock when the holding
//! process dies, which gives the failure-triggered release the elector relies on.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use super::LockService;
use crate::utils::file_io::create_parent_dir_if_not_exist;
use crate::LockError;
use crate::Result;

#[derive(Debug, Default)]
struct FileLockState {
    path: Option<PathBuf>,
    /// Owner and the open file carrying the lock
    held: Option<(String, File)>,
}

#[derive(Debug)]
pub struct FileLockService {
    poll_interval: Duration,
    state: Mutex<FileLockState>,
}

impl FileLockService {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            state: Mutex::new(FileLockState::default()),
        }
    }

    pub fn lock_path(&self) -> Option<PathBuf> {
        self.state.lock().path.clone()
    }

    fn open_lock_file(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
    }

    fn try_acquire(
        &self,
        owner: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let path = match &state.path {
            Some(p) => p.clone(),
            None => return Err(LockError::Unavailable("file lock service is not connected".into()).into()),
        };

        if let Some((holder, _)) = &state.held {
            return Ok(holder == owner);
        }

        let file = Self::open_lock_file(&path).map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("{} acquired flock on {}", owner, path.display());
                state.held = Some((owner.to_string(), file));
                Ok(true)
            }
            Err(e) if is_contended(&e) => Ok(false),
            Err(source) => Err(LockError::Io { path, source }.into()),
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[async_trait]
impl LockService for FileLockService {
    async fn connect(
        &self,
        coordinator_address: &str,
    ) -> Result<()> {
        let path = PathBuf::from(coordinator_address);
        create_parent_dir_if_not_exist(&path)
            .map_err(|e| LockError::Unavailable(format!("cannot prepare {}: {}", path.display(), e)))?;
        // Opening proves the coordinator path is usable before anyone competes.
        Self::open_lock_file(&path)
            .map_err(|e| LockError::Unavailable(format!("cannot open {}: {}", path.display(), e)))?;

        let mut state = self.state.lock();
        match &state.path {
            Some(current) if current != &path => {
                warn!(
                    "file lock service already bound to {}, ignoring {}",
                    current.display(),
                    path.display()
                );
            }
            Some(_) => {}
            None => state.path = Some(path),
        }
        Ok(())
    }

    async fn try_lock(
        &self,
        owner: &str,
    ) -> Result<bool> {
        self.try_acquire(owner)
    }

    async fn lock(
        &self,
        owner: &str,
    ) -> Result<()> {
        loop {
            if self.try_acquire(owner)? {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn unlock(
        &self,
        owner: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        match state.held.take() {
            Some((holder, file)) if holder == owner => {
                let path = state.path.clone().unwrap_or_default();
                file.unlock().map_err(|source| LockError::Io { path, source })?;
                debug!("{} released flock", owner);
                Ok(())
            }
            other => {
                state.held = other;
                Err(LockError::NotHeld {
                    owner: owner.to_string(),
                }
                .into())
            }
        }
    }
}
