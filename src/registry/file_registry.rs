//! Registry shared by processes on one host.
//!
//! The whole registry is a single JSON document. Every operation takes an
//! exclusive `flock` on the document, reads it, applies the change and writes
//! it back before unlocking, so counters stay atomic across processes.

use std::collections::BTreeMap;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use fs2::FileExt;
use serde::Deserialize;
use serde::Serialize;

use super::ClusterRegistry;
use crate::utils::file_io::create_parent_dir_if_not_exist;
use crate::RegistryError;
use crate::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    entries: BTreeMap<String, String>,
    #[serde(default)]
    counters: BTreeMap<String, i64>,
}

#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        create_parent_dir_if_not_exist(&path).map_err(RegistryError::Io)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `apply` on the locked document. `apply` returns its result and
    /// whether the document changed.
    async fn with_document<T, F>(
        &self,
        apply: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RegistryDocument) -> (T, bool) + Send + 'static,
    {
        let path = self.path.clone();
        let res = tokio::task::spawn_blocking(move || locked_update(&path, apply))
            .await
            .map_err(|e| RegistryError::TaskFailed(e.to_string()))?;
        Ok(res?)
    }
}

fn locked_update<T, F>(
    path: &Path,
    apply: F,
) -> std::result::Result<T, RegistryError>
where
    F: FnOnce(&mut RegistryDocument) -> (T, bool),
{
    let mut file: File = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;

    let outcome = read_apply_write(&mut file, apply);
    // flock is also dropped with the descriptor; unlock explicitly to release early.
    let _ = file.unlock();
    outcome
}

fn read_apply_write<T, F>(
    file: &mut File,
    apply: F,
) -> std::result::Result<T, RegistryError>
where
    F: FnOnce(&mut RegistryDocument) -> (T, bool),
{
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    let mut doc: RegistryDocument = if raw.trim().is_empty() {
        RegistryDocument::default()
    } else {
        serde_json::from_str(&raw)?
    };

    let (result, changed) = apply(&mut doc);
    if changed {
        let bytes = serde_json::to_vec_pretty(&doc)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        file.sync_data()?;
    }
    Ok(result)
}

#[async_trait]
impl ClusterRegistry for FileRegistry {
    async fn put(
        &self,
        key: &str,
        value: String,
    ) -> Result<()> {
        let key = key.to_string();
        self.with_document(move |doc| {
            doc.entries.insert(key, value);
            ((), true)
        })
        .await
    }

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_document(move |doc| (doc.entries.get(&key).cloned(), false))
            .await
    }

    async fn increment(
        &self,
        counter: &str,
    ) -> Result<i64> {
        let counter = counter.to_string();
        self.with_document(move |doc| {
            let value = doc.counters.entry(counter).or_insert(0);
            *value += 1;
            (*value, true)
        })
        .await
    }

    async fn zero(
        &self,
        counter: &str,
    ) -> Result<()> {
        let counter = counter.to_string();
        self.with_document(move |doc| {
            doc.counters.insert(counter, 0);
            ((), true)
        })
        .await
    }
}
