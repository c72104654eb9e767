use std::fs::create_dir_all;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::error;

pub fn create_parent_dir_if_not_exist(path: &Path) -> io::Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(e);
            }
            debug!("created directory {:?}", parent_dir);
        }
    }
    Ok(())
}

pub fn open_file_for_append(path: PathBuf) -> io::Result<File> {
    create_parent_dir_if_not_exist(&path)?;
    OpenOptions::new().append(true).create(true).open(&path)
}

/// Regular files directly under `dir` whose extension is `extension`,
/// sorted by path. A missing directory yields an empty list.
pub async fn files_with_extension(
    dir: &Path,
    extension: &str,
) -> io::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Case-insensitive search for any of `needles` in the file at `path`.
pub async fn file_contains_any(
    path: &Path,
    needles: &[&str],
) -> io::Result<bool> {
    let bytes = tokio::fs::read(path).await?;
    let haystack = String::from_utf8_lossy(&bytes).to_lowercase();
    Ok(needles.iter().any(|needle| haystack.contains(&needle.to_lowercase())))
}
