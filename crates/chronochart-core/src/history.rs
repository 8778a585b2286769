//! Per-user chart history persistence
//!
//! Each successful generation appends a timestamped entry under
//! `<uploadDirectory>/private/<uuid>/history/<epoch-ms>/` holding a copy
//! of the settings, the rendered SVG named `<hash>.svg`, and a
//! `datapacks` directory of symlinks to the resolved datapack files
//! (provenance without duplicating large files).
//!
//! At most [`MAX_HISTORY_ENTRIES`] entries are kept per user; the
//! lexicographically smallest timestamp is evicted on overflow. Entries
//! whose datapack links no longer resolve are purged lazily on read.
//! All mutations for one user serialize through a per-uuid async lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{io_error, ChartError};

/// Retention bound per user
pub const MAX_HISTORY_ENTRIES: usize = 10;

/// Chart history store rooted at the upload directory
pub struct ChartHistory {
    upload_directory: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChartHistory {
    #[must_use]
    pub fn new(upload_directory: impl Into<PathBuf>) -> Self {
        Self {
            upload_directory: upload_directory.into(),
            locks: DashMap::new(),
        }
    }

    fn history_dir(&self, uuid: &str) -> PathBuf {
        self.upload_directory.join("private").join(uuid).join("history")
    }

    fn lock_for(&self, uuid: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(uuid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append one history entry, evicting the oldest past the bound
    pub async fn save(
        &self,
        uuid: &str,
        settings_file: &Path,
        datapack_paths: &[PathBuf],
        chart_file: &Path,
        hash: &str,
    ) -> Result<(), ChartError> {
        let lock = self.lock_for(uuid);
        let _guard = lock.lock().await;

        let history_dir = self.history_dir(uuid);
        tokio::fs::create_dir_all(&history_dir)
            .await
            .map_err(io_error(&history_dir))?;

        let mut entries = list_dir(&history_dir).await?;
        entries.sort();
        while entries.len() >= MAX_HISTORY_ENTRIES {
            let oldest = history_dir.join(entries.remove(0));
            tracing::debug!(uuid, entry = %oldest.display(), "evicting oldest history entry");
            tokio::fs::remove_dir_all(&oldest)
                .await
                .map_err(io_error(&oldest))?;
        }

        let entry_dir = create_timestamped_dir(&history_dir).await?;

        tokio::fs::copy(settings_file, entry_dir.join("settings.tsc"))
            .await
            .map_err(io_error(settings_file))?;
        tokio::fs::copy(chart_file, entry_dir.join(format!("{hash}.svg")))
            .await
            .map_err(io_error(chart_file))?;

        let datapacks_dir = entry_dir.join("datapacks");
        tokio::fs::create_dir(&datapacks_dir)
            .await
            .map_err(io_error(&datapacks_dir))?;
        for datapack in datapack_paths {
            let target = tokio::fs::canonicalize(datapack)
                .await
                .map_err(io_error(datapack))?;
            let Some(name) = datapack.file_name() else {
                continue;
            };
            link_datapack(&target, &datapacks_dir.join(name)).await?;
        }
        Ok(())
    }

    /// Timestamps of this user's valid entries, oldest first
    ///
    /// Entries with a dangling datapack link are removed here rather than
    /// surfaced.
    pub async fn entries(&self, uuid: &str) -> Result<Vec<String>, ChartError> {
        let lock = self.lock_for(uuid);
        let _guard = lock.lock().await;

        let history_dir = self.history_dir(uuid);
        if !tokio::fs::try_exists(&history_dir)
            .await
            .map_err(io_error(&history_dir))?
        {
            return Ok(Vec::new());
        }
        let mut valid = Vec::new();
        let mut entries = list_dir(&history_dir).await?;
        entries.sort();
        for timestamp in entries {
            let entry_dir = history_dir.join(&timestamp);
            if entry_is_valid(&entry_dir).await {
                valid.push(timestamp);
            } else {
                tracing::warn!(uuid, timestamp, "purging history entry with dangling datapack link");
                tokio::fs::remove_dir_all(&entry_dir)
                    .await
                    .map_err(io_error(&entry_dir))?;
            }
        }
        Ok(valid)
    }

    /// Settings document saved with one entry
    pub async fn settings(&self, uuid: &str, timestamp: &str) -> Result<String, ChartError> {
        let entry_dir = self.entry_dir(uuid, timestamp)?;
        let path = find_by_extension(&entry_dir, "tsc")
            .await?
            .ok_or_else(|| ChartError::HistoryEntryNotFound(timestamp.to_string()))?;
        tokio::fs::read_to_string(&path).await.map_err(io_error(&path))
    }

    /// Rendered chart saved with one entry, plus its hash
    pub async fn chart(&self, uuid: &str, timestamp: &str) -> Result<(String, String), ChartError> {
        let entry_dir = self.entry_dir(uuid, timestamp)?;
        let path = find_by_extension(&entry_dir, "svg")
            .await?
            .ok_or_else(|| ChartError::HistoryEntryNotFound(timestamp.to_string()))?;
        let hash = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = tokio::fs::read_to_string(&path).await.map_err(io_error(&path))?;
        Ok((content, hash))
    }

    fn entry_dir(&self, uuid: &str, timestamp: &str) -> Result<PathBuf, ChartError> {
        // timestamps are opaque strings from the caller; keep them inside
        // the history directory
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ChartError::InvalidHistoryEntry(timestamp.to_string()));
        }
        Ok(self.history_dir(uuid).join(timestamp))
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<String>, ChartError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error(dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error(dir))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Create `<history>/<epoch-ms>`, bumping the timestamp on collision so
/// two saves in the same millisecond stay distinct entries
async fn create_timestamped_dir(history_dir: &Path) -> Result<PathBuf, ChartError> {
    let mut timestamp = chrono::Utc::now().timestamp_millis();
    loop {
        let candidate = history_dir.join(timestamp.to_string());
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => timestamp += 1,
            Err(err) => return Err(io_error(&candidate)(err)),
        }
    }
}

async fn entry_is_valid(entry_dir: &Path) -> bool {
    let datapacks_dir = entry_dir.join("datapacks");
    let Ok(mut entries) = tokio::fs::read_dir(&datapacks_dir).await else {
        // no datapack links to dangle
        return true;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        // metadata follows symlinks; a dangling link fails here
        if tokio::fs::metadata(entry.path()).await.is_err() {
            return false;
        }
    }
    true
}

async fn find_by_extension(dir: &Path, extension: &str) -> Result<Option<PathBuf>, ChartError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|_| ChartError::HistoryEntryNotFound(dir.display().to_string()))?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error(dir))? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == extension) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(unix)]
async fn link_datapack(target: &Path, link: &Path) -> Result<(), ChartError> {
    tokio::fs::symlink(target, link).await.map_err(io_error(link))
}

#[cfg(not(unix))]
async fn link_datapack(target: &Path, link: &Path) -> Result<(), ChartError> {
    tokio::fs::copy(target, link)
        .await
        .map(|_| ())
        .map_err(io_error(link))
}
