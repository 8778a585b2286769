//! Chart cache lookup and eviction
//!
//! A cache entry is the per-hash directory holding `chart.svg` and
//! `settings.tsc`. This is an existence-plus-flag check, not a TTL or LRU
//! cache; eviction is request driven.

use std::path::Path;

use crate::error::{io_error, ChartError};

/// A previously generated chart served from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    /// URL path to the cached `chart.svg`
    pub chartpath: String,
    pub hash: String,
}

/// Check for a cached chart under this hash
///
/// Returns `None` when generation should proceed. With `use_cache` false
/// an existing entry is deleted eagerly, before the new generation starts,
/// so a failed run never leaves a stale partial overwrite behind.
pub async fn check_cache(
    chart_file: &Path,
    use_cache: bool,
    url_path: &str,
    hash: &str,
) -> Result<Option<CacheHit>, ChartError> {
    let exists = tokio::fs::try_exists(chart_file)
        .await
        .map_err(io_error(chart_file))?;
    if !exists {
        tracing::debug!(hash, "no cached chart, proceeding with generation");
        return Ok(None);
    }
    if !use_cache {
        let entry_dir = chart_file.parent().unwrap_or(chart_file);
        tracing::info!(hash, "evicting cached chart before regeneration");
        tokio::fs::remove_dir_all(entry_dir)
            .await
            .map_err(io_error(entry_dir))?;
        return Ok(None);
    }
    tracing::info!(hash, "serving cached chart");
    Ok(Some(CacheHit {
        chartpath: url_path.to_string(),
        hash: hash.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn seeded_entry(root: &Path, hash: &str) -> PathBuf {
        let dir = root.join(hash);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let chart = dir.join("chart.svg");
        tokio::fs::write(&chart, "<svg/>").await.unwrap();
        tokio::fs::write(dir.join("settings.tsc"), "<settings/>")
            .await
            .unwrap();
        chart
    }

    #[tokio::test]
    async fn missing_entry_is_a_miss() {
        let root = tempfile::tempdir().unwrap();
        let chart = root.path().join("abc/chart.svg");
        let hit = check_cache(&chart, true, "/charts/abc/chart.svg", "abc")
            .await
            .unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn repeated_hits_are_identical_and_nondestructive() {
        let root = tempfile::tempdir().unwrap();
        let chart = seeded_entry(root.path(), "abc").await;

        let first = check_cache(&chart, true, "/charts/abc/chart.svg", "abc")
            .await
            .unwrap()
            .unwrap();
        let second = check_cache(&chart, true, "/charts/abc/chart.svg", "abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.chartpath, "/charts/abc/chart.svg");
        assert!(chart.exists());
        assert!(root.path().join("abc/settings.tsc").exists());
    }

    #[tokio::test]
    async fn use_cache_false_evicts_the_whole_entry() {
        let root = tempfile::tempdir().unwrap();
        let chart = seeded_entry(root.path(), "abc").await;

        let hit = check_cache(&chart, false, "/charts/abc/chart.svg", "abc")
            .await
            .unwrap();
        assert_eq!(hit, None);
        assert!(!root.path().join("abc").exists());
    }
}
