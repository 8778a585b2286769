//! Chart request and datapack reference types

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Who owns a referenced datapack, and under what access rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Ownership {
    /// Owned by a user; readable by others only when public
    User { uuid: String, is_public: bool },
    /// Curated datapack under the official storage root; no access check
    Official,
    /// Request-scoped upload under the temp root, deleted after use
    Temp,
    /// Shared within a workshop; requires active membership
    Workshop { uuid: String },
}

/// One datapack reference within a chart request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatapackRef {
    /// Display title, also the storage lookup key
    pub title: String,
    /// Filename of the datapack inside its storage directory
    pub stored_file_name: String,
    #[serde(flatten)]
    pub ownership: Ownership,
}

/// A chart generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRequest {
    /// Serialized settings document passed through to the renderer
    pub settings: String,
    /// Datapack references in command-line order
    pub datapacks: Vec<DatapackRef>,
    /// When false, an existing cache entry for this hash is evicted and
    /// the chart regenerates
    pub use_cache: bool,
    /// Alternate cross-plot renderer mode
    pub cross_plot: bool,
}

impl ChartRequest {
    /// Cache/history key: MD5 over the cross-plot flag, the settings
    /// text, and the comma-joined datapack titles
    #[must_use]
    pub fn chart_hash(&self) -> String {
        let titles: Vec<&str> = self.datapacks.iter().map(|d| d.title.as_str()).collect();
        let mut hasher = Md5::new();
        hasher.update(if self.cross_plot { "true" } else { "false" });
        hasher.update(&self.settings);
        hasher.update(titles.join(","));
        hex::encode(hasher.finalize())
    }
}

/// Numeric workshop id from a `workshop-<id>` uuid
#[must_use]
pub fn workshop_id_from_uuid(uuid: &str) -> Option<u32> {
    uuid.split('-').nth(1)?.parse().ok()
}
