//! External collaborator interfaces
//!
//! The orchestration core does not own identity, membership, or datapack
//! storage. These traits are the seams to those systems; tests and
//! deployments supply their own implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Errors surfaced by collaborator implementations
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    /// The lookup ran but could not produce a result
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Underlying storage failure
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity and workshop membership lookups
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Numeric user id for a uuid, `None` when no such user exists
    async fn find_user_id(&self, uuid: &str) -> Result<Option<i64>, CollabError>;

    /// Whether the user is currently an active member of the workshop
    async fn is_active_workshop_member(
        &self,
        user_id: i64,
        workshop_id: u32,
    ) -> Result<bool, CollabError>;

    /// Number of active workshops the user belongs to
    async fn active_workshop_count(&self, user_id: i64) -> Result<usize, CollabError>;
}

/// Datapack storage lookups and bookkeeping
#[async_trait]
pub trait DatapackStore: Send + Sync {
    /// Directory holding the datapack owned by `owner` with this title
    ///
    /// `owner` is a user uuid, a workshop uuid, or the `official`/`temp`
    /// storage category.
    async fn datapack_directory(&self, owner: &str, title: &str) -> Result<PathBuf, CollabError>;

    /// Delete a single-use temp datapack's backing storage
    async fn delete_temp_datapack(&self, title: &str) -> Result<(), CollabError>;

    /// Refresh shared file-metadata bookkeeping for user-owned paths
    async fn update_file_metadata(
        &self,
        metadata_file: &Path,
        paths: &[PathBuf],
    ) -> Result<(), CollabError>;
}
