//! Datapack reference resolution and authorization
//!
//! Each reference in a chart request is authorized against the requesting
//! identity and resolved to a filesystem path via the storage collaborator.
//! Resolution fails closed: the first unauthorized or unresolvable
//! reference aborts with no partial results.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::collab::{DatapackStore, IdentityStore};
use crate::error::ChartError;
use crate::request::{workshop_id_from_uuid, ChartRequest, Ownership};

/// Everything the generation pipeline needs from the request's datapacks
#[derive(Debug, Clone, Default)]
pub struct ResolvedDatapacks {
    /// Full datapack file paths, in request order
    pub command_line_paths: Vec<PathBuf>,
    /// Stored filename to display title, for progress messages
    pub filename_map: HashMap<String, String>,
    /// Directories of user-owned datapacks, for metadata bookkeeping
    pub user_datapack_dirs: Vec<PathBuf>,
    /// Titles of temp datapacks, cleaned up after the request
    pub temp_datapack_titles: Vec<String>,
}

/// Authorize and resolve every datapack reference in the request
///
/// `user_id` is the requesting identity's numeric id when known, used for
/// workshop membership checks.
pub async fn resolve_datapacks(
    request: &ChartRequest,
    requesting_uuid: Option<&str>,
    user_id: Option<i64>,
    identity: &dyn IdentityStore,
    store: &dyn DatapackStore,
) -> Result<ResolvedDatapacks, ChartError> {
    let mut resolved = ResolvedDatapacks::default();

    for datapack in &request.datapacks {
        let owner = match &datapack.ownership {
            Ownership::Workshop { uuid } => {
                let workshop_id = workshop_id_from_uuid(uuid);
                let member = match (user_id, workshop_id) {
                    (Some(user_id), Some(workshop_id)) => identity
                        .is_active_workshop_member(user_id, workshop_id)
                        .await
                        .map_err(ChartError::Resolve)?,
                    _ => false,
                };
                if !member {
                    return Err(ChartError::Unauthorized(format!(
                        "user lacks access to workshop datapack {:?}",
                        datapack.title
                    )));
                }
                uuid.as_str()
            }
            Ownership::Official => "official",
            Ownership::User { uuid, is_public } => {
                if requesting_uuid != Some(uuid.as_str()) && !is_public {
                    return Err(ChartError::Unauthorized(format!(
                        "unauthorized access to user datapack {:?}",
                        datapack.title
                    )));
                }
                uuid.as_str()
            }
            Ownership::Temp => "temp",
        };

        let directory = store
            .datapack_directory(owner, &datapack.title)
            .await
            .map_err(ChartError::Resolve)?;
        if matches!(datapack.ownership, Ownership::User { .. }) {
            resolved.user_datapack_dirs.push(directory.clone());
        }
        if matches!(datapack.ownership, Ownership::Temp) {
            resolved.temp_datapack_titles.push(datapack.title.clone());
        }
        resolved
            .command_line_paths
            .push(directory.join(&datapack.stored_file_name));
        resolved
            .filename_map
            .insert(datapack.stored_file_name.clone(), datapack.title.clone());
    }
    Ok(resolved)
}
