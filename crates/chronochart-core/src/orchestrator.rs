//! End-to-end chart generation
//!
//! Composes resolution, caching, the renderer supervisor, the readiness
//! poller, the priority queue, and history persistence into the single
//! [`ChartGenerator::generate`] flow. Concurrent identical requests
//! (same hash) collapse onto one builder via a per-hash in-flight lock;
//! the second requester re-checks the cache under the lock and serves the
//! first one's output.

use std::path::PathBuf;
use std::sync::Arc;

use chronochart_engine::{
    run_renderer, wait_for_svg_ready, EngineError, ProgressUpdate, RenderOutcome, RenderSpec,
};
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use crate::cache::check_cache;
use crate::collab::{DatapackStore, IdentityStore};
use crate::config::AssetConfig;
use crate::error::{io_error, ChartError};
use crate::history::ChartHistory;
use crate::queue::{GenerationQueue, QueueError};
use crate::request::ChartRequest;
use crate::resolver::{resolve_datapacks, ResolvedDatapacks};

/// A generated or cache-served chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    /// URL path to the rendered `chart.svg`
    pub chartpath: String,
    pub hash: String,
}

/// Chart generation orchestrator
pub struct ChartGenerator {
    config: AssetConfig,
    identity: Arc<dyn IdentityStore>,
    datapacks: Arc<dyn DatapackStore>,
    queue: Arc<GenerationQueue>,
    history: Arc<ChartHistory>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ChartGenerator {
    #[must_use]
    pub fn new(
        config: AssetConfig,
        identity: Arc<dyn IdentityStore>,
        datapacks: Arc<dyn DatapackStore>,
        queue: Arc<GenerationQueue>,
    ) -> Self {
        let history = Arc::new(ChartHistory::new(config.upload_directory.clone()));
        Self {
            config,
            identity,
            datapacks,
            queue,
            history,
            in_flight: DashMap::new(),
        }
    }

    /// History store backing this generator, for read-back
    #[inline]
    #[must_use]
    pub fn history(&self) -> &Arc<ChartHistory> {
        &self.history
    }

    /// Generate a chart, or serve it from the cache
    ///
    /// Progress milestones stream through `progress` while the renderer
    /// runs. Temp datapacks used by the request are deleted afterwards
    /// whether generation succeeded or failed.
    pub async fn generate(
        &self,
        request: &ChartRequest,
        progress: &mpsc::UnboundedSender<ProgressUpdate>,
        requesting_uuid: Option<&str>,
    ) -> Result<ChartArtifact, ChartError> {
        let hash = request.chart_hash();
        tracing::info!(hash, datapacks = request.datapacks.len(), "chart generation requested");

        let user_id = match requesting_uuid {
            Some(uuid) => self
                .identity
                .find_user_id(uuid)
                .await
                .map_err(ChartError::Resolve)?,
            None => None,
        };
        let in_workshop = match user_id {
            Some(id) => {
                self.identity
                    .active_workshop_count(id)
                    .await
                    .map_err(ChartError::Resolve)?
                    > 0
            }
            None => false,
        };

        let resolved = resolve_datapacks(
            request,
            requesting_uuid,
            user_id,
            self.identity.as_ref(),
            self.datapacks.as_ref(),
        )
        .await?;

        // collapse concurrent identical requests onto one builder
        let gate = self
            .in_flight
            .entry(hash.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = gate.lock().await;
            self.generate_locked(request, &resolved, &hash, progress, requesting_uuid, in_workshop)
                .await
        };
        self.in_flight
            .remove_if(&hash, |_, lock| Arc::strong_count(lock) <= 2);

        // temp datapacks are single use; clean up regardless of outcome
        for title in &resolved.temp_datapack_titles {
            if let Err(err) = self.datapacks.delete_temp_datapack(title).await {
                tracing::error!(title, error = %err, "failed to delete temp datapack");
            }
        }

        match &result {
            Ok(artifact) => tracing::info!(hash = %artifact.hash, "chart ready"),
            Err(err) => {
                tracing::error!(hash, code = err.error_code(), error = %err, "chart generation failed");
            }
        }
        result
    }

    async fn generate_locked(
        &self,
        request: &ChartRequest,
        resolved: &ResolvedDatapacks,
        hash: &str,
        progress: &mpsc::UnboundedSender<ProgressUpdate>,
        requesting_uuid: Option<&str>,
        in_workshop: bool,
    ) -> Result<ChartArtifact, ChartError> {
        let chart_dir = self.config.chart_dir(hash);
        let chart_file = self.config.chart_file(hash);
        let settings_file = self.config.settings_file(hash);
        let url_path = self.config.chart_url_path(hash);

        // stale metadata causes authorization drift downstream, so a
        // failure here is fatal to the request
        self.datapacks
            .update_file_metadata(&self.config.file_metadata, &resolved.user_datapack_dirs)
            .await
            .map_err(ChartError::MetadataUpdate)?;

        if let Some(hit) = check_cache(&chart_file, request.use_cache, &url_path, hash).await? {
            if !request.cross_plot {
                if let Some(uuid) = requesting_uuid {
                    self.spawn_history_save(uuid, resolved, &settings_file, &chart_file, hash);
                }
            }
            return Ok(ChartArtifact {
                chartpath: hit.chartpath,
                hash: hit.hash,
            });
        }

        tokio::fs::create_dir_all(&chart_dir)
            .await
            .map_err(io_error(&chart_dir))?;
        tokio::fs::write(&settings_file, &request.settings)
            .await
            .map_err(io_error(&settings_file))?;
        tracing::debug!(path = %settings_file.display(), "saved chart settings");

        if self.queue.is_full() {
            return Err(ChartError::QueueFull);
        }
        let priority: u8 = if in_workshop {
            2
        } else if requesting_uuid.is_some() {
            1
        } else {
            0
        };

        let command = self.config.renderer_command();
        let spec = RenderSpec {
            settings_file: settings_file.clone(),
            output_file: chart_file.clone(),
            datapack_paths: resolved.command_line_paths.clone(),
            cross_plot: request.cross_plot,
            filename_map: resolved.filename_map.clone(),
        };
        let outcome = self
            .queue
            .run(priority, run_renderer(&command, &spec, progress))
            .await
            .map_err(|err| match err {
                QueueError::Full => ChartError::QueueFull,
                QueueError::TimedOut => ChartError::QueueTimeout,
            })?
            .map_err(|err| match err {
                EngineError::TimedOut => ChartError::RendererTimedOut,
                err @ EngineError::FinalizeTimeout => ChartError::FinalizeTimeout(err),
                err => ChartError::RendererFailed(err),
            })?;

        if let RenderOutcome::GenerationError { code, message } = outcome {
            return Err(ChartError::Generation { code, message });
        }

        wait_for_svg_ready(&chart_file, self.config.finalize_timeout())
            .await
            .map_err(ChartError::FinalizeTimeout)?;

        if !request.cross_plot {
            if let Some(uuid) = requesting_uuid {
                self.spawn_history_save(uuid, resolved, &settings_file, &chart_file, hash);
            }
        }
        Ok(ChartArtifact {
            chartpath: url_path,
            hash: hash.to_string(),
        })
    }

    /// Fire-and-forget history persistence; failures are logged, never
    /// surfaced to the requester
    fn spawn_history_save(
        &self,
        uuid: &str,
        resolved: &ResolvedDatapacks,
        settings_file: &std::path::Path,
        chart_file: &std::path::Path,
        hash: &str,
    ) {
        let history = self.history.clone();
        let uuid = uuid.to_string();
        let settings_file = settings_file.to_path_buf();
        let chart_file = chart_file.to_path_buf();
        let datapack_paths: Vec<PathBuf> = resolved.command_line_paths.clone();
        let hash = hash.to_string();
        tokio::spawn(async move {
            if let Err(err) = history
                .save(&uuid, &settings_file, &datapack_paths, &chart_file, &hash)
                .await
            {
                tracing::error!(uuid, error = %err, "failed to save chart history");
            }
        });
    }
}
