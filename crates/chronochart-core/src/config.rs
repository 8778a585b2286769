//! Asset and runtime configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use chronochart_engine::RendererCommand;
use serde::{Deserialize, Serialize};

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Directory roots, renderer launch settings, and queue limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Root of the per-hash chart cache
    pub charts_directory: PathBuf,
    /// Root of user uploads; history lives under `private/<uuid>/history`
    pub upload_directory: PathBuf,
    /// Executable used to launch the renderer
    pub renderer_program: PathBuf,
    /// Renderer jar passed via `-jar`
    pub renderer_jar: PathBuf,
    /// Shared file-metadata bookkeeping file
    pub file_metadata: PathBuf,
    /// Maximum number of tasks waiting in the generation queue
    pub max_queue_size: usize,
    /// How many generations may run at once
    pub concurrency: usize,
    /// Queue-level limit covering wait plus run, seconds
    pub queue_timeout_secs: u64,
    /// Hard renderer process timeout, seconds
    pub render_timeout_secs: u64,
    /// How long to poll for the output SVG to finalize, seconds
    pub finalize_timeout_secs: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            charts_directory: PathBuf::from("assets/charts"),
            upload_directory: PathBuf::from("assets/uploads"),
            renderer_program: PathBuf::from("java"),
            renderer_jar: PathBuf::from("assets/jars/TSCreator.jar"),
            file_metadata: PathBuf::from("assets/file-metadata.json"),
            max_queue_size: 30,
            concurrency: 1,
            queue_timeout_secs: 60,
            render_timeout_secs: 30,
            finalize_timeout_secs: 30,
        }
    }
}

impl AssetConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn with_charts_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.charts_directory = dir.into();
        self
    }

    #[must_use]
    pub fn with_upload_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_directory = dir.into();
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, program: impl Into<PathBuf>, jar: impl Into<PathBuf>) -> Self {
        self.renderer_program = program.into();
        self.renderer_jar = jar.into();
        self
    }

    #[must_use]
    pub fn with_queue_limits(mut self, max_size: usize, concurrency: usize) -> Self {
        self.max_queue_size = max_size;
        self.concurrency = concurrency;
        self
    }

    /// Working directory for one hash
    #[must_use]
    pub fn chart_dir(&self, hash: &str) -> PathBuf {
        self.charts_directory.join(hash)
    }

    /// `<chartsDirectory>/<hash>/chart.svg`
    #[must_use]
    pub fn chart_file(&self, hash: &str) -> PathBuf {
        self.chart_dir(hash).join("chart.svg")
    }

    /// `<chartsDirectory>/<hash>/settings.tsc`
    #[must_use]
    pub fn settings_file(&self, hash: &str) -> PathBuf {
        self.chart_dir(hash).join("settings.tsc")
    }

    /// URL path the caller uses to fetch the rendered chart
    #[must_use]
    pub fn chart_url_path(&self, hash: &str) -> String {
        format!("/{}/{hash}/chart.svg", self.charts_directory.display())
    }

    /// Launch parameters for the renderer subprocess
    #[must_use]
    pub fn renderer_command(&self) -> RendererCommand {
        RendererCommand {
            program: self.renderer_program.clone(),
            jar_path: self.renderer_jar.clone(),
            timeout: Duration::from_secs(self.render_timeout_secs),
        }
    }

    #[inline]
    #[must_use]
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }
}
