//! chronochart-core - Chart Generation Orchestration
//!
//! The end-to-end pipeline behind a chart request:
//! - Authorizes and resolves mixed-ownership datapack references
//! - Deduplicates requests by content hash with an existence-based cache
//! - Collapses concurrent identical requests onto one renderer run
//! - Admits work through a bounded priority queue
//! - Persists per-user chart history with a retention bound
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chronochart_core::{AssetConfig, ChartGenerator, GenerationQueue, QueueConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn example(identity: Arc<dyn chronochart_core::IdentityStore>,
//! #                  datapacks: Arc<dyn chronochart_core::DatapackStore>,
//! #                  request: chronochart_core::ChartRequest) {
//! let config = AssetConfig::from_file("assets/config.json").unwrap();
//! let queue = Arc::new(GenerationQueue::new(QueueConfig {
//!     max_size: config.max_queue_size,
//!     width: config.concurrency,
//!     timeout: config.queue_timeout(),
//! }));
//! let generator = ChartGenerator::new(config, identity, datapacks, queue);
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let artifact = generator.generate(&request, &tx, Some("user-uuid")).await;
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod cache;
pub mod collab;
pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod queue;
pub mod request;
pub mod resolver;

// Re-exports for convenience
pub use cache::{check_cache, CacheHit};
pub use collab::{CollabError, DatapackStore, IdentityStore};
pub use config::{AssetConfig, ConfigError};
pub use error::ChartError;
pub use history::{ChartHistory, MAX_HISTORY_ENTRIES};
pub use orchestrator::{ChartArtifact, ChartGenerator};
pub use queue::{GenerationQueue, QueueConfig, QueueError};
pub use request::{workshop_id_from_uuid, ChartRequest, DatapackRef, Ownership};
pub use resolver::{resolve_datapacks, ResolvedDatapacks};

// The progress shape callers drain from the channel
pub use chronochart_engine::ProgressUpdate;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for orchestrating chart generation
    pub use crate::{
        AssetConfig, ChartArtifact, ChartError, ChartGenerator, ChartRequest, DatapackRef,
        DatapackStore, GenerationQueue, IdentityStore, Ownership, ProgressUpdate, QueueConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
