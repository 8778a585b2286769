//! chronochart-engine - Renderer Supervision
//!
//! Supervises the external chart rendering engine:
//! - Classifies known renderer error lines into stable numeric codes
//! - Extracts progress milestones from renderer stdout
//! - Spawns and times out the renderer subprocess, returning a
//!   discriminated outcome instead of raw process events
//! - Polls the output file until it is a complete, parseable SVG
//!
//! # Example
//!
//! ```rust,ignore
//! use chronochart_engine::{run_renderer, RendererCommand, RenderSpec};
//! use tokio::sync::mpsc;
//!
//! # async fn example(command: RendererCommand, spec: RenderSpec) {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let outcome = run_renderer(&command, &spec, &tx).await;
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod classify;
pub mod error;
pub mod progress;
pub mod readiness;
pub mod supervisor;

// Re-exports for convenience
pub use classify::{classify_line, UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE};
pub use error::EngineError;
pub use progress::{parse_renderer_line, ProgressUpdate};
pub use readiness::wait_for_svg_ready;
pub use supervisor::{
    run_renderer, RenderOutcome, RenderSpec, RendererCommand, SUCCESS_SENTINEL,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for supervising chart generation
    pub use crate::{
        run_renderer, wait_for_svg_ready, EngineError, ProgressUpdate, RenderOutcome, RenderSpec,
        RendererCommand,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
