//! chronochart-datapack - Datapack Text Parser
//!
//! Parses the tab-delimited datapack format into a typed column model:
//! - Hierarchical column tree built from `parent\t:\tchildren` declarations
//! - Per-type data rows (block/chron/facies/event/range/sequence/point)
//! - Facies extraction with `" - shallow"` display-name aliasing
//! - File-level properties (chart title, age units, top/base ages)
//! - Lenient and strict parse modes
//!
//! # Example
//!
//! ```rust
//! use chronochart_datapack::{parse, ParseMode};
//!
//! let text = "Period\tblock\t150\n\tTOP\t145.5\n\tJurassic\t199.6\n";
//! let parsed = parse(text, ParseMode::Lenient).unwrap();
//! assert_eq!(parsed.columns.roots.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod column;
pub mod error;
pub mod facies;
pub mod parser;
pub mod rows;

// Re-exports for convenience
pub use column::{
    Abundance, ColumnData, ColumnInfo, ColumnTree, LineStyle, Rgb, SubBlockInfo, SubChronInfo,
    SubEventInfo, SubFaciesInfo, SubPointInfo, SubRangeInfo, SubSequenceInfo,
};
pub use error::DatapackError;
pub use parser::{parse, DatapackParse, DatapackProperties, ParseMode};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with parsed datapacks
    pub use crate::{
        parse, ColumnData, ColumnInfo, ColumnTree, DatapackError, DatapackParse,
        DatapackProperties, ParseMode,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
