//! Progress extraction from renderer stdout
//!
//! The renderer prints fixed milestone lines during a generation. Each
//! recognized line maps to a stage label and a percent; only the
//! per-datapack load fan-out computes its percent dynamically (10 to 40).
//! Unrecognized lines produce no update.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One progress milestone emitted while a chart generates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: String,
    /// 0 to 100
    pub percent: u8,
}

static LOADING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Loading datapack \[(\d+)/(\d+)\]:\s*(.+)").expect("static regex"));

/// Parse one stdout line into a progress update, if it is a milestone
///
/// `filename_map` translates stored datapack filenames into display titles
/// for the per-datapack load messages; unmapped filenames pass through raw.
#[must_use]
pub fn parse_renderer_line(
    line: &str,
    filename_map: &HashMap<String, String>,
) -> Option<ProgressUpdate> {
    if line.contains("Convert Datapack to sqlite database") {
        return Some(ProgressUpdate {
            stage: "Loading Datapacks".to_string(),
            percent: 10,
        });
    }
    if let Some(captures) = LOADING_PATTERN.captures(line) {
        let current: u32 = captures[1].parse().ok()?;
        let total: u32 = captures[2].parse().ok()?;
        if total == 0 {
            return None;
        }
        let filename = captures[3].trim();
        let display = filename_map
            .get(filename)
            .map(String::as_str)
            .unwrap_or(filename);
        // renderer output is untrusted; current > total must not overflow
        let percent = (10.0 + (f64::from(current) / f64::from(total) * 30.0).floor()).min(100.0) as u8;
        return Some(ProgressUpdate {
            stage: format!("Loading Datapack: {display} ({current}/{total})"),
            percent,
        });
    }
    if line.contains("Generating Image") {
        return Some(ProgressUpdate {
            stage: "Generating Chart".to_string(),
            percent: 50,
        });
    }
    if line.contains("ImageGenerator did not have any errors") {
        return Some(ProgressUpdate {
            stage: "Waiting for File".to_string(),
            percent: 90,
        });
    }
    None
}
