//! Output readiness polling
//!
//! The renderer's process exit can race the OS flushing the SVG to disk.
//! Trusting exit-implies-file-ready produces intermittent truncated reads,
//! so success is declared only once the file exists and parses as a
//! well-formed XML document. Transient parse failures (mid-write file)
//! keep polling rather than failing fast.

use std::path::Path;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::time::Instant;

use crate::error::EngineError;

const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Wait until `path` holds a complete, parseable SVG
///
/// Polls every 300ms; [`EngineError::FinalizeTimeout`] once the cumulative
/// wait exceeds `timeout`.
pub async fn wait_for_svg_ready(path: &Path, timeout: Duration) -> Result<(), EngineError> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        match tokio::fs::read_to_string(path).await {
            Ok(content) if is_well_formed_xml(&content) => return Ok(()),
            Ok(_) => {
                tracing::trace!(path = %path.display(), "output not yet well formed, retrying");
            }
            Err(_) => {}
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    tracing::warn!(path = %path.display(), timeout = ?timeout, "chart output never finalized");
    Err(EngineError::FinalizeTimeout)
}

/// Whole-document well-formedness check with at least one element
///
/// The reader reports a clean `Eof` even with open elements, so a document
/// truncated between tags parses without error; every start tag must be
/// balanced by an end tag before `Eof` counts as complete.
fn is_well_formed_xml(content: &str) -> bool {
    let mut reader = Reader::from_str(content);
    let mut saw_element = false;
    let mut depth: usize = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                saw_element = true;
                depth += 1;
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Ok(Event::Empty(_)) => saw_element = true,
            Ok(Event::Eof) => return saw_element && depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="1" height="1"/></svg>"#;

    #[test]
    fn well_formedness() {
        assert!(is_well_formed_xml(SVG));
        assert!(!is_well_formed_xml(""));
        assert!(!is_well_formed_xml("<svg><rect>"));
        assert!(!is_well_formed_xml("<svg><rect/>"));
        assert!(!is_well_formed_xml("</svg>"));
        assert!(!is_well_formed_xml(&SVG[..SVG.len() - 10]));
    }

    #[tokio::test]
    async fn existing_complete_file_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        tokio::fs::write(&path, SVG).await.unwrap();
        wait_for_svg_ready(&path, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn late_write_is_picked_up_by_polling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        tokio::fs::write(&path, &SVG[..SVG.len() - 10]).await.unwrap();

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(400)).await;
                tokio::fs::write(&path, SVG).await.unwrap();
            })
        };
        wait_for_svg_ready(&path, Duration::from_secs(5)).await.unwrap();
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.svg");
        let err = wait_for_svg_ready(&path, Duration::from_millis(400))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FinalizeTimeout));
    }
}
