//! Renderer process supervision
//!
//! Spawns the external rendering engine with the fixed argument template,
//! streams stdout line-by-line through the progress parser, enforces a
//! hard timeout with a forceful kill, and folds the captured output
//! through the error classifier into a discriminated [`RenderOutcome`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::classify::{classify_line, UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE};
use crate::error::EngineError;
use crate::progress::{parse_renderer_line, ProgressUpdate};

/// Line the renderer prints as the final stdout line of a clean generation
pub const SUCCESS_SENTINEL: &str = "ImageGenerator did not have any errors on generation";

/// How to launch the rendering engine
#[derive(Debug, Clone)]
pub struct RendererCommand {
    /// Executable to run, normally `java`
    pub program: PathBuf,
    /// Path to the renderer jar passed via `-jar`
    pub jar_path: PathBuf,
    /// Hard wall-clock limit; the process is killed when it elapses
    pub timeout: Duration,
}

/// One generation's resolved inputs and outputs
#[derive(Debug, Clone)]
pub struct RenderSpec {
    pub settings_file: PathBuf,
    pub output_file: PathBuf,
    /// Resolved datapack file paths, in request order
    pub datapack_paths: Vec<PathBuf>,
    /// Alternate cross-plot renderer mode
    pub cross_plot: bool,
    /// Stored filename to display title, for progress messages
    pub filename_map: HashMap<String, String>,
}

/// Result of a renderer run that completed without supervision errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The success sentinel was present
    Success,
    /// The sentinel was absent; code/message from the classifier, or the
    /// unknown-error fallback
    GenerationError { code: u16, message: String },
}

/// Run the renderer to completion, streaming progress updates
///
/// Argument template: `-jar <jar> -node -s <settings> -ss <settings>
/// -d <paths...> -o <output> -a [-cross]`. Spawn failure and timeout are
/// distinct errors; every other completion is a [`RenderOutcome`].
pub async fn run_renderer(
    command: &RendererCommand,
    spec: &RenderSpec,
    progress: &mpsc::UnboundedSender<ProgressUpdate>,
) -> Result<RenderOutcome, EngineError> {
    let mut cmd = Command::new(&command.program);
    cmd.arg("-jar")
        .arg(&command.jar_path)
        .arg("-node")
        .arg("-s")
        .arg(&spec.settings_file)
        .arg("-ss")
        .arg(&spec.settings_file)
        .arg("-d");
    for path in &spec.datapack_paths {
        cmd.arg(path);
    }
    cmd.arg("-o").arg(&spec.output_file).arg("-a");
    if spec.cross_plot {
        cmd.arg("-cross");
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(program = %command.program.display(), "spawning renderer");
    let mut child = cmd.spawn().map_err(EngineError::Spawn)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::Process(std::io::Error::other("renderer stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| EngineError::Process(std::io::Error::other("renderer stderr not captured")))?;

    let stdout_task = read_stdout(stdout, spec.filename_map.clone(), progress.clone());
    let stderr_task = read_lines(stderr);

    let status = match tokio::time::timeout(command.timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(err)) => return Err(EngineError::Process(err)),
        Err(_) => {
            tracing::warn!(timeout = ?command.timeout, "renderer timed out, killing process");
            if let Err(err) = child.start_kill() {
                tracing::warn!(error = %err, "failed to kill timed-out renderer");
            }
            let _ = child.wait().await;
            return Err(EngineError::TimedOut);
        }
    };

    let stdout_lines = stdout_task.await.unwrap_or_default();
    let stderr_lines = stderr_task.await.unwrap_or_default();
    tracing::debug!(code = ?status.code(), stdout = stdout_lines.len(), stderr = stderr_lines.len(), "renderer exited");

    // a clean generation ends with the sentinel as the last stdout line
    if stdout_lines.last().map(String::as_str) == Some(SUCCESS_SENTINEL) {
        return Ok(RenderOutcome::Success);
    }

    for line in stdout_lines.iter().chain(stderr_lines.iter()) {
        let code = classify_line(line);
        if code != 0 {
            return Ok(RenderOutcome::GenerationError {
                code,
                message: line.clone(),
            });
        }
    }
    Ok(RenderOutcome::GenerationError {
        code: UNKNOWN_ERROR_CODE,
        message: UNKNOWN_ERROR_MESSAGE.to_string(),
    })
}

/// Collect stdout lines, forwarding recognized progress milestones in
/// arrival order
fn read_stdout(
    stdout: impl AsyncRead + Unpin + Send + 'static,
    filename_map: HashMap<String, String>,
    progress: mpsc::UnboundedSender<ProgressUpdate>,
) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut collected = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(update) = parse_renderer_line(&line, &filename_map) {
                // receiver gone means the caller stopped listening; keep reading
                let _ = progress.send(update);
            }
            collected.push(line);
        }
        collected
    })
}

fn read_lines(reader: impl AsyncRead + Unpin + Send + 'static) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut collected = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            collected.push(line);
        }
        collected
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    fn fake_renderer(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("renderer.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn command(program: PathBuf, timeout: Duration) -> RendererCommand {
        RendererCommand {
            program,
            jar_path: PathBuf::from("engine.jar"),
            timeout,
        }
    }

    fn spec(dir: &Path) -> RenderSpec {
        RenderSpec {
            settings_file: dir.join("settings.tsc"),
            output_file: dir.join("chart.svg"),
            datapack_paths: vec![dir.join("pack.dpk")],
            cross_plot: false,
            filename_map: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn sentinel_line_means_success() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_renderer(
            dir.path(),
            "echo \"Generating Image\"\necho \"ImageGenerator did not have any errors on generation\"",
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = run_renderer(&command(program, Duration::from_secs(5)), &spec(dir.path()), &tx)
            .await
            .unwrap();
        assert_eq!(outcome, RenderOutcome::Success);

        drop(tx);
        let mut stages = Vec::new();
        while let Some(update) = rx.recv().await {
            stages.push((update.stage, update.percent));
        }
        assert_eq!(
            stages,
            [
                ("Generating Chart".to_string(), 50),
                ("Waiting for File".to_string(), 90)
            ]
        );
    }

    #[tokio::test]
    async fn known_error_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_renderer(dir.path(), "echo \"Out of Memory!\"");
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = run_renderer(&command(program, Duration::from_secs(5)), &spec(dir.path()), &tx)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenderOutcome::GenerationError {
                code: 1003,
                message: "Out of Memory!".to_string()
            }
        );
    }

    #[tokio::test]
    async fn stderr_lines_are_classified_too() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_renderer(
            dir.path(),
            "echo \"some output\"\necho \"[Fatal Error] settings.tsc:1:1\" 1>&2",
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = run_renderer(&command(program, Duration::from_secs(5)), &spec(dir.path()), &tx)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RenderOutcome::GenerationError { code: 2002, .. }
        ));
    }

    #[tokio::test]
    async fn missing_sentinel_without_known_error_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_renderer(dir.path(), "echo \"something odd happened\"");
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = run_renderer(&command(program, Duration::from_secs(5)), &spec(dir.path()), &tx)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenderOutcome::GenerationError {
                code: UNKNOWN_ERROR_CODE,
                message: UNKNOWN_ERROR_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn overrunning_process_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_renderer(dir.path(), "sleep 5");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = run_renderer(
            &command(program, Duration::from_millis(200)),
            &spec(dir.path()),
            &tx,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::TimedOut));
    }

    #[tokio::test]
    async fn missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = run_renderer(
            &command(dir.path().join("no-such-renderer"), Duration::from_secs(5)),
            &spec(dir.path()),
            &tx,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Spawn(_)));
    }
}
