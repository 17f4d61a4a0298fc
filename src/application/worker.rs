//! Drives one encoder process for one job: consumes the segment-filename
//! stream, uploads finished segments, and reports final state.

use std::process::Stdio;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::error::{Error, Result};
use crate::domain::types::{SegmentData, StreamKind};
use crate::ports::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Done,
    Error,
}

/// Single-use encoder driver. The work directory is owned by the worker and
/// removed on drop, whichever way the run ends.
pub struct Worker {
    args: Vec<String>,
    store: Arc<dyn Storage>,
    source_url: String,
    rendition: String,
    kind: StreamKind,
    work_dir: TempDir,
    skip_first: bool,
    state: WorkerState,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        args: Vec<String>,
        store: Arc<dyn Storage>,
        source_url: String,
        rendition: String,
        kind: StreamKind,
        work_dir: TempDir,
        skip_first: bool,
    ) -> Self {
        Self {
            args,
            store,
            source_url,
            rendition,
            kind,
            work_dir,
            skip_first,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run the encoder to completion. Cancelling the token kills the encoder
    /// and counts as requested termination, not failure. Calling `run` on a
    /// worker that already ran is an error.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        if self.state != WorkerState::Idle {
            return Err(Error::Encoder("worker already started".to_owned()));
        }
        self.state = WorkerState::Running;

        match self.execute(&cancel).await {
            Ok(()) => {
                self.state = WorkerState::Done;
                Ok(())
            }
            Err(err) => {
                self.state = WorkerState::Error;
                Err(err)
            }
        }
    }

    async fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut child = Command::new("ffmpeg")
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Encoder(format!("spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Encoder("ffmpeg stdout unavailable".to_owned()))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut skip_first = self.skip_first;

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Ok(());
                }
                line = lines.next_line() => line,
            };

            let filename = match line {
                Ok(Some(raw)) => raw.trim().to_owned(),
                Ok(None) => break,
                Err(err) => {
                    let _ = child.wait().await;
                    return Err(Error::Encoder(format!("read ffmpeg output: {err}")));
                }
            };

            if filename.is_empty() {
                continue;
            }

            if skip_first {
                skip_first = false;
                let _ = tokio::fs::remove_file(self.work_dir.path().join(&filename)).await;
                debug!(%filename, "discarded keyframe realignment segment");
                continue;
            }

            if let Err(err) = self.upload_segment(&filename).await {
                // Always drain the encoder before surfacing the failure so
                // the process cannot outlive the worker.
                let _ = child.wait().await;
                return Err(err);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Encoder(format!("await ffmpeg: {e}")))?;

        if cancel.is_cancelled() {
            return Ok(());
        }
        if !status.success() {
            return Err(Error::Encoder(format!("ffmpeg exited with {status}")));
        }

        Ok(())
    }

    async fn upload_segment(&self, filename: &str) -> Result<()> {
        let Some(index) = parse_segment_index(filename) else {
            debug!(filename, "skipping unrecognized encoder output line");
            return Ok(());
        };

        let path = self.work_dir.path().join(filename);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Encoder(format!("read segment file {filename}: {e}")))?;

        let info = SegmentData {
            source_url: self.source_url.clone(),
            rendition: self.rendition.clone(),
            kind: self.kind,
            index,
        };

        self.store
            .write_segment(&info, &data)
            .await
            .map_err(Error::storage)?;

        let _ = tokio::fs::remove_file(&path).await;

        Ok(())
    }
}

fn parse_segment_index(filename: &str) -> Option<usize> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"-(\d+)\.ts$").expect("segment filename pattern"));

    pattern.captures(filename)?.get(1)?.as_str().parse().ok()
}
