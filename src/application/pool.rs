//! Worker pools: one per stream kind, each running N loops over the
//! coordinator's job subscription.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::worker::Worker;
use crate::av::cmd::{AudioParams, CommandBuilder, VideoParams};
use crate::domain::error::{Error, Result};
use crate::domain::rendition::{self, Method};
use crate::domain::segment;
use crate::domain::types::{Job, Metadata, SegmentData, SegmentStatus, StreamKind};
use crate::ports::coordinator::Coordinator;
use crate::ports::storage::Storage;

type SharedJobs = Arc<Mutex<UnboundedReceiver<Job>>>;

pub struct Pool {
    coordinator: Arc<dyn Coordinator>,
    size: usize,
    kind: StreamKind,
    storage: Arc<dyn Storage>,
    cmd_builder: Arc<CommandBuilder>,
    segment_store: Arc<dyn Storage>,
    target_duration: f64,
    state: Mutex<Option<PoolState>>,
}

struct PoolState {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Pool {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        size: usize,
        kind: StreamKind,
        storage: Arc<dyn Storage>,
        cmd_builder: Arc<CommandBuilder>,
        segment_store: Arc<dyn Storage>,
        target_duration: f64,
    ) -> Self {
        Self {
            coordinator,
            size,
            kind,
            storage,
            cmd_builder,
            segment_store,
            target_duration,
            state: Mutex::new(None),
        }
    }

    /// Subscribe to the coordinator and spawn the worker loops. The token
    /// bounds the lifetime of every loop and of any encoder they spawn.
    pub async fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(Error::Config("pool already started".to_owned()));
        }

        let jobs = self
            .coordinator
            .subscribe(self.kind)
            .await
            .map_err(Error::coordinator)?;
        let jobs: SharedJobs = Arc::new(Mutex::new(jobs));

        let mut handles = Vec::with_capacity(self.size);
        for _ in 0..self.size {
            let pool = Arc::clone(self);
            let jobs = Arc::clone(&jobs);
            let token = cancel.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(jobs, token).await;
            }));
        }

        *state = Some(PoolState { cancel, handles });

        Ok(())
    }

    /// Cancel the loops (killing any live encoders) and wait for them all.
    pub async fn stop(&self) {
        let state = self.state.lock().await.take();
        if let Some(state) = state {
            state.cancel.cancel();
            join_all(state.handles).await;
        }
    }

    async fn worker_loop(self: Arc<Self>, jobs: SharedJobs, cancel: CancellationToken) {
        loop {
            let job = {
                let mut rx = jobs.lock().await;
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    job = rx.recv() => job,
                }
            };

            let Some(job) = job else {
                return;
            };

            self.process_job(job, &cancel).await;
        }
    }

    async fn process_job(&self, job: Job, cancel: &CancellationToken) {
        debug!(job_id = %job.id, kind = %self.kind, start = job.start_index, end = job.end_index, "processing job");

        match self.prepare(&job).await {
            Ok(Some(mut worker)) => {
                if let Err(err) = worker.run(cancel.child_token()).await {
                    warn!(job_id = %job.id, error = %err, "transcode job failed");
                }
            }
            Ok(None) => {
                debug!(job_id = %job.id, "no segments in requested range");
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "job rejected before execution");
                self.publish_error(&job, &err).await;
            }
        }

        if let Err(err) = self.coordinator.ack(&job.id).await {
            warn!(job_id = %job.id, error = %err, "job ack failed");
        }
    }

    /// Resolve everything the encoder run needs. Any failure here is fanned
    /// out as an error status for the whole index range. An out-of-range
    /// batch resolves to `None`: nothing to run, nothing to notify.
    async fn prepare(&self, job: &Job) -> Result<Option<Worker>> {
        let meta = self.load_metadata(&job.source_url).await?;

        let segments = segment::segments_in_range(
            &meta.keyframes,
            meta.duration,
            self.target_duration,
            job.start_index,
            job.end_index,
        );
        if segments.is_empty() {
            return Ok(None);
        }

        let work_dir = tempfile::Builder::new().prefix("transcode-").tempdir()?;

        let (args, skip_first) = match self.kind {
            StreamKind::Video => {
                let video = meta
                    .video
                    .as_ref()
                    .ok_or_else(|| Error::Rendition {
                        name: job.rendition.clone(),
                    })?;
                let rendition = rendition::video_renditions(video)
                    .into_iter()
                    .find(|r| r.name == job.rendition)
                    .ok_or_else(|| Error::Rendition {
                        name: job.rendition.clone(),
                    })?;

                let mut segments = segments;
                let mut skip_first = false;
                let mut actual_seek_keyframe = None;

                if rendition.method == Method::DirectStream {
                    // Stream copy starts from whatever keyframe the seek
                    // lands on. Widen one segment left so the batch begins
                    // on a boundary we control, then drop that extra
                    // segment on output.
                    if job.start_index > 0 {
                        let widened = segment::segments_in_range(
                            &meta.keyframes,
                            meta.duration,
                            self.target_duration,
                            job.start_index - 1,
                            job.end_index,
                        );
                        if widened.len() > segments.len() {
                            segments = widened;
                            skip_first = true;
                        }
                    }
                    actual_seek_keyframe = Some(segment::nearest_keyframe(
                        &meta.keyframes,
                        segments[0].start,
                    ));
                }

                let args = self.cmd_builder.video(&VideoParams {
                    input_url: &job.source_url,
                    stream_index: 0,
                    rendition: &rendition,
                    segments: &segments,
                    output_dir: work_dir.path(),
                    actual_seek_keyframe,
                });
                (args, skip_first)
            }
            StreamKind::Audio => {
                let audio = meta.audios.first().ok_or_else(|| Error::Rendition {
                    name: job.rendition.clone(),
                })?;
                let rendition = rendition::audio_renditions(audio)
                    .into_iter()
                    .find(|r| r.name == job.rendition)
                    .ok_or_else(|| Error::Rendition {
                        name: job.rendition.clone(),
                    })?;

                let args = self.cmd_builder.audio(&AudioParams {
                    input_url: &job.source_url,
                    stream_index: 0,
                    rendition: &rendition,
                    segments: &segments,
                    output_dir: work_dir.path(),
                });
                (args, false)
            }
            StreamKind::Subtitle => {
                return Err(Error::Rendition {
                    name: job.rendition.clone(),
                })
            }
        };

        if args.is_empty() {
            return Err(Error::Encoder("empty encoder command".to_owned()));
        }

        Ok(Some(Worker::new(
            args,
            Arc::clone(&self.segment_store),
            job.source_url.clone(),
            job.rendition.clone(),
            self.kind,
            work_dir,
            skip_first,
        )))
    }

    async fn load_metadata(&self, source_url: &str) -> Result<Metadata> {
        let data = self
            .storage
            .read_metadata(source_url)
            .await
            .map_err(Error::storage)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Wake every waiter in the job's range with an error status so nobody
    /// waits out the timeout for work that will never happen.
    async fn publish_error(&self, job: &Job, err: &Error) {
        for index in job.start_index..=job.end_index {
            let info = SegmentData {
                source_url: job.source_url.clone(),
                rendition: job.rendition.clone(),
                kind: self.kind,
                index,
            };
            if let Err(notify_err) = self
                .coordinator
                .notify_segment(&info, SegmentStatus::error(err.to_string()))
                .await
            {
                warn!(index, error = %notify_err, "failed to publish job failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryCoordinator, MemoryStorage};
    use crate::domain::hwaccel::{Accelerator, HwAccelProfile};
    use crate::domain::types::{SegmentState, VideoStream};

    fn test_metadata() -> Metadata {
        Metadata {
            duration: 30.0,
            keyframes: vec![0.0, 6.0, 12.0, 18.0, 24.0],
            video: Some(VideoStream {
                index: 0,
                codec: "h264".to_owned(),
                width: 1920,
                height: 1080,
                bitrate: 5_000_000,
                frame_rate: 25.0,
            }),
            audios: Vec::new(),
            subtitles: Vec::new(),
        }
    }

    fn test_pool(
        storage: Arc<MemoryStorage>,
        coordinator: Arc<MemoryCoordinator>,
        kind: StreamKind,
    ) -> Arc<Pool> {
        Arc::new(Pool::new(
            coordinator,
            1,
            kind,
            storage.clone(),
            Arc::new(CommandBuilder::new(HwAccelProfile::new(Accelerator::None))),
            storage,
            6.0,
        ))
    }

    async fn seed_metadata(storage: &MemoryStorage, source_url: &str) {
        let data = serde_json::to_vec(&test_metadata()).expect("encode");
        storage
            .write_metadata(source_url, &data)
            .await
            .expect("seed metadata");
    }

    #[tokio::test]
    async fn unknown_rendition_fans_out_errors_for_whole_range() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        seed_metadata(&storage, "file:///media.mkv").await;

        let pool = test_pool(storage, coordinator.clone(), StreamKind::Video);

        let job = Job {
            id: "job-1".to_owned(),
            source_url: "file:///media.mkv".to_owned(),
            rendition: "4320p".to_owned(),
            kind: StreamKind::Video,
            start_index: 2,
            end_index: 4,
        };

        let mut waiters = Vec::new();
        for index in job.start_index..=job.end_index {
            let info = SegmentData {
                source_url: job.source_url.clone(),
                rendition: job.rendition.clone(),
                kind: StreamKind::Video,
                index,
            };
            waiters.push(coordinator.wait_segment(&info).await.expect("register"));
        }

        pool.process_job(job, &CancellationToken::new()).await;

        for waiter in &mut waiters {
            let status = waiter.recv().await.expect("status delivered");
            assert_eq!(status.state, SegmentState::Error);
            assert!(status.error.contains("4320p"), "{}", status.error);
        }
    }

    #[tokio::test]
    async fn missing_metadata_fans_out_errors() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        let pool = test_pool(storage, coordinator.clone(), StreamKind::Audio);

        let info = SegmentData {
            source_url: "file:///absent.mkv".to_owned(),
            rendition: "aac_stereo".to_owned(),
            kind: StreamKind::Audio,
            index: 0,
        };
        let mut waiter = coordinator.wait_segment(&info).await.expect("register");

        let job = Job {
            id: "job-2".to_owned(),
            source_url: "file:///absent.mkv".to_owned(),
            rendition: "aac_stereo".to_owned(),
            kind: StreamKind::Audio,
            start_index: 0,
            end_index: 0,
        };
        pool.process_job(job, &CancellationToken::new()).await;

        let status = waiter.recv().await.expect("status delivered");
        assert_eq!(status.state, SegmentState::Error);
    }

    #[tokio::test]
    async fn out_of_range_batch_notifies_nobody() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        seed_metadata(&storage, "file:///media.mkv").await;

        let pool = test_pool(storage, coordinator.clone(), StreamKind::Video);

        let info = SegmentData {
            source_url: "file:///media.mkv".to_owned(),
            rendition: "1080p".to_owned(),
            kind: StreamKind::Video,
            index: 40,
        };
        let mut waiter = coordinator.wait_segment(&info).await.expect("register");

        let job = Job {
            id: "job-3".to_owned(),
            source_url: "file:///media.mkv".to_owned(),
            rendition: "1080p".to_owned(),
            kind: StreamKind::Video,
            start_index: 40,
            end_index: 49,
        };
        pool.process_job(job, &CancellationToken::new()).await;

        // The waiter must not have been woken; it would time out upstream.
        assert!(waiter.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_twice_is_rejected_and_stop_joins_loops() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        let pool = test_pool(storage, coordinator, StreamKind::Video);

        pool.start(CancellationToken::new())
            .await
            .expect("first start");
        let err = pool
            .start(CancellationToken::new())
            .await
            .expect_err("second start rejected");
        assert!(matches!(err, Error::Config(_)));

        pool.stop().await;
    }
}
