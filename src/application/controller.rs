//! The front door: playlists, on-demand segments, and cached assets.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::application::notify::NotifyingStore;
use crate::application::pool::Pool;
use crate::av::assets;
use crate::av::cmd::CommandBuilder;
use crate::av::hwaccel;
use crate::av::probe::Prober;
use crate::config::Options;
use crate::domain::error::{Error, Result};
use crate::domain::hwaccel::{Accelerator, HwAccelProfile};
use crate::domain::playlist;
use crate::domain::rendition;
use crate::domain::segment;
use crate::domain::types::{Job, Metadata, SegmentData, SegmentState, StreamKind};
use crate::ports::coordinator::Coordinator;
use crate::ports::path::PathGenerator;
use crate::ports::storage::Storage;

/// Entry point for HLS transcoding operations. Construct with [`Options`],
/// call [`Controller::start`] before serving requests, and
/// [`Controller::stop`] on shutdown so worker loops and encoders terminate
/// cleanly.
///
/// All operations are safe to call from any number of tasks concurrently.
pub struct Controller {
    opts: Options,
    playlist: playlist::Generator,
    video_pool: Arc<Pool>,
    audio_pool: Arc<Pool>,
    prober: Prober,
    assets: assets::Generator,
    shutdown: CancellationToken,
}

impl Controller {
    /// Build a controller. When `hw_accel` is enabled this probes the host's
    /// ffmpeg for usable hardware encoders and locks in the best backend.
    pub async fn new(mut opts: Options) -> Self {
        opts.normalize();

        let profile = if opts.hw_accel {
            hwaccel::detect_best().await
        } else {
            HwAccelProfile::new(Accelerator::None)
        };
        let cmd_builder = Arc::new(CommandBuilder::new(profile));

        let notifying: Arc<dyn Storage> = Arc::new(NotifyingStore::new(
            Arc::clone(&opts.storage),
            Arc::clone(&opts.coordinator),
        ));

        let video_pool = Arc::new(Pool::new(
            Arc::clone(&opts.coordinator),
            opts.video_pool_size,
            StreamKind::Video,
            Arc::clone(&opts.storage),
            Arc::clone(&cmd_builder),
            Arc::clone(&notifying),
            opts.target_duration,
        ));

        let audio_pool = Arc::new(Pool::new(
            Arc::clone(&opts.coordinator),
            opts.audio_pool_size,
            StreamKind::Audio,
            Arc::clone(&opts.storage),
            cmd_builder,
            notifying,
            opts.target_duration,
        ));

        Self {
            playlist: playlist::Generator::new(Arc::clone(&opts.path_gen)),
            prober: Prober::new(Arc::clone(&opts.storage)),
            assets: assets::Generator::new(Arc::clone(&opts.storage)),
            video_pool,
            audio_pool,
            shutdown: CancellationToken::new(),
            opts,
        }
    }

    /// Subscribe the worker pools to the coordinator and begin processing
    /// jobs.
    pub async fn start(&self) -> Result<()> {
        self.video_pool.start(self.shutdown.child_token()).await?;
        self.audio_pool.start(self.shutdown.child_token()).await?;
        Ok(())
    }

    /// Shut down both pools, killing any live encoders, and wake in-flight
    /// `segment` calls with [`Error::Cancelled`].
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.video_pool.stop().await;
        self.audio_pool.stop().await;
    }

    /// The master playlist for a source: every video variant plus every
    /// audio track. Probes and caches metadata on first call.
    pub async fn master_playlist(&self, source_url: &str) -> Result<String> {
        let meta = self.metadata(source_url).await?;

        let videos = meta
            .video
            .as_ref()
            .map(rendition::video_renditions)
            .unwrap_or_default();
        let audios = meta
            .audios
            .first()
            .map(rendition::audio_renditions)
            .unwrap_or_default();

        Ok(self.playlist.master(source_url, &videos, &audios))
    }

    /// The media playlist for one rendition, with segment durations derived
    /// from the source's keyframe table.
    pub async fn variant_playlist(
        &self,
        source_url: &str,
        kind: StreamKind,
        rendition: &str,
    ) -> Result<String> {
        let meta = self.metadata(source_url).await?;

        let segments = segment::segments(&meta.keyframes, meta.duration, self.opts.target_duration);

        Ok(self.playlist.variant(source_url, rendition, kind, &segments))
    }

    /// One transcoded MPEG-TS segment.
    ///
    /// Returns straight from storage on a cache hit. Otherwise registers a
    /// readiness waiter, enqueues a batch job covering the index, and blocks
    /// until the segment is produced, the producer reports failure, the
    /// timeout elapses, or the controller stops.
    pub async fn segment(
        &self,
        source_url: &str,
        kind: StreamKind,
        rendition: &str,
        index: usize,
    ) -> Result<Vec<u8>> {
        let info = SegmentData {
            source_url: source_url.to_owned(),
            rendition: rendition.to_owned(),
            kind,
            index,
        };

        let exists = self
            .opts
            .storage
            .segment_exists(&info)
            .await
            .map_err(Error::storage)?;
        if exists {
            return self
                .opts
                .storage
                .read_segment(&info)
                .await
                .map_err(Error::storage);
        }

        // Register before enqueueing: a notification fired between the two
        // must still reach this waiter.
        let mut status = self
            .opts
            .coordinator
            .wait_segment(&info)
            .await
            .map_err(Error::coordinator)?;

        self.enqueue_segment(source_url, kind, rendition, index)
            .await?;

        tokio::select! {
            _ = self.shutdown.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(self.opts.segment_timeout) => Err(Error::Timeout { index }),
            received = status.recv() => match received {
                Some(status) => match status.state {
                    SegmentState::Ready => self
                        .opts
                        .storage
                        .read_segment(&info)
                        .await
                        .map_err(Error::storage),
                    SegmentState::Error => Err(Error::Segment {
                        index,
                        reason: status.error,
                    }),
                },
                None => Err(Error::coordinator("segment wait stream closed".into())),
            },
        }
    }

    /// WebVTT index for seek-preview thumbnails. Sheets are generated and
    /// cached on first request.
    pub async fn sprite_vtt(&self, source_url: &str) -> Result<Vec<u8>> {
        let meta = self.metadata(source_url).await?;

        self.assets
            .sprite_vtt(source_url, meta.duration, |index| {
                self.opts.path_gen.sprite(source_url, index)
            })
            .await
    }

    /// One thumbnail sprite sheet (JPEG) by index.
    pub async fn sprite(&self, source_url: &str, index: usize) -> Result<Vec<u8>> {
        let meta = self.metadata(source_url).await?;

        self.assets
            .sprite(source_url, meta.duration, index, |sheet| {
                self.opts.path_gen.sprite(source_url, sheet)
            })
            .await
    }

    /// One subtitle track as WebVTT, selected by language code.
    pub async fn subtitle_vtt(&self, source_url: &str, lang: &str) -> Result<Vec<u8>> {
        let meta = self.metadata(source_url).await?;

        let stream_index = meta
            .subtitles
            .iter()
            .position(|s| s.language == lang)
            .ok_or_else(|| Error::Probe(format!("subtitle language {lang} not found")))?;

        self.assets.subtitles(source_url, stream_index, lang).await
    }

    async fn enqueue_segment(
        &self,
        source_url: &str,
        kind: StreamKind,
        rendition: &str,
        index: usize,
    ) -> Result<()> {
        let start_index = (index / self.opts.segments_per_job) * self.opts.segments_per_job;
        let end_index = start_index + self.opts.segments_per_job - 1;

        let job = Job {
            id: Uuid::new_v4().to_string(),
            source_url: source_url.to_owned(),
            rendition: rendition.to_owned(),
            kind,
            start_index,
            end_index,
        };

        debug!(job_id = %job.id, index, start_index, end_index, "enqueueing segment job");

        self.opts
            .coordinator
            .enqueue(job)
            .await
            .map_err(Error::coordinator)
    }

    async fn metadata(&self, source_url: &str) -> Result<Metadata> {
        self.prober.probe(source_url).await
    }
}
