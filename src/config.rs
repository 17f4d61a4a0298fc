//! Construction-time configuration for the controller.

use std::sync::Arc;
use std::time::Duration;

use crate::ports::coordinator::Coordinator;
use crate::ports::path::PathGenerator;
use crate::ports::storage::Storage;

pub const DEFAULT_SEGMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TARGET_DURATION: f64 = 6.0;
pub const DEFAULT_SEGMENTS_PER_JOB: usize = 10;
pub const DEFAULT_VIDEO_POOL_SIZE: usize = 2;
pub const DEFAULT_AUDIO_POOL_SIZE: usize = 4;

/// Options bundle for [`crate::Controller`]. The three collaborators are
/// required; the tunables start from sensible defaults and zero values are
/// normalized back to those defaults at construction.
#[derive(Clone)]
pub struct Options {
    pub storage: Arc<dyn Storage>,
    pub coordinator: Arc<dyn Coordinator>,
    pub path_gen: Arc<dyn PathGenerator>,

    /// Detect and use a hardware H.264 encoder when available. Falls back
    /// to software encoding when detection fails or finds nothing.
    pub hw_accel: bool,

    /// Maximum time a `segment` call waits for production.
    pub segment_timeout: Duration,

    /// Target HLS segment duration in seconds. Actual durations vary with
    /// keyframe positions.
    pub target_duration: f64,

    /// Number of segments transcoded per job. Larger batches improve
    /// throughput at the cost of first-segment latency.
    pub segments_per_job: usize,

    pub video_pool_size: usize,
    pub audio_pool_size: usize,
}

impl Options {
    pub fn new(
        storage: Arc<dyn Storage>,
        coordinator: Arc<dyn Coordinator>,
        path_gen: Arc<dyn PathGenerator>,
    ) -> Self {
        Self {
            storage,
            coordinator,
            path_gen,
            hw_accel: false,
            segment_timeout: DEFAULT_SEGMENT_TIMEOUT,
            target_duration: DEFAULT_TARGET_DURATION,
            segments_per_job: DEFAULT_SEGMENTS_PER_JOB,
            video_pool_size: DEFAULT_VIDEO_POOL_SIZE,
            audio_pool_size: DEFAULT_AUDIO_POOL_SIZE,
        }
    }

    pub(crate) fn normalize(&mut self) {
        if self.segment_timeout.is_zero() {
            self.segment_timeout = DEFAULT_SEGMENT_TIMEOUT;
        }
        if self.target_duration <= 0.0 {
            self.target_duration = DEFAULT_TARGET_DURATION;
        }
        if self.segments_per_job == 0 {
            self.segments_per_job = DEFAULT_SEGMENTS_PER_JOB;
        }
        if self.video_pool_size == 0 {
            self.video_pool_size = DEFAULT_VIDEO_POOL_SIZE;
        }
        if self.audio_pool_size == 0 {
            self.audio_pool_size = DEFAULT_AUDIO_POOL_SIZE;
        }
    }
}
