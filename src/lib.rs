//! caruso - on-demand HLS transcoding.
//!
//! caruso turns an arbitrary input video into an HLS presentation lazily:
//! clients fetch a master playlist, pick a rendition, and request numbered
//! MPEG-TS segments; each segment is transcoded the first time it is asked
//! for, then cached for every later request.
//!
//! # Architecture
//!
//! The core is generic over three capabilities, defined as traits in
//! [`ports`]:
//!
//! - [`Storage`]: persists metadata, segments, sprites, and subtitles
//! - [`Coordinator`]: job queues plus segment readiness notifications
//! - [`PathGenerator`]: renders the URLs embedded in playlists
//!
//! In-memory and filesystem implementations ship in [`adapters`]; swap in
//! Redis, S3, or anything else without touching the core.
//!
//! # Basic usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use caruso::adapters::{FsStorage, MemoryCoordinator};
//! use caruso::{Controller, Options, StreamKind};
//! # struct MyPathGen;
//! # impl caruso::PathGenerator for MyPathGen {
//! #     fn master_playlist(&self, _: &str) -> String { String::new() }
//! #     fn variant_playlist(&self, _: &str, _: &str, _: StreamKind) -> String { String::new() }
//! #     fn segment(&self, _: &str, _: &str, _: StreamKind, _: usize) -> String { String::new() }
//! #     fn sprite_vtt(&self, _: &str) -> String { String::new() }
//! #     fn sprite(&self, _: &str, _: usize) -> String { String::new() }
//! #     fn subtitle_vtt(&self, _: &str, _: &str) -> String { String::new() }
//! # }
//!
//! # async fn run() -> caruso::Result<()> {
//! let mut opts = Options::new(
//!     Arc::new(FsStorage::new("/var/lib/caruso")),
//!     Arc::new(MemoryCoordinator::new()),
//!     Arc::new(MyPathGen),
//! );
//! opts.hw_accel = true;
//!
//! let controller = Controller::new(opts).await;
//! controller.start().await?;
//!
//! let master = controller.master_playlist("file:///media/movie.mkv").await?;
//! let segment = controller
//!     .segment("file:///media/movie.mkv", StreamKind::Video, "1080p", 0)
//!     .await?;
//!
//! controller.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Segment-on-demand
//!
//! A `segment` call that misses the cache registers a readiness waiter,
//! enqueues a job batching several consecutive segments, and parks until a
//! pool worker drives ffmpeg through the batch and the coordinator reports
//! the requested index ready. Concurrent callers of the same segment share
//! one production run; duplicated jobs are harmless because batch bounds
//! are deterministic and writes are idempotent.

pub mod adapters;
pub mod application;
pub mod av;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::controller::Controller;
pub use config::Options;
pub use domain::error::{BoxError, Error, Result};
pub use domain::hwaccel::{Accelerator, HwAccelProfile};
pub use domain::rendition::{AudioRendition, Method, VideoRendition};
pub use domain::types::{
    AudioStream, Job, Metadata, Segment, SegmentData, SegmentState, SegmentStatus, StreamKind,
    SubtitleStream, VideoStream,
};
pub use ports::{Coordinator, PathGenerator, Storage};
