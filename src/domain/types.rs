use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of media stream a rendition, job, or segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Video => f.write_str("video"),
            StreamKind::Audio => f.write_str("audio"),
            StreamKind::Subtitle => f.write_str("subtitle"),
        }
    }
}

/// Probed description of a media source. Computed once per source URL and
/// cached as a JSON blob in storage; immutable after the first write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub duration: f64,
    #[serde(default)]
    pub keyframes: Vec<f64>,
    #[serde(default)]
    pub video: Option<VideoStream>,
    #[serde(default)]
    pub audios: Vec<AudioStream>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleStream>,
}

/// The primary video stream of a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStream {
    pub index: usize,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStream {
    pub index: usize,
    pub codec: String,
    pub language: String,
    pub channels: u32,
    pub bitrate: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: usize,
    pub codec: String,
    pub language: String,
    pub forced: bool,
}

/// One contiguous slice of the presentation timeline. Derived from the
/// keyframe table, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Identity of a produced segment artifact. This tuple is both the cache key
/// in storage and the notification key in the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentData {
    pub source_url: String,
    pub rendition: String,
    pub kind: StreamKind,
    pub index: usize,
}

/// A batched transcoding job covering the inclusive segment index range
/// `[start_index, end_index]`. Created by the controller, consumed and
/// acknowledged by exactly one pool worker. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source_url: String,
    pub rendition: String,
    pub kind: StreamKind,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    Ready,
    Error,
}

/// Wire message between a segment producer and its waiters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentStatus {
    pub state: SegmentState,
    #[serde(default)]
    pub error: String,
}

impl SegmentStatus {
    pub fn ready() -> Self {
        Self {
            state: SegmentState::Ready,
            error: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: SegmentState::Error,
            error: message.into(),
        }
    }
}
