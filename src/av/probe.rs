//! Source probing. One ffprobe pass for streams and format, one for the
//! keyframe table; the merged result is cached in storage as a JSON blob.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::domain::error::{Error, Result};
use crate::domain::types::{AudioStream, Metadata, SubtitleStream, VideoStream};
use crate::ports::storage::Storage;

pub struct Prober {
    storage: Arc<dyn Storage>,
}

impl Prober {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Metadata for a source, probing and persisting on first request.
    /// Metadata is never mutated after the first successful write.
    pub async fn probe(&self, source_url: &str) -> Result<Metadata> {
        if self
            .storage
            .metadata_exists(source_url)
            .await
            .map_err(Error::storage)?
        {
            let data = self
                .storage
                .read_metadata(source_url)
                .await
                .map_err(Error::storage)?;
            return Ok(serde_json::from_slice(&data)?);
        }

        debug!(source_url, "probing source");
        let metadata = self.probe_source(source_url).await?;

        let data = serde_json::to_vec(&metadata)?;
        self.storage
            .write_metadata(source_url, &data)
            .await
            .map_err(Error::storage)?;

        Ok(metadata)
    }

    async fn probe_source(&self, url: &str) -> Result<Metadata> {
        let mut metadata = probe_streams(url).await?;
        metadata.keyframes = probe_keyframes(url).await?;
        Ok(metadata)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    codec_name: String,
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    r_frame_rate: String,
    #[serde(default)]
    channels: u32,
    #[serde(default)]
    bit_rate: String,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    forced: i64,
}

async fn probe_streams(url: &str) -> Result<Metadata> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_format", "-show_streams", "-of", "json"])
        .arg(url)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Probe(format!("run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(Error::Probe(format!("ffprobe exited with {}", output.status)));
    }

    let ff: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::Probe(format!("decode ffprobe output: {e}")))?;

    let mut metadata = Metadata {
        duration: ff.format.duration.parse().unwrap_or(0.0),
        ..Metadata::default()
    };

    for stream in ff.streams {
        match stream.codec_type.as_str() {
            "video" => {
                if metadata.video.is_none() {
                    metadata.video = Some(VideoStream {
                        index: stream.index,
                        codec: stream.codec_name,
                        width: stream.width,
                        height: stream.height,
                        bitrate: parse_bitrate(stream.tags.get("BPS").map_or("", String::as_str)),
                        frame_rate: parse_frame_rate(&stream.r_frame_rate),
                    });
                }
            }
            "audio" => metadata.audios.push(AudioStream {
                index: stream.index,
                codec: stream.codec_name,
                language: stream.tags.get("language").cloned().unwrap_or_default(),
                channels: stream.channels,
                bitrate: parse_bitrate(&stream.bit_rate),
            }),
            "subtitle" => metadata.subtitles.push(SubtitleStream {
                index: stream.index,
                codec: stream.codec_name,
                language: stream.tags.get("language").cloned().unwrap_or_default(),
                forced: stream.disposition.forced == 1,
            }),
            _ => {}
        }
    }

    Ok(metadata)
}

/// Keyframe PTS table for the first video stream. Packet lines look like
/// `4.171000,K__`; a line contributes iff its flags contain the key marker.
/// Malformed lines and out-of-order values are skipped.
async fn probe_keyframes(url: &str) -> Result<Vec<f64>> {
    let mut child = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "packet=pts_time,flags",
            "-of",
            "csv=p=0",
        ])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Probe(format!("run ffprobe: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Probe("ffprobe stdout unavailable".to_owned()))?;
    let mut lines = BufReader::new(stdout).lines();

    let mut keyframes = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::Probe(format!("read ffprobe output: {e}")))?
    {
        let mut parts = line.split(',');
        let (Some(pts_time), Some(flags)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !flags.contains('K') {
            continue;
        }
        let Ok(pts) = pts_time.parse::<f64>() else {
            continue;
        };
        if keyframes.last().is_some_and(|&last| pts < last) {
            continue;
        }
        keyframes.push(pts);
    }

    let status = child
        .wait()
        .await
        .map_err(|e| Error::Probe(format!("await ffprobe: {e}")))?;
    if !status.success() {
        return Err(Error::Probe(format!("ffprobe exited with {status}")));
    }

    Ok(keyframes)
}

fn parse_bitrate(raw: &str) -> u64 {
    raw.parse().unwrap_or(0)
}

fn parse_frame_rate(raw: &str) -> f64 {
    let mut parts = raw.split('/');
    let (Some(num), Some(den)) = (parts.next(), parts.next()) else {
        return 0.0;
    };
    let num: f64 = num.parse().unwrap_or(0.0);
    let den: f64 = den.parse().unwrap_or(0.0);
    if den == 0.0 {
        return 0.0;
    }
    num / den
}
