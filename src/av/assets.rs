//! One-shot asset extraction: thumbnail sprite sheets with their WebVTT
//! index, and subtitle tracks converted to WebVTT. Generated on first
//! request and cached in storage; these are plain ffmpeg invocations that do
//! not go through the job pipeline.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::debug;

use crate::domain::error::{Error, Result};
use crate::ports::storage::Storage;

const THUMB_WIDTH: u32 = 160;
const THUMB_HEIGHT: u32 = 90;
const THUMB_INTERVAL: f64 = 5.0;
const SHEET_COLS: usize = 10;
const SHEET_ROWS: usize = 10;

pub struct Generator {
    storage: Arc<dyn Storage>,
}

impl Generator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// WebVTT index mapping playback times to sprite-sheet coordinates.
    /// `sprite_url` renders the URL for a given sheet index.
    pub async fn sprite_vtt(
        &self,
        source_url: &str,
        duration: f64,
        sprite_url: impl Fn(usize) -> String,
    ) -> Result<Vec<u8>> {
        let exists = self
            .storage
            .sprite_vtt_exists(source_url)
            .await
            .map_err(Error::storage)?;
        if !exists {
            self.generate_sprites(source_url, duration, &sprite_url)
                .await?;
        }

        self.storage
            .read_sprite_vtt(source_url)
            .await
            .map_err(Error::storage)
    }

    /// One sprite sheet (JPEG) by index.
    pub async fn sprite(
        &self,
        source_url: &str,
        duration: f64,
        index: usize,
        sprite_url: impl Fn(usize) -> String,
    ) -> Result<Vec<u8>> {
        let exists = self
            .storage
            .sprite_exists(source_url, index)
            .await
            .map_err(Error::storage)?;
        if !exists {
            self.generate_sprites(source_url, duration, &sprite_url)
                .await?;
        }

        self.storage
            .read_sprite(source_url, index)
            .await
            .map_err(Error::storage)
    }

    async fn generate_sprites(
        &self,
        source_url: &str,
        duration: f64,
        sprite_url: &dyn Fn(usize) -> String,
    ) -> Result<()> {
        let thumbs_per_sheet = SHEET_COLS * SHEET_ROWS;
        let total_thumbs = (duration / THUMB_INTERVAL).ceil() as usize;
        let sheet_count = total_thumbs.div_ceil(thumbs_per_sheet);

        let work_dir = tempfile::Builder::new().prefix("sprites-").tempdir()?;
        let output_pattern = work_dir.path().join("sprite-%d.jpg");

        debug!(source_url, sheet_count, "generating sprite sheets");

        let status = Command::new("ffmpeg")
            .arg("-i")
            .arg(source_url)
            .arg("-vf")
            .arg(format!(
                "fps=1/{THUMB_INTERVAL},scale={THUMB_WIDTH}:{THUMB_HEIGHT},tile={SHEET_COLS}x{SHEET_ROWS}"
            ))
            .args(["-q:v", "5"])
            .arg(&output_pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Encoder(format!("run ffmpeg: {e}")))?;

        if !status.success() {
            return Err(Error::Encoder(format!(
                "ffmpeg sprite generation exited with {status}"
            )));
        }

        // ffmpeg numbers the %d pattern from 1; sheets are stored 0-based.
        for sheet in 0..sheet_count {
            let sheet_path = work_dir.path().join(format!("sprite-{}.jpg", sheet + 1));
            let data = tokio::fs::read(&sheet_path).await?;
            self.storage
                .write_sprite(source_url, sheet, &data)
                .await
                .map_err(Error::storage)?;
        }

        let vtt = render_vtt(duration, sheet_count, sprite_url);
        self.storage
            .write_sprite_vtt(source_url, &vtt)
            .await
            .map_err(Error::storage)?;

        Ok(())
    }

    /// One subtitle track as WebVTT, keyed by language. `stream_index` is
    /// the position within the source's subtitle streams.
    pub async fn subtitles(
        &self,
        source_url: &str,
        stream_index: usize,
        lang: &str,
    ) -> Result<Vec<u8>> {
        let exists = self
            .storage
            .subtitle_vtt_exists(source_url, lang)
            .await
            .map_err(Error::storage)?;
        if !exists {
            self.extract_subtitles(source_url, stream_index, lang)
                .await?;
        }

        self.storage
            .read_subtitle_vtt(source_url, lang)
            .await
            .map_err(Error::storage)
    }

    async fn extract_subtitles(
        &self,
        source_url: &str,
        stream_index: usize,
        lang: &str,
    ) -> Result<()> {
        let output = Command::new("ffmpeg")
            .arg("-i")
            .arg(source_url)
            .args(["-map", &format!("0:s:{stream_index}")])
            .args(["-c:s", "webvtt", "-f", "webvtt", "pipe:1"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Encoder(format!("run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(Error::Encoder(format!(
                "ffmpeg subtitle extraction exited with {}",
                output.status
            )));
        }

        self.storage
            .write_subtitle_vtt(source_url, lang, &output.stdout)
            .await
            .map_err(Error::storage)?;

        Ok(())
    }
}

fn render_vtt(duration: f64, sheet_count: usize, sprite_url: &dyn Fn(usize) -> String) -> Vec<u8> {
    let mut out = String::from("WEBVTT\n\n");

    let mut current = 0.0;

    'sheets: for sheet in 0..sheet_count {
        let url = sprite_url(sheet);

        for row in 0..SHEET_ROWS {
            for col in 0..SHEET_COLS {
                if current >= duration {
                    break 'sheets;
                }

                let end = (current + THUMB_INTERVAL).min(duration);
                let x = col as u32 * THUMB_WIDTH;
                let y = row as u32 * THUMB_HEIGHT;

                out.push_str(&format!(
                    "{} --> {}\n",
                    format_vtt_time(current),
                    format_vtt_time(end)
                ));
                out.push_str(&format!(
                    "{url}#xywh={x},{y},{THUMB_WIDTH},{THUMB_HEIGHT}\n\n"
                ));

                current += THUMB_INTERVAL;
            }
        }
    }

    out.into_bytes()
}

fn format_vtt_time(seconds: f64) -> String {
    let whole = seconds as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;
    let millis = ((seconds - whole as f64) * 1000.0) as u64;

    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtt_time_formatting() {
        assert_eq!(format_vtt_time(0.0), "00:00:00.000");
        assert_eq!(format_vtt_time(5.0), "00:00:05.000");
        assert_eq!(format_vtt_time(3675.25), "01:01:15.250");
    }

    #[test]
    fn vtt_covers_duration_with_clamped_final_cue() {
        let vtt = render_vtt(12.0, 1, &|i| format!("/sprites/{i}"));
        let text = String::from_utf8(vtt).expect("utf8");

        assert!(text.starts_with("WEBVTT\n\n"));
        // 12 seconds at a 5 second interval: cues at 0, 5, and 10.
        assert_eq!(text.matches("-->").count(), 3);
        assert!(text.contains("00:00:10.000 --> 00:00:12.000"));
        assert!(text.contains("/sprites/0#xywh=0,0,160,90"));
        assert!(text.contains("#xywh=320,0,160,90"));
    }

    #[test]
    fn vtt_advances_sheet_urls() {
        // 600s of thumbs fills one 10x10 sheet exactly; 601s spills into a
        // second sheet.
        let vtt = render_vtt(601.0, 2, &|i| format!("/sprites/{i}"));
        let text = String::from_utf8(vtt).expect("utf8");

        assert!(text.contains("/sprites/0#xywh="));
        assert!(text.contains("/sprites/1#xywh=0,0,160,90"));
    }
}
