//! HLS playlist rendering. Output is a stable wire format: UTF-8 text with
//! LF line endings, compared literally by clients and tests.

use std::sync::Arc;

use crate::domain::rendition::{AudioRendition, VideoRendition};
use crate::domain::types::{Segment, StreamKind};
use crate::ports::path::PathGenerator;

const AUDIO_GROUP_ID: &str = "audio";
const DEFAULT_AUDIO_RENDITION: &str = "aac_stereo";

pub struct Generator {
    path_gen: Arc<dyn PathGenerator>,
}

impl Generator {
    pub fn new(path_gen: Arc<dyn PathGenerator>) -> Self {
        Self { path_gen }
    }

    /// Master playlist advertising every video variant and audio track.
    pub fn master(
        &self,
        source_url: &str,
        videos: &[VideoRendition],
        audios: &[AudioRendition],
    ) -> String {
        let mut out = String::new();

        out.push_str("#EXTM3U\n");
        out.push_str("#EXT-X-VERSION:4\n");
        out.push('\n');

        for audio in audios {
            out.push_str(&format!(
                "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"{}\",NAME=\"{}\",DEFAULT={},AUTOSELECT=YES,URI=\"{}\"\n",
                AUDIO_GROUP_ID,
                audio.name,
                default_flag(audio.name == DEFAULT_AUDIO_RENDITION),
                self.path_gen
                    .variant_playlist(source_url, &audio.name, StreamKind::Audio),
            ));
        }

        if !audios.is_empty() {
            out.push('\n');
        }

        for video in videos {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{},CODECS=\"{},{}\",AUDIO=\"{}\"\n",
                video.bitrate,
                video.width,
                video.height,
                video_codec_string(video.height),
                audio_codec_string(),
                AUDIO_GROUP_ID,
            ));
            out.push_str(&self.path_gen.variant_playlist(
                source_url,
                &video.name,
                StreamKind::Video,
            ));
            out.push('\n');
        }

        out
    }

    /// Media playlist for one rendition: every segment in order, VOD style.
    pub fn variant(
        &self,
        source_url: &str,
        rendition: &str,
        kind: StreamKind,
        segments: &[Segment],
    ) -> String {
        let max_duration = segments
            .iter()
            .map(|s| s.duration)
            .fold(0.0f64, f64::max);

        let mut out = String::new();
        out.push_str("#EXTM3U\n");
        out.push_str("#EXT-X-VERSION:4\n");
        out.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", max_duration.ceil() as u64));
        out.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n");
        out.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
        out.push('\n');

        for segment in segments {
            out.push_str(&format!("#EXTINF:{:.3},\n", segment.duration));
            out.push_str(&self.path_gen.segment(source_url, rendition, kind, segment.index));
            out.push('\n');
        }

        out.push_str("#EXT-X-ENDLIST\n");

        out
    }
}

fn default_flag(is_default: bool) -> &'static str {
    if is_default {
        "YES"
    } else {
        "NO"
    }
}

fn video_codec_string(height: u32) -> &'static str {
    match height {
        2160 => "avc1.640033",
        1080 => "avc1.640028",
        720 => "avc1.64001f",
        480 => "avc1.64001e",
        _ => "avc1.640015",
    }
}

fn audio_codec_string() -> &'static str {
    "mp4a.40.2"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rendition::Method;

    struct StaticPathGen;

    impl PathGenerator for StaticPathGen {
        fn master_playlist(&self, source_url: &str) -> String {
            format!("/{source_url}/master.m3u8")
        }

        fn variant_playlist(&self, source_url: &str, rendition: &str, kind: StreamKind) -> String {
            format!("/{source_url}/{kind}/{rendition}/playlist.m3u8")
        }

        fn segment(
            &self,
            source_url: &str,
            rendition: &str,
            kind: StreamKind,
            index: usize,
        ) -> String {
            format!("/{source_url}/{kind}/{rendition}/segment-{index}.ts")
        }

        fn sprite_vtt(&self, source_url: &str) -> String {
            format!("/{source_url}/sprites.vtt")
        }

        fn sprite(&self, source_url: &str, index: usize) -> String {
            format!("/{source_url}/sprites/{index}")
        }

        fn subtitle_vtt(&self, source_url: &str, lang: &str) -> String {
            format!("/{source_url}/subtitles/{lang}.vtt")
        }
    }

    fn generator() -> Generator {
        Generator::new(Arc::new(StaticPathGen))
    }

    #[test]
    fn master_renders_audio_groups_and_variants() {
        let videos = vec![
            VideoRendition {
                name: "1080p".to_owned(),
                width: 1920,
                height: 1080,
                bitrate: 5_000_000,
                method: Method::DirectStream,
            },
            VideoRendition {
                name: "480p".to_owned(),
                width: 854,
                height: 480,
                bitrate: 900_000,
                method: Method::Transcode,
            },
        ];
        let audios = vec![
            AudioRendition {
                name: "aac_stereo".to_owned(),
                codec: "aac".to_owned(),
                bitrate: 128_000,
                channels: 2,
                method: Method::Transcode,
            },
            AudioRendition {
                name: "ac3_passthrough".to_owned(),
                codec: "ac3".to_owned(),
                bitrate: 640_000,
                channels: 6,
                method: Method::DirectStream,
            },
        ];

        let out = generator().master("media", &videos, &audios);

        let want = "#EXTM3U\n\
            #EXT-X-VERSION:4\n\
            \n\
            #EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"aac_stereo\",DEFAULT=YES,AUTOSELECT=YES,URI=\"/media/audio/aac_stereo/playlist.m3u8\"\n\
            #EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"ac3_passthrough\",DEFAULT=NO,AUTOSELECT=YES,URI=\"/media/audio/ac3_passthrough/playlist.m3u8\"\n\
            \n\
            #EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,CODECS=\"avc1.640028,mp4a.40.2\",AUDIO=\"audio\"\n\
            /media/video/1080p/playlist.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=900000,RESOLUTION=854x480,CODECS=\"avc1.64001e,mp4a.40.2\",AUDIO=\"audio\"\n\
            /media/video/480p/playlist.m3u8\n";
        assert_eq!(out, want);
    }

    #[test]
    fn master_without_audio_skips_media_lines() {
        let videos = vec![VideoRendition {
            name: "720p".to_owned(),
            width: 1280,
            height: 720,
            bitrate: 2_000_000,
            method: Method::Transcode,
        }];

        let out = generator().master("media", &videos, &[]);
        assert!(!out.contains("#EXT-X-MEDIA"));
        assert!(out.contains("CODECS=\"avc1.64001f,mp4a.40.2\""));
    }

    #[test]
    fn variant_renders_segments_with_literal_layout() {
        let segments = vec![
            Segment {
                index: 0,
                start: 0.0,
                end: 5.5,
                duration: 5.5,
            },
            Segment {
                index: 1,
                start: 5.5,
                end: 11.7,
                duration: 6.2,
            },
        ];

        let out = generator().variant("media", "720p", StreamKind::Video, &segments);

        let want = "#EXTM3U\n\
            #EXT-X-VERSION:4\n\
            #EXT-X-TARGETDURATION:7\n\
            #EXT-X-PLAYLIST-TYPE:VOD\n\
            #EXT-X-MEDIA-SEQUENCE:0\n\
            \n\
            #EXTINF:5.500,\n\
            /media/video/720p/segment-0.ts\n\
            #EXTINF:6.200,\n\
            /media/video/720p/segment-1.ts\n\
            #EXT-X-ENDLIST\n";
        assert_eq!(out, want);
    }

    #[test]
    fn variant_has_one_extinf_per_segment_and_endlist() {
        let segments: Vec<Segment> = (0..7)
            .map(|i| Segment {
                index: i,
                start: i as f64 * 6.0,
                end: (i + 1) as f64 * 6.0,
                duration: 6.0,
            })
            .collect();

        let out = generator().variant("media", "aac_stereo", StreamKind::Audio, &segments);

        assert_eq!(out.matches("#EXTINF").count(), segments.len());
        assert!(out.trim_end().ends_with("#EXT-X-ENDLIST"));
        assert!(out.contains("#EXT-X-TARGETDURATION:6\n"));
    }
}
