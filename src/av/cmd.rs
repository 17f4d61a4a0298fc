//! ffmpeg argument vectors for batched segment production.
//!
//! Every command writes `segment-NNNNN.ts` files into a work directory and
//! lists each finished filename on stdout, one per line, in index order. For
//! identical inputs the vector is byte-identical.

use std::path::Path;

use crate::domain::hwaccel::{Accelerator, HwAccelProfile};
use crate::domain::rendition::{AudioRendition, Method, VideoRendition};
use crate::domain::types::Segment;

pub struct VideoParams<'a> {
    pub input_url: &'a str,
    pub stream_index: usize,
    pub rendition: &'a VideoRendition,
    pub segments: &'a [Segment],
    pub output_dir: &'a Path,
    /// The keyframe ffmpeg will actually land on when seeking a
    /// direct-stream batch. When set, segment split times are anchored here
    /// and the caller must discard the first produced segment.
    pub actual_seek_keyframe: Option<f64>,
}

pub struct AudioParams<'a> {
    pub input_url: &'a str,
    pub stream_index: usize,
    pub rendition: &'a AudioRendition,
    pub segments: &'a [Segment],
    pub output_dir: &'a Path,
}

pub struct CommandBuilder {
    profile: HwAccelProfile,
}

impl CommandBuilder {
    pub fn new(profile: HwAccelProfile) -> Self {
        Self { profile }
    }

    pub fn video(&self, p: &VideoParams<'_>) -> Vec<String> {
        let (Some(first), Some(last)) = (p.segments.first(), p.segments.last()) else {
            return Vec::new();
        };

        let mut args = base_args();

        if p.rendition.method != Method::DirectStream {
            args.extend(self.profile.decode_flags.iter().map(|&f| f.to_owned()));
        }

        args.extend([
            "-ss".to_owned(),
            format_time(first.start),
            "-i".to_owned(),
            p.input_url.to_owned(),
            "-to".to_owned(),
            format_time(last.end),
            "-copyts".to_owned(),
            "-start_at_zero".to_owned(),
            "-muxdelay".to_owned(),
            "0".to_owned(),
            "-map".to_owned(),
            format!("0:V:{}", p.stream_index),
        ]);

        args.extend(self.video_encode_args(p));

        let anchor = match (p.rendition.method, p.actual_seek_keyframe) {
            (Method::DirectStream, Some(keyframe)) => keyframe,
            _ => first.start,
        };

        args.extend(segment_muxer_args(p.segments, anchor, first.index, p.output_dir));

        args
    }

    fn video_encode_args(&self, p: &VideoParams<'_>) -> Vec<String> {
        if p.rendition.method == Method::DirectStream {
            return vec!["-c:v".to_owned(), "copy".to_owned()];
        }

        let mut args: Vec<String> = self
            .profile
            .encode_flags
            .iter()
            .map(|&f| f.to_owned())
            .collect();

        args.extend([
            "-vf".to_owned(),
            self.profile.scale_filter(p.rendition.width, p.rendition.height),
            "-b:v".to_owned(),
            p.rendition.bitrate.to_string(),
            "-maxrate".to_owned(),
            ((p.rendition.bitrate as f64 * 1.5) as u64).to_string(),
            "-bufsize".to_owned(),
            (p.rendition.bitrate * 5).to_string(),
            self.profile.keyframe_flag.to_owned(),
            format_keyframe_times(p.segments),
        ]);

        if self.profile.accelerator == Accelerator::Cuda {
            args.extend(["-forced-idr".to_owned(), "1".to_owned()]);
        }

        args
    }

    pub fn audio(&self, p: &AudioParams<'_>) -> Vec<String> {
        let (Some(first), Some(last)) = (p.segments.first(), p.segments.last()) else {
            return Vec::new();
        };

        let mut args = base_args();

        args.extend([
            "-ss".to_owned(),
            format_time(first.start),
            "-i".to_owned(),
            p.input_url.to_owned(),
            "-to".to_owned(),
            format_time(last.end),
            "-copyts".to_owned(),
            "-start_at_zero".to_owned(),
            "-muxdelay".to_owned(),
            "0".to_owned(),
            "-map".to_owned(),
            format!("0:a:{}", p.stream_index),
        ]);

        args.extend(audio_encode_args(p.rendition));

        args.extend(segment_muxer_args(p.segments, first.start, first.index, p.output_dir));

        args
    }
}

fn base_args() -> Vec<String> {
    ["-nostats", "-hide_banner", "-loglevel", "warning"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn audio_encode_args(rendition: &AudioRendition) -> Vec<String> {
    if rendition.method == Method::DirectStream {
        return vec!["-c:a".to_owned(), "copy".to_owned()];
    }

    vec![
        "-c:a".to_owned(),
        "aac".to_owned(),
        "-ac".to_owned(),
        rendition.channels.to_string(),
        "-b:a".to_owned(),
        rendition.bitrate.to_string(),
    ]
}

fn segment_muxer_args(
    segments: &[Segment],
    anchor: f64,
    start_index: usize,
    output_dir: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-f".to_owned(),
        "segment".to_owned(),
        "-segment_time_delta".to_owned(),
        "0.05".to_owned(),
        "-segment_format".to_owned(),
        "mpegts".to_owned(),
        "-segment_list_type".to_owned(),
        "flat".to_owned(),
        "-segment_list".to_owned(),
        "pipe:1".to_owned(),
        "-segment_start_number".to_owned(),
        start_index.to_string(),
    ];

    let times = format_segment_times(segments, anchor);
    if !times.is_empty() {
        args.extend(["-segment_times".to_owned(), times]);
    }

    args.push(
        output_dir
            .join("segment-%05d.ts")
            .to_string_lossy()
            .into_owned(),
    );

    args
}

/// Split times for all segments after the first, relative to the anchor.
fn format_segment_times(segments: &[Segment], anchor: f64) -> String {
    if segments.len() <= 1 {
        return String::new();
    }

    segments[1..]
        .iter()
        .map(|s| format_time(s.start - anchor))
        .collect::<Vec<_>>()
        .join(",")
}

/// Forced keyframe times for every segment boundary, relative to the seek
/// position, so re-encoded output splits exactly where the playlist says.
fn format_keyframe_times(segments: &[Segment]) -> String {
    let Some(first) = segments.first() else {
        return String::new();
    };

    segments
        .iter()
        .map(|s| format_time(s.start - first.start))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_time(seconds: f64) -> String {
    format!("{seconds:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(index: usize, start: f64, end: f64) -> Segment {
        Segment {
            index,
            start,
            end,
            duration: end - start,
        }
    }

    fn software_builder() -> CommandBuilder {
        CommandBuilder::new(HwAccelProfile::new(Accelerator::None))
    }

    fn video_rendition(method: Method) -> VideoRendition {
        VideoRendition {
            name: "720p".to_owned(),
            width: 1280,
            height: 720,
            bitrate: 2_000_000,
            method,
        }
    }

    #[test]
    fn transcode_video_includes_relative_segment_times() {
        let segments = [seg(0, 12.0, 18.5), seg(1, 18.5, 24.0), seg(2, 24.0, 30.0)];
        let rendition = video_rendition(Method::Transcode);

        let args = software_builder().video(&VideoParams {
            input_url: "input.mp4",
            stream_index: 0,
            rendition: &rendition,
            segments: &segments,
            output_dir: Path::new("/tmp/out"),
            actual_seek_keyframe: None,
        });

        let joined = args.join(" ");
        assert!(joined.contains("-ss 12.000000"), "{joined}");
        assert!(joined.contains("-to 30.000000"), "{joined}");
        assert!(joined.contains("-segment_times 6.500000,12.000000"), "{joined}");
        assert!(joined.contains("-vf scale=1280:720"), "{joined}");
        assert!(
            joined.contains("-force_key_frames 0.000000,6.500000,12.000000"),
            "{joined}"
        );
        assert!(joined.contains("-maxrate 3000000"), "{joined}");
        assert!(joined.contains("-bufsize 10000000"), "{joined}");
        assert!(joined.contains("-segment_start_number 0"), "{joined}");
        assert!(joined.ends_with("/tmp/out/segment-%05d.ts"), "{joined}");
    }

    #[test]
    fn direct_stream_video_copies_and_anchors_on_seek_keyframe() {
        let segments = [seg(5, 30.0, 36.0), seg(6, 36.0, 42.5)];
        let rendition = VideoRendition {
            name: "1080p".to_owned(),
            width: 1920,
            height: 1080,
            bitrate: 8_000_000,
            method: Method::DirectStream,
        };

        let args = software_builder().video(&VideoParams {
            input_url: "input.mp4",
            stream_index: 0,
            rendition: &rendition,
            segments: &segments,
            output_dir: Path::new("/tmp/out"),
            actual_seek_keyframe: Some(29.5),
        });

        let joined = args.join(" ");
        assert!(joined.contains("-c:v copy"), "{joined}");
        assert!(joined.contains("-segment_times 6.500000"), "{joined}");
        assert!(joined.contains("-segment_start_number 5"), "{joined}");
        assert!(!joined.contains("-force_key_frames"), "{joined}");
        // Stream copy never engages the decode pipeline.
        assert!(!joined.contains("-hwaccel"), "{joined}");
    }

    #[test]
    fn audio_transcode_and_copy_args() {
        let segments = [seg(0, 0.0, 5.0), seg(1, 5.0, 10.0)];

        let transcode = AudioRendition {
            name: "aac_stereo".to_owned(),
            codec: "aac".to_owned(),
            bitrate: 192_000,
            channels: 2,
            method: Method::Transcode,
        };
        let args = software_builder().audio(&AudioParams {
            input_url: "in.mkv",
            stream_index: 1,
            rendition: &transcode,
            segments: &segments,
            output_dir: Path::new("/tmp/a"),
        });
        let joined = args.join(" ");
        assert!(joined.contains("-map 0:a:1"), "{joined}");
        assert!(joined.contains("-c:a aac -ac 2 -b:a 192000"), "{joined}");
        assert!(joined.contains("-segment_times 5.000000"), "{joined}");

        let passthrough = AudioRendition {
            method: Method::DirectStream,
            ..transcode
        };
        let args = software_builder().audio(&AudioParams {
            input_url: "in.mkv",
            stream_index: 1,
            rendition: &passthrough,
            segments: &segments,
            output_dir: Path::new("/tmp/a"),
        });
        assert!(args.join(" ").contains("-c:a copy"));
    }

    #[test]
    fn cuda_transcode_appends_forced_idr() {
        let segments = [seg(0, 0.0, 6.0), seg(1, 6.0, 12.0)];
        let rendition = video_rendition(Method::Transcode);
        let builder = CommandBuilder::new(HwAccelProfile::new(Accelerator::Cuda));

        let args = builder.video(&VideoParams {
            input_url: "in.mkv",
            stream_index: 0,
            rendition: &rendition,
            segments: &segments,
            output_dir: Path::new("/tmp/v"),
            actual_seek_keyframe: None,
        });

        let joined = args.join(" ");
        assert!(joined.contains("-hwaccel cuda"), "{joined}");
        assert!(joined.contains("-force_idr 0.000000,6.000000"), "{joined}");
        assert!(joined.contains("-forced-idr 1"), "{joined}");
        assert!(joined.contains("-vf scale_cuda=1280:720:format=nv12"), "{joined}");
    }

    #[test]
    fn empty_segment_list_builds_no_command() {
        let rendition = video_rendition(Method::Transcode);
        let args = software_builder().video(&VideoParams {
            input_url: "in.mkv",
            stream_index: 0,
            rendition: &rendition,
            segments: &[],
            output_dir: Path::new("/tmp/v"),
            actual_seek_keyframe: None,
        });
        assert!(args.is_empty());
    }

    #[test]
    fn time_helpers_handle_edge_cases() {
        assert_eq!(format_segment_times(&[], 0.0), "");
        assert_eq!(format_keyframe_times(&[]), "");

        let segs = [seg(0, 5.0, 8.0), seg(1, 8.0, 11.0), seg(2, 11.0, 14.0)];
        assert_eq!(format_segment_times(&segs, 4.0), "4.000000,7.000000");
        assert_eq!(format_segment_times(&segs, segs[0].start), "3.000000,6.000000");
        assert_eq!(format_keyframe_times(&segs), "0.000000,3.000000,6.000000");
    }

    #[test]
    fn identical_inputs_build_identical_vectors() {
        let segments = [seg(0, 0.0, 6.0), seg(1, 6.0, 12.0)];
        let rendition = video_rendition(Method::Transcode);
        let params = VideoParams {
            input_url: "in.mkv",
            stream_index: 0,
            rendition: &rendition,
            segments: &segments,
            output_dir: Path::new("/tmp/v"),
            actual_seek_keyframe: None,
        };
        assert_eq!(software_builder().video(&params), software_builder().video(&params));
    }
}
