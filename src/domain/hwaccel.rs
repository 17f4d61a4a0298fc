//! Hardware acceleration profiles: per-backend ffmpeg flag sets.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    None,
    Cuda,
    VideoToolbox,
    Vaapi,
    Qsv,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accelerator::None => f.write_str("none"),
            Accelerator::Cuda => f.write_str("cuda"),
            Accelerator::VideoToolbox => f.write_str("videotoolbox"),
            Accelerator::Vaapi => f.write_str("vaapi"),
            Accelerator::Qsv => f.write_str("qsv"),
        }
    }
}

/// ffmpeg flag profile for one acceleration backend.
#[derive(Debug, Clone)]
pub struct HwAccelProfile {
    pub accelerator: Accelerator,
    pub decode_flags: &'static [&'static str],
    pub encode_flags: &'static [&'static str],
    pub encoder: &'static str,
    pub keyframe_flag: &'static str,
}

impl HwAccelProfile {
    pub fn new(accelerator: Accelerator) -> Self {
        match accelerator {
            Accelerator::Cuda => Self {
                accelerator,
                decode_flags: &["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"],
                encode_flags: &["-c:v", "h264_nvenc", "-preset", "p4", "-tune", "ll"],
                encoder: "h264_nvenc",
                keyframe_flag: "-force_idr",
            },
            Accelerator::VideoToolbox => Self {
                accelerator,
                decode_flags: &["-hwaccel", "videotoolbox"],
                encode_flags: &[
                    "-c:v",
                    "h264_videotoolbox",
                    "-realtime",
                    "true",
                    "-prio_speed",
                    "true",
                ],
                encoder: "h264_videotoolbox",
                keyframe_flag: "-force_key_frames",
            },
            Accelerator::Vaapi => Self {
                accelerator,
                decode_flags: &["-hwaccel", "vaapi", "-vaapi_device", "/dev/dri/renderD128"],
                encode_flags: &["-c:v", "h264_vaapi"],
                encoder: "h264_vaapi",
                keyframe_flag: "-force_key_frames",
            },
            Accelerator::Qsv => Self {
                accelerator,
                decode_flags: &["-hwaccel", "qsv", "-hwaccel_output_format", "qsv"],
                encode_flags: &["-c:v", "h264_qsv", "-preset", "veryfast"],
                encoder: "h264_qsv",
                keyframe_flag: "-force_key_frames",
            },
            Accelerator::None => Self {
                accelerator,
                decode_flags: &[],
                encode_flags: &["-c:v", "libx264", "-preset", "ultrafast"],
                encoder: "libx264",
                keyframe_flag: "-force_key_frames",
            },
        }
    }

    /// Scale filter expression for the backend's pixel pipeline.
    pub fn scale_filter(&self, width: u32, height: u32) -> String {
        match self.accelerator {
            Accelerator::Cuda => format!("scale_cuda={width}:{height}:format=nv12"),
            Accelerator::Vaapi => format!("scale_vaapi={width}:{height}:format=nv12"),
            Accelerator::Qsv => format!("scale_qsv={width}:{height}:format=nv12"),
            Accelerator::VideoToolbox | Accelerator::None => format!("scale={width}:{height}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qsv_profile_uses_qsv_encoder() {
        let profile = HwAccelProfile::new(Accelerator::Qsv);
        assert!(profile.encode_flags.contains(&"h264_qsv"));
        assert_eq!(profile.scale_filter(1280, 720), "scale_qsv=1280:720:format=nv12");
    }

    #[test]
    fn software_profile_falls_back_to_libx264() {
        let profile = HwAccelProfile::new(Accelerator::None);
        assert_eq!(profile.encoder, "libx264");
        assert!(profile.encode_flags.contains(&"ultrafast"));
        assert!(profile.decode_flags.is_empty());
        assert_eq!(profile.scale_filter(640, 360), "scale=640:360");
    }

    #[test]
    fn cuda_profile_forces_idr_keyframes() {
        let profile = HwAccelProfile::new(Accelerator::Cuda);
        assert_eq!(profile.keyframe_flag, "-force_idr");
        assert_eq!(profile.scale_filter(1920, 1080), "scale_cuda=1920:1080:format=nv12");
    }
}
