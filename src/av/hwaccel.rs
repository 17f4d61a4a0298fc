//! Hardware encoder detection. An accelerator counts as available only when
//! ffmpeg reports both the acceleration method and its H.264 encoder.

use std::collections::HashSet;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::domain::error::{Error, Result};
use crate::domain::hwaccel::{Accelerator, HwAccelProfile};

const KNOWN_ENCODERS: [&str; 4] = [
    "h264_nvenc",
    "h264_videotoolbox",
    "h264_vaapi",
    "h264_qsv",
];

/// Accelerators usable on this host, best-effort. `Accelerator::None` is
/// always included as the final fallback.
pub async fn detect() -> Result<Vec<Accelerator>> {
    let methods = hwaccel_methods().await?;
    let encoders = encoder_support().await?;

    let mut available = Vec::new();

    if methods.contains("cuda") && encoders.contains("h264_nvenc") {
        available.push(Accelerator::Cuda);
    }
    if methods.contains("videotoolbox") && encoders.contains("h264_videotoolbox") {
        available.push(Accelerator::VideoToolbox);
    }
    if methods.contains("vaapi") && encoders.contains("h264_vaapi") {
        available.push(Accelerator::Vaapi);
    }
    if methods.contains("qsv") && encoders.contains("h264_qsv") {
        available.push(Accelerator::Qsv);
    }

    available.push(Accelerator::None);

    Ok(available)
}

/// The preferred accelerator out of the available set.
pub fn select(available: &[Accelerator]) -> Accelerator {
    const PRIORITY: [Accelerator; 4] = [
        Accelerator::Cuda,
        Accelerator::Qsv,
        Accelerator::VideoToolbox,
        Accelerator::Vaapi,
    ];

    PRIORITY
        .into_iter()
        .find(|accel| available.contains(accel))
        .unwrap_or(Accelerator::None)
}

/// Detect, pick, and lock in a flag profile. Detection failures fall back to
/// software encoding.
pub async fn detect_best() -> HwAccelProfile {
    match detect().await {
        Ok(available) => {
            let chosen = select(&available);
            debug!(accelerator = %chosen, "hardware acceleration selected");
            HwAccelProfile::new(chosen)
        }
        Err(err) => {
            debug!(error = %err, "hardware detection failed, using software encoding");
            HwAccelProfile::new(Accelerator::None)
        }
    }
}

async fn hwaccel_methods() -> Result<HashSet<String>> {
    let output = run_ffmpeg_query("-hwaccels").await?;

    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(str::to_owned)
        .collect())
}

async fn encoder_support() -> Result<HashSet<String>> {
    let output = run_ffmpeg_query("-encoders").await?;

    let mut found = HashSet::new();
    for line in output.lines() {
        for encoder in KNOWN_ENCODERS {
            if line.contains(encoder) {
                found.insert(encoder.to_owned());
            }
        }
    }

    Ok(found)
}

async fn run_ffmpeg_query(flag: &str) -> Result<String> {
    let output = Command::new("ffmpeg")
        .arg(flag)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Encoder(format!("run ffmpeg {flag}: {e}")))?;

    if !output.status.success() {
        return Err(Error::Encoder(format!(
            "ffmpeg {flag} exited with {}",
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_follows_priority_order() {
        let available = [Accelerator::VideoToolbox, Accelerator::Cuda, Accelerator::None];
        assert_eq!(select(&available), Accelerator::Cuda);

        assert_eq!(select(&[Accelerator::Vaapi, Accelerator::None]), Accelerator::Vaapi);
        assert_eq!(
            select(&[Accelerator::Qsv, Accelerator::VideoToolbox]),
            Accelerator::Qsv
        );
        assert_eq!(select(&[Accelerator::None]), Accelerator::None);
        assert_eq!(select(&[]), Accelerator::None);
    }
}
