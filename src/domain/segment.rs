//! Deterministic segmentation of a source timeline.
//!
//! Segment boundaries always coincide with keyframes, so the list is a pure
//! function of `(keyframes, duration, target_duration)`: the playlist
//! emitter and the transcoding pool must derive identical lists.

use crate::domain::types::Segment;

/// Keyframes this close to a target count as "at or before" it.
const KEYFRAME_TOLERANCE: f64 = 1e-3;

/// When the matched keyframe is within this window of the target, prefer the
/// previous keyframe. Guards against seeking onto the boundary keyframe and
/// producing an empty first segment.
const PREFER_PREVIOUS_WINDOW: f64 = 1e-2;

/// Split the timeline into contiguous segments.
///
/// A moving cursor starts at `keyframes[0]`; the first later keyframe at
/// least `target_duration` away closes a segment. Whatever remains before
/// `duration` becomes one final tail segment.
pub fn segments(keyframes: &[f64], duration: f64, target_duration: f64) -> Vec<Segment> {
    let Some(&first) = keyframes.first() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut start = first;
    let mut index = 0usize;

    for &keyframe in &keyframes[1..] {
        if keyframe - start >= target_duration {
            out.push(Segment {
                index,
                start,
                end: keyframe,
                duration: keyframe - start,
            });
            start = keyframe;
            index += 1;
        }
    }

    if start < duration {
        out.push(Segment {
            index,
            start,
            end: duration,
            duration: duration - start,
        });
    }

    out
}

/// The full segment list filtered to the inclusive index range
/// `[start_index, end_index]`. Workers use this so a batch is always a slice
/// of the list the playlist advertises.
pub fn segments_in_range(
    keyframes: &[f64],
    duration: f64,
    target_duration: f64,
    start_index: usize,
    end_index: usize,
) -> Vec<Segment> {
    segments(keyframes, duration, target_duration)
        .into_iter()
        .filter(|s| s.index >= start_index && s.index <= end_index)
        .collect()
}

/// The greatest keyframe at or before `target` (within tolerance), falling
/// back to the previous keyframe when the match lands on `target` itself.
pub fn nearest_keyframe(keyframes: &[f64], target: f64) -> f64 {
    let mut found: Option<f64> = None;
    let mut previous: Option<f64> = None;

    for &keyframe in keyframes {
        if keyframe > target + KEYFRAME_TOLERANCE {
            break;
        }
        previous = found;
        found = Some(keyframe);
    }

    let Some(found) = found else {
        return 0.0;
    };

    match previous {
        Some(previous) if target - found < PREFER_PREVIOUS_WINDOW => previous,
        _ => found,
    }
}
