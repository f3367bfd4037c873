// crates/fmm-core/src/time.rs
//
// Millisecond/frame arithmetic shared across the model, timeline engine, and
// export renderer. All project time is integer milliseconds — this module is
// the single place that converts to/from frames, display strings, and the
// handful of timecode spellings a user might type into a "go to time" box.

use crate::error::ModelError;

/// Half-open tolerance used by the timeline engine when deciding whether a
/// playback position has crossed a clip boundary (§4.3).
pub const BOUNDARY_EPSILON_MS: i64 = 30;

/// Format `ms` as `MM:SS.mmm`, padding components as needed.
///
/// ```
/// use fmm_core::time::ms_to_display;
/// assert_eq!(ms_to_display(0), "00:00.000");
/// assert_eq!(ms_to_display(65_250), "01:05.250");
/// ```
pub fn ms_to_display(ms: i64) -> String {
    let ms = ms.max(0);
    let total_secs = ms / 1000;
    let millis = ms % 1000;
    let secs = total_secs % 60;
    let mins = total_secs / 60;
    format!("{mins:02}:{secs:02}.{millis:03}")
}

/// Format `ms` as SRT-exact `HH:MM:SS,mmm`.
///
/// ```
/// use fmm_core::time::ms_to_srt_time;
/// assert_eq!(ms_to_srt_time(3_725_040), "01:02:05,040");
/// ```
pub fn ms_to_srt_time(ms: i64) -> String {
    let ms = ms.max(0);
    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{mins:02}:{secs:02},{millis:03}")
}

/// Convert a millisecond position to a frame number at `fps`, rounding to
/// the nearest frame. `fps <= 0.0` maps everything to frame 0.
pub fn ms_to_frame(ms: i64, fps: f64) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    (ms as f64 * fps / 1000.0).round() as i64
}

/// Convert a frame number back to milliseconds at `fps`.
pub fn frame_to_ms(frame: i64, fps: f64) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    (frame as f64 * 1000.0 / fps).round() as i64
}

/// Snap `ms` to the nearest frame boundary at `fps`. Identity when `fps == 0`.
pub fn snap_to_frame(ms: i64, fps: f64) -> i64 {
    if fps <= 0.0 {
        return ms;
    }
    frame_to_ms(ms_to_frame(ms, fps), fps)
}

/// Parse a flexible timecode string into milliseconds.
///
/// Accepted forms:
///   - `MM:SS.mmm`
///   - `HH:MM:SS.mmm`
///   - `HH:MM:SS:FF` (frames, converted via `fps`)
///   - `F:<n>` or `frame:<n>` (direct frame number)
pub fn parse_flexible_timecode(text: &str, fps: f64) -> Result<i64, ModelError> {
    let t = text.trim();
    let bad = || ModelError::InvalidTimecode {
        token: text.to_string(),
        expected: "MM:SS.mmm | HH:MM:SS.mmm | HH:MM:SS:FF | F:<n> | frame:<n>".to_string(),
    };

    let lower = t.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("f:").or_else(|| lower.strip_prefix("frame:")) {
        let frame: i64 = rest.trim().parse().map_err(|_| bad())?;
        return Ok(frame_to_ms(frame, fps));
    }

    let parts: Vec<&str> = t.split(':').collect();
    match parts.as_slice() {
        // MM:SS.mmm
        [mm, ss] => {
            let mins: i64 = mm.parse().map_err(|_| bad())?;
            let secs_f: f64 = ss.parse().map_err(|_| bad())?;
            if secs_f < 0.0 {
                return Err(bad());
            }
            Ok(mins * 60_000 + (secs_f * 1000.0).round() as i64)
        }
        // HH:MM:SS.mmm  or  HH:MM:SS:FF
        [hh, mm, last] => {
            let hours: i64 = hh.parse().map_err(|_| bad())?;
            let mins: i64 = mm.parse().map_err(|_| bad())?;
            let secs_f: f64 = last.parse().map_err(|_| bad())?;
            if secs_f < 0.0 {
                return Err(bad());
            }
            Ok(hours * 3_600_000 + mins * 60_000 + (secs_f * 1000.0).round() as i64)
        }
        [hh, mm, ss, ff] => {
            let hours: i64 = hh.parse().map_err(|_| bad())?;
            let mins: i64 = mm.parse().map_err(|_| bad())?;
            let secs: i64 = ss.parse().map_err(|_| bad())?;
            let frames: i64 = ff.parse().map_err(|_| bad())?;
            let base_ms = hours * 3_600_000 + mins * 60_000 + secs * 1000;
            Ok(base_ms + frame_to_ms(frames, fps))
        }
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(ms_to_display(0), "00:00.000");
        assert_eq!(ms_to_display(65_250), "01:05.250");
    }

    #[test]
    fn srt_formats() {
        assert_eq!(ms_to_srt_time(3_725_040), "01:02:05,040");
        assert_eq!(ms_to_srt_time(0), "00:00:00,000");
    }

    #[test]
    fn frame_roundtrip_within_one_frame() {
        for fps in [24.0, 25.0, 30.0, 60.0, 120.0] {
            for x in [0i64, 1, 500, 1001, 3_723_456, 59_999] {
                let frame = ms_to_frame(x, fps);
                let back = frame_to_ms(frame, fps);
                let frame_ms = (1000.0 / fps).ceil() as i64 + 1;
                assert!(
                    (back - x).abs() <= frame_ms,
                    "fps={fps} x={x} back={back}"
                );
            }
        }
    }

    #[test]
    fn snap_identity_when_fps_zero() {
        assert_eq!(snap_to_frame(12345, 0.0), 12345);
    }

    #[test]
    fn flexible_timecode_s4() {
        // HH:MM:SS:FF = 1h 23m 45s + 15 frames @ 30fps (500ms) = 5_025_500ms.
        assert_eq!(parse_flexible_timecode("01:23:45:15", 30.0).unwrap(), 5_025_500);
        assert_eq!(parse_flexible_timecode("F:90", 30.0).unwrap(), 3_000);
        assert!(parse_flexible_timecode("bad", 30.0).is_err());
    }

    #[test]
    fn flexible_timecode_other_forms() {
        assert_eq!(parse_flexible_timecode("01:30.500", 30.0).unwrap(), 90_500);
        assert_eq!(parse_flexible_timecode("00:01:30.500", 30.0).unwrap(), 90_500);
        assert_eq!(parse_flexible_timecode("frame:60", 30.0).unwrap(), 2_000);
    }
}
