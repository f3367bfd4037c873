// crates/fmm-core/src/timeline.rs
//
// The coordinate engine that maps between output-timeline time and
// (clip index, source time). `VideoClipTrack` already holds the
// prefix-sum data; this module wraps it with a playback cursor so
// advancing by wallclock doesn't have to re-derive the clip index from
// `source_ms` alone — two clips can share a source file, and reverse
// mapping would then pick the wrong one.

use crate::error::ModelError;
use crate::model::clip::VideoClipTrack;

/// Tolerance for detecting that playback has crossed into the next clip.
/// Without it, a player ticking in frame-sized steps could land exactly on
/// a boundary and, due to float/ms rounding upstream, read as still inside
/// the previous clip.
pub const BOUNDARY_EPSILON_MS: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorPosition {
    pub timeline_ms: i64,
    pub clip_index: usize,
    pub source_ms: i64,
}

/// Holds the current playback position. `advance`/`seek` are the only ways
/// to move it, so the cursor can never silently desync from the clip track
/// it was built against.
#[derive(Clone, Debug)]
pub struct TimelineCursor {
    timeline_ms: i64,
    clip_index: usize,
    source_ms: i64,
}

impl TimelineCursor {
    pub fn at_start(track: &VideoClipTrack) -> Result<Self, ModelError> {
        if track.clips.is_empty() {
            return Ok(Self {
                timeline_ms: 0,
                clip_index: 0,
                source_ms: 0,
            });
        }
        let (idx, clip, local) = track.clip_at_timeline(0)?;
        Ok(Self {
            timeline_ms: 0,
            clip_index: idx,
            source_ms: clip.source_in_ms + local,
        })
    }

    pub fn position(&self) -> CursorPosition {
        CursorPosition {
            timeline_ms: self.timeline_ms,
            clip_index: self.clip_index,
            source_ms: self.source_ms,
        }
    }

    /// A user seek always re-derives the cursor from scratch via the
    /// prefix-sum lookup — seeks are not required to be small, so there is
    /// no continuity to preserve.
    pub fn seek(&mut self, track: &VideoClipTrack, timeline_ms: i64) -> Result<CursorPosition, ModelError> {
        if track.clips.is_empty() {
            self.timeline_ms = timeline_ms.max(0);
            self.clip_index = 0;
            self.source_ms = self.timeline_ms;
            return Ok(self.position());
        }
        let (idx, clip, local) = track.clip_at_timeline(timeline_ms)?;
        self.timeline_ms = timeline_ms;
        self.clip_index = idx;
        self.source_ms = clip.source_in_ms + local;
        Ok(self.position())
    }

    /// Advance the cursor by `delta_ms` of wallclock, without a full
    /// prefix-sum re-lookup in the common case: if the new timeline position
    /// still falls within `[clip start, clip start + epsilon-adjusted end)`
    /// of the current clip, the cursor advances `source_ms` directly.
    /// Otherwise it falls back to `seek`, which always correctly resolves
    /// the new clip even when a source file repeats across clips.
    pub fn advance(&mut self, track: &VideoClipTrack, delta_ms: i64) -> Result<CursorPosition, ModelError> {
        if track.clips.is_empty() {
            self.timeline_ms = (self.timeline_ms + delta_ms).max(0);
            self.source_ms = self.timeline_ms;
            return Ok(self.position());
        }

        let new_timeline_ms = self.timeline_ms + delta_ms;
        let clip_start = track.clip_timeline_start(self.clip_index)?;
        let clip_end = track.clip_timeline_start(self.clip_index + 1).unwrap_or_else(|_| track.total_duration_ms());

        if new_timeline_ms >= clip_start - BOUNDARY_EPSILON_MS
            && new_timeline_ms < clip_end - BOUNDARY_EPSILON_MS
        {
            let clip = &track.clips[self.clip_index];
            self.source_ms = clip.source_in_ms + (new_timeline_ms - clip_start).max(0);
            self.timeline_ms = new_timeline_ms;
            return Ok(self.position());
        }

        self.seek(track, new_timeline_ms)
    }
}

/// The host-facing timeline facade named in spec §6: `clip_at(t)` and
/// `source_to_timeline(path, ms, hint_idx?)` over whichever clip track the
/// project currently holds. With no clip track the output timeline is
/// simply the primary video's own time, 1:1.
pub struct Timeline<'a> {
    track: Option<&'a VideoClipTrack>,
}

impl<'a> Timeline<'a> {
    pub fn new(track: Option<&'a VideoClipTrack>) -> Self {
        Self { track }
    }

    pub fn total_duration_ms(&self, primary_video_duration_ms: i64) -> i64 {
        match self.track {
            Some(t) => t.total_duration_ms(),
            None => primary_video_duration_ms,
        }
    }

    pub fn clip_at(&self, t: i64) -> Option<(usize, i64)> {
        self.track
            .and_then(|track| track.clip_at_timeline(t).ok())
            .map(|(idx, _clip, local)| (idx, local))
    }

    pub fn source_to_timeline(
        &self,
        path: &str,
        source_ms: i64,
        hint_idx: Option<usize>,
    ) -> Result<i64, ModelError> {
        match self.track {
            Some(t) => t.source_to_timeline(path, source_ms, hint_idx),
            None => Ok(source_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::clip::VideoClip;

    fn clip(path: &str, in_ms: i64, out_ms: i64) -> VideoClip {
        let mut c = VideoClip::new(in_ms, out_ms);
        c.source_path = Some(path.to_string());
        c
    }

    fn sample_track() -> VideoClipTrack {
        let mut t = VideoClipTrack::new();
        t.add_clip(clip("A.mp4", 0, 10_000)).unwrap();
        t.add_clip(clip("B.mp4", 0, 5_000)).unwrap();
        t.add_clip(clip("A.mp4", 10_000, 20_000)).unwrap();
        t
    }

    #[test]
    fn cursor_advances_within_clip() {
        let track = sample_track();
        let mut cursor = TimelineCursor::at_start(&track).unwrap();
        let pos = cursor.advance(&track, 4_000).unwrap();
        assert_eq!(pos.clip_index, 0);
        assert_eq!(pos.source_ms, 4_000);
    }

    #[test]
    fn cursor_crosses_boundary_correctly_with_repeated_source() {
        // Advancing across the B -> second-A boundary must resolve to clip
        // index 2, not accidentally re-match clip 0 just because both share
        // "A.mp4" as the source path.
        let track = sample_track();
        let mut cursor = TimelineCursor::at_start(&track).unwrap();
        cursor.seek(&track, 14_900).unwrap();
        let pos = cursor.advance(&track, 200).unwrap();
        assert_eq!(pos.clip_index, 2);
        assert_eq!(pos.source_ms, 10_100);
    }

    #[test]
    fn timeline_without_clip_track_is_identity() {
        let tl = Timeline::new(None);
        assert_eq!(tl.total_duration_ms(60_000), 60_000);
        assert_eq!(tl.source_to_timeline("primary", 5_000, None).unwrap(), 5_000);
    }

    #[test]
    fn timeline_facade_delegates_to_track() {
        let track = sample_track();
        let tl = Timeline::new(Some(&track));
        assert_eq!(tl.total_duration_ms(0), 25_000);
        let (idx, local) = tl.clip_at(15_000).unwrap();
        assert_eq!((idx, local), (2, 0));
    }
}
