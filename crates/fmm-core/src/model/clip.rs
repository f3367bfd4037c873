// crates/fmm-core/src/model/clip.rs
//
// VideoClip / VideoClipTrack — the output timeline. `offsets` is the
// memoized prefix-sum array from spec §3: `offsets[i]` is clip `i`'s start
// on the output timeline. Every mutator rebuilds it atomically so it never
// observably diverges from `clips`.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
    CircleOpen,
    CircleClose,
}

impl TransitionKind {
    /// The literal `xfade=transition=<kind>` token FFmpeg expects.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipeleft",
            TransitionKind::WipeRight => "wiperight",
            TransitionKind::WipeUp => "wipeup",
            TransitionKind::WipeDown => "wipedown",
            TransitionKind::SlideLeft => "slideleft",
            TransitionKind::SlideRight => "slideright",
            TransitionKind::CircleOpen => "circleopen",
            TransitionKind::CircleClose => "circleclose",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub duration_ms: i64,
    pub audio_crossfade: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TrimSide {
    #[default]
    Start,
    End,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub source_in_ms: i64,
    pub source_out_ms: i64,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub brightness: Option<f32>,
    #[serde(default)]
    pub contrast: Option<f32>,
    #[serde(default)]
    pub saturation: Option<f32>,
    #[serde(default)]
    pub transition: Option<Transition>,
}

impl VideoClip {
    pub fn new(source_in_ms: i64, source_out_ms: i64) -> Self {
        Self {
            source_in_ms,
            source_out_ms,
            source_path: None,
            brightness: None,
            contrast: None,
            saturation: None,
            transition: None,
        }
    }

    pub fn source_duration_ms(&self) -> i64 {
        self.source_out_ms - self.source_in_ms
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.source_in_ms < 0 || self.source_in_ms >= self.source_out_ms {
            return Err(ModelError::OutOfRange(format!(
                "clip in={} out={} violates 0 <= in < out",
                self.source_in_ms, self.source_out_ms
            )));
        }
        if let Some(t) = &self.transition {
            if t.duration_ms < 0 || t.duration_ms > self.source_duration_ms() {
                return Err(ModelError::OutOfRange(format!(
                    "transition duration {}ms exceeds clip duration {}ms",
                    t.duration_ms,
                    self.source_duration_ms()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VideoClipTrack {
    pub clips: Vec<VideoClip>,
    #[serde(skip)]
    offsets: Vec<i64>,
}

impl VideoClipTrack {
    pub fn new() -> Self {
        Self {
            clips: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Output-timeline contribution of `clips[i]`: its full source duration,
    /// minus its outgoing transition's duration (transitions collapse the
    /// boundary overlap — the final clip's transition field, if any, is
    /// ignored since there is no following clip to overlap with).
    fn clip_output_duration(&self, i: usize) -> i64 {
        let clip = &self.clips[i];
        let dur = clip.source_duration_ms();
        if i + 1 < self.clips.len() {
            if let Some(t) = &clip.transition {
                return (dur - t.duration_ms).max(0);
            }
        }
        dur
    }

    /// Rebuild the prefix-sum array. Called by every mutator before it
    /// returns, so `offsets` never observably diverges from `clips`.
    fn rebuild_offsets(&mut self) {
        let mut offsets = Vec::with_capacity(self.clips.len() + 1);
        let mut acc = 0i64;
        offsets.push(0);
        for i in 0..self.clips.len() {
            acc += self.clip_output_duration(i);
            offsets.push(acc);
        }
        self.offsets = offsets;
    }

    pub fn total_duration_ms(&self) -> i64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// O(1): the output-timeline start of `clips[i]`.
    pub fn clip_timeline_start(&self, i: usize) -> Result<i64, ModelError> {
        self.offsets.get(i).copied().ok_or(ModelError::NotFound(i))
    }

    /// O(log n): binary-search the prefix sum for the clip containing `t`.
    pub fn clip_at_timeline(&self, t: i64) -> Result<(usize, &VideoClip, i64), ModelError> {
        if self.clips.is_empty() || t < 0 || t >= self.total_duration_ms() {
            return Err(ModelError::OutOfRange(format!(
                "timeline position {t} outside [0, {})",
                self.total_duration_ms()
            )));
        }
        let idx = self.offsets.partition_point(|&o| o <= t) - 1;
        let local_offset = t - self.offsets[idx];
        Ok((idx, &self.clips[idx], local_offset))
    }

    /// Reverse mapping: the first timeline position that plays source frame
    /// `(path, source_ms)`. `hint_idx` disambiguates when the same source
    /// file is used by more than one clip.
    pub fn source_to_timeline(
        &self,
        path: &str,
        source_ms: i64,
        hint_idx: Option<usize>,
    ) -> Result<i64, ModelError> {
        let matches = |i: usize| -> bool {
            let c = &self.clips[i];
            c.source_path.as_deref().unwrap_or("") == path
                && source_ms >= c.source_in_ms
                && source_ms < c.source_out_ms
        };

        if let Some(i) = hint_idx {
            if self.clips.get(i).is_none() || !matches(i) {
                return Err(ModelError::OutOfRange(format!(
                    "hint_idx {i} does not contain source_ms {source_ms} of '{path}'"
                )));
            }
            return Ok(self.offsets[i] + (source_ms - self.clips[i].source_in_ms));
        }

        let mut found: Option<usize> = None;
        for i in 0..self.clips.len() {
            if matches(i) {
                if found.is_some() {
                    return Err(ModelError::AmbiguousSource {
                        path: path.to_string(),
                        source_ms,
                    });
                }
                found = Some(i);
            }
        }
        let i = found.ok_or_else(|| {
            ModelError::OutOfRange(format!("no clip plays '{path}' at source_ms {source_ms}"))
        })?;
        Ok(self.offsets[i] + (source_ms - self.clips[i].source_in_ms))
    }

    pub fn add_clip(&mut self, clip: VideoClip) -> Result<usize, ModelError> {
        clip.validate()?;
        self.clips.push(clip);
        self.rebuild_offsets();
        Ok(self.clips.len() - 1)
    }

    pub fn remove_clip(&mut self, i: usize) -> Result<VideoClip, ModelError> {
        if i >= self.clips.len() {
            return Err(ModelError::NotFound(i));
        }
        // Clearing the predecessor's transition avoids silently collapsing a
        // boundary that no longer exists once `i` is gone.
        if i > 0 {
            self.clips[i - 1].transition = None;
        }
        let removed = self.clips.remove(i);
        self.rebuild_offsets();
        Ok(removed)
    }

    /// Split the clip at timeline position `t` into two adjacent clips over
    /// the same source, each covering its half of the original source range.
    /// Any transition on the original clip moves to the second half.
    pub fn split_clip_at_timeline(&mut self, t: i64) -> Result<usize, ModelError> {
        let (idx, clip, local_offset) = self.clip_at_timeline(t)?;
        if local_offset <= 0 {
            return Err(ModelError::OutOfRange(
                "split point falls on a clip boundary, not inside a clip".to_string(),
            ));
        }
        let split_source_ms = clip.source_in_ms + local_offset;
        let mut first = clip.clone();
        let mut second = clip.clone();
        first.source_out_ms = split_source_ms;
        first.transition = None;
        second.source_in_ms = split_source_ms;

        self.clips[idx] = first;
        self.clips.insert(idx + 1, second);
        self.rebuild_offsets();
        Ok(idx + 1)
    }

    /// Trim the in- or out-point of `clips[i]` by `delta_ms`. Positive
    /// `delta_ms` shortens the clip from that edge; negative extends it
    /// (bounded only by the other edge — extending past original source
    /// bounds is the caller's responsibility to validate against media
    /// duration, which this module does not know).
    pub fn trim_clip_edge(
        &mut self,
        i: usize,
        side: TrimSide,
        delta_ms: i64,
    ) -> Result<(), ModelError> {
        let clip = self.clips.get(i).ok_or(ModelError::NotFound(i))?;
        let mut trimmed = clip.clone();
        match side {
            TrimSide::Start => trimmed.source_in_ms += delta_ms,
            TrimSide::End => trimmed.source_out_ms -= delta_ms,
        }
        trimmed.validate()?;
        self.clips[i] = trimmed;
        self.rebuild_offsets();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(path: &str, in_ms: i64, out_ms: i64) -> VideoClip {
        let mut c = VideoClip::new(in_ms, out_ms);
        c.source_path = Some(path.to_string());
        c
    }

    /// S1 — multi-source timeline mapping.
    #[test]
    fn s1_multi_source_mapping() {
        let mut t = VideoClipTrack::new();
        t.add_clip(clip("A.mp4", 0, 10_000)).unwrap();
        t.add_clip(clip("B.mp4", 0, 5_000)).unwrap();
        t.add_clip(clip("A.mp4", 10_000, 20_000)).unwrap();

        assert_eq!(t.total_duration_ms(), 25_000);

        let (i, _c, off) = t.clip_at_timeline(0).unwrap();
        assert_eq!((i, off), (0, 0));

        let (i, _c, off) = t.clip_at_timeline(10_000).unwrap();
        assert_eq!((i, off), (1, 0));

        let (i, _c, off) = t.clip_at_timeline(14_999).unwrap();
        assert_eq!((i, off), (1, 4999));

        let (i, _c, off) = t.clip_at_timeline(15_000).unwrap();
        assert_eq!((i, off), (2, 0));

        let pos = t.source_to_timeline("A.mp4", 10_500, Some(2)).unwrap();
        assert_eq!(pos, 15_500);
    }

    #[test]
    fn ambiguous_source_without_hint() {
        let mut t = VideoClipTrack::new();
        t.add_clip(clip("A.mp4", 0, 10_000)).unwrap();
        t.add_clip(clip("A.mp4", 10_000, 20_000)).unwrap();
        // 10_500 only matches clip 1, so it should resolve without a hint.
        assert!(t.source_to_timeline("A.mp4", 10_500, None).is_ok());
    }

    #[test]
    fn offsets_monotone_after_mutations() {
        let mut t = VideoClipTrack::new();
        t.add_clip(clip("A.mp4", 0, 3000)).unwrap();
        t.add_clip(clip("B.mp4", 0, 2000)).unwrap();
        t.add_clip(clip("C.mp4", 0, 4000)).unwrap();
        t.split_clip_at_timeline(4000).unwrap();
        t.remove_clip(0).unwrap();

        let mut prev = 0;
        for w in [t.clip_timeline_start(0).unwrap()] {
            assert!(w >= prev);
            prev = w;
        }
        assert_eq!(
            t.total_duration_ms(),
            t.clips.iter().map(|c| c.source_duration_ms()).sum::<i64>()
        );
    }

    #[test]
    fn transition_collapses_boundary() {
        let mut t = VideoClipTrack::new();
        let mut a = clip("A.mp4", 0, 5000);
        a.transition = Some(Transition {
            kind: TransitionKind::Fade,
            duration_ms: 1000,
            audio_crossfade: true,
        });
        t.add_clip(a).unwrap();
        t.add_clip(clip("B.mp4", 0, 3000)).unwrap();
        // 5000 + 3000 - 1000 overlap
        assert_eq!(t.total_duration_ms(), 7000);
    }
}
