// crates/fmm-core/src/model/subtitle.rs
//
// SubtitleSegment / SubtitleTrack — the sorted, disjoint interval sequence
// that carries caption text. All mutating operations either fully apply or
// leave the track untouched; none leave a partially-applied state on error.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::style::SubtitleStyle;

/// Adjacent segments within this gap (ms) can be merged with `merge_segments`.
pub const MERGE_GAP_MS: i64 = 500;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    #[serde(default)]
    pub style: Option<SubtitleStyle>,
    #[serde(default)]
    pub audio_file: Option<String>,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl SubtitleSegment {
    pub fn new(start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            style: None,
            audio_file: None,
            volume: 1.0,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.start_ms < 0 || self.start_ms >= self.end_ms {
            return Err(ModelError::OutOfRange(format!(
                "segment start_ms={} end_ms={} violates 0 <= start < end",
                self.start_ms, self.end_ms
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub name: String,
    pub language: String,
    pub segments: Vec<SubtitleSegment>,
    #[serde(default)]
    pub audio_path: Option<String>,
    #[serde(default)]
    pub audio_start_ms: i64,
    #[serde(default)]
    pub audio_duration_ms: i64,
}

impl SubtitleTrack {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            segments: Vec::new(),
            audio_path: None,
            audio_start_ms: 0,
            audio_duration_ms: 0,
        }
    }

    /// Binary search for the segment containing `ms` (half-open on end). O(log n).
    pub fn segment_at(&self, ms: i64) -> Option<&SubtitleSegment> {
        let idx = self
            .segments
            .partition_point(|s| s.start_ms <= ms)
            .checked_sub(1)?;
        let seg = &self.segments[idx];
        if ms < seg.end_ms {
            Some(seg)
        } else {
            None
        }
    }

    /// True when `[start, end)` does not collide with any segment other than
    /// (optionally) the one at `ignore_index`.
    fn fits(&self, start: i64, end: i64, ignore_index: Option<usize>) -> bool {
        self.segments.iter().enumerate().all(|(i, s)| {
            Some(i) == ignore_index || end <= s.start_ms || start >= s.end_ms
        })
    }

    /// Insert into sorted order. Fails with `Overlap` if a collision exists.
    /// Returns the insertion index.
    pub fn add_segment(&mut self, seg: SubtitleSegment) -> Result<usize, ModelError> {
        seg.validate()?;
        if !self.fits(seg.start_ms, seg.end_ms, None) {
            return Err(ModelError::Overlap);
        }
        let idx = self.segments.partition_point(|s| s.start_ms < seg.start_ms);
        self.segments.insert(idx, seg);
        Ok(idx)
    }

    pub fn remove_segment(&mut self, index: usize) -> Result<SubtitleSegment, ModelError> {
        if index >= self.segments.len() {
            return Err(ModelError::NotFound(index));
        }
        Ok(self.segments.remove(index))
    }

    /// Shift segment `index` by `delta_ms`, clamped to `[0, duration]` and
    /// rejected atomically if it would overlap a neighbor.
    pub fn move_segment(
        &mut self,
        index: usize,
        delta_ms: i64,
        duration_ms: i64,
    ) -> Result<(), ModelError> {
        let seg = self
            .segments
            .get(index)
            .ok_or(ModelError::NotFound(index))?;

        let span = seg.duration_ms();
        let mut new_start = seg.start_ms + delta_ms;
        new_start = new_start.max(0).min((duration_ms - span).max(0));
        let new_end = new_start + span;

        if !self.fits(new_start, new_end, Some(index)) {
            return Err(ModelError::Overlap);
        }

        let seg = &mut self.segments[index];
        seg.start_ms = new_start;
        seg.end_ms = new_end;
        self.resort();
        Ok(())
    }

    /// Split segment `index` at `at_ms` into two, copying style and the
    /// audio_file reference to both halves. Fails if `at_ms` is not strictly
    /// inside the segment.
    pub fn split_segment(&mut self, index: usize, at_ms: i64) -> Result<usize, ModelError> {
        let seg = self
            .segments
            .get(index)
            .ok_or(ModelError::NotFound(index))?
            .clone();

        if at_ms <= seg.start_ms || at_ms >= seg.end_ms {
            return Err(ModelError::OutOfRange(format!(
                "split point {at_ms} not strictly inside [{}, {})",
                seg.start_ms, seg.end_ms
            )));
        }

        let first = SubtitleSegment {
            start_ms: seg.start_ms,
            end_ms: at_ms,
            text: seg.text.clone(),
            style: seg.style.clone(),
            audio_file: seg.audio_file.clone(),
            volume: seg.volume,
        };
        let second = SubtitleSegment {
            start_ms: at_ms,
            end_ms: seg.end_ms,
            text: seg.text,
            style: seg.style,
            audio_file: seg.audio_file,
            volume: seg.volume,
        };

        self.segments[index] = first;
        self.segments.insert(index + 1, second);
        Ok(index + 1)
    }

    /// Merge the adjacent pair `(i, i+1)` into one segment spanning both,
    /// with text `"{a}\n{b}"`. Requires a gap `<= MERGE_GAP_MS`.
    pub fn merge_segments(&mut self, i: usize) -> Result<(), ModelError> {
        let j = i + 1;
        if j >= self.segments.len() {
            return Err(ModelError::NotFound(j));
        }
        let gap = self.segments[j].start_ms - self.segments[i].end_ms;
        if !(0..=MERGE_GAP_MS).contains(&gap) {
            return Err(ModelError::OutOfRange(format!(
                "gap {gap}ms between segments {i} and {j} exceeds MERGE_GAP_MS"
            )));
        }

        let b = self.segments.remove(j);
        let a = &mut self.segments[i];
        a.end_ms = b.end_ms;
        a.text = format!("{}\n{}", a.text, b.text);
        Ok(())
    }

    /// Shift every segment in `indices` by `delta_ms`. All-or-nothing: if the
    /// result would create any overlap (with each other or with an
    /// unaffected segment), nothing is changed.
    pub fn batch_shift(&mut self, indices: &[usize], delta_ms: i64) -> Result<(), ModelError> {
        for &i in indices {
            if i >= self.segments.len() {
                return Err(ModelError::NotFound(i));
            }
        }

        let mut trial = self.segments.clone();
        for &i in indices {
            trial[i].start_ms += delta_ms;
            trial[i].end_ms += delta_ms;
        }
        for seg in &trial {
            if seg.start_ms < 0 || seg.start_ms >= seg.end_ms {
                return Err(ModelError::OutOfRange(
                    "batch_shift would move a segment out of range".to_string(),
                ));
            }
        }
        trial.sort_by_key(|s| s.start_ms);
        for w in trial.windows(2) {
            if w[0].end_ms > w[1].start_ms {
                return Err(ModelError::Overlap);
            }
        }

        for &i in indices {
            self.segments[i].start_ms += delta_ms;
            self.segments[i].end_ms += delta_ms;
        }
        self.resort();
        Ok(())
    }

    fn resort(&mut self) {
        self.segments.sort_by_key(|s| s.start_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(a: i64, b: i64, t: &str) -> SubtitleSegment {
        SubtitleSegment::new(a, b, t)
    }

    #[test]
    fn segment_at_half_open() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(0, 1000, "hi")).unwrap();
        t.add_segment(seg(1000, 2000, "bye")).unwrap();
        assert_eq!(t.segment_at(999).unwrap().text, "hi");
        assert_eq!(t.segment_at(1000).unwrap().text, "bye");
        assert!(t.segment_at(2000).is_none());
    }

    #[test]
    fn s2_add_rejects_overlap() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(0, 1000, "hi")).unwrap();
        let before = t.clone();
        let err = t.add_segment(seg(500, 1500, "x")).unwrap_err();
        assert_eq!(err, ModelError::Overlap);
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            serde_json::to_string(&before).unwrap()
        );
    }

    #[test]
    fn s3_split_then_conceptual_undo() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(0, 4000, "hello world")).unwrap();
        let before = t.clone();
        t.split_segment(0, 2000).unwrap();
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].end_ms, 2000);
        assert_eq!(t.segments[1].start_ms, 2000);

        // revert: caller-level undo replaces with the snapshot.
        t = before;
        assert_eq!(t.segments.len(), 1);
    }

    #[test]
    fn merge_requires_small_gap() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(0, 1000, "a")).unwrap();
        t.add_segment(seg(1400, 2000, "b")).unwrap();
        t.merge_segments(0).unwrap();
        assert_eq!(t.segments.len(), 1);
        assert_eq!(t.segments[0].text, "a\nb");
        assert_eq!(t.segments[0].end_ms, 2000);
    }

    #[test]
    fn merge_too_far_rejected() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(0, 1000, "a")).unwrap();
        t.add_segment(seg(2000, 2500, "b")).unwrap();
        assert!(t.merge_segments(0).is_err());
    }

    #[test]
    fn batch_shift_atomic() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(0, 1000, "a")).unwrap();
        t.add_segment(seg(1000, 2000, "b")).unwrap();
        t.add_segment(seg(3000, 4000, "c")).unwrap();
        let before = t.clone();
        // shifting a and c by +500 would make c collide with b (unaffected).
        let err = t.batch_shift(&[0, 2], 500).unwrap_err();
        assert_eq!(err, ModelError::Overlap);
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            serde_json::to_string(&before).unwrap()
        );
    }

    #[test]
    fn disjoint_invariant_after_ops() {
        let mut t = SubtitleTrack::new("Default", "en");
        t.add_segment(seg(5000, 6000, "c")).unwrap();
        t.add_segment(seg(0, 1000, "a")).unwrap();
        t.add_segment(seg(1000, 2000, "b")).unwrap();
        for w in t.segments.windows(2) {
            assert!(w[0].end_ms <= w[1].start_ms);
        }
    }
}
