// crates/fmm-core/src/model/project.rs
//
// ProjectState — the root aggregate persisted to disk and mutated by every
// editor command. Holds one primary clip track, zero or more subtitle
// tracks, image/text overlay tracks, and an optional background music bed.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::clip::VideoClipTrack;
use crate::model::overlay::{ImageOverlayTrack, TextOverlayTrack};
use crate::model::subtitle::SubtitleTrack;

/// Background music: one looping or one-shot audio bed under the whole project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BgmTrack {
    pub audio_path: String,
    pub volume: f32,
    pub loop_audio: bool,
    pub fade_in_ms: i64,
    pub fade_out_ms: i64,
    /// Ducking applied under subtitle-track narration, 0.0 (silent) to 1.0 (no duck).
    pub duck_level: f32,
}

impl Default for BgmTrack {
    fn default() -> Self {
        Self {
            audio_path: String::new(),
            volume: 1.0,
            loop_audio: true,
            fade_in_ms: 0,
            fade_out_ms: 0,
            duck_level: 0.3,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectState {
    pub name: String,
    #[serde(default)]
    pub video_path: Option<String>,
    pub clips: VideoClipTrack,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    /// -1 when `subtitle_tracks` is empty, otherwise an existing index (invariant 2).
    #[serde(default = "default_active_track_index")]
    pub active_track_index: i64,
    pub image_overlays: ImageOverlayTrack,
    pub text_overlays: TextOverlayTrack,
    #[serde(default)]
    pub bgm: Option<BgmTrack>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

fn default_active_track_index() -> i64 {
    -1
}

impl ProjectState {
    pub fn new(name: impl Into<String>, fps: f64, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            video_path: None,
            clips: VideoClipTrack::new(),
            subtitle_tracks: Vec::new(),
            active_track_index: -1,
            image_overlays: ImageOverlayTrack::default(),
            text_overlays: TextOverlayTrack::default(),
            bgm: None,
            fps,
            width,
            height,
        }
    }

    pub fn total_duration_ms(&self) -> i64 {
        self.clips.total_duration_ms()
    }

    /// Invariant checks run after load and after every mutating command:
    /// 1. each subtitle track's segments stay disjoint and sorted
    /// 2. each subtitle segment lies within `[0, total_duration_ms]`
    /// 3. the clip track's `offsets` matches a fresh rebuild
    /// 4. overlays are clamped into the project window (never silently dropped
    ///    except when the clamp collapses them to nothing, which load already
    ///    performs)
    /// 5. at most one `bgm` track
    pub fn check_invariants(&self) -> Result<(), ModelError> {
        // With no clip track the output timeline is the primary video's own
        // duration, which this model doesn't know — bounds-check only when
        // a clip track actually defines one.
        let bounded_total = (!self.clips.clips.is_empty()).then(|| self.total_duration_ms());

        for track in &self.subtitle_tracks {
            for w in track.segments.windows(2) {
                if w[0].end_ms > w[1].start_ms {
                    return Err(ModelError::Overlap);
                }
            }
            if let Some(total) = bounded_total {
                for seg in &track.segments {
                    if seg.start_ms < 0 || seg.end_ms > total {
                        return Err(ModelError::OutOfRange(format!(
                            "segment [{}, {}) lies outside project duration {}ms",
                            seg.start_ms, seg.end_ms, total
                        )));
                    }
                }
            }
        }

        if let Some(total) = bounded_total {
            for o in &self.image_overlays.overlays {
                if o.start_ms < 0 || o.end_ms > total {
                    return Err(ModelError::OutOfRange(format!(
                        "image overlay [{}, {}) lies outside project duration {}ms",
                        o.start_ms, o.end_ms, total
                    )));
                }
            }
        }

        if self.subtitle_tracks.is_empty() {
            if self.active_track_index != -1 {
                return Err(ModelError::OutOfRange(
                    "active_track_index must be -1 when there are no subtitle tracks".to_string(),
                ));
            }
        } else if self.active_track_index < 0
            || self.active_track_index as usize >= self.subtitle_tracks.len()
        {
            return Err(ModelError::OutOfRange(format!(
                "active_track_index {} does not reference an existing track",
                self.active_track_index
            )));
        }

        Ok(())
    }

    /// Load-time repair: clamp overlay windows into the (now-known) project
    /// duration rather than rejecting the whole file over a stale window.
    /// With no clip track the output timeline equals the primary video's own
    /// (model-unknown) duration, so there is nothing to clamp against yet —
    /// clamping against 0 would silently drop every subtitle in that case.
    pub fn repair_after_load(&mut self) {
        if self.clips.clips.is_empty() {
            return;
        }
        let total = self.total_duration_ms();
        self.image_overlays.clamp_all(total);
        for track in &mut self.subtitle_tracks {
            track.segments.retain(|s| s.start_ms < total);
            for seg in &mut track.segments {
                seg.end_ms = seg.end_ms.min(total);
            }
        }
    }

    pub fn add_subtitle_track(&mut self, track: SubtitleTrack) -> usize {
        self.subtitle_tracks.push(track);
        if self.active_track_index < 0 {
            self.active_track_index = 0;
        }
        self.subtitle_tracks.len() - 1
    }

    pub fn remove_subtitle_track(&mut self, index: usize) -> Result<SubtitleTrack, ModelError> {
        if index >= self.subtitle_tracks.len() {
            return Err(ModelError::NotFound(index));
        }
        let removed = self.subtitle_tracks.remove(index);
        if self.subtitle_tracks.is_empty() {
            self.active_track_index = -1;
        } else if self.active_track_index as usize >= self.subtitle_tracks.len() {
            self.active_track_index = self.subtitle_tracks.len() as i64 - 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::clip::VideoClip;
    use crate::model::subtitle::SubtitleSegment;

    fn sample_project() -> ProjectState {
        let mut p = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut c = VideoClip::new(0, 10_000);
        c.source_path = Some("A.mp4".to_string());
        p.clips.add_clip(c).unwrap();
        p
    }

    #[test]
    fn invariants_hold_on_fresh_project() {
        let p = sample_project();
        assert!(p.check_invariants().is_ok());
    }

    #[test]
    fn invariants_reject_out_of_range_segment() {
        let mut p = sample_project();
        let mut track = SubtitleTrack::new("Default", "en");
        track
            .add_segment(SubtitleSegment::new(0, 1000, "hi"))
            .unwrap();
        p.add_subtitle_track(track);
        // simulate a stale segment past the (now shorter) project duration
        p.subtitle_tracks[0].segments[0].end_ms = 50_000;
        assert!(p.check_invariants().is_err());
    }

    #[test]
    fn repair_after_load_clamps_stale_overlay() {
        let mut p = sample_project();
        p.image_overlays
            .add(crate::model::overlay::ImageOverlay::new(8000, 50_000, "logo.png"))
            .unwrap();
        p.repair_after_load();
        assert_eq!(p.image_overlays.overlays[0].end_ms, 10_000);
        assert!(p.check_invariants().is_ok());
    }

    #[test]
    fn at_most_one_bgm_track_by_construction() {
        let mut p = sample_project();
        assert!(p.bgm.is_none());
        p.bgm = Some(BgmTrack::default());
        assert!(p.bgm.is_some());
    }
}
