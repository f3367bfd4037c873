// crates/fmm-core/src/commands.rs
//
// Every user-visible mutation goes through a `Command`. Apply/revert are
// snapshot-based: each command clones the project before mutating it, so
// `revert()` is simply "restore the clone" and trivially satisfies the
// byte-identical-serialization property tested in §8 of the spec this
// module implements, at the cost of an O(size-of-project) clone per
// command. That's the same tradeoff the teacher's own command layer left
// unresolved (the `EditorCommand` enum existed but never actually pushed
// onto a history) — this fills it in rather than optimizing it.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::clip::{Transition, TrimSide, VideoClip};
use crate::model::overlay::{ImageOverlay, TextOverlay};
use crate::model::project::ProjectState;
use crate::model::style::SubtitleStyle;
use crate::model::subtitle::SubtitleSegment;

pub const DEFAULT_STACK_DEPTH: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommandKind {
    EditText { track: usize, index: usize, text: String },
    EditTime { track: usize, index: usize, start_ms: i64, end_ms: i64 },
    MoveSegment { track: usize, index: usize, delta_ms: i64, duration_ms: i64 },
    AddSegment { track: usize, segment: SubtitleSegment },
    DeleteSegment { track: usize, index: usize },
    Split { track: usize, index: usize, at_ms: i64 },
    Merge { track: usize, index: usize },
    BatchShift { track: usize, indices: Vec<usize>, delta_ms: i64 },
    EditStyle { track: usize, index: usize, style: SubtitleStyle },
    EditVolume { track: usize, index: usize, volume: f32 },
    AddClip { clip: VideoClip },
    DeleteClip { index: usize },
    SplitClip { at_timeline_ms: i64 },
    TrimClip { index: usize, side: TrimSide, delta_ms: i64 },
    AddImageOverlay { overlay: ImageOverlay },
    MoveImageOverlay { index: usize, delta_ms: i64 },
    RemoveImageOverlay { index: usize },
    AddTextOverlay { overlay: TextOverlay },
    EditTextOverlay { index: usize, text: String },
    SetTransition { clip_index: usize, transition: Option<Transition> },
    EditFilter { clip_index: usize, brightness: Option<f32>, contrast: Option<f32>, saturation: Option<f32> },
}

impl CommandKind {
    /// A stable, human-readable label for the history UI.
    pub fn description(&self) -> String {
        match self {
            CommandKind::EditText { .. } => "Edit text".to_string(),
            CommandKind::EditTime { .. } => "Edit timing".to_string(),
            CommandKind::MoveSegment { .. } => "Move segment".to_string(),
            CommandKind::AddSegment { .. } => "Add segment".to_string(),
            CommandKind::DeleteSegment { .. } => "Delete segment".to_string(),
            CommandKind::Split { .. } => "Split segment".to_string(),
            CommandKind::Merge { .. } => "Merge segments".to_string(),
            CommandKind::BatchShift { indices, .. } => format!("Shift {} segments", indices.len()),
            CommandKind::EditStyle { .. } => "Edit style".to_string(),
            CommandKind::EditVolume { .. } => "Edit volume".to_string(),
            CommandKind::AddClip { .. } => "Add clip".to_string(),
            CommandKind::DeleteClip { .. } => "Delete clip".to_string(),
            CommandKind::SplitClip { .. } => "Split clip".to_string(),
            CommandKind::TrimClip { .. } => "Trim clip".to_string(),
            CommandKind::AddImageOverlay { .. } => "Add image overlay".to_string(),
            CommandKind::MoveImageOverlay { .. } => "Move image overlay".to_string(),
            CommandKind::RemoveImageOverlay { .. } => "Remove image overlay".to_string(),
            CommandKind::AddTextOverlay { .. } => "Add text overlay".to_string(),
            CommandKind::EditTextOverlay { .. } => "Edit text overlay".to_string(),
            CommandKind::SetTransition { .. } => "Set transition".to_string(),
            CommandKind::EditFilter { .. } => "Edit filter".to_string(),
        }
    }

    fn apply_to(&self, state: &mut ProjectState) -> Result<(), ModelError> {
        match self {
            CommandKind::EditText { track, index, text } => {
                let seg = state
                    .subtitle_tracks
                    .get_mut(*track)
                    .ok_or(ModelError::NotFound(*track))?
                    .segments
                    .get_mut(*index)
                    .ok_or(ModelError::NotFound(*index))?;
                seg.text = text.clone();
                Ok(())
            }
            CommandKind::EditTime { track, index, start_ms, end_ms } => {
                let seg = state
                    .subtitle_tracks
                    .get_mut(*track)
                    .ok_or(ModelError::NotFound(*track))?
                    .segments
                    .get_mut(*index)
                    .ok_or(ModelError::NotFound(*index))?;
                if *start_ms < 0 || *start_ms >= *end_ms {
                    return Err(ModelError::OutOfRange(
                        "edited timing violates 0 <= start < end".to_string(),
                    ));
                }
                seg.start_ms = *start_ms;
                seg.end_ms = *end_ms;
                Ok(())
            }
            CommandKind::MoveSegment { track, index, delta_ms, duration_ms } => state
                .subtitle_tracks
                .get_mut(*track)
                .ok_or(ModelError::NotFound(*track))?
                .move_segment(*index, *delta_ms, *duration_ms),
            CommandKind::AddSegment { track, segment } => state
                .subtitle_tracks
                .get_mut(*track)
                .ok_or(ModelError::NotFound(*track))?
                .add_segment(segment.clone())
                .map(|_| ()),
            CommandKind::DeleteSegment { track, index } => state
                .subtitle_tracks
                .get_mut(*track)
                .ok_or(ModelError::NotFound(*track))?
                .remove_segment(*index)
                .map(|_| ()),
            CommandKind::Split { track, index, at_ms } => state
                .subtitle_tracks
                .get_mut(*track)
                .ok_or(ModelError::NotFound(*track))?
                .split_segment(*index, *at_ms)
                .map(|_| ()),
            CommandKind::Merge { track, index } => state
                .subtitle_tracks
                .get_mut(*track)
                .ok_or(ModelError::NotFound(*track))?
                .merge_segments(*index),
            CommandKind::BatchShift { track, indices, delta_ms } => state
                .subtitle_tracks
                .get_mut(*track)
                .ok_or(ModelError::NotFound(*track))?
                .batch_shift(indices, *delta_ms),
            CommandKind::EditStyle { track, index, style } => {
                let seg = state
                    .subtitle_tracks
                    .get_mut(*track)
                    .ok_or(ModelError::NotFound(*track))?
                    .segments
                    .get_mut(*index)
                    .ok_or(ModelError::NotFound(*index))?;
                seg.style = Some(style.clone());
                Ok(())
            }
            CommandKind::EditVolume { track, index, volume } => {
                let seg = state
                    .subtitle_tracks
                    .get_mut(*track)
                    .ok_or(ModelError::NotFound(*track))?
                    .segments
                    .get_mut(*index)
                    .ok_or(ModelError::NotFound(*index))?;
                seg.volume = *volume;
                Ok(())
            }
            CommandKind::AddClip { clip } => state.clips.add_clip(clip.clone()).map(|_| ()),
            CommandKind::DeleteClip { index } => state.clips.remove_clip(*index).map(|_| ()),
            CommandKind::SplitClip { at_timeline_ms } => {
                state.clips.split_clip_at_timeline(*at_timeline_ms).map(|_| ())
            }
            CommandKind::TrimClip { index, side, delta_ms } => {
                state.clips.trim_clip_edge(*index, *side, *delta_ms)
            }
            CommandKind::AddImageOverlay { overlay } => {
                state.image_overlays.add(overlay.clone()).map(|_| ())
            }
            CommandKind::MoveImageOverlay { index, delta_ms } => {
                state.image_overlays.move_overlay(*index, *delta_ms)
            }
            CommandKind::RemoveImageOverlay { index } => {
                state.image_overlays.remove(*index).map(|_| ())
            }
            CommandKind::AddTextOverlay { overlay } => {
                state.text_overlays.add(overlay.clone()).map(|_| ())
            }
            CommandKind::EditTextOverlay { index, text } => {
                state.text_overlays.edit(*index, text.clone())
            }
            CommandKind::SetTransition { clip_index, transition } => {
                let clip = state
                    .clips
                    .clips
                    .get_mut(*clip_index)
                    .ok_or(ModelError::NotFound(*clip_index))?;
                clip.transition = transition.clone();
                Ok(())
            }
            CommandKind::EditFilter { clip_index, brightness, contrast, saturation } => {
                let clip = state
                    .clips
                    .clips
                    .get_mut(*clip_index)
                    .ok_or(ModelError::NotFound(*clip_index))?;
                clip.brightness = *brightness;
                clip.contrast = *contrast;
                clip.saturation = *saturation;
                Ok(())
            }
        }
    }
}

/// A single bounded undo/redo history over a `ProjectState`. Holds a full
/// snapshot before each applied command rather than an inverse operation —
/// simpler to get right, and `revert` is then definitionally exact.
pub struct CommandStack {
    max_depth: usize,
    undo_stack: Vec<(ProjectState, CommandKind)>,
    redo_stack: Vec<(ProjectState, CommandKind)>,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Apply `kind` to `state`. On success the pre-apply snapshot is pushed
    /// onto the undo stack (evicting the oldest entry past `max_depth`) and
    /// the redo stack is cleared. On failure `state` is left exactly as it
    /// was — mutation happens on a clone, never in place.
    pub fn apply(&mut self, state: &mut ProjectState, kind: CommandKind) -> Result<(), ModelError> {
        let before = state.clone();
        let mut trial = state.clone();
        kind.apply_to(&mut trial)?;

        *state = trial;
        self.undo_stack.push((before, kind));
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
        Ok(())
    }

    /// Restore the snapshot taken before the most recent command. Returns
    /// `false` if there is nothing to undo.
    pub fn undo(&mut self, state: &mut ProjectState) -> bool {
        let Some((before, kind)) = self.undo_stack.pop() else {
            return false;
        };
        let after = std::mem::replace(state, before);
        self.redo_stack.push((after, kind));
        true
    }

    /// Re-apply the most recently undone command's resulting state.
    pub fn redo(&mut self, state: &mut ProjectState) -> bool {
        let Some((after, kind)) = self.redo_stack.pop() else {
            return false;
        };
        let before = std::mem::replace(state, after);
        self.undo_stack.push((before, kind));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::subtitle::SubtitleTrack;

    fn project_with_one_track() -> ProjectState {
        let mut p = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut track = SubtitleTrack::new("Default", "en");
        track.add_segment(SubtitleSegment::new(0, 4000, "hello world")).unwrap();
        p.add_subtitle_track(track);
        p
    }

    #[test]
    fn s3_split_then_undo_is_byte_identical() {
        let mut state = project_with_one_track();
        let before_json = serde_json::to_string(&state).unwrap();
        let mut stack = CommandStack::new(DEFAULT_STACK_DEPTH);

        stack
            .apply(&mut state, CommandKind::Split { track: 0, index: 0, at_ms: 2000 })
            .unwrap();
        assert_eq!(state.subtitle_tracks[0].segments.len(), 2);

        assert!(stack.undo(&mut state));
        let after_json = serde_json::to_string(&state).unwrap();
        assert_eq!(before_json, after_json);
    }

    #[test]
    fn failed_apply_leaves_state_untouched() {
        let mut state = project_with_one_track();
        let before_json = serde_json::to_string(&state).unwrap();
        let mut stack = CommandStack::new(DEFAULT_STACK_DEPTH);

        let err = stack
            .apply(
                &mut state,
                CommandKind::AddSegment {
                    track: 0,
                    segment: SubtitleSegment::new(1000, 3000, "overlap"),
                },
            )
            .unwrap_err();
        assert_eq!(err, ModelError::Overlap);
        assert_eq!(serde_json::to_string(&state).unwrap(), before_json);
        assert_eq!(stack.undo_len(), 0);
    }

    #[test]
    fn redo_replays_the_applied_state() {
        let mut state = project_with_one_track();
        let mut stack = CommandStack::new(DEFAULT_STACK_DEPTH);
        stack
            .apply(&mut state, CommandKind::Split { track: 0, index: 0, at_ms: 2000 })
            .unwrap();
        let split_json = serde_json::to_string(&state).unwrap();

        stack.undo(&mut state);
        assert!(stack.redo(&mut state));
        assert_eq!(serde_json::to_string(&state).unwrap(), split_json);
    }

    #[test]
    fn stack_evicts_oldest_past_bound() {
        let mut state = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut stack = CommandStack::new(2);
        let track = SubtitleTrack::new("Default", "en");
        state.add_subtitle_track(track);

        for i in 0..5 {
            stack
                .apply(
                    &mut state,
                    CommandKind::AddSegment {
                        track: 0,
                        segment: SubtitleSegment::new(i * 1000, i * 1000 + 500, "x"),
                    },
                )
                .unwrap();
        }
        assert_eq!(stack.undo_len(), 2);
    }

    #[test]
    fn batch_shift_command_is_atomic() {
        let mut state = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut track = SubtitleTrack::new("Default", "en");
        track.add_segment(SubtitleSegment::new(0, 1000, "a")).unwrap();
        track.add_segment(SubtitleSegment::new(1000, 2000, "b")).unwrap();
        track.add_segment(SubtitleSegment::new(3000, 4000, "c")).unwrap();
        state.add_subtitle_track(track);
        let before_json = serde_json::to_string(&state).unwrap();

        let mut stack = CommandStack::new(DEFAULT_STACK_DEPTH);
        let err = stack
            .apply(
                &mut state,
                CommandKind::BatchShift { track: 0, indices: vec![0, 2], delta_ms: 500 },
            )
            .unwrap_err();
        assert_eq!(err, ModelError::Overlap);
        assert_eq!(serde_json::to_string(&state).unwrap(), before_json);
    }
}
