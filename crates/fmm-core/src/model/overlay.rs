// crates/fmm-core/src/model/overlay.rs
//
// Picture-in-picture image overlays and independent text overlays. Unlike
// subtitle segments, overlaps between entries are permitted — they stack
// visually, so the track is just a sorted Vec with no disjointness
// invariant to maintain.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::style::SubtitleStyle;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    pub start_ms: i64,
    pub end_ms: i64,
    pub image_path: String,
    pub x_percent: f32,
    pub y_percent: f32,
    pub scale_percent: f32,
    pub opacity: f32,
}

impl ImageOverlay {
    pub fn new(start_ms: i64, end_ms: i64, image_path: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            image_path: image_path.into(),
            x_percent: 0.0,
            y_percent: 0.0,
            scale_percent: 100.0,
            opacity: 1.0,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.end_ms <= self.start_ms {
            return Err(ModelError::OutOfRange(format!(
                "overlay end_ms {} must be > start_ms {}",
                self.end_ms, self.start_ms
            )));
        }
        Ok(())
    }

    /// Clamp the overlay's time window into `[0, project_duration_ms]`.
    /// Returns `false` (and leaves the overlay unclamped) if the window
    /// collapses entirely outside the project — the caller decides whether
    /// a degenerate overlay like that should be dropped.
    pub fn clamp_to(&mut self, project_duration_ms: i64) -> bool {
        if self.end_ms <= 0 || self.start_ms >= project_duration_ms {
            return false;
        }
        self.start_ms = self.start_ms.max(0);
        self.end_ms = self.end_ms.min(project_duration_ms);
        true
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImageOverlayTrack {
    pub overlays: Vec<ImageOverlay>,
}

impl ImageOverlayTrack {
    pub fn add(&mut self, overlay: ImageOverlay) -> Result<usize, ModelError> {
        overlay.validate()?;
        let idx = self
            .overlays
            .partition_point(|o| o.start_ms < overlay.start_ms);
        self.overlays.insert(idx, overlay);
        Ok(idx)
    }

    pub fn remove(&mut self, index: usize) -> Result<ImageOverlay, ModelError> {
        if index >= self.overlays.len() {
            return Err(ModelError::NotFound(index));
        }
        Ok(self.overlays.remove(index))
    }

    pub fn move_overlay(&mut self, index: usize, delta_ms: i64) -> Result<(), ModelError> {
        let o = self
            .overlays
            .get_mut(index)
            .ok_or(ModelError::NotFound(index))?;
        o.start_ms += delta_ms;
        o.end_ms += delta_ms;
        if o.start_ms < 0 {
            return Err(ModelError::OutOfRange("overlay moved before 0".to_string()));
        }
        self.overlays.sort_by_key(|o| o.start_ms);
        Ok(())
    }

    /// Clamp every overlay into `[0, project_duration_ms]`, dropping entries
    /// that fall entirely outside the window (load-time repair, §3 invariant 4
    /// — "clamped on load, not silently dropped" applies to the clamping
    /// itself; a window with zero overlap left after clamping is dropped).
    pub fn clamp_all(&mut self, project_duration_ms: i64) {
        self.overlays
            .retain_mut(|o| o.clamp_to(project_duration_ms));
    }

    /// All overlays whose `[start, end)` window contains `ms`.
    pub fn active_at(&self, ms: i64) -> Vec<&ImageOverlay> {
        self.overlays
            .iter()
            .filter(|o| ms >= o.start_ms && ms < o.end_ms)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub style: SubtitleStyle,
    pub x_percent: f32,
    pub y_percent: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TextOverlayTrack {
    pub overlays: Vec<TextOverlay>,
}

impl TextOverlayTrack {
    pub fn add(&mut self, overlay: TextOverlay) -> Result<usize, ModelError> {
        if overlay.end_ms <= overlay.start_ms {
            return Err(ModelError::OutOfRange(
                "text overlay end_ms must be > start_ms".to_string(),
            ));
        }
        let idx = self
            .overlays
            .partition_point(|o| o.start_ms < overlay.start_ms);
        self.overlays.insert(idx, overlay);
        Ok(idx)
    }

    pub fn remove(&mut self, index: usize) -> Result<TextOverlay, ModelError> {
        if index >= self.overlays.len() {
            return Err(ModelError::NotFound(index));
        }
        Ok(self.overlays.remove(index))
    }

    pub fn edit(&mut self, index: usize, text: String) -> Result<(), ModelError> {
        self.overlays
            .get_mut(index)
            .ok_or(ModelError::NotFound(index))?
            .text = text;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlays_permit_overlap() {
        let mut t = ImageOverlayTrack::default();
        t.add(ImageOverlay::new(0, 2000, "a.png")).unwrap();
        t.add(ImageOverlay::new(1000, 3000, "b.png")).unwrap();
        assert_eq!(t.active_at(1500).len(), 2);
    }

    #[test]
    fn clamp_drops_fully_outside() {
        let mut t = ImageOverlayTrack::default();
        t.add(ImageOverlay::new(-500, 500, "a.png")).unwrap();
        t.overlays[0].start_ms = -500; // simulate a stale on-disk value
        t.add(ImageOverlay::new(50_000, 60_000, "b.png")).unwrap();
        t.clamp_all(10_000);
        assert_eq!(t.overlays.len(), 1);
        assert_eq!(t.overlays[0].start_ms, 0);
    }
}
