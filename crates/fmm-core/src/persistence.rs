// crates/fmm-core/src/persistence.rs
//
// Versioned JSON persistence with migration up to the current schema (v4)
// and an atomic save (write to a `.tmp` sibling, then rename).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PersistError, ReferencedFileMissing};
use crate::model::project::ProjectState;

pub const CURRENT_VERSION: u32 = 4;

/// The on-disk schema, independent of `ProjectState`'s in-memory shape so
/// the two can diverge without breaking the file format (spec §4.4's field
/// names are authoritative here).
#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    #[serde(flatten)]
    state: ProjectState,
}

/// Load result: the project plus any non-fatal warnings (spec §4.4 —
/// `ReferencedFileMissing` never aborts a load).
#[derive(Debug)]
pub struct LoadResult {
    pub project: ProjectState,
    pub warnings: Vec<ReferencedFileMissing>,
}

pub fn save_project(project: &ProjectState, path: &Path) -> Result<(), PersistError> {
    let file = ProjectFile {
        version: CURRENT_VERSION,
        state: project.clone(),
    };
    let json = serde_json::to_string_pretty(&file)?;

    let tmp_path = path.with_extension("fmm.json.tmp");
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_project(path: &Path) -> Result<LoadResult, PersistError> {
    let raw = fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&raw)?;
    migrate_to_current(&mut value)?;

    let file: ProjectFile = serde_json::from_value(value)
        .map_err(|e| PersistError::SchemaViolation(e.to_string()))?;

    let mut project = file.state;
    project.repair_after_load();

    let warnings = collect_missing_file_warnings(&project);
    for w in &warnings {
        warn!(path = %w.path, context = %w.context, "referenced file missing on load");
    }

    Ok(LoadResult { project, warnings })
}

fn collect_missing_file_warnings(project: &ProjectState) -> Vec<ReferencedFileMissing> {
    let mut warnings = Vec::new();
    let check = |path: &Option<String>, context: &str, warnings: &mut Vec<ReferencedFileMissing>| {
        if let Some(p) = path {
            if !p.is_empty() && !Path::new(p).exists() {
                warnings.push(ReferencedFileMissing {
                    path: p.clone(),
                    context: context.to_string(),
                });
            }
        }
    };

    check(&project.video_path, "project video", &mut warnings);
    for (i, clip) in project.clips.clips.iter().enumerate() {
        check(
            &clip.source_path,
            &format!("clip[{i}].source_path"),
            &mut warnings,
        );
    }
    for (ti, track) in project.subtitle_tracks.iter().enumerate() {
        check(
            &track.audio_path,
            &format!("subtitle_tracks[{ti}].audio_path"),
            &mut warnings,
        );
        for (si, seg) in track.segments.iter().enumerate() {
            check(
                &seg.audio_file,
                &format!("subtitle_tracks[{ti}].segments[{si}].audio_file"),
                &mut warnings,
            );
        }
    }
    for (i, overlay) in project.image_overlays.overlays.iter().enumerate() {
        if !overlay.image_path.is_empty() && !Path::new(&overlay.image_path).exists() {
            warnings.push(ReferencedFileMissing {
                path: overlay.image_path.clone(),
                context: format!("image_overlays[{i}].image_path"),
            });
        }
    }
    warnings
}

/// Migrate a raw JSON value in place up to `CURRENT_VERSION`. Each step
/// only adds fields with their documented defaults; it never rewrites data
/// that a later version already understands.
fn migrate_to_current(value: &mut Value) -> Result<(), PersistError> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| PersistError::SchemaViolation("project root is not an object".to_string()))?;

    let version = obj
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| PersistError::SchemaViolation("missing or non-numeric 'version'".to_string()))?
        as u32;

    if version > CURRENT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: version,
            max: CURRENT_VERSION,
        });
    }

    if version < 2 {
        migrate_v1_to_v2(obj);
    }
    if version < 3 {
        migrate_v2_to_v3(obj);
    }
    if version < 4 {
        migrate_v3_to_v4(obj);
    }
    obj.insert("version".to_string(), Value::from(CURRENT_VERSION));
    Ok(())
}

/// v1 stored a single flat `segments[]` array with no track wrapper.
/// Synthesize a track named "Default" around it.
fn migrate_v1_to_v2(obj: &mut Map<String, Value>) {
    if obj.contains_key("subtitle_tracks") {
        return;
    }
    let segments = obj.remove("segments").unwrap_or(Value::Array(Vec::new()));
    let track = serde_json::json!({
        "name": "Default",
        "language": "en",
        "segments": segments,
        "audio_path": Value::Null,
        "audio_start_ms": 0,
        "audio_duration_ms": 0,
    });
    obj.insert(
        "subtitle_tracks".to_string(),
        Value::Array(vec![track]),
    );
    obj.insert("active_track_index".to_string(), Value::from(0));
}

/// v2 -> v3: each track gains `audio_start_ms` / `audio_duration_ms`.
fn migrate_v2_to_v3(obj: &mut Map<String, Value>) {
    if let Some(Value::Array(tracks)) = obj.get_mut("subtitle_tracks") {
        for track in tracks {
            if let Some(t) = track.as_object_mut() {
                t.entry("audio_start_ms").or_insert(Value::from(0));
                t.entry("audio_duration_ms").or_insert(Value::from(0));
            }
        }
    }
}

/// v3 -> v4: adds `video_clips`, `text_overlays`, and per-segment `volume`.
fn migrate_v3_to_v4(obj: &mut Map<String, Value>) {
    obj.entry("clips")
        .or_insert_with(|| serde_json::json!({ "clips": [] }));
    obj.entry("text_overlays")
        .or_insert_with(|| serde_json::json!({ "overlays": [] }));
    obj.entry("image_overlays")
        .or_insert_with(|| serde_json::json!({ "overlays": [] }));
    obj.entry("video_path").or_insert(Value::Null);
    obj.entry("bgm").or_insert(Value::Null);
    obj.entry("fps").or_insert(Value::from(30.0));
    obj.entry("width").or_insert(Value::from(1920));
    obj.entry("height").or_insert(Value::from(1080));

    if let Some(Value::Array(tracks)) = obj.get_mut("subtitle_tracks") {
        for track in tracks {
            if let Some(Value::Array(segments)) = track.get_mut("segments") {
                for seg in segments {
                    if let Some(s) = seg.as_object_mut() {
                        s.entry("volume").or_insert(Value::from(1.0));
                        s.entry("style").or_insert(Value::Null);
                        s.entry("audio_file").or_insert(Value::Null);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_at_current_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.fmm.json");

        let mut project = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut track = crate::model::subtitle::SubtitleTrack::new("Default", "en");
        track
            .add_segment(crate::model::subtitle::SubtitleSegment::new(0, 1000, "hi"))
            .unwrap();
        project.add_subtitle_track(track);

        save_project(&project, &path).unwrap();
        let loaded = load_project(&path).unwrap();

        assert_eq!(loaded.project.name, "demo");
        assert_eq!(loaded.project.subtitle_tracks.len(), 1);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn save_is_atomic_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.fmm.json");
        let project = ProjectState::new("demo", 30.0, 1920, 1080);
        save_project(&project, &path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("fmm.json.tmp").exists());
    }

    #[test]
    fn migrates_v1_flat_segments_into_default_track() {
        let raw = serde_json::json!({
            "version": 1,
            "name": "legacy",
            "segments": [
                { "start_ms": 0, "end_ms": 1000, "text": "hi" }
            ],
            "clips": { "clips": [] },
            "image_overlays": { "overlays": [] },
            "fps": 30.0,
            "width": 1920,
            "height": 1080,
        });
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.fmm.json");
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.project.subtitle_tracks.len(), 1);
        assert_eq!(loaded.project.subtitle_tracks[0].name, "Default");
        assert_eq!(loaded.project.subtitle_tracks[0].segments[0].volume, 1.0);
        assert_eq!(loaded.project.active_track_index, 0);
    }

    #[test]
    fn rejects_future_version() {
        let raw = serde_json::json!({ "version": 99, "name": "x" });
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.fmm.json");
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let err = load_project(&path).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn missing_referenced_file_is_a_warning_not_a_failure() {
        let mut project = ProjectState::new("demo", 30.0, 1920, 1080);
        project.video_path = Some("/nonexistent/video.mp4".to_string());

        let dir = tempdir().unwrap();
        let path = dir.path().join("project.fmm.json");
        save_project(&project, &path).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].context, "project video");
    }
}
