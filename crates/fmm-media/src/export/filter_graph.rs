// crates/fmm-media/src/export/filter_graph.rs
//
// §4.8 — pure filter-graph construction, no process I/O. Builds the
// `-filter_complex` string and the list of extra inputs (TTS clip files)
// the renderer needs to add `-i` arguments for. Fully unit-testable
// without FFmpeg, matching the spec's described build order: per-clip
// preprocessing → concat/xfade → subtitle burn-in → PIP overlays → text
// overlays → audio mix.

use std::path::PathBuf;

use fmm_core::error::ExportError;
use fmm_core::model::clip::VideoClip;
use fmm_core::model::project::ProjectState;
use fmm_core::model::subtitle::SubtitleTrack;
use fmm_core::srt::track_to_srt;

#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub video_gain: f32,
    pub tts_gain: f32,
}

/// An extra media input the filter graph references beyond the clips'
/// source files (currently: per-segment TTS clips). The renderer appends
/// `-i <path>` for each, in order, after the clip inputs.
#[derive(Debug, Clone)]
pub struct ExtraInput {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FilterGraphPlan {
    /// Unique source paths referenced by clips, in first-appearance order;
    /// input index `0` is always reserved for the project's primary video
    /// even if no clip references it directly (subtitle/PIP sources never
    /// need their own `-i`, only clips and TTS segments do).
    pub clip_inputs: Vec<String>,
    pub extra_inputs: Vec<ExtraInput>,
    pub filter_complex: String,
    pub video_out_label: String,
    pub audio_out_label: Option<String>,
    pub srt_contents: Option<String>,
    pub trim_node_count: usize,
    pub concat_node_count: usize,
}

pub fn build(project: &ProjectState, spec: &OutputSpec) -> Result<FilterGraphPlan, ExportError> {
    if project.clips.clips.is_empty() {
        return Err(ExportError::FilterGraph("project has no clips to export".to_string()));
    }

    let mut clip_inputs: Vec<String> = Vec::new();
    let mut input_index_of = |path: &str| -> usize {
        if let Some(i) = clip_inputs.iter().position(|p| p == path) {
            i
        } else {
            clip_inputs.push(path.to_string());
            clip_inputs.len() - 1
        }
    };

    let mut filters = Vec::new();
    let mut video_labels = Vec::new();
    let mut trim_node_count = 0usize;

    for (i, clip) in project.clips.clips.iter().enumerate() {
        let path = clip
            .source_path
            .clone()
            .or_else(|| project.video_path.clone())
            .unwrap_or_default();
        let input_idx = input_index_of(&path);
        let label = format!("v{i}");
        filters.push(preprocess_clip_filter(clip, input_idx, spec, &label));
        trim_node_count += 1;
        video_labels.push(label);
    }

    let has_transition = project.clips.clips[..project.clips.clips.len().saturating_sub(1)]
        .iter()
        .any(|c| c.transition.is_some());

    let (concat_filters, video_out_label, concat_node_count) = if has_transition {
        build_xfade_chain(project, &video_labels)
    } else {
        let inputs: String = video_labels.iter().map(|l| format!("[{l}]")).collect();
        let label = "vcat".to_string();
        (
            vec![format!("{inputs}concat=n={}:v=1:a=0[{label}]", video_labels.len())],
            label,
            1,
        )
    };
    filters.extend(concat_filters);

    let mut video_out_label = video_out_label;

    let active_track = active_subtitle_track(project);
    let srt_contents = active_track.as_ref().map(track_to_srt);
    if srt_contents.is_some() {
        let next = format!("{video_out_label}_sub");
        filters.push(format!(
            "[{video_out_label}]subtitles=${{SRT_PATH}}[{next}]",
        ));
        video_out_label = next;
    }

    for (i, overlay) in project.image_overlays.overlays.iter().enumerate() {
        let x = (overlay.x_percent * spec.width as f32).round() as i64;
        let y = (overlay.y_percent * spec.height as f32).round() as i64;
        let scaled_label = format!("ov{i}_scaled");
        let img_idx = clip_inputs.len() + i; // overlay images are appended as extra inputs by the renderer
        filters.push(format!(
            "[{img_idx}:v]scale=iw*{:.3}:ih*{:.3},format=rgba,colorchannelmixer=aa={:.3}[{scaled_label}]",
            overlay.scale_percent / 100.0,
            overlay.scale_percent / 100.0,
            overlay.opacity
        ));
        let next = format!("{video_out_label}_pip{i}");
        filters.push(format!(
            "[{video_out_label}][{scaled_label}]overlay=x={x}:y={y}:enable='between(t,{:.1},{:.1})'[{next}]",
            overlay.start_ms as f64 / 1000.0,
            overlay.end_ms as f64 / 1000.0
        ));
        video_out_label = next;
    }

    for (i, overlay) in project.text_overlays.overlays.iter().enumerate() {
        let next = format!("{video_out_label}_txt{i}");
        let x = (overlay.x_percent * spec.width as f32).round() as i64;
        let y = (overlay.y_percent * spec.height as f32).round() as i64;
        filters.push(format!(
            "[{video_out_label}]drawtext=text='{}':fontcolor={}:fontsize={}:x={x}:y={y}:enable='between(t,{:.1},{:.1})'[{next}]",
            escape_drawtext(&overlay.text),
            if overlay.style.font_color.is_empty() { "white" } else { &overlay.style.font_color },
            overlay.style.font_size,
            overlay.start_ms as f64 / 1000.0,
            overlay.end_ms as f64 / 1000.0
        ));
        video_out_label = next;
    }

    let (audio_filters, extra_inputs, audio_out_label) =
        build_audio_mix(project, &clip_inputs, active_track, clip_inputs.len(), spec);
    filters.extend(audio_filters);

    Ok(FilterGraphPlan {
        clip_inputs,
        extra_inputs,
        filter_complex: filters.join(";"),
        video_out_label,
        audio_out_label,
        srt_contents,
        trim_node_count,
        concat_node_count,
    })
}

fn preprocess_clip_filter(clip: &VideoClip, input_idx: usize, spec: &OutputSpec, label: &str) -> String {
    let start_s = clip.source_in_ms as f64 / 1000.0;
    let end_s = clip.source_out_ms as f64 / 1000.0;
    let mut chain = format!("[{input_idx}:v]trim=start={start_s:.3}:end={end_s:.3},setpts=PTS-STARTPTS");
    chain.push_str(&format!(
        ",scale={}:{}:force_original_aspect_ratio=decrease,pad={}:{}:(ow-iw)/2:(oh-ih)/2",
        spec.width, spec.height, spec.width, spec.height
    ));
    if clip.brightness.is_some() || clip.contrast.is_some() || clip.saturation.is_some() {
        chain.push_str(&format!(
            ",eq=brightness={:.3}:contrast={:.3}:saturation={:.3}",
            clip.brightness.unwrap_or(0.0),
            clip.contrast.unwrap_or(1.0),
            clip.saturation.unwrap_or(1.0)
        ));
    }
    chain.push_str(&format!("[{label}]"));
    chain
}

/// Replace hard concatenation at each transition boundary with `xfade`,
/// folding left to right. Boundaries without a transition still need a
/// 2-input concat to join that pair, since they're not part of any xfade
/// chain segment.
fn build_xfade_chain(project: &ProjectState, video_labels: &[String]) -> (Vec<String>, String, usize) {
    let mut filters = Vec::new();
    let mut acc_label = video_labels[0].clone();
    let mut acc_duration_ms: i64 = project.clips.clips[0].source_duration_ms();
    let mut concat_nodes = 0usize;

    for i in 1..video_labels.len() {
        let prev_clip = &project.clips.clips[i - 1];
        let next_label = format!("x{i}");
        if let Some(t) = &prev_clip.transition {
            let offset_ms = (acc_duration_ms - t.duration_ms).max(0);
            filters.push(format!(
                "[{acc_label}][{next}]xfade=transition={}:duration={:.3}:offset={:.3}[{out}]",
                t.kind.ffmpeg_name(),
                t.duration_ms as f64 / 1000.0,
                offset_ms as f64 / 1000.0,
                next = video_labels[i],
                out = next_label,
            ));
            acc_duration_ms = acc_duration_ms + project.clips.clips[i].source_duration_ms() - t.duration_ms;
        } else {
            filters.push(format!(
                "[{acc_label}][{next}]concat=n=2:v=1:a=0[{out}]",
                next = video_labels[i],
                out = next_label,
            ));
            concat_nodes += 1;
            acc_duration_ms += project.clips.clips[i].source_duration_ms();
        }
        acc_label = next_label;
    }

    (filters, acc_label, concat_nodes)
}

fn active_subtitle_track(project: &ProjectState) -> Option<SubtitleTrack> {
    if project.active_track_index < 0 {
        return None;
    }
    project
        .subtitle_tracks
        .get(project.active_track_index as usize)
        .cloned()
}

fn clip_input_idx(clip_inputs: &[String], clip: &VideoClip, project: &ProjectState) -> usize {
    let path = clip.source_path.clone().or_else(|| project.video_path.clone()).unwrap_or_default();
    clip_inputs.iter().position(|p| *p == path).unwrap_or(0)
}

/// Mirrors the video trim/concat/xfade chain for the clips' own audio.
/// `audio_crossfade` is independent of the video `TransitionKind` (Open
/// Question #1): a boundary can `acrossfade` even when its video transition
/// is a hard cut or `None`.
fn build_audio_clip_chain(project: &ProjectState, clip_inputs: &[String]) -> (Vec<String>, String) {
    let clips = &project.clips.clips;
    let mut filters = Vec::new();
    let mut labels = Vec::new();

    for (i, clip) in clips.iter().enumerate() {
        let idx = clip_input_idx(clip_inputs, clip, project);
        let start_s = clip.source_in_ms as f64 / 1000.0;
        let end_s = clip.source_out_ms as f64 / 1000.0;
        let label = format!("a{i}");
        filters.push(format!("[{idx}:a]atrim=start={start_s:.3}:end={end_s:.3},asetpts=PTS-STARTPTS[{label}]"));
        labels.push(label);
    }

    if labels.len() == 1 {
        return (filters, labels.into_iter().next().unwrap());
    }

    let mut acc = labels[0].clone();
    for (i, label) in labels.iter().enumerate().skip(1) {
        let prev_clip = &clips[i - 1];
        let crossfade = prev_clip.transition.as_ref().map(|t| t.audio_crossfade).unwrap_or(false);
        let next_label = format!("ax{i}");
        if crossfade {
            let duration_s = prev_clip.transition.as_ref().unwrap().duration_ms as f64 / 1000.0;
            filters.push(format!("[{acc}][{label}]acrossfade=d={duration_s:.3}[{next_label}]"));
        } else {
            filters.push(format!("[{acc}][{label}]concat=n=2:v=0:a=1[{next_label}]"));
        }
        acc = next_label;
    }

    (filters, acc)
}

/// Per-segment TTS volume mix (spec §4.8 item 6): each segment with a
/// synthesized `audio_file` becomes its own input, delayed to its timeline
/// position and scaled by its own volume, then combined with the clip
/// audio via `amix` at the user's video/TTS gains.
fn build_audio_mix(
    project: &ProjectState,
    clip_inputs: &[String],
    active_track: Option<SubtitleTrack>,
    extra_input_base_idx: usize,
    spec: &OutputSpec,
) -> (Vec<String>, Vec<ExtraInput>, Option<String>) {
    let dubbed: Vec<_> = active_track
        .iter()
        .flat_map(|t| t.segments.iter())
        .filter_map(|s| s.audio_file.as_ref().map(|f| (f.clone(), s.start_ms, s.volume)))
        .collect();

    let (mut filters, base_label) = build_audio_clip_chain(project, clip_inputs);
    if dubbed.is_empty() {
        if project.clips.clips.len() == 1 {
            // Single clip, no dubbing: the renderer can `-map` the
            // original stream directly, no filter graph needed for audio.
            return (Vec::new(), Vec::new(), None);
        }
        return (filters, Vec::new(), Some(base_label));
    }

    let mut extra_inputs = Vec::new();
    let mut dub_labels = Vec::new();
    for (i, (path, start_ms, volume)) in dubbed.into_iter().enumerate() {
        let idx = extra_input_base_idx + i;
        extra_inputs.push(ExtraInput { path: PathBuf::from(path) });
        let label = format!("dub{i}");
        filters.push(format!(
            "[{idx}:a]adelay={ms}|{ms}:all=1,volume={vol:.3}[{label}]",
            ms = start_ms,
            vol = volume * spec.tts_gain
        ));
        dub_labels.push(label);
    }

    let video_label = "vid_a".to_string();
    filters.push(format!("[{base_label}]volume={:.3}[{video_label}]", spec.video_gain));

    let input_labels: Vec<String> = std::iter::once(video_label).chain(dub_labels).collect();
    let mix_inputs: String = input_labels.iter().map(|l| format!("[{l}]")).collect();
    filters.push(format!("{mix_inputs}amix=inputs={}:duration=longest[aout]", input_labels.len()));

    (filters, extra_inputs, Some("aout".to_string()))
}

fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmm_core::model::clip::{Transition, TransitionKind};
    use fmm_core::model::overlay::ImageOverlay;
    use fmm_core::model::subtitle::SubtitleSegment;

    fn clip(path: &str, in_ms: i64, out_ms: i64) -> VideoClip {
        let mut c = VideoClip::new(in_ms, out_ms);
        c.source_path = Some(path.to_string());
        c
    }

    fn spec() -> OutputSpec {
        OutputSpec { width: 1920, height: 1080, video_gain: 1.0, tts_gain: 1.0 }
    }

    /// S5 — two clips (same source, non-adjacent ranges), one PIP overlay
    /// from 1000-3000ms: exactly two trim nodes, one concat, one overlay
    /// with the documented `enable` gate, subtitles referencing the active
    /// track's SRT serialization.
    #[test]
    fn s5_export_filter_graph_invariants() {
        let mut project = ProjectState::new("demo", 30.0, 1920, 1080);
        project.clips.add_clip(clip("A.mp4", 0, 5000)).unwrap();
        project.clips.add_clip(clip("A.mp4", 10_000, 15_000)).unwrap();
        project
            .image_overlays
            .add(ImageOverlay::new(1000, 3000, "logo.png"))
            .unwrap();
        let mut track = SubtitleTrack::new("Default", "en");
        track.add_segment(SubtitleSegment::new(0, 1000, "hi")).unwrap();
        project.add_subtitle_track(track.clone());

        let plan = build(&project, &spec()).unwrap();

        assert_eq!(plan.trim_node_count, 2);
        assert_eq!(plan.filter_complex.matches("]trim=start=").count(), 2);
        assert_eq!(plan.filter_complex.matches(":v=1:a=0").count(), 1);
        assert!(plan
            .filter_complex
            .contains("overlay=x=0:y=0:enable='between(t,1.0,3.0)'"));
        assert!(plan.filter_complex.contains("subtitles="));
        assert_eq!(plan.srt_contents.as_deref(), Some(track_to_srt(&track).as_str()));
    }

    #[test]
    fn transition_replaces_concat_with_xfade() {
        let mut project = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut a = clip("A.mp4", 0, 5000);
        a.transition = Some(Transition { kind: TransitionKind::Fade, duration_ms: 1000, audio_crossfade: false });
        project.clips.add_clip(a).unwrap();
        project.clips.add_clip(clip("B.mp4", 0, 3000)).unwrap();

        let plan = build(&project, &spec()).unwrap();
        assert!(plan.filter_complex.contains("xfade=transition=fade:duration=1.000:offset=4.000"));
        assert!(!plan.filter_complex.contains(":v=1:a=0"));
    }

    #[test]
    fn no_clips_is_a_filter_graph_error() {
        let project = ProjectState::new("demo", 30.0, 1920, 1080);
        assert!(build(&project, &spec()).is_err());
    }

    #[test]
    fn dubbed_segments_produce_amix() {
        let mut project = ProjectState::new("demo", 30.0, 1920, 1080);
        project.clips.add_clip(clip("A.mp4", 0, 5000)).unwrap();
        let mut track = SubtitleTrack::new("Default", "en");
        let mut seg = SubtitleSegment::new(0, 1000, "hi");
        seg.audio_file = Some("dub0.mp3".to_string());
        track.add_segment(seg).unwrap();
        project.add_subtitle_track(track);

        let plan = build(&project, &spec()).unwrap();
        assert!(plan.filter_complex.contains("amix=inputs=2"));
        assert_eq!(plan.extra_inputs.len(), 1);
        assert_eq!(plan.audio_out_label.as_deref(), Some("aout"));
    }
}
