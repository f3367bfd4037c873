// crates/fmm-media/src/export/renderer.rs
//
// §4.8 "Output tail" + "Progress"/"Cancellation"/"Batch export": turns a
// `FilterGraphPlan` into an actual `ffmpeg` invocation, writes to a
// temporary path and renames on success, and runs batch jobs sequentially
// (FFmpeg already saturates available cores per job; running two jobs at
// once only contends for the same CPU).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use fmm_core::error::ExportError;
use fmm_core::model::project::ProjectState;
use tracing::{info, warn};

use crate::events::{CancelFlag, JobHandle, WorkerError, WorkerEvent, WorkerResult};
use crate::export::filter_graph::{self, OutputSpec};
use crate::process::{ProcessError, ProcessRunner, ProgressEvent};

#[derive(Debug, Clone)]
pub struct ExportJob {
    pub output_path: PathBuf,
    pub container: String,
    pub spec: OutputSpec,
    /// `None` selects the platform's best-available hardware encoder,
    /// falling back to libx264 (spec §4.6).
    pub video_codec: Option<String>,
}

pub fn run(runner: Arc<ProcessRunner>, project: ProjectState, job: ExportJob, temp_dir: PathBuf) -> JobHandle {
    crate::workers::spawn(move |job_id, tx, cancel| {
        let total_ms = project.total_duration_ms().max(1) as u64;
        info!(%job_id, output_path = %job.output_path.display(), total_ms, "export started");
        let result = render_one(&runner, &project, &job, &temp_dir, &cancel, |progress: ProgressEvent| {
            let _ = tx.send(WorkerEvent::Progress {
                current: progress.current_ms.max(0) as u64,
                total: progress.total_ms.map(|t| t.max(0) as u64).unwrap_or(total_ms),
                message: None,
            });
        });

        match result {
            Ok(output_path) => {
                info!(%job_id, output_path = %output_path.display(), "export finished");
                let _ = tx.send(WorkerEvent::Finished(WorkerResult::Exported { job_id, output_path }));
            }
            Err(ExportError::Process(ProcessError::Cancelled)) => {
                info!(%job_id, "export cancelled");
                let _ = tx.send(WorkerEvent::Cancelled);
            }
            Err(e) => {
                warn!(%job_id, error = %e, "export failed");
                let _ = tx.send(WorkerEvent::Failed(e.into()));
            }
        }
    })
}

fn render_one(
    runner: &ProcessRunner,
    project: &ProjectState,
    job: &ExportJob,
    temp_dir: &std::path::Path,
    cancel: &CancelFlag,
    on_progress: impl FnMut(ProgressEvent),
) -> Result<PathBuf, ExportError> {
    let plan = filter_graph::build(project, &job.spec)?;

    let srt_path = if let Some(contents) = &plan.srt_contents {
        let path = temp_dir.join(format!("fmm_export_{}.srt", uuid::Uuid::new_v4()));
        fs::write(&path, contents).map_err(|e| ExportError::FilterGraph(format!("writing temp SRT: {e}")))?;
        Some(path)
    } else {
        None
    };

    let filter_complex = match &srt_path {
        Some(path) => plan.filter_complex.replace("${SRT_PATH}", &escape_subtitles_path(path)),
        None => plan.filter_complex,
    };

    let encoder = job.video_codec.clone().unwrap_or_else(|| runner.detect_hardware_encoder());
    let tmp_output = job.output_path.with_extension(format!("tmp.{}", job.container));

    let mut args: Vec<String> = vec![
        "-y".into(), "-hide_banner".into(), "-loglevel".into(), "error".into(),
        "-progress".into(), "pipe:1".into(), "-nostats".into(),
    ];
    for input in &plan.clip_inputs {
        args.push("-i".into());
        args.push(input.clone());
    }
    for extra in &plan.extra_inputs {
        args.push("-i".into());
        args.push(extra.path.to_string_lossy().into_owned());
    }
    args.push("-filter_complex".into());
    args.push(filter_complex);
    args.push("-map".into());
    args.push(format!("[{}]", plan.video_out_label));
    match &plan.audio_out_label {
        Some(label) => {
            args.push("-map".into());
            args.push(format!("[{label}]"));
        }
        None if !plan.clip_inputs.is_empty() => {
            args.push("-map".into());
            args.push("0:a?".into());
        }
        None => {}
    }
    args.push("-c:v".into());
    args.push(encoder);
    args.push("-c:a".into());
    args.push("aac".into());
    args.push(tmp_output.to_string_lossy().into_owned());

    let run_result = runner.run_with_progress(&runner.ffmpeg_path.clone(), &args, cancel, on_progress);

    if let Some(path) = &srt_path {
        let _ = fs::remove_file(path);
    }

    match run_result {
        Ok(_) => {
            fs::rename(&tmp_output, &job.output_path)
                .map_err(|e| ExportError::OutputNotWritable(e.to_string()))?;
            Ok(job.output_path.clone())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_output);
            Err(ExportError::Process(e))
        }
    }
}

fn escape_subtitles_path(path: &std::path::Path) -> String {
    // FFmpeg's `subtitles=` filter treats `:` and `\` specially inside the
    // argument; escape both before quoting.
    let raw = path.to_string_lossy().replace('\\', "\\\\").replace(':', "\\:");
    format!("'{raw}'")
}

/// Batch export: §4.8 — "runs jobs sequentially (never in parallel)".
pub fn run_batch(
    runner: Arc<ProcessRunner>,
    jobs: Vec<(ProjectState, ExportJob)>,
    temp_dir: PathBuf,
) -> Vec<Result<PathBuf, WorkerError>> {
    let total_jobs = jobs.len();
    let mut results = Vec::with_capacity(total_jobs);
    for (i, (project, job)) in jobs.into_iter().enumerate() {
        info!(job_index = i, total_jobs, "batch export: starting job");
        let handle = run(runner.clone(), project, job, temp_dir.clone());
        results.push(handle.await_result().map(|r| match r {
            WorkerResult::Exported { output_path, .. } => output_path,
            other => unreachable!("export job produced non-export result: {other:?}"),
        }));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmm_core::model::clip::VideoClip;
    use std::io::Write;

    fn fake_ffmpeg(body: &str) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        let path = file.into_temp_path();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn project_with_one_clip() -> ProjectState {
        let mut project = ProjectState::new("demo", 30.0, 1920, 1080);
        let mut clip = VideoClip::new(0, 2000);
        clip.source_path = Some("A.mp4".to_string());
        project.clips.add_clip(clip).unwrap();
        project
    }

    #[test]
    fn render_renames_temp_output_on_success() {
        let script = fake_ffmpeg("for a in \"$@\"; do last=\"$a\"; done\ntouch \"$last\"\necho progress=end\nexit 0");
        let runner = ProcessRunner { ffmpeg_path: script.to_str().unwrap().to_string(), ..ProcessRunner::default() };
        let dir = tempfile::tempdir().unwrap();
        let project = project_with_one_clip();
        let job = ExportJob {
            output_path: dir.path().join("out.mp4"),
            container: "mp4".to_string(),
            spec: OutputSpec { width: 1280, height: 720, video_gain: 1.0, tts_gain: 1.0 },
            video_codec: Some("libx264".to_string()),
        };
        let cancel = CancelFlag::new();
        let output = render_one(&runner, &project, &job, dir.path(), &cancel, |_| {}).unwrap();
        assert!(output.exists());
        assert!(!dir.path().join("out.tmp.mp4").exists());
    }

    #[test]
    fn failed_render_cleans_up_temp_output() {
        let script = fake_ffmpeg("for a in \"$@\"; do last=\"$a\"; done\ntouch \"$last\"\nexit 1");
        let runner = ProcessRunner { ffmpeg_path: script.to_str().unwrap().to_string(), ..ProcessRunner::default() };
        let dir = tempfile::tempdir().unwrap();
        let project = project_with_one_clip();
        let job = ExportJob {
            output_path: dir.path().join("out.mp4"),
            container: "mp4".to_string(),
            spec: OutputSpec { width: 1280, height: 720, video_gain: 1.0, tts_gain: 1.0 },
            video_codec: Some("libx264".to_string()),
        };
        let cancel = CancelFlag::new();
        let err = render_one(&runner, &project, &job, dir.path(), &cancel, |_| {}).unwrap_err();
        assert!(matches!(err, ExportError::Process(_)));
        assert!(!dir.path().join("out.tmp.mp4").exists());
        assert!(!job.output_path.exists());
    }
}
