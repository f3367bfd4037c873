// crates/fmm-media/src/workers/audio_extract.rs
//
// §4.7 "Audio Extraction" worker: `ffmpeg -ac 1 -ar 16000 -vn -f wav` to a
// temp file. The mono/16kHz choice matches what a downstream transcription
// engine expects and keeps the Waveform worker's input small.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::events::{JobHandle, WorkerEvent, WorkerResult};
use crate::process::{ProcessError, ProcessRunner};

pub fn start(runner: Arc<ProcessRunner>, video_path: PathBuf, temp_dir: PathBuf) -> JobHandle {
    super::spawn(move |job_id, tx, cancel| {
        let wav_path = temp_dir.join(format!("fmm_audio_{job_id}.wav"));
        info!(%job_id, video_path = %video_path.display(), "audio extraction started");
        let result = extract(&runner, &video_path, &wav_path, &cancel, |current_ms, total_ms| {
            let _ = tx.send(WorkerEvent::Progress {
                current: current_ms.max(0) as u64,
                total: total_ms.unwrap_or(0).max(0) as u64,
                message: None,
            });
        });

        match result {
            Ok(()) => {
                info!(%job_id, wav_path = %wav_path.display(), "audio extraction finished");
                let _ = tx.send(WorkerEvent::Finished(WorkerResult::AudioExtracted { job_id, wav_path }));
            }
            Err(ProcessError::Cancelled) => {
                info!(%job_id, "audio extraction cancelled");
                let _ = tx.send(WorkerEvent::Cancelled);
            }
            Err(e) => {
                warn!(%job_id, error = %e, "audio extraction failed");
                let _ = tx.send(WorkerEvent::Failed(e.into()));
            }
        }
    })
}

fn extract(
    runner: &ProcessRunner,
    video_path: &Path,
    wav_path: &Path,
    cancel: &crate::events::CancelFlag,
    on_progress: impl FnMut(i64, Option<i64>),
) -> Result<(), ProcessError> {
    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        "-i".to_string(),
        video_path.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-ar".to_string(),
        "16000".to_string(),
        "-f".to_string(),
        "wav".to_string(),
        wav_path.to_string_lossy().into_owned(),
    ];

    let mut on_progress = on_progress;
    runner.run_with_progress(&runner.ffmpeg_path.clone(), &args, cancel, move |e| {
        on_progress(e.current_ms, e.total_ms)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CancelFlag;
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

    #[test]
    fn extract_writes_output_path_on_success() {
        let script = fake_ffmpeg("for a in \"$@\"; do last=\"$a\"; done; touch \"$last\"; echo progress=end; exit 0");
        let runner = ProcessRunner {
            ffmpeg_path: script.to_str().unwrap().to_string(),
            ..ProcessRunner::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("out.wav");
        let cancel = CancelFlag::new();
        extract(&runner, Path::new("/dev/null"), &wav_path, &cancel, |_, _| {}).unwrap();
        assert!(wav_path.exists());
    }

    #[test]
    fn extract_propagates_non_zero_exit() {
        let script = fake_ffmpeg("exit 1");
        let runner = ProcessRunner {
            ffmpeg_path: script.to_str().unwrap().to_string(),
            ..ProcessRunner::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("out.wav");
        let cancel = CancelFlag::new();
        let err = extract(&runner, Path::new("/dev/null"), &wav_path, &cancel, |_, _| {}).unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { .. }));
    }
}
