// crates/fmm-media/src/workers/transcription.rs
//
// §9 models the transcription engine as a capability trait, not a
// hard-wired dependency — the core "does not perform speech recognition
// internally" (§1 non-goal). `Transcriber::load`/`transcribe` are the seam;
// `ProcessTranscriber` is the one concrete implementation we ship, driving
// an external CLI through the same `ProcessRunner` FFmpeg uses.

use std::path::{Path, PathBuf};

use fmm_core::model::subtitle::{SubtitleSegment, SubtitleTrack};
use tracing::{info, warn};

use crate::events::{JobHandle, WorkerError, WorkerEvent, WorkerResult};
use crate::process::ProcessRunner;

#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Chunk length fed to the engine at a time (spec default ~5s), so
    /// cancellation can take effect "at chunk boundaries" rather than only
    /// after the whole file finishes.
    pub chunk_ms: i64,
    pub language: Option<String>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self { chunk_ms: 5_000, language: None }
    }
}

#[derive(Debug, Clone)]
pub struct TranscribedSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

/// Capability seam for an external speech-recognition engine. `load` is
/// intentionally fallible and separate from construction: model weights
/// are loaded lazily, on the worker thread, never blocking the caller.
pub trait Transcriber: Send {
    fn load(&mut self, model_id: &str) -> Result<(), WorkerError>;
    fn transcribe_chunk(
        &mut self,
        wav_path: &Path,
        chunk_start_ms: i64,
        chunk_end_ms: i64,
    ) -> Result<Vec<TranscribedSegment>, WorkerError>;
}

/// Drives an external transcription binary: `<binary> --model <id> --wav
/// <path> --start-ms <a> --end-ms <b>`, one JSON object per line on stdout:
/// `{"start_ms": .., "end_ms": .., "text": ".."}`.
pub struct ProcessTranscriber {
    runner: std::sync::Arc<ProcessRunner>,
    binary_path: String,
    model_id: String,
}

impl ProcessTranscriber {
    pub fn new(runner: std::sync::Arc<ProcessRunner>, binary_path: impl Into<String>) -> Self {
        Self { runner, binary_path: binary_path.into(), model_id: String::new() }
    }
}

impl Transcriber for ProcessTranscriber {
    fn load(&mut self, model_id: &str) -> Result<(), WorkerError> {
        self.model_id = model_id.to_string();
        Ok(())
    }

    fn transcribe_chunk(
        &mut self,
        wav_path: &Path,
        chunk_start_ms: i64,
        chunk_end_ms: i64,
    ) -> Result<Vec<TranscribedSegment>, WorkerError> {
        let args = vec![
            "--model".to_string(),
            self.model_id.clone(),
            "--wav".to_string(),
            wav_path.to_string_lossy().into_owned(),
            "--start-ms".to_string(),
            chunk_start_ms.to_string(),
            "--end-ms".to_string(),
            chunk_end_ms.to_string(),
        ];
        let outcome = self.runner.run_capture(&self.binary_path, &args).map_err(WorkerError::from)?;
        parse_jsonl(&outcome.stdout)
    }
}

fn parse_jsonl(bytes: &[u8]) -> Result<Vec<TranscribedSegment>, WorkerError> {
    let text = String::from_utf8_lossy(bytes);
    let mut segments = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| WorkerError::Transcription { near_ms: 0, detail: e.to_string() })?;
        let start_ms = value["start_ms"].as_i64().unwrap_or(0);
        let end_ms = value["end_ms"].as_i64().unwrap_or(start_ms);
        let text = value["text"].as_str().unwrap_or("").to_string();
        segments.push(TranscribedSegment { start_ms, end_ms, text });
    }
    Ok(segments)
}

pub fn start(
    mut transcriber: Box<dyn Transcriber>,
    model_id: String,
    wav_path: PathBuf,
    total_duration_ms: i64,
    language: String,
    opts: TranscribeOptions,
) -> JobHandle {
    super::spawn(move |job_id, tx, cancel| {
        info!(%job_id, model_id, "transcription started");
        if let Err(e) = transcriber.load(&model_id) {
            warn!(%job_id, error = %e, "transcription model load failed");
            let _ = tx.send(WorkerEvent::Failed(e));
            return;
        }
        if cancel.is_cancelled() {
            info!(%job_id, "transcription cancelled before first chunk");
            let _ = tx.send(WorkerEvent::Cancelled);
            return;
        }

        let mut track = SubtitleTrack::new("Transcript", &language);
        let mut cursor = 0i64;
        while cursor < total_duration_ms {
            if cancel.is_cancelled() {
                info!(%job_id, cursor, "transcription cancelled at chunk boundary");
                let _ = tx.send(WorkerEvent::Cancelled);
                return;
            }
            let chunk_end = (cursor + opts.chunk_ms).min(total_duration_ms);
            match transcriber.transcribe_chunk(&wav_path, cursor, chunk_end) {
                Ok(segments) => {
                    for seg in segments {
                        if track.add_segment(SubtitleSegment::new(seg.start_ms, seg.end_ms, seg.text)).is_err() {
                            // Engine emitted an overlapping span; drop it rather
                            // than corrupting the track's disjoint invariant.
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(%job_id, cursor, error = %e, "transcription chunk failed");
                    let _ = tx.send(WorkerEvent::Failed(e));
                    return;
                }
            }
            let _ = tx.send(WorkerEvent::Progress {
                current: chunk_end.max(0) as u64,
                total: total_duration_ms.max(0) as u64,
                message: None,
            });
            cursor = chunk_end;
        }

        info!(%job_id, segments = track.segments.len(), "transcription finished");
        let _ = tx.send(WorkerEvent::Finished(WorkerResult::Transcribed { job_id, track }));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FakeTranscriber {
        calls: Arc<Mutex<Vec<(i64, i64)>>>,
    }

    impl Transcriber for FakeTranscriber {
        fn load(&mut self, _model_id: &str) -> Result<(), WorkerError> {
            Ok(())
        }

        fn transcribe_chunk(
            &mut self,
            _wav_path: &Path,
            chunk_start_ms: i64,
            chunk_end_ms: i64,
        ) -> Result<Vec<TranscribedSegment>, WorkerError> {
            self.calls.lock().unwrap().push((chunk_start_ms, chunk_end_ms));
            Ok(vec![TranscribedSegment {
                start_ms: chunk_start_ms,
                end_ms: chunk_end_ms,
                text: format!("chunk {chunk_start_ms}"),
            }])
        }
    }

    #[test]
    fn chunks_cover_full_duration_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let transcriber = Box::new(FakeTranscriber { calls: calls.clone() });
        let handle = start(
            transcriber,
            "tiny".to_string(),
            PathBuf::from("/dev/null"),
            12_000,
            "en".to_string(),
            TranscribeOptions { chunk_ms: 5_000, language: None },
        );
        let result = handle.await_result().unwrap();
        match result {
            WorkerResult::Transcribed { track, .. } => {
                assert_eq!(track.segments.len(), 3);
                assert_eq!(track.segments.last().unwrap().end_ms, 12_000);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(*calls.lock().unwrap(), vec![(0, 5000), (5000, 10000), (10000, 12000)]);
    }

    #[test]
    fn cancellation_between_chunks_reports_cancelled() {
        struct SlowCancellingTranscriber;
        impl Transcriber for SlowCancellingTranscriber {
            fn load(&mut self, _model_id: &str) -> Result<(), WorkerError> {
                Ok(())
            }
            fn transcribe_chunk(
                &mut self,
                _wav_path: &Path,
                chunk_start_ms: i64,
                chunk_end_ms: i64,
            ) -> Result<Vec<TranscribedSegment>, WorkerError> {
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(vec![TranscribedSegment { start_ms: chunk_start_ms, end_ms: chunk_end_ms, text: String::new() }])
            }
        }

        let handle = start(
            Box::new(SlowCancellingTranscriber),
            "tiny".to_string(),
            PathBuf::from("/dev/null"),
            20_000,
            "en".to_string(),
            TranscribeOptions::default(),
        );
        handle.cancel();
        let err = handle.await_result().unwrap_err();
        assert!(matches!(err, WorkerError::Io(_)));
    }
}
