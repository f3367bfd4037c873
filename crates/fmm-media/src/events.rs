// crates/fmm-media/src/events.rs
//
// Plain-data event and result types that cross the channel from a worker
// thread to the main thread. No egui, no process handles, no references to
// main-thread state — just what §4.7 calls "pure data."

use std::path::PathBuf;

use fmm_core::model::subtitle::SubtitleTrack;
use uuid::Uuid;

/// One of the three events every worker emits, in FIFO order, on its own
/// per-job channel. `Progress` may repeat any number of times; `Finished`
/// and `Failed` are each terminal and mutually exclusive (spec §8 property 8).
#[derive(Debug)]
pub enum WorkerEvent {
    Progress {
        current: u64,
        total: u64,
        message: Option<String>,
    },
    Finished(WorkerResult),
    Failed(WorkerError),
    /// Not terminal by itself — only emitted when cancellation raced a
    /// result that had already crossed the finish line is instead reported
    /// as `Finished`. This variant covers the case where the flag was
    /// observed before any usable result existed.
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum WorkerResult {
    AudioExtracted { job_id: Uuid, wav_path: PathBuf },
    Transcribed { job_id: Uuid, track: SubtitleTrack },
    TtsSynthesized { job_id: Uuid, track: SubtitleTrack, merged_audio_path: PathBuf },
    Waveform { job_id: Uuid, peaks: Vec<(f32, f32)> },
    FramesExtracted { job_id: Uuid, frame_dir: PathBuf, frame_count: usize },
    Exported { job_id: Uuid, output_path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Process(#[from] fmm_core::error::ProcessError),
    #[error(transparent)]
    Export(#[from] fmm_core::error::ExportError),
    #[error("{service} request failed: {detail}")]
    Http { service: String, detail: String },
    #[error("transcription failed on segment starting near {near_ms}ms: {detail}")]
    Transcription { near_ms: i64, detail: String },
    #[error("TTS failed on segment {segment_index} (\"{text_preview}\"): {detail}")]
    Tts { segment_index: usize, text_preview: String, detail: String },
    #[error("cache miss: {0}")]
    CacheMiss(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// A progress/result mailbox for a single job, backed by an unbounded
/// crossbeam channel. The main thread drains it with `try_recv`/`recv`;
/// the worker thread owns the sending half and drops it when done, which
/// is how a consumer can tell a job will emit no further events.
pub struct JobMailbox {
    pub job_id: Uuid,
    pub rx: crossbeam_channel::Receiver<WorkerEvent>,
}

pub(crate) fn channel(job_id: Uuid) -> (crossbeam_channel::Sender<WorkerEvent>, JobMailbox) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (tx, JobMailbox { job_id, rx })
}

/// Shared, cheaply-cloned cooperative cancellation flag. `cancel()` is
/// idempotent; a worker that finishes before observing it still reports
/// `Finished` rather than `Cancelled` (spec §5 cancellation semantics).
#[derive(Clone, Default)]
pub struct CancelFlag(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// A handle to a running or finished worker job, returned to the host by
/// every `Workers::start_*()` call (spec §6 host API surface).
pub struct JobHandle {
    pub job_id: Uuid,
    pub mailbox: JobMailbox,
    cancel: CancelFlag,
    join: Option<std::thread::JoinHandle<()>>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: Uuid,
        mailbox: JobMailbox,
        cancel: CancelFlag,
        join: std::thread::JoinHandle<()>,
    ) -> Self {
        Self {
            job_id,
            mailbox,
            cancel,
            join: Some(join),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain events until a terminal one arrives, blocking the calling
    /// thread. Intended for tests and the CLI smoke harness; a real host
    /// should instead poll `progress()` from its own event loop.
    pub fn await_result(mut self) -> Result<WorkerResult, WorkerError> {
        loop {
            match self.mailbox.rx.recv() {
                Ok(WorkerEvent::Finished(r)) => {
                    self.join();
                    return Ok(r);
                }
                Ok(WorkerEvent::Failed(e)) => {
                    self.join();
                    return Err(e);
                }
                Ok(WorkerEvent::Cancelled) => {
                    self.join();
                    return Err(WorkerError::Io("cancelled".to_string()));
                }
                Ok(WorkerEvent::Progress { .. }) => continue,
                Err(_) => {
                    self.join();
                    return Err(WorkerError::Io("worker mailbox closed unexpectedly".to_string()));
                }
            }
        }
    }

    /// Non-blocking drain of whatever progress events are currently queued.
    pub fn poll_progress(&self) -> Vec<WorkerEvent> {
        self.mailbox.rx.try_iter().collect()
    }

    fn join(&mut self) {
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.join();
    }
}
