// crates/fmm-core/src/error.rs
//
// Exhaustive, tagged error types for the core. Mirrors the error-enum-per-
// subsystem shape used elsewhere in the corpus (HlsError/FfmpegError):
// one enum per concern, composed into CoreError via #[from] so callers that
// don't care which subsystem failed can still propagate with `?`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid timecode '{token}', expected one of: {expected}")]
    InvalidTimecode { token: String, expected: String },

    #[error("segment overlaps an existing segment")]
    Overlap,

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("no entry at index {0}")]
    NotFound(usize),

    #[error("source '{path}' at {source_ms}ms is reached by more than one clip; pass hint_idx")]
    AmbiguousSource { path: String, source_ms: i64 },
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("unsupported project version {found} (newest known is {max})")]
    UnsupportedVersion { found: u32, max: u32 },

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal: a referenced file (video/audio/image) was missing at load time.
/// Collected separately from `PersistError` so load can still succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedFileMissing {
    pub path: String,
    pub context: String,
}

/// Errors from the external process runner (ffmpeg/ffprobe/transcriber
/// subprocesses). Lives in core rather than the media crate so `CoreError`
/// can compose it without a dependency inversion.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {status}: {stderr_tail}")]
    NonZeroExit {
        program: String,
        status: i32,
        stderr_tail: String,
    },

    #[error("'{program}' produced no output before the {timeout_secs}s stall timeout")]
    Stalled { program: String, timeout_secs: u64 },

    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("unsupported or missing hardware encoder: {0}")]
    EncoderUnavailable(String),

    #[error("invalid filter graph: {0}")]
    FilterGraph(String),

    #[error("output path '{0}' is not writable")]
    OutputNotWritable(String),
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned status {status}: {body_tail}")]
    ApiError {
        service: String,
        status: u16,
        body_tail: String,
    },

    #[error("missing API key for {service}; set the {env_var} environment variable")]
    MissingApiKey { service: String, env_var: String },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Http(#[from] HttpError),
}
