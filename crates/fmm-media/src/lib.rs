// crates/fmm-media/src/lib.rs
//
// Background worker pipeline and FFmpeg-driven export renderer. Depends on
// `fmm-core` for the project model and error types; owns everything that
// spawns an external process or talks to the network. No GUI code lives
// here — `events::JobHandle` is the host-facing seam every caller uses.

pub mod events;
pub mod export;
pub mod process;
pub mod workers;

pub use events::{CancelFlag, JobHandle, JobMailbox, WorkerError, WorkerEvent, WorkerResult};
pub use process::{ProcessRunner, ProgressEvent, RunOutcome, StdinMode};
