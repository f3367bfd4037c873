// crates/fmm-media/src/process.rs
//
// §4.6 — the one abstraction every external process (FFmpeg, FFprobe, the
// transcription engine) is launched through. Two invariants the rest of
// the crate leans on:
//
//   1. stdout and stderr are drained concurrently, on their own threads.
//      FFmpeg blocks once a pipe's OS buffer fills (stderr commonly exceeds
//      4 KB on a busy filter graph); single-pipe draining deadlocks the
//      whole job. This is "mandatory" per spec, not an optimization.
//   2. cancellation is cooperative-first: `q` on stdin, then a grace
//      period, then `kill()`. A process with no stdin pipe (StdinMode::Null)
//      skips straight to `kill()` since it has no channel to ask nicely.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

pub use fmm_core::error::ProcessError;

use crate::events::CancelFlag;

const STDERR_TAIL_LINES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    Null,
    Piped,
}

/// A parsed `-progress pipe:1` emission: FFmpeg writes a block of
/// `key=value` lines ending in `progress=continue|end`; this is the one
/// field the workers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub current_ms: i64,
    pub total_ms: Option<i64>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub stdout: Vec<u8>,
    pub stderr_tail: String,
}

pub struct ProcessRunner {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub cancel_grace: Duration,
    /// How long a process may produce nothing on stdout/stderr before the
    /// caller is warned (spec: "still not terminated — a warning event").
    pub stall_warning: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            cancel_grace: Duration::from_secs(2),
            stall_warning: Duration::from_secs(5),
        }
    }
}

impl ProcessRunner {
    pub fn from_config(config: &fmm_core::config::ProcessConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            cancel_grace: Duration::from_secs(config.cancel_grace_period_secs),
            stall_warning: Duration::from_secs(config.stall_warning_secs),
        }
    }

    /// Run `program` to completion, draining stdout and stderr concurrently,
    /// with no cancellation support (used for short-lived probes like
    /// `ffprobe`, which never need `q`-on-stdin cancellation).
    pub fn run_capture(&self, program: &str, args: &[String]) -> Result<RunOutcome, ProcessError> {
        self.run(program, args, StdinMode::Null, None, |_| {})
    }

    /// Run `ffmpeg`, reporting `-progress pipe:1` lines via `on_progress`
    /// and honoring `cancel`: a `q` is written to stdin as soon as the flag
    /// is observed, escalating to `kill()` if the process hasn't exited
    /// within `cancel_grace`.
    pub fn run_with_progress(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancelFlag,
        on_progress: impl FnMut(ProgressEvent),
    ) -> Result<RunOutcome, ProcessError> {
        self.run(program, args, StdinMode::Piped, Some(cancel), on_progress)
    }

    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin_mode: StdinMode,
        cancel: Option<&CancelFlag>,
        mut on_progress: impl FnMut(ProgressEvent),
    ) -> Result<RunOutcome, ProcessError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(match stdin_mode {
                StdinMode::Null => Stdio::null(),
                StdinMode::Piped => Stdio::piped(),
            });

        debug!(program, ?args, "spawning external process");
        let mut child = command.spawn().map_err(|source| {
            warn!(program, error = %source, "failed to spawn external process");
            ProcessError::Spawn { program: program.to_string(), source }
        })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        // Both pipes get their own draining thread so neither can back up
        // and stall the child while the other is read.
        let (progress_tx, progress_rx) = mpsc::channel::<ProgressLine>();
        let stdout_join = std::thread::spawn(move || drain_stdout(stdout, progress_tx));
        let stderr_join = std::thread::spawn(move || drain_stderr(stderr));

        let mut last_activity = Instant::now();

        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|source| ProcessError::Spawn { program: program.to_string(), source })?
            {
                break status;
            }

            if let Ok(line) = progress_rx.recv_timeout(Duration::from_millis(50)) {
                last_activity = Instant::now();
                match line {
                    ProgressLine::OutTimeMs(current_ms) => {
                        on_progress(ProgressEvent { current_ms, total_ms: None });
                    }
                    ProgressLine::End => {}
                }
            }

            if let Some(cancel) = cancel {
                if cancel.is_cancelled() {
                    debug!(program, "cancellation requested, signalling child");
                    request_cancel(&mut child, stdin_mode, self.cancel_grace)?;
                    return Err(ProcessError::Cancelled);
                }
            }

            if last_activity.elapsed() > self.stall_warning {
                // Non-fatal: the caller decides whether to surface this as
                // a warning. We reset the clock so it doesn't repeat every
                // poll.
                warn!(program, stall_secs = self.stall_warning.as_secs(), "no progress from external process");
                last_activity = Instant::now();
            }
        };

        let stderr_tail = stderr_join.join().unwrap_or_default();
        let _ = stdout_join.join();

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            warn!(program, code, stderr_tail, "external process exited non-zero");
            return Err(ProcessError::NonZeroExit {
                program: program.to_string(),
                status: code,
                stderr_tail,
            });
        }

        debug!(program, "external process exited successfully");
        Ok(RunOutcome { stdout: Vec::new(), stderr_tail })
    }

    /// Probe `ffmpeg -encoders` for a hardware encoder matching the current
    /// platform, falling back to `libx264`. Never fails outright — an
    /// unreadable/absent ffmpeg still yields the baseline name, since the
    /// caller's subsequent `ffmpeg` invocation is what will actually error.
    pub fn detect_hardware_encoder(&self) -> String {
        let candidates: &[&str] = if cfg!(target_os = "macos") {
            &["h264_videotoolbox"]
        } else if cfg!(target_os = "windows") {
            &["h264_nvenc", "h264_qsv", "h264_amf"]
        } else {
            &["h264_vaapi", "h264_nvenc"]
        };

        let Ok(outcome) = self.run_capture(&self.ffmpeg_path, &["-hide_banner".into(), "-encoders".into()]) else {
            return "libx264".to_string();
        };
        let listing = String::from_utf8_lossy(&outcome.stdout);
        for candidate in candidates {
            if listing.contains(candidate) {
                return candidate.to_string();
            }
        }
        "libx264".to_string()
    }
}

enum ProgressLine {
    OutTimeMs(i64),
    End,
}

/// FFmpeg's `-progress` output never reports a total duration — only
/// `out_time_ms`/`out_time_us` and a terminal `progress=end` — so total
/// duration is the caller's responsibility to supply (it already knows the
/// project's timeline length).
fn drain_stdout(stdout: impl Read, tx: mpsc::Sender<ProgressLine>) {
    for line in BufReader::new(stdout).lines().map_while(Result::ok) {
        if let Some(v) = line.strip_prefix("out_time_ms=") {
            if let Ok(us) = v.trim().parse::<i64>() {
                let _ = tx.send(ProgressLine::OutTimeMs(us / 1000));
            }
        } else if let Some(v) = line.strip_prefix("out_time_us=") {
            if let Ok(us) = v.trim().parse::<i64>() {
                let _ = tx.send(ProgressLine::OutTimeMs(us / 1000));
            }
        } else if line.trim() == "progress=end" {
            let _ = tx.send(ProgressLine::End);
        }
    }
}

/// Keep only the last `STDERR_TAIL_LINES` for error reporting — FFmpeg's
/// stderr is chatty (codec banners, per-frame stats) and the full capture
/// is rarely useful once something has gone wrong.
fn drain_stderr(stderr: impl Read) -> String {
    let mut tail: std::collections::VecDeque<String> = std::collections::VecDeque::with_capacity(STDERR_TAIL_LINES);
    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}

fn request_cancel(child: &mut Child, stdin_mode: StdinMode, grace: Duration) -> Result<(), ProcessError> {
    if stdin_mode == StdinMode::Piped {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(b"q");
            let _ = stdin.flush();
        }
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    warn!(grace_secs = grace.as_secs(), "process ignored cooperative cancel, killing");
    let _ = child.kill();
    let _ = child.wait();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CancelFlag;

    /// A tiny stand-in "ffmpeg": writes progress lines to stdout, ignores
    /// stdin, sleeps briefly, exits 0. Lets process.rs tests run without a
    /// real FFmpeg binary on the test machine.
    fn fake_ffmpeg_script(body: &str) -> tempfile::TempPath {
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
    fn run_capture_reports_non_zero_exit() {
        let runner = ProcessRunner::default();
        let script = fake_ffmpeg_script("echo 'boom' 1>&2; exit 3");
        let err = runner
            .run_capture(script.to_str().unwrap(), &[])
            .unwrap_err();
        match err {
            ProcessError::NonZeroExit { status, stderr_tail, .. } => {
                assert_eq!(status, 3);
                assert!(stderr_tail.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn run_capture_succeeds_on_zero_exit() {
        let runner = ProcessRunner::default();
        let script = fake_ffmpeg_script("echo hi; exit 0");
        let outcome = runner.run_capture(script.to_str().unwrap(), &[]).unwrap();
        assert!(outcome.stderr_tail.is_empty());
    }

    #[test]
    fn progress_lines_are_parsed() {
        let runner = ProcessRunner::default();
        let script = fake_ffmpeg_script(
            "echo 'out_time_ms=1000000'; sleep 0.05; echo 'out_time_ms=2000000'; echo progress=end",
        );
        let cancel = CancelFlag::new();
        let mut seen = Vec::new();
        runner
            .run_with_progress(script.to_str().unwrap(), &[], &cancel, |e| seen.push(e.current_ms))
            .unwrap();
        assert_eq!(seen, vec![1000, 2000]);
    }

    #[test]
    fn cancellation_is_cooperative_then_killed() {
        let runner = ProcessRunner {
            cancel_grace: Duration::from_millis(200),
            ..ProcessRunner::default()
        };
        // ignores stdin `q` on purpose (no `read`), forcing the grace-period kill path.
        let script = fake_ffmpeg_script("sleep 5");
        let cancel = CancelFlag::new();
        cancel.cancel();
        let started = Instant::now();
        let err = runner
            .run_with_progress(script.to_str().unwrap(), &[], &cancel, |_| {})
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn detect_hardware_encoder_falls_back_without_ffmpeg() {
        let runner = ProcessRunner {
            ffmpeg_path: "definitely-not-a-real-binary".to_string(),
            ..ProcessRunner::default()
        };
        assert_eq!(runner.detect_hardware_encoder(), "libx264");
    }
}
