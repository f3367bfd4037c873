// crates/fmm-media/src/workers/framecache.rs
//
// §4.7 "Frame Cache": JPEG thumbnails at integer-second positions, one file
// per project under the temp dir, looked up by binary search over sorted
// filenames, evicted by an LRU-on-disk policy bounded by a byte budget.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{info, warn};

use crate::events::{JobHandle, WorkerEvent, WorkerResult};
use crate::process::{ProcessError, ProcessRunner};

fn frame_file_name(second: i64) -> String {
    format!("frame_{second:09}.jpg")
}

fn parse_frame_second(name: &str) -> Option<i64> {
    name.strip_prefix("frame_")?.strip_suffix(".jpg")?.parse().ok()
}

pub struct FrameCache {
    dir: PathBuf,
    max_bytes: u64,
}

impl FrameCache {
    pub fn new(dir: PathBuf, max_bytes: u64) -> std::io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_bytes })
    }

    pub fn frame_path(&self, second: i64) -> PathBuf {
        self.dir.join(frame_file_name(second))
    }

    /// Binary search over the sorted, parsed filenames already on disk.
    pub fn lookup(&self, second: i64) -> Option<PathBuf> {
        let mut seconds = self.cached_seconds();
        seconds.sort_unstable();
        seconds.binary_search(&second).ok().map(|_| self.frame_path(second))
    }

    fn cached_seconds(&self) -> Vec<i64> {
        let Ok(entries) = fs::read_dir(&self.dir) else { return Vec::new() };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| parse_frame_second(e.file_name().to_str()?))
            .collect()
    }

    /// Evict oldest-accessed files until the directory's total size is
    /// under `max_bytes`. Modification time stands in for access time: the
    /// entry just written is always newest, so it survives eviction.
    fn enforce_budget(&self) -> std::io::Result<()> {
        let mut entries: Vec<(PathBuf, SystemTime, u64)> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                Some((e.path(), meta.modified().ok()?, meta.len()))
            })
            .collect();

        let mut total: u64 = entries.iter().map(|(_, _, len)| len).sum();
        if total <= self.max_bytes {
            return Ok(());
        }
        entries.sort_by_key(|(_, mtime, _)| *mtime);

        for (path, _, len) in entries {
            if total <= self.max_bytes {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(len);
            }
        }
        Ok(())
    }

    pub fn disk_bytes(&self) -> u64 {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

pub fn start(
    runner: Arc<ProcessRunner>,
    video_path: PathBuf,
    cache: Arc<FrameCache>,
    seconds: Vec<i64>,
) -> JobHandle {
    super::spawn(move |job_id, tx, cancel| {
        let total = seconds.len();
        info!(%job_id, total, "frame cache extraction started");
        let mut extracted = 0usize;
        for (i, second) in seconds.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(%job_id, extracted, "frame cache extraction cancelled");
                let _ = tx.send(WorkerEvent::Cancelled);
                return;
            }
            if cache.lookup(second).is_some() {
                extracted += 1;
                continue;
            }
            match extract_one(&runner, &video_path, &cache, second) {
                Ok(()) => extracted += 1,
                Err(e) => {
                    warn!(%job_id, second, error = %e, "frame cache extraction failed");
                    let _ = tx.send(WorkerEvent::Failed(e.into()));
                    return;
                }
            }
            let _ = tx.send(WorkerEvent::Progress { current: (i + 1) as u64, total: total as u64, message: None });
        }

        info!(%job_id, extracted, "frame cache extraction finished");
        let _ = tx.send(WorkerEvent::Finished(WorkerResult::FramesExtracted {
            job_id,
            frame_dir: cache.dir.clone(),
            frame_count: extracted,
        }));
    })
}

fn extract_one(runner: &ProcessRunner, video_path: &Path, cache: &FrameCache, second: i64) -> Result<(), ProcessError> {
    let out_path = cache.frame_path(second);
    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        second.to_string(),
        "-i".to_string(),
        video_path.to_string_lossy().into_owned(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        out_path.to_string_lossy().into_owned(),
    ];
    runner.run_capture(&runner.ffmpeg_path.clone(), &args)?;
    let _ = cache.enforce_budget();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fake_ffmpeg() -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "#!/bin/sh\nfor a in \"$@\"; do last=\"$a\"; done\nhead -c 1000 /dev/zero > \"$last\"\nexit 0"
        )
        .unwrap();
        let path = file.into_temp_path();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn lookup_finds_extracted_frame() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FrameCache::new(dir.path().join("frames"), 10_000_000).unwrap();
        let script = fake_ffmpeg();
        let runner = ProcessRunner { ffmpeg_path: script.to_str().unwrap().to_string(), ..ProcessRunner::default() };
        extract_one(&runner, Path::new("/dev/null"), &cache, 5).unwrap();
        assert!(cache.lookup(5).is_some());
        assert!(cache.lookup(6).is_none());
    }

    #[test]
    fn eviction_keeps_disk_usage_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        // Each frame is ~1000 bytes; budget fits ~2.
        let cache = FrameCache::new(dir.path().join("frames"), 2_500).unwrap();
        let script = fake_ffmpeg();
        let runner = ProcessRunner { ffmpeg_path: script.to_str().unwrap().to_string(), ..ProcessRunner::default() };
        for second in 0..5 {
            extract_one(&runner, Path::new("/dev/null"), &cache, second).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(cache.disk_bytes() <= 2_500);
    }
}
