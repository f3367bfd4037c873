// crates/fmm-core/src/autosave.rs
//
// Idle-triggered snapshotting, recovery candidate listing, and the
// recent-files MRU list. The timer itself lives on the host side; this
// module only decides, given elapsed time and dirty state, whether a tick
// should produce a write (spec S6 — zero writes with no edits since the
// last save).

use std::path::{Path, PathBuf};

use crate::error::PersistError;
use crate::model::project::ProjectState;
use crate::persistence::save_project;

pub const AUTOSAVE_INTERVAL_SECS: u64 = 30;
pub const AUTOSAVE_IDLE_MS: u64 = 5_000;
const RECENT_FILES_MAX: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryCandidate {
    pub path: PathBuf,
    pub saved_at_epoch_ms: i64,
}

/// Tracks dirty/quiescence state between autosave ticks. `now_ms` and
/// `last_edit_at_ms` are supplied by the caller (host clock) rather than
/// read internally, keeping this module free of wall-clock side effects.
pub struct AutosaveState {
    dir: PathBuf,
    dirty: bool,
    last_edit_at_ms: i64,
    last_autosave_at_ms: i64,
}

impl AutosaveState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dirty: false,
            last_edit_at_ms: 0,
            last_autosave_at_ms: 0,
        }
    }

    /// Call once per applied command.
    pub fn mark_edited(&mut self, now_ms: i64) {
        self.dirty = true;
        self.last_edit_at_ms = now_ms;
    }

    /// Call on every timer tick. Writes a snapshot and returns its path only
    /// when there has been an edit since the last autosave *and* at least
    /// `AUTOSAVE_IDLE_MS` of quiescence has elapsed since that edit.
    pub fn tick(
        &mut self,
        project: &ProjectState,
        now_ms: i64,
    ) -> Result<Option<PathBuf>, PersistError> {
        if !self.dirty {
            return Ok(None);
        }
        if now_ms.saturating_sub(self.last_edit_at_ms) < AUTOSAVE_IDLE_MS as i64 {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{now_ms}.fmm.json"));
        save_project(project, &path)?;

        self.dirty = false;
        self.last_autosave_at_ms = now_ms;
        Ok(Some(path))
    }

    pub fn last_autosave_at_ms(&self) -> i64 {
        self.last_autosave_at_ms
    }
}

/// Scan `dir` for autosave files left behind by a crash (anything present
/// at startup is, by definition, from a session that didn't clean up).
pub fn scan_recovery_candidates(dir: &Path) -> std::io::Result<Vec<RecoveryCandidate>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("tmp")
            && path.to_string_lossy().ends_with(".fmm.json")
        {
            let stem = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('.').next())
                .and_then(|n| n.parse::<i64>().ok())
                .unwrap_or(0);
            candidates.push(RecoveryCandidate {
                path,
                saved_at_epoch_ms: stem,
            });
        }
    }
    candidates.sort_by_key(|c| std::cmp::Reverse(c.saved_at_epoch_ms));
    Ok(candidates)
}

pub fn discard_recovery_candidate(candidate: &RecoveryCandidate) -> std::io::Result<()> {
    if candidate.path.exists() {
        std::fs::remove_file(&candidate.path)?;
    }
    Ok(())
}

/// MRU list of recently opened project paths, deduplicated by absolute
/// path and capped at `RECENT_FILES_MAX`.
#[derive(Debug, Clone, Default)]
pub struct RecentFiles {
    paths: Vec<PathBuf>,
}

impl RecentFiles {
    pub fn touch(&mut self, path: PathBuf) {
        self.paths.retain(|p| p != &path);
        self.paths.insert(0, path);
        self.paths.truncate(RECENT_FILES_MAX);
    }

    pub fn list(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn s6_no_writes_without_edits() {
        let dir = tempdir().unwrap();
        let mut autosave = AutosaveState::new(dir.path().join("autosave"));
        let project = ProjectState::new("demo", 30.0, 1920, 1080);

        let result = autosave.tick(&project, 100_000).unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join("autosave").exists());
    }

    #[test]
    fn s6_one_write_after_edit_and_idle() {
        let dir = tempdir().unwrap();
        let mut autosave = AutosaveState::new(dir.path().join("autosave"));
        let project = ProjectState::new("demo", 30.0, 1920, 1080);

        autosave.mark_edited(0);
        assert!(autosave.tick(&project, 1_000).unwrap().is_none(), "still within idle window");

        let written = autosave.tick(&project, AUTOSAVE_IDLE_MS as i64 + 1).unwrap();
        assert!(written.is_some());

        // A further tick with no new edit must not write again.
        assert!(autosave.tick(&project, AUTOSAVE_IDLE_MS as i64 + 10_000).unwrap().is_none());
    }

    #[test]
    fn recovery_scan_finds_autosave_files() {
        let dir = tempdir().unwrap();
        let autosave_dir = dir.path().join("autosave");
        std::fs::create_dir_all(&autosave_dir).unwrap();
        std::fs::write(autosave_dir.join("1000.fmm.json"), "{}").unwrap();
        std::fs::write(autosave_dir.join("2000.fmm.json"), "{}").unwrap();

        let candidates = scan_recovery_candidates(&autosave_dir).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].saved_at_epoch_ms, 2000, "newest first");
    }

    #[test]
    fn recent_files_deduplicates_and_caps() {
        let mut recent = RecentFiles::default();
        for i in 0..15 {
            recent.touch(PathBuf::from(format!("/p{i}.fmm.json")));
        }
        recent.touch(PathBuf::from("/p5.fmm.json"));
        assert_eq!(recent.list().len(), RECENT_FILES_MAX);
        assert_eq!(recent.list()[0], PathBuf::from("/p5.fmm.json"));
    }
}
