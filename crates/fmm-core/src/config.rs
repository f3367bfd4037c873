// crates/fmm-core/src/config.rs
//
// Host-provided configuration: FFmpeg/FFprobe paths, data/temp directory
// roots, worker concurrency, autosave cadence, and LRU cache budgets. One
// struct per concern, the same shape as `CacheConfig`/`SegmentConfig` in
// `miquels-hls-server/src/config.rs`, loaded from an optional `config.toml`
// with struct-level `Default` impls filling in everything the file omits.
//
// API keys for premium TTS are deliberately not fields here — they are read
// from the environment only (see `fmm_media::workers::tts`), so a `Config`
// can always be serialized without leaking a secret into a project export.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Seconds of no stdout/stderr progress before a running process is
    /// considered stalled (a warning, not a termination).
    pub stall_warning_secs: u64,
    /// Grace period after cooperative cancellation (`q` on stdin) before
    /// escalating to a hard kill.
    pub cancel_grace_period_secs: u64,
    pub network_timeout_secs: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            stall_warning_secs: 5,
            cancel_grace_period_secs: 2,
            network_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_waveform_memory_bytes: usize,
    pub max_frame_cache_disk_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_waveform_memory_bytes: 64 * 1024 * 1024,
            max_frame_cache_disk_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    pub interval_secs: u64,
    pub idle_ms: u64,
    pub recent_files_max: usize,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: crate::autosave::AUTOSAVE_INTERVAL_SECS,
            idle_ms: crate::autosave::AUTOSAVE_IDLE_MS,
            recent_files_max: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Upper bound on concurrently running background workers.
    pub worker_concurrency: usize,
    pub process: ProcessConfig,
    pub cache: CacheConfig,
    pub autosave: AutosaveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("fastmoviemaker"),
            temp_dir: std::env::temp_dir().join("fastmoviemaker-tmp"),
            worker_concurrency: 4,
            process: ProcessConfig::default(),
            cache: CacheConfig::default(),
            autosave: AutosaveConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
