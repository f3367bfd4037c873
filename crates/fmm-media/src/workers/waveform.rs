// crates/fmm-media/src/workers/waveform.rs
//
// §4.7 "Waveform": per-millisecond (positive, negative) peak pairs from a
// WAV, normalized to [-1, 1], processed in ~1-second chunks so memory use
// stays bounded regardless of file length. `hound` streams samples off a
// buffered file reader rather than decoding the whole file into one
// `Vec<f32>` up front.

use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::events::{CancelFlag, JobHandle, WorkerError, WorkerEvent, WorkerResult};
use crate::workers::WaveformCache;

pub fn start(wav_path: PathBuf, cache: Arc<WaveformCache>) -> JobHandle {
    super::spawn(move |job_id, tx, cancel| {
        info!(%job_id, wav_path = %wav_path.display(), "waveform computation started");
        match compute_cached(&wav_path, &cache, &cancel) {
            Ok(peaks) => {
                info!(%job_id, ms = peaks.len(), "waveform computation finished");
                let _ = tx.send(WorkerEvent::Finished(WorkerResult::Waveform { job_id, peaks: peaks.to_vec() }));
            }
            Err(WorkerError::Io(msg)) if msg == "cancelled" => {
                info!(%job_id, "waveform computation cancelled");
                let _ = tx.send(WorkerEvent::Cancelled);
            }
            Err(e) => {
                warn!(%job_id, error = %e, "waveform computation failed");
                let _ = tx.send(WorkerEvent::Failed(e));
            }
        }
    })
}

fn compute_cached(
    wav_path: &Path,
    cache: &WaveformCache,
    cancel: &CancelFlag,
) -> Result<Arc<[(f32, f32)]>, WorkerError> {
    let key = content_hash(wav_path)?;
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }
    let peaks = compute(wav_path, cancel)?;
    Ok(cache.insert(key, peaks))
}

fn content_hash(path: &Path) -> Result<String, WorkerError> {
    let mut file = std::fs::File::open(path).map_err(|e| WorkerError::Io(e.to_string()))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| WorkerError::Io(e.to_string()))?;
        if n == 0 {
            break;
        }
        buf[..n].hash(&mut hasher);
    }
    Ok(format!("{:016x}", hasher.finish()))
}

/// Computes per-ms (positive, negative) peaks. `chunk_frames` bounds how
/// often the cancellation flag is polled — roughly every second of audio at
/// the file's own sample rate, matching the spec's "~1-second chunk" cadence.
fn compute(wav_path: &Path, cancel: &CancelFlag) -> Result<Vec<(f32, f32)>, WorkerError> {
    let mut reader = hound::WavReader::open(wav_path).map_err(|e| WorkerError::DecodeFailed(e.to_string()))?;
    let spec = reader.spec();
    let sample_rate = (spec.sample_rate as f64).max(1.0);
    let channels = spec.channels.max(1) as u64;
    let total_frames = reader.duration() as u64;
    let ms_count = ((total_frames as f64 / sample_rate) * 1000.0).ceil() as usize;
    let mut peaks = vec![(0f32, 0f32); ms_count.max(1)];
    let chunk_frames = spec.sample_rate.max(1) as u64;

    let mut frame_index: u64 = 0;
    let mut sample_in_frame: u64 = 0;

    macro_rules! record {
        ($value:expr) => {{
            let ms = ((frame_index as f64 / sample_rate) * 1000.0) as usize;
            if ms < peaks.len() {
                let entry = &mut peaks[ms];
                entry.0 = entry.0.max($value);
                entry.1 = entry.1.min($value);
            }
            sample_in_frame += 1;
            if sample_in_frame == channels {
                sample_in_frame = 0;
                frame_index += 1;
                if frame_index % chunk_frames == 0 && cancel.is_cancelled() {
                    return Err(WorkerError::Io("cancelled".to_string()));
                }
            }
        }};
    }

    match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            for sample in reader.samples::<i32>() {
                let sample = sample.map_err(|e| WorkerError::DecodeFailed(e.to_string()))?;
                record!((sample as f32 / scale).clamp(-1.0, 1.0));
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                let sample = sample.map_err(|e| WorkerError::DecodeFailed(e.to_string()))?;
                record!(sample.clamp(-1.0, 1.0));
            }
        }
    }

    Ok(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn peaks_are_normalized_and_one_per_ms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        // 1kHz sample rate => one sample per ms.
        write_test_wav(&path, &[i16::MAX, i16::MIN, 0, 16384]);

        let cancel = CancelFlag::new();
        let peaks = compute(&path, &cancel).unwrap();
        assert_eq!(peaks.len(), 4);
        assert!((peaks[0].0 - 1.0).abs() < 0.001);
        assert!((peaks[1].1 - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn waveform_cache_hit_skips_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        write_test_wav(&path, &[100, -100, 200]);

        let cache = Arc::new(WaveformCache::new(1024 * 1024));
        let cancel = CancelFlag::new();
        let first = compute_cached(&path, &cache, &cancel).unwrap();
        let second = compute_cached(&path, &cache, &cancel).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
