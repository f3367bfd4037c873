// crates/fmm-media/src/workers/mod.rs
//
// §4.7 — every background job (audio extraction, transcription, TTS,
// waveform, frame cache) is "scheduled on a dedicated OS thread... exposes
// three events... in FIFO order." `spawn` below is the one place that
// contract is implemented; each worker module only supplies the closure.

pub mod audio_extract;
pub mod framecache;
pub mod transcription;
pub mod tts;
pub mod waveform;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::events::{channel, CancelFlag, JobHandle, WorkerEvent};

pub(crate) fn spawn<F>(work: F) -> JobHandle
where
    F: FnOnce(Uuid, crossbeam_channel::Sender<WorkerEvent>, CancelFlag) + Send + 'static,
{
    let job_id = Uuid::new_v4();
    let (tx, mailbox) = channel(job_id);
    let cancel = CancelFlag::new();
    let cancel_for_thread = cancel.clone();
    let join = std::thread::Builder::new()
        .name(format!("fmm-worker-{job_id}"))
        .spawn(move || work(job_id, tx, cancel_for_thread))
        .expect("failed to spawn worker thread");
    JobHandle::new(job_id, mailbox, cancel, join)
}

/// In-memory LRU for waveform peaks, keyed by file content hash (spec §4.7:
/// "memory-bounded by a LRU keyed on file content hash"). Bounded by total
/// byte size rather than entry count, since a peak array's size varies
/// enormously with source duration.
pub struct WaveformCache {
    entries: Mutex<LruCache<String, Arc<[(f32, f32)]>>>,
    used_bytes: AtomicUsize,
    max_bytes: usize,
}

impl WaveformCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            used_bytes: AtomicUsize::new(0),
            max_bytes,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<[(f32, f32)]>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, peaks: Vec<(f32, f32)>) -> Arc<[(f32, f32)]> {
        let bytes = std::mem::size_of_val(peaks.as_slice());
        let arc: Arc<[(f32, f32)]> = peaks.into();

        let mut entries = self.entries.lock();
        entries.put(key, arc.clone());
        self.used_bytes.fetch_add(bytes, Ordering::SeqCst);

        while self.used_bytes.load(Ordering::SeqCst) > self.max_bytes {
            match entries.pop_lru() {
                Some((_, evicted)) => {
                    self.used_bytes
                        .fetch_sub(std::mem::size_of_val(&*evicted), Ordering::SeqCst);
                }
                None => break,
            }
        }
        arc
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_cache_evicts_to_stay_under_budget() {
        // Each entry is 1000 * 8 bytes = 8000 bytes; budget fits one.
        let cache = WaveformCache::new(8000);
        cache.insert("a".to_string(), vec![(0.0, 0.0); 1000]);
        assert!(cache.get("a").is_some());
        cache.insert("b".to_string(), vec![(0.0, 0.0); 1000]);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.used_bytes() <= 8000);
    }
}
