use crate::error::PersistError;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use ultranode_hal::KvStore;
use ultranode_proto::{OutputClass, SlotId};

/// Per-slot payload cap (§4.6): "1024 bytes including terminator".
pub const MAX_PAYLOAD_BYTES: usize = 1024;
const DEBOUNCE: Duration = Duration::from_secs(3);
const TICK_INTERVAL: Duration = Duration::from_millis(50);
const WRITER_QUEUE_DEPTH: usize = 8;

fn all_slot_ids() -> Vec<SlotId> {
    [OutputClass::Ws, OutputClass::Rgb, OutputClass::White, OutputClass::Relay]
        .into_iter()
        .flat_map(SlotId::all)
        .collect()
}

/// Read whatever was last durably written for every slot, for boot-time
/// recovery before the writer thread takes ownership of the store.
pub fn recover_all(kv: &dyn KvStore) -> Vec<(SlotId, Vec<u8>)> {
    all_slot_ids()
        .into_iter()
        .filter_map(|slot| match kv.get(&slot.persistence_key()) {
            Ok(Some(payload)) => Some((slot, payload)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("persistence recovery failed for {slot}: {e}");
                None
            }
        })
        .collect()
}

struct PendingState {
    payload: Option<Vec<u8>>,
    deadline: Option<Instant>,
}

struct SlotPending(Mutex<PendingState>);

impl SlotPending {
    fn new() -> Self { Self(Mutex::new(PendingState { payload: None, deadline: None })) }
}

/// §4.6: a bounded pending-payload buffer, dirty flag, and debounce timer
/// per slot, draining through a single bounded writer queue into the
/// key-value store.
pub struct PersistencePipeline {
    slot_ids: Vec<SlotId>,
    pending: Arc<Vec<SlotPending>>,
    writer_tx: Option<Sender<usize>>,
    stop: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl PersistencePipeline {
    pub fn new(kv: Box<dyn KvStore + Send>) -> Self {
        let slot_ids = all_slot_ids();
        let pending: Arc<Vec<SlotPending>> = Arc::new((0..slot_ids.len()).map(|_| SlotPending::new()).collect());
        let stop = Arc::new(AtomicBool::new(false));
        let (writer_tx, writer_rx) = bounded::<usize>(WRITER_QUEUE_DEPTH);

        let ticker = {
            let pending = pending.clone();
            let stop = stop.clone();
            let writer_tx = writer_tx.clone();
            std::thread::Builder::new()
                .name("persist-ticker".to_string())
                .spawn(move || Self::run_ticker(pending, writer_tx, stop))
                .expect("spawn persistence ticker thread")
        };

        let writer = {
            let pending = pending.clone();
            let slot_ids = slot_ids.clone();
            std::thread::Builder::new()
                .name("persist-writer".to_string())
                .spawn(move || Self::run_writer(pending, slot_ids, kv, writer_rx))
                .expect("spawn persistence writer thread")
        };

        Self { slot_ids, pending, writer_tx: Some(writer_tx), stop, ticker: Some(ticker), writer: Some(writer) }
    }

    fn index_of(&self, slot: SlotId) -> Option<usize> { self.slot_ids.iter().position(|s| *s == slot) }

    /// Record a newly committed command payload for a slot. A no-op if it's
    /// identical to what's already pending; otherwise (re-)arms the debounce
    /// timer, cancelling whatever arming preceded it.
    pub fn record(&self, slot: SlotId, payload: Vec<u8>) -> Result<(), PersistError> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(PersistError::PayloadTooLarge { len: payload.len(), max: MAX_PAYLOAD_BYTES });
        }
        let Some(idx) = self.index_of(slot) else { return Ok(()) };
        let mut state = self.pending[idx].0.lock();
        if state.payload.as_deref() == Some(payload.as_slice()) {
            return Ok(());
        }
        state.payload = Some(payload);
        state.deadline = Some(Instant::now() + DEBOUNCE);
        Ok(())
    }

    /// True if a slot has an unwritten dirty payload, for tests/diagnostics.
    pub fn is_dirty(&self, slot: SlotId) -> bool {
        self.index_of(slot).is_some_and(|idx| self.pending[idx].0.lock().payload.is_some())
    }

    fn run_ticker(pending: Arc<Vec<SlotPending>>, writer_tx: Sender<usize>, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::Relaxed) {
            std::thread::sleep(TICK_INTERVAL);
            let now = Instant::now();
            for (idx, slot) in pending.iter().enumerate() {
                let due = {
                    let mut state = slot.0.lock();
                    match state.deadline {
                        Some(deadline) if now >= deadline => {
                            state.deadline = None;
                            true
                        }
                        _ => false,
                    }
                };
                if due && writer_tx.try_send(idx).is_err() {
                    // Queue full: re-arm rather than drop the write.
                    slot.0.lock().deadline = Some(Instant::now() + DEBOUNCE);
                }
            }
        }
    }

    fn run_writer(
        pending: Arc<Vec<SlotPending>>,
        slot_ids: Vec<SlotId>,
        mut kv: Box<dyn KvStore + Send>,
        rx: Receiver<usize>,
    ) {
        while let Ok(idx) = rx.recv() {
            let payload = pending[idx].0.lock().payload.take();
            let Some(payload) = payload else { continue };
            let key = slot_ids[idx].persistence_key();
            let result = kv.set(&key, &payload).and_then(|_| kv.commit());
            if let Err(e) = result {
                log::warn!("persistence write failed for {key}: {e}");
                let mut state = pending[idx].0.lock();
                if state.payload.is_none() {
                    state.payload = Some(payload);
                }
                state.deadline = Some(Instant::now() + DEBOUNCE);
            }
        }
    }
}

impl Drop for PersistencePipeline {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.writer_tx.take();
        if let Some(t) = self.ticker.take() {
            let _ = t.join();
        }
        if let Some(w) = self.writer.take() {
            let _ = w.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultranode_hal::sim::kv_store::MemKvStore;

    fn ws0() -> SlotId { SlotId::new(OutputClass::Ws, 0) }

    #[test]
    fn identical_pending_payload_is_a_no_op() {
        let kv = MemKvStore::default();
        let pipeline = PersistencePipeline::new(Box::new(kv));
        pipeline.record(ws0(), b"abc".to_vec()).unwrap();
        assert!(pipeline.is_dirty(ws0()));
        pipeline.record(ws0(), b"abc".to_vec()).unwrap();
        assert!(pipeline.is_dirty(ws0()));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let kv = MemKvStore::default();
        let pipeline = PersistencePipeline::new(Box::new(kv));
        let huge = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        assert!(matches!(pipeline.record(ws0(), huge), Err(PersistError::PayloadTooLarge { .. })));
    }

    #[test]
    fn recover_all_reads_every_previously_written_slot() {
        let mut kv = MemKvStore::default();
        kv.set(&ws0().persistence_key(), b"saved").unwrap();
        kv.commit().unwrap();
        let recovered = recover_all(&kv);
        assert!(recovered.iter().any(|(slot, payload)| *slot == ws0() && payload == b"saved"));
    }

    #[test]
    fn debounced_write_eventually_lands_in_the_store() {
        let kv = MemKvStore::default();
        let handle = kv.clone();
        let pipeline = PersistencePipeline::new(Box::new(kv));
        pipeline.record(ws0(), b"hello".to_vec()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.is_dirty(ws0()) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!pipeline.is_dirty(ws0()));
        assert_eq!(handle.get(&ws0().persistence_key()).unwrap().unwrap(), b"hello");
    }
}
