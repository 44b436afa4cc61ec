//! The `motion/off` brightness fade (§4.7). This crate owns only the fade
//! math, timer, and cancellation state — it has no notion of an effect or a
//! driver. The caller (`ultranode-dispatch`) supplies the slots to fade and
//! a callback that actually writes the new brightness back into the
//! relevant engine.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ultranode_proto::SlotId;

const DEFAULT_DURATION_MS: u64 = 2000;
const DEFAULT_STEPS: u32 = 255;
const MIN_INTERVAL_US: u64 = 1000;

fn ceil_div(a: u64, b: u64) -> u64 { (a + b - 1) / b }

struct ActiveFade {
    initial: Vec<(SlotId, u8)>,
    total_steps: u32,
    current_step: u32,
}

/// Runs the per-slot brightness ramp described in §4.7. Not `Clone`able —
/// one instance owns the single in-flight fade a node can have active.
pub struct FadeController {
    on_tick: Arc<dyn Fn(&[(SlotId, u8)]) + Send + Sync>,
    generation: Arc<AtomicU64>,
    active: Arc<Mutex<Option<ActiveFade>>>,
}

impl FadeController {
    pub fn new(on_tick: impl Fn(&[(SlotId, u8)]) + Send + Sync + 'static) -> Self {
        Self { on_tick: Arc::new(on_tick), generation: Arc::new(AtomicU64::new(0)), active: Arc::new(Mutex::new(None)) }
    }

    pub fn is_active(&self) -> bool { self.active.lock().is_some() }

    /// Cancel any in-flight fade, leaving slots at their current brightness
    /// (§4.7's "any destructive external command cancels the fade
    /// immediately"). Safe to call when nothing is active.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.active.lock().take().is_some() {
            log::debug!("motion: fade cancelled");
        }
    }

    /// Start a fade over `enabled_slots` (slot, current brightness) pairs.
    /// Slots at brightness zero are excluded per step 2. Does nothing if no
    /// slot qualifies.
    pub fn start(&self, duration_ms: Option<u64>, steps: Option<u32>, enabled_slots: &[(SlotId, u8)]) {
        self.cancel();

        let initial: Vec<(SlotId, u8)> = enabled_slots.iter().copied().filter(|(_, b)| *b > 0).collect();
        if initial.is_empty() {
            log::debug!("motion: fade requested with no active slots, not starting");
            return;
        }

        let total_steps = steps.unwrap_or(DEFAULT_STEPS).max(1);
        let duration_ms = duration_ms.unwrap_or(DEFAULT_DURATION_MS);
        let interval_us = (duration_ms.saturating_mul(1000) / total_steps as u64).max(MIN_INTERVAL_US);
        log::info!("motion: starting fade over {} slots, {total_steps} steps, {interval_us}us interval", initial.len());

        let my_gen = self.generation.load(Ordering::SeqCst);
        *self.active.lock() = Some(ActiveFade { initial: initial.clone(), total_steps, current_step: 0 });

        // Step 0: no-op write equal to each slot's initial brightness.
        (self.on_tick)(&initial);

        let active = self.active.clone();
        let generation = self.generation.clone();
        let on_tick = self.on_tick.clone();
        std::thread::Builder::new()
            .name("motion-fade".to_string())
            .spawn(move || Self::run(active, generation, on_tick, my_gen, interval_us))
            .expect("spawn motion fade thread");
    }

    fn run(
        active: Arc<Mutex<Option<ActiveFade>>>,
        generation: Arc<AtomicU64>,
        on_tick: Arc<dyn Fn(&[(SlotId, u8)]) + Send + Sync>,
        my_gen: u64,
        interval_us: u64,
    ) {
        loop {
            std::thread::sleep(Duration::from_micros(interval_us));
            if generation.load(Ordering::SeqCst) != my_gen {
                return;
            }
            let (updates, done) = {
                let mut guard = active.lock();
                let Some(fade) = guard.as_mut() else { return };
                fade.current_step += 1;
                let remaining = fade.total_steps.saturating_sub(fade.current_step);
                let updates: Vec<(SlotId, u8)> = fade
                    .initial
                    .iter()
                    .map(|(slot, initial)| {
                        let b = ceil_div(*initial as u64 * remaining as u64, fade.total_steps as u64);
                        (*slot, b as u8)
                    })
                    .collect();
                let done = fade.current_step >= fade.total_steps;
                if done {
                    *guard = None;
                }
                (updates, done)
            };
            (on_tick)(&updates);
            if done {
                log::info!("motion: fade reached zero, stopping");
                return;
            }
        }
    }
}
