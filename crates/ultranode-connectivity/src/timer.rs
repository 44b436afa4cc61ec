use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cancelable one-shot timer: arming bumps a generation counter, and the
/// sleeping thread only fires its callback if its own generation is still
/// current. Every "cancel any pending timer first, then (re)arm" rule in
/// §4.8-§4.10 is built on this.
#[derive(Clone)]
pub struct OneShotTimer {
    generation: Arc<AtomicU64>,
}

impl OneShotTimer {
    pub fn new() -> Self { Self { generation: Arc::new(AtomicU64::new(0)) } }

    pub fn cancel(&self) { self.generation.fetch_add(1, Ordering::SeqCst); }

    pub fn arm(&self, delay: Duration, name: &str, callback: impl FnOnce() + Send + 'static) {
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                if generation.load(Ordering::SeqCst) == my_gen {
                    callback();
                }
            })
            .expect("spawn timer thread");
    }
}

impl Default for OneShotTimer {
    fn default() -> Self { Self::new() }
}
