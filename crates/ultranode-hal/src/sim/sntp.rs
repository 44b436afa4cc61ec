use crate::error::SntpError;
use crate::ports::SntpPort;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hosted SNTP stand-in. `unix_s` is shared so a test can advance wallclock
/// independently of real time.
pub struct SimSntp {
    pub unix_s: Arc<AtomicU64>,
    pub fail_start_times: u32,
    pub start_calls: u32,
}

impl SimSntp {
    pub fn new(initial_unix_s: u64) -> Self {
        Self { unix_s: Arc::new(AtomicU64::new(initial_unix_s)), fail_start_times: 0, start_calls: 0 }
    }
}

impl SntpPort for SimSntp {
    fn start(&mut self, on_sync: Box<dyn Fn() + Send>) -> Result<(), SntpError> {
        self.start_calls += 1;
        if self.start_calls <= self.fail_start_times {
            return Err(SntpError::SpawnFailed("simulated failure".to_string()));
        }
        on_sync();
        Ok(())
    }

    fn now_unix_s(&self) -> u64 { self.unix_s.load(Ordering::Relaxed) }
}
