use crate::state::ConnectivityState;
use crate::timer::OneShotTimer;
use crate::wifi::WifiSupervisor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ultranode_hal::SntpPort;

/// 2023-01-01T00:00:00Z. Wallclock below this is "not yet synced" (§4.9).
const SANITY_EPOCH_UNIX_S: u64 = 1_672_531_200;
const INITIAL_POLL_ATTEMPTS: u32 = 20;
const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RETRY_INITIAL_MS: u64 = 5_000;
const RETRY_MAX_MS: u64 = 60_000;

/// SNTP lifecycle (§4.9): bounded initial poll for wallclock sanity, a
/// periodic resync task gated on connectivity, and a doubling-backoff retry
/// path for the one failure mode the spec calls out explicitly — failing to
/// *launch* the resync task (as opposed to a single sync attempt failing,
/// which the SNTP client itself retries internally).
pub struct SntpSupervisor {
    state: Arc<ConnectivityState>,
    retry_timer: OneShotTimer,
    retry_delay_ms: AtomicU64,
    /// Test hook: make the next N resync-task launches fail before a real
    /// `std::thread::Builder::spawn` is attempted, so the retry/backoff path
    /// is exercisable without exhausting OS threads.
    force_fail_spawns: Arc<AtomicU32>,
}

impl SntpSupervisor {
    pub fn start(
        sntp: Box<dyn SntpPort>,
        wifi: Arc<WifiSupervisor>,
        state: Arc<ConnectivityState>,
        resync_interval: Duration,
    ) -> Arc<Self> {
        Self::start_with_spawn_failures(sntp, wifi, state, resync_interval, 0)
    }

    pub fn start_with_spawn_failures(
        sntp: Box<dyn SntpPort>,
        wifi: Arc<WifiSupervisor>,
        state: Arc<ConnectivityState>,
        resync_interval: Duration,
        fail_spawns_times: u32,
    ) -> Arc<Self> {
        let supervisor = Arc::new(Self {
            state,
            retry_timer: OneShotTimer::new(),
            retry_delay_ms: AtomicU64::new(RETRY_INITIAL_MS),
            force_fail_spawns: Arc::new(AtomicU32::new(fail_spawns_times)),
        });
        let sntp = Arc::new(Mutex::new(sntp));
        supervisor.clone().launch(sntp, wifi, resync_interval);
        supervisor
    }

    fn launch(self: Arc<Self>, sntp: Arc<Mutex<Box<dyn SntpPort>>>, wifi: Arc<WifiSupervisor>, resync_interval: Duration) {
        log::info!("sntp: configuring timezone and starting client");
        let on_sync = {
            let state = self.state.clone();
            move || state.note_time_sync()
        };
        if let Err(e) = sntp.lock().start(Box::new(on_sync)) {
            log::warn!("sntp: client start failed: {e}");
            self.state.note_sntp_spawn_failure();
            self.schedule_retry(sntp, wifi, resync_interval);
            return;
        }

        for _ in 0..INITIAL_POLL_ATTEMPTS {
            if sntp.lock().now_unix_s() > SANITY_EPOCH_UNIX_S {
                break;
            }
            std::thread::sleep(INITIAL_POLL_INTERVAL);
        }

        match self.try_spawn_resync(sntp.clone(), wifi.clone(), resync_interval) {
            Ok(()) => {
                self.state.reset_sntp_failures();
                self.retry_delay_ms.store(RETRY_INITIAL_MS, Ordering::SeqCst);
            }
            Err(()) => {
                log::warn!("sntp: resync task launch failed");
                self.state.note_sntp_spawn_failure();
                self.schedule_retry(sntp, wifi, resync_interval);
            }
        }
    }

    fn try_spawn_resync(
        &self,
        sntp: Arc<Mutex<Box<dyn SntpPort>>>,
        wifi: Arc<WifiSupervisor>,
        resync_interval: Duration,
    ) -> Result<(), ()> {
        if self.force_fail_spawns.load(Ordering::SeqCst) > 0 {
            self.force_fail_spawns.fetch_sub(1, Ordering::SeqCst);
            return Err(());
        }
        let state = self.state.clone();
        std::thread::Builder::new()
            .name("sntp-resync".to_string())
            .spawn(move || loop {
                std::thread::sleep(resync_interval);
                while !wifi.is_connected() {
                    std::thread::sleep(Duration::from_secs(1));
                }
                let on_sync = {
                    let state = state.clone();
                    move || state.note_time_sync()
                };
                if let Err(e) = sntp.lock().start(Box::new(on_sync)) {
                    log::warn!("sntp: resync attempt failed: {e}");
                }
            })
            .map(|_| ())
            .map_err(|_| ())
    }

    /// Doubling backoff from 5 s to a 60 s cap; each fire re-attempts the
    /// whole `launch` sequence, and a success resets both the failure
    /// counters and the backoff delay.
    fn schedule_retry(self: &Arc<Self>, sntp: Arc<Mutex<Box<dyn SntpPort>>>, wifi: Arc<WifiSupervisor>, resync_interval: Duration) {
        let delay_ms = self.retry_delay_ms.load(Ordering::SeqCst);
        let supervisor = self.clone();
        self.retry_timer.arm(Duration::from_millis(delay_ms), "sntp-retry", move || {
            supervisor.launch(sntp, wifi, resync_interval)
        });
        let _ = self.retry_delay_ms.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| Some((d * 2).min(RETRY_MAX_MS)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultranode_hal::sim::sntp::SimSntp;
    use ultranode_hal::sim::wifi::SimWifi;

    fn connected_wifi() -> Arc<WifiSupervisor> {
        let sim = SimWifi::new();
        sim.set_auto_succeed(true);
        let sup = WifiSupervisor::new(Box::new(sim.clone()), |_| {});
        sim.fire(ultranode_hal::WifiEvent::GotIp);
        std::thread::sleep(Duration::from_millis(20));
        sup
    }

    #[test]
    fn successful_start_marks_time_sync_seen() {
        let state = Arc::new(ConnectivityState::new());
        let sntp = SimSntp::new(SANITY_EPOCH_UNIX_S + 10);
        let _sup = SntpSupervisor::start(Box::new(sntp), connected_wifi(), state.clone(), Duration::from_secs(3600));
        std::thread::sleep(Duration::from_millis(50));
        assert!(state.time_sync_ever_seen());
    }

    #[test]
    fn client_start_failure_schedules_a_retry_and_eventually_succeeds() {
        let state = Arc::new(ConnectivityState::new());
        let mut sntp = SimSntp::new(SANITY_EPOCH_UNIX_S + 10);
        sntp.fail_start_times = 1;
        let _sup = SntpSupervisor::start_with_spawn_failures(
            Box::new(sntp),
            connected_wifi(),
            state.clone(),
            Duration::from_secs(3600),
            0,
        );
        // Retry delay starts at 5s in real operation; here we only assert
        // the failure was observed, not that we waited out the real delay.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(state.sntp_spawn_failures(), 1);
    }

    #[test]
    fn resync_spawn_failure_is_recorded() {
        let state = Arc::new(ConnectivityState::new());
        let sntp = SimSntp::new(SANITY_EPOCH_UNIX_S + 10);
        let _sup = SntpSupervisor::start_with_spawn_failures(
            Box::new(sntp),
            connected_wifi(),
            state.clone(),
            Duration::from_secs(3600),
            1,
        );
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(state.sntp_spawn_failures(), 1);
    }
}
