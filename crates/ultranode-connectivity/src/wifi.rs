use crate::timer::OneShotTimer;
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ultranode_hal::{WifiError, WifiEvent, WifiPort};

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30_000;
const RESTART_PAUSE: Duration = Duration::from_millis(250);
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Station-mode Wi-Fi state machine (§4.8): reconnect backoff doubling from
/// 1 s to a 30 s cap, a connected/fail bit pair `wait_for_ip` polls, and a
/// mutex-serialized `restart()`.
pub struct WifiSupervisor {
    wifi: Mutex<Box<dyn WifiPort>>,
    connected: AtomicBool,
    fail: AtomicBool,
    backoff_ms: AtomicU64,
    restart_mutex: Mutex<()>,
    reconnect_timer: OneShotTimer,
    on_connectivity: Arc<dyn Fn(bool) + Send + Sync>,
}

impl WifiSupervisor {
    pub fn new(mut wifi: Box<dyn WifiPort>, on_connectivity: impl Fn(bool) + Send + Sync + 'static) -> Arc<Self> {
        let (tx, rx) = bounded::<WifiEvent>(16);
        wifi.set_event_sender(tx);
        let supervisor = Arc::new(Self {
            wifi: Mutex::new(wifi),
            connected: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            backoff_ms: AtomicU64::new(INITIAL_BACKOFF_MS),
            restart_mutex: Mutex::new(()),
            reconnect_timer: OneShotTimer::new(),
            on_connectivity: Arc::new(on_connectivity),
        });
        let events = supervisor.clone();
        std::thread::Builder::new()
            .name("wifi-events".to_string())
            .spawn(move || {
                while let Ok(event) = rx.recv() {
                    events.handle_event(event);
                }
            })
            .expect("spawn wifi event thread");
        supervisor
    }

    pub fn set_credentials(&self, ssid: &str, psk: &str) -> Result<(), WifiError> {
        self.wifi.lock().set_credentials(ssid, psk)
    }

    pub fn start(&self) -> Result<(), WifiError> { self.wifi.lock().start() }

    pub fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }

    /// Wait for `GOT_IP` (success) or the overall deadline. A `DISCONNECTED`
    /// observed mid-wait resets the fail bit and keeps waiting, per §4.8.
    pub fn wait_for_ip(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.connected.load(Ordering::SeqCst) {
                return true;
            }
            self.fail.swap(false, Ordering::SeqCst);
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Serialized stop → brief pause → start. Callers observe
    /// `connected=false` during the gap.
    pub fn restart(&self) -> Result<(), WifiError> {
        let _guard = self.restart_mutex.lock();
        self.connected.store(false, Ordering::SeqCst);
        (self.on_connectivity)(false);
        self.wifi.lock().stop()?;
        std::thread::sleep(RESTART_PAUSE);
        self.wifi.lock().start()
    }

    fn handle_event(self: &Arc<Self>, event: WifiEvent) {
        match event {
            WifiEvent::Start => {
                self.backoff_ms.store(INITIAL_BACKOFF_MS, Ordering::SeqCst);
                let _ = self.wifi.lock().connect();
            }
            WifiEvent::Disconnected => {
                self.connected.store(false, Ordering::SeqCst);
                (self.on_connectivity)(false);
                self.fail.store(true, Ordering::SeqCst);
                self.reconnect_timer.cancel();
                let delay = Duration::from_millis(self.backoff_ms.load(Ordering::SeqCst));
                self.arm_reconnect(delay);
                self.double_backoff();
            }
            WifiEvent::GotIp => {
                log::info!("wifi: got ip");
                self.backoff_ms.store(INITIAL_BACKOFF_MS, Ordering::SeqCst);
                self.connected.store(true, Ordering::SeqCst);
                (self.on_connectivity)(true);
            }
        }
    }

    fn double_backoff(&self) {
        let _ =
            self.backoff_ms.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| Some((b * 2).min(MAX_BACKOFF_MS)));
    }

    fn arm_reconnect(self: &Arc<Self>, delay: Duration) {
        let supervisor = self.clone();
        self.reconnect_timer.arm(delay, "wifi-reconnect", move || supervisor.reconnect_fire());
    }

    fn reconnect_fire(self: &Arc<Self>) {
        self.fail.store(false, Ordering::SeqCst);
        if self.wifi.lock().connect().is_err() {
            let delay = Duration::from_millis(self.backoff_ms.load(Ordering::SeqCst));
            self.arm_reconnect(delay);
            self.double_backoff();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use ultranode_hal::sim::wifi::SimWifi;

    #[test]
    fn start_event_resets_backoff_and_connects() {
        let sim = SimWifi::new();
        let (tx, rx) = mpsc::channel();
        let _sup = WifiSupervisor::new(Box::new(sim.clone()), move |c| {
            let _ = tx.send(c);
        });
        sim.fire(WifiEvent::Start);
        std::thread::sleep(Duration::from_millis(50));
        assert!(sim.connect_calls() >= 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn got_ip_marks_connected_and_notifies() {
        let sim = SimWifi::new();
        let (tx, rx) = mpsc::channel();
        let sup = WifiSupervisor::new(Box::new(sim.clone()), move |c| {
            let _ = tx.send(c);
        });
        sim.fire(WifiEvent::GotIp);
        std::thread::sleep(Duration::from_millis(50));
        assert!(sup.is_connected());
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), true);
    }

    #[test]
    fn disconnect_arms_a_reconnect_and_notifies_false() {
        let sim = SimWifi::new();
        let (tx, rx) = mpsc::channel();
        let sup = WifiSupervisor::new(Box::new(sim.clone()), move |c| {
            let _ = tx.send(c);
        });
        sim.fire(WifiEvent::GotIp);
        let _ = rx.recv_timeout(Duration::from_secs(1));
        sim.fire(WifiEvent::Disconnected);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), false);
        assert!(!sup.is_connected());
    }

    #[test]
    fn wait_for_ip_times_out_when_never_connected() {
        let sim = SimWifi::new();
        let sup = WifiSupervisor::new(Box::new(sim), |_| {});
        assert!(!sup.wait_for_ip(Duration::from_millis(100)));
    }
}
