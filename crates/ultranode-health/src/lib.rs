//! Periodic health snapshot, logging, and recovery escalation (§4.11).
//!
//! The monitor itself never touches Wi-Fi/MQTT/the reboot path directly —
//! it reads [`ultranode_connectivity::ConnectivityState`], queries a
//! [`HeapSource`] collaborator for heap pressure, and calls back into
//! opaque `on_recovery`/`on_reboot` closures the embedder wires to
//! `WifiSupervisor::restart`/`MqttSupervisor::start`/an actual reboot.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ultranode_connectivity::ConnectivityState;

/// A heap-pressure reading. `min_ever_free_bytes` is the lifetime minimum
/// free-heap watermark the allocator tracks, not a reading at this instant.
#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    pub free_bytes: u64,
    pub min_ever_free_bytes: u64,
}

/// Heap query collaborator (§1: allocator particulars are out of scope;
/// this is the narrow interface the monitor needs from them).
pub trait HeapSource: Send {
    fn snapshot(&self) -> HeapStats;
}

/// A recovery the monitor is asking the embedder to perform. Opaque to the
/// monitor itself — it does not know how Wi-Fi or MQTT actually restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryRequest {
    Wifi,
    Mqtt,
}

/// Every numeric threshold §4.11 names, broken out so tests can shrink
/// them instead of sleeping for real hours; [`Default`] carries the
/// spec's actual values.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub check_interval: Duration,
    pub log_interval: Duration,
    pub low_heap_bytes: u64,
    pub low_heap_consecutive: u32,
    pub wifi_offline_recovery: Duration,
    pub wifi_recovery_cooldown: Duration,
    pub wifi_max_recoveries: u32,
    pub wifi_offline_reboot: Duration,
    pub mqtt_offline_recovery: Duration,
    pub mqtt_recovery_cooldown: Duration,
    pub mqtt_max_recoveries: u32,
    pub mqtt_offline_escalation: Duration,
    pub time_sync_reboot: Duration,
    pub time_sync_recovery: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            log_interval: Duration::from_secs(15 * 60),
            low_heap_bytes: 20 * 1024,
            low_heap_consecutive: 5,
            wifi_offline_recovery: Duration::from_secs(15 * 60),
            wifi_recovery_cooldown: Duration::from_secs(10 * 60),
            wifi_max_recoveries: 4,
            wifi_offline_reboot: Duration::from_secs(6 * 3600),
            mqtt_offline_recovery: Duration::from_secs(5 * 60),
            mqtt_recovery_cooldown: Duration::from_secs(5 * 60),
            mqtt_max_recoveries: 6,
            mqtt_offline_escalation: Duration::from_secs(2 * 3600),
            time_sync_reboot: Duration::from_secs(7 * 24 * 3600),
            time_sync_recovery: Duration::from_secs(24 * 3600),
        }
    }
}

struct Inner {
    low_heap_consecutive: u32,
    last_log: Option<Instant>,
}

/// One task, low priority, that wakes every `check_interval` and walks
/// §4.11's escalation ladder.
pub struct HealthMonitor {
    connectivity: Arc<ConnectivityState>,
    heap: Box<dyn HeapSource>,
    thresholds: HealthThresholds,
    on_recovery: Arc<dyn Fn(RecoveryRequest) + Send + Sync>,
    on_reboot: Arc<dyn Fn(&str) + Send + Sync>,
    inner: Mutex<Inner>,
    rebooted: AtomicBool,
    stop: Arc<AtomicBool>,
}

impl HealthMonitor {
    /// Spawn the monitor's background task. Returns the shared handle so
    /// `request_stop` can be called from teardown.
    pub fn start(
        connectivity: Arc<ConnectivityState>,
        heap: Box<dyn HeapSource>,
        thresholds: HealthThresholds,
        on_recovery: impl Fn(RecoveryRequest) + Send + Sync + 'static,
        on_reboot: impl Fn(&str) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let monitor = Arc::new(Self {
            connectivity,
            heap,
            thresholds,
            on_recovery: Arc::new(on_recovery),
            on_reboot: Arc::new(on_reboot),
            inner: Mutex::new(Inner { low_heap_consecutive: 0, last_log: None }),
            rebooted: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        });
        let handle = monitor.clone();
        std::thread::Builder::new()
            .name("health-monitor".to_string())
            .spawn(move || {
                while !handle.stop.load(Ordering::Relaxed) {
                    std::thread::sleep(handle.thresholds.check_interval);
                    if handle.stop.load(Ordering::Relaxed) {
                        return;
                    }
                    handle.check();
                }
            })
            .expect("spawn health monitor thread");
        monitor
    }

    pub fn request_stop(&self) { self.stop.store(true, Ordering::Relaxed); }

    /// Run one check cycle now. Exposed so `request_stop`-driven teardown
    /// and tests can drive the ladder without waiting out a real
    /// `check_interval`.
    pub fn check(&self) {
        if self.rebooted.load(Ordering::SeqCst) {
            return;
        }

        let heap = self.heap.snapshot();
        {
            let mut inner = self.inner.lock();
            if heap.min_ever_free_bytes < self.thresholds.low_heap_bytes {
                inner.low_heap_consecutive += 1;
            } else {
                inner.low_heap_consecutive = 0;
            }
            if inner.low_heap_consecutive >= self.thresholds.low_heap_consecutive {
                drop(inner);
                self.reboot("minimum-ever heap below threshold for 5 consecutive checks");
                return;
            }

            let should_log = inner.last_log.map(|t| t.elapsed() >= self.thresholds.log_interval).unwrap_or(true);
            if should_log {
                inner.last_log = Some(Instant::now());
                log::info!(
                    "health: heap_free={} heap_min_ever={} wifi_up={} mqtt_ready={} time_synced={}",
                    heap.free_bytes,
                    heap.min_ever_free_bytes,
                    self.connectivity.wifi_up(),
                    self.connectivity.mqtt_ready(),
                    self.connectivity.time_sync_ever_seen(),
                );
            }
        }

        if let Some(offline) = self.connectivity.wifi_offline_for() {
            if offline >= self.thresholds.wifi_offline_recovery {
                let eligible =
                    self.connectivity.wifi_since_last_recovery().map_or(true, |d| d >= self.thresholds.wifi_recovery_cooldown);
                if eligible {
                    self.connectivity.record_wifi_recovery();
                    (self.on_recovery)(RecoveryRequest::Wifi);
                    if self.connectivity.wifi_recovery_attempts() > self.thresholds.wifi_max_recoveries
                        && offline >= self.thresholds.wifi_offline_reboot
                    {
                        self.reboot("wifi offline for 6h+ after repeated recovery attempts");
                        return;
                    }
                }
                return;
            }
        }

        if let Some(offline) = self.connectivity.mqtt_offline_for() {
            if offline >= self.thresholds.mqtt_offline_recovery {
                let eligible =
                    self.connectivity.mqtt_since_last_recovery().map_or(true, |d| d >= self.thresholds.mqtt_recovery_cooldown);
                if eligible {
                    self.connectivity.record_mqtt_recovery();
                    if self.connectivity.mqtt_recovery_attempts() > self.thresholds.mqtt_max_recoveries
                        && offline >= self.thresholds.mqtt_offline_escalation
                    {
                        log::warn!("health: escalating repeated mqtt recovery to a wifi recovery");
                        (self.on_recovery)(RecoveryRequest::Wifi);
                    } else {
                        (self.on_recovery)(RecoveryRequest::Mqtt);
                    }
                }
            }
        }

        if self.connectivity.time_sync_ever_seen() {
            if let Some(since) = self.connectivity.time_since_last_sync() {
                if since >= self.thresholds.time_sync_reboot {
                    self.reboot("time sync drift exceeded 7 days");
                    return;
                } else if since >= self.thresholds.time_sync_recovery {
                    (self.on_recovery)(RecoveryRequest::Wifi);
                }
            }
        } else if self.connectivity.sntp_spawn_failures() > 0 {
            log::warn!(
                "health: sntp task never started, {} launch retries outstanding",
                self.connectivity.sntp_spawn_failures()
            );
        }
    }

    fn reboot(&self, reason: &str) {
        self.rebooted.store(true, Ordering::SeqCst);
        log::error!("health: requesting reboot: {reason}");
        (self.on_reboot)(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::mpsc;

    struct FakeHeap {
        min_ever: Arc<AtomicU64>,
    }

    impl HeapSource for FakeHeap {
        fn snapshot(&self) -> HeapStats {
            let min_ever = self.min_ever.load(Ordering::SeqCst);
            HeapStats { free_bytes: min_ever, min_ever_free_bytes: min_ever }
        }
    }

    fn monitor_with_heap_handle(
        connectivity: Arc<ConnectivityState>,
        heap_floor: u64,
    ) -> (HealthMonitor, Arc<AtomicU64>, mpsc::Receiver<String>) {
        let (reboot_tx, reboot_rx) = mpsc::channel();
        let min_ever = Arc::new(AtomicU64::new(heap_floor));
        let heap = FakeHeap { min_ever: min_ever.clone() };
        let monitor = HealthMonitor {
            connectivity,
            heap: Box::new(heap),
            thresholds: thresholds(),
            on_recovery: Arc::new(|_| {}),
            on_reboot: Arc::new(move |reason| {
                let _ = reboot_tx.send(reason.to_string());
            }),
            inner: Mutex::new(Inner { low_heap_consecutive: 0, last_log: None }),
            rebooted: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        };
        (monitor, min_ever, reboot_rx)
    }

    fn thresholds() -> HealthThresholds {
        HealthThresholds {
            check_interval: Duration::from_millis(10),
            log_interval: Duration::from_millis(10),
            low_heap_bytes: 20_000,
            low_heap_consecutive: 3,
            wifi_offline_recovery: Duration::from_millis(30),
            wifi_recovery_cooldown: Duration::from_millis(30),
            wifi_max_recoveries: 2,
            wifi_offline_reboot: Duration::from_millis(60),
            mqtt_offline_recovery: Duration::from_millis(30),
            mqtt_recovery_cooldown: Duration::from_millis(30),
            mqtt_max_recoveries: 2,
            mqtt_offline_escalation: Duration::from_millis(60),
            time_sync_reboot: Duration::from_millis(90),
            time_sync_recovery: Duration::from_millis(30),
        }
    }

    fn monitor_for_test(
        connectivity: Arc<ConnectivityState>,
        heap_floor: u64,
    ) -> (HealthMonitor, mpsc::Receiver<RecoveryRequest>, mpsc::Receiver<String>) {
        let (rec_tx, rec_rx) = mpsc::channel();
        let (reboot_tx, reboot_rx) = mpsc::channel();
        let heap = FakeHeap { min_ever: Arc::new(AtomicU64::new(heap_floor)) };
        let monitor = HealthMonitor {
            connectivity,
            heap: Box::new(heap),
            thresholds: thresholds(),
            on_recovery: Arc::new(move |r| {
                let _ = rec_tx.send(r);
            }),
            on_reboot: Arc::new(move |reason| {
                let _ = reboot_tx.send(reason.to_string());
            }),
            inner: Mutex::new(Inner { low_heap_consecutive: 0, last_log: None }),
            rebooted: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        };
        (monitor, rec_rx, reboot_rx)
    }

    #[test]
    fn low_heap_for_five_consecutive_checks_reboots() {
        let (monitor, _rec_rx, reboot_rx) = monitor_for_test(Arc::new(ConnectivityState::new()), 1_000);
        for _ in 0..2 {
            monitor.check();
            assert!(reboot_rx.try_recv().is_err());
        }
        monitor.check();
        assert_eq!(reboot_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "minimum-ever heap below threshold for 5 consecutive checks");
    }

    #[test]
    fn healthy_heap_reading_resets_the_consecutive_counter() {
        // thresholds() sets low_heap_consecutive to 3.
        let (monitor, heap_floor, reboot_rx) =
            monitor_with_heap_handle(Arc::new(ConnectivityState::new()), 1_000);
        monitor.check();
        monitor.check();
        assert!(reboot_rx.try_recv().is_err());
        // A healthy reading here should reset the streak, so it takes a full
        // three more low checks (not just one) to reach the reboot threshold.
        heap_floor.store(1_000_000, Ordering::SeqCst);
        monitor.check();
        assert!(reboot_rx.try_recv().is_err());
        heap_floor.store(1_000, Ordering::SeqCst);
        monitor.check();
        monitor.check();
        assert!(reboot_rx.try_recv().is_err());
        monitor.check();
        assert_eq!(
            reboot_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            "minimum-ever heap below threshold for 5 consecutive checks"
        );
    }

    #[test]
    fn wifi_offline_past_threshold_requests_recovery_once_per_cooldown() {
        let state = Arc::new(ConnectivityState::new());
        state.set_wifi(false);
        let (monitor, rec_rx, _reboot_rx) = monitor_for_test(state, 1_000_000);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Wifi);
        // Immediately re-checking is still within the cooldown: no second request.
        monitor.check();
        assert!(rec_rx.try_recv().is_err());
    }

    #[test]
    fn repeated_wifi_recovery_with_prolonged_offline_escalates_to_reboot() {
        let state = Arc::new(ConnectivityState::new());
        state.set_wifi(false);
        let (monitor, rec_rx, reboot_rx) = monitor_for_test(state.clone(), 1_000_000);
        std::thread::sleep(Duration::from_millis(70));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Wifi);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Wifi);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(reboot_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "wifi offline for 6h+ after repeated recovery attempts");
    }

    #[test]
    fn mqtt_offline_is_only_checked_when_wifi_is_not_also_offline() {
        let state = Arc::new(ConnectivityState::new());
        state.set_wifi(true);
        state.set_mqtt(false);
        let (monitor, rec_rx, _reboot_rx) = monitor_for_test(state, 1_000_000);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Mqtt);
    }

    #[test]
    fn repeated_mqtt_recovery_with_prolonged_offline_escalates_to_wifi() {
        let state = Arc::new(ConnectivityState::new());
        state.set_wifi(true);
        state.set_mqtt(false);
        let (monitor, rec_rx, _reboot_rx) = monitor_for_test(state, 1_000_000);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Mqtt);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Mqtt);
        std::thread::sleep(Duration::from_millis(70));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Wifi);
    }

    #[test]
    fn stale_time_sync_past_seven_day_equivalent_reboots() {
        let state = Arc::new(ConnectivityState::new());
        state.note_time_sync();
        let (monitor, _rec_rx, reboot_rx) = monitor_for_test(state, 1_000_000);
        std::thread::sleep(Duration::from_millis(100));
        monitor.check();
        assert_eq!(reboot_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "time sync drift exceeded 7 days");
    }

    #[test]
    fn moderately_stale_time_sync_requests_wifi_recovery() {
        let state = Arc::new(ConnectivityState::new());
        state.note_time_sync();
        let (monitor, rec_rx, reboot_rx) = monitor_for_test(state, 1_000_000);
        std::thread::sleep(Duration::from_millis(40));
        monitor.check();
        assert_eq!(rec_rx.recv_timeout(Duration::from_secs(1)).unwrap(), RecoveryRequest::Wifi);
        assert!(reboot_rx.try_recv().is_err());
    }

    #[test]
    fn no_time_sync_ever_seen_skips_the_drift_checks_entirely() {
        let state = Arc::new(ConnectivityState::new());
        let (monitor, rec_rx, reboot_rx) = monitor_for_test(state, 1_000_000);
        std::thread::sleep(Duration::from_millis(100));
        monitor.check();
        assert!(rec_rx.try_recv().is_err());
        assert!(reboot_rx.try_recv().is_err());
    }
}
