use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Inner {
    wifi_up: bool,
    wifi_last_change: Instant,
    wifi_recovery_attempts: u32,
    wifi_last_recovery: Option<Instant>,
    mqtt_ready: bool,
    mqtt_last_change: Instant,
    mqtt_recovery_attempts: u32,
    mqtt_last_recovery: Option<Instant>,
    last_time_sync: Option<Instant>,
    time_sync_ever_seen: bool,
    sntp_spawn_failures: u32,
    sntp_first_failure: Option<Instant>,
    sntp_last_failure: Option<Instant>,
}

/// §3's "Connectivity state": two independent boolean states (Wi-Fi up,
/// MQTT ready) each with `last_change_time`/`recovery_attempts`/
/// `last_recovery_time`, plus time-sync and SNTP-launch-failure tracking.
/// Guarded by a single short spinlock (§5: "Connectivity event group" /
/// "SNTP counters: short spinlock") rather than one lock per field, since
/// every writer here is already off the hot command/render paths.
pub struct ConnectivityState {
    inner: Mutex<Inner>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            inner: Mutex::new(Inner {
                wifi_up: false,
                wifi_last_change: now,
                wifi_recovery_attempts: 0,
                wifi_last_recovery: None,
                mqtt_ready: false,
                mqtt_last_change: now,
                mqtt_recovery_attempts: 0,
                mqtt_last_recovery: None,
                last_time_sync: None,
                time_sync_ever_seen: false,
                sntp_spawn_failures: 0,
                sntp_first_failure: None,
                sntp_last_failure: None,
            }),
        }
    }
}

impl ConnectivityState {
    pub fn new() -> Self { Self::default() }

    pub fn set_wifi(&self, up: bool) {
        let mut inner = self.inner.lock();
        if inner.wifi_up != up {
            inner.wifi_up = up;
            inner.wifi_last_change = Instant::now();
        }
    }

    pub fn wifi_up(&self) -> bool { self.inner.lock().wifi_up }

    pub fn wifi_offline_for(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        (!inner.wifi_up).then(|| inner.wifi_last_change.elapsed())
    }

    pub fn record_wifi_recovery(&self) {
        let mut inner = self.inner.lock();
        inner.wifi_recovery_attempts += 1;
        inner.wifi_last_recovery = Some(Instant::now());
    }

    pub fn wifi_recovery_attempts(&self) -> u32 { self.inner.lock().wifi_recovery_attempts }

    pub fn wifi_since_last_recovery(&self) -> Option<Duration> {
        self.inner.lock().wifi_last_recovery.map(|t| t.elapsed())
    }

    pub fn set_mqtt(&self, ready: bool) {
        let mut inner = self.inner.lock();
        if inner.mqtt_ready != ready {
            inner.mqtt_ready = ready;
            inner.mqtt_last_change = Instant::now();
        }
    }

    pub fn mqtt_ready(&self) -> bool { self.inner.lock().mqtt_ready }

    pub fn mqtt_offline_for(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        (!inner.mqtt_ready).then(|| inner.mqtt_last_change.elapsed())
    }

    pub fn record_mqtt_recovery(&self) {
        let mut inner = self.inner.lock();
        inner.mqtt_recovery_attempts += 1;
        inner.mqtt_last_recovery = Some(Instant::now());
    }

    pub fn mqtt_recovery_attempts(&self) -> u32 { self.inner.lock().mqtt_recovery_attempts }

    pub fn mqtt_since_last_recovery(&self) -> Option<Duration> {
        self.inner.lock().mqtt_last_recovery.map(|t| t.elapsed())
    }

    pub fn note_time_sync(&self) {
        let mut inner = self.inner.lock();
        inner.last_time_sync = Some(Instant::now());
        inner.time_sync_ever_seen = true;
    }

    pub fn time_sync_ever_seen(&self) -> bool { self.inner.lock().time_sync_ever_seen }

    pub fn time_since_last_sync(&self) -> Option<Duration> {
        self.inner.lock().last_time_sync.map(|t| t.elapsed())
    }

    pub fn note_sntp_spawn_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if inner.sntp_first_failure.is_none() {
            inner.sntp_first_failure = Some(now);
        }
        inner.sntp_last_failure = Some(now);
        inner.sntp_spawn_failures += 1;
    }

    pub fn reset_sntp_failures(&self) {
        let mut inner = self.inner.lock();
        inner.sntp_spawn_failures = 0;
        inner.sntp_first_failure = None;
        inner.sntp_last_failure = None;
    }

    pub fn sntp_spawn_failures(&self) -> u32 { self.inner.lock().sntp_spawn_failures }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_offline_duration_is_none_while_up() {
        let state = ConnectivityState::new();
        state.set_wifi(true);
        assert!(state.wifi_offline_for().is_none());
        state.set_wifi(false);
        assert!(state.wifi_offline_for().is_some());
    }

    #[test]
    fn recovery_attempts_accumulate() {
        let state = ConnectivityState::new();
        state.record_wifi_recovery();
        state.record_wifi_recovery();
        assert_eq!(state.wifi_recovery_attempts(), 2);
    }

    #[test]
    fn time_sync_ever_seen_latches_true() {
        let state = ConnectivityState::new();
        assert!(!state.time_sync_ever_seen());
        state.note_time_sync();
        assert!(state.time_sync_ever_seen());
    }

    #[test]
    fn sntp_failure_counters_reset_together() {
        let state = ConnectivityState::new();
        state.note_sntp_spawn_failure();
        state.note_sntp_spawn_failure();
        assert_eq!(state.sntp_spawn_failures(), 2);
        state.reset_sntp_failures();
        assert_eq!(state.sntp_spawn_failures(), 0);
    }
}
