use crate::error::WifiError;
use crate::ports::{WifiEvent, WifiPort};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;

struct Inner {
    tx: Option<Sender<WifiEvent>>,
    connect_calls: u32,
    credentials: Option<(String, String)>,
    auto_succeed: bool,
}

impl Default for Inner {
    fn default() -> Self { Self { tx: None, connect_calls: 0, credentials: None, auto_succeed: true } }
}

/// Hosted Wi-Fi driver stand-in. Cheaply `Clone`s to a shared handle so a
/// test can keep inspecting call counts and firing events after handing a
/// boxed copy to [`WifiPort`]'s owner, the same shared-handle shape as
/// [`crate::sim::kv_store::MemKvStore`]. Tests drive it by calling the
/// trait methods and/or `fire` directly; `auto_succeed` simulates a driver
/// that always gets an IP shortly after `connect()`.
#[derive(Clone, Default)]
pub struct SimWifi {
    inner: Arc<Mutex<Inner>>,
}

impl SimWifi {
    pub fn new() -> Self { Self::default() }

    pub fn fire(&self, ev: WifiEvent) {
        if let Some(tx) = &self.inner.lock().tx {
            let _ = tx.send(ev);
        }
    }

    pub fn connect_calls(&self) -> u32 { self.inner.lock().connect_calls }

    pub fn set_auto_succeed(&self, auto_succeed: bool) { self.inner.lock().auto_succeed = auto_succeed; }
}

impl WifiPort for SimWifi {
    fn set_event_sender(&mut self, tx: Sender<WifiEvent>) { self.inner.lock().tx = Some(tx); }

    fn set_credentials(&mut self, ssid: &str, psk: &str) -> Result<(), WifiError> {
        self.inner.lock().credentials = Some((ssid.to_string(), psk.to_string()));
        Ok(())
    }

    fn connect(&mut self) -> Result<(), WifiError> {
        let (has_credentials, auto_succeed) = {
            let mut inner = self.inner.lock();
            inner.connect_calls += 1;
            (inner.credentials.is_some(), inner.auto_succeed)
        };
        if !has_credentials {
            return Err(WifiError::NoCredentials);
        }
        if auto_succeed {
            self.fire(WifiEvent::GotIp);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WifiError> {
        self.fire(WifiEvent::Disconnected);
        Ok(())
    }

    fn start(&mut self) -> Result<(), WifiError> {
        self.fire(WifiEvent::Start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_fails_without_credentials() {
        let mut sim = SimWifi::new();
        assert!(matches!(sim.connect(), Err(WifiError::NoCredentials)));
    }

    #[test]
    fn cloned_handle_observes_the_same_call_count() {
        let mut sim = SimWifi::new();
        let handle = sim.clone();
        sim.set_credentials("ssid", "psk").unwrap();
        sim.set_auto_succeed(false);
        let _ = sim.connect();
        assert_eq!(handle.connect_calls(), 1);
    }
}
