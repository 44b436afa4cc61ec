use crate::error::MqttError;
use crate::ports::{MqttClientConfig, MqttEvent, MqttPort};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;

struct Inner {
    tx: Option<Sender<MqttEvent>>,
    init_calls: u32,
    register_calls: u32,
    start_calls: u32,
    fail_init_times: u32,
    fail_register_times: u32,
    fail_start_times: u32,
    destroyed_count: u32,
    subscriptions: Vec<(String, u8)>,
    published: Vec<(String, Vec<u8>, u8)>,
    next_msg_id: u32,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tx: None,
            init_calls: 0,
            register_calls: 0,
            start_calls: 0,
            fail_init_times: 0,
            fail_register_times: 0,
            fail_start_times: 0,
            destroyed_count: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
            next_msg_id: 0,
        }
    }
}

/// Hosted MQTT client stand-in. Cheaply `Clone`s to a shared handle (same
/// shape as [`crate::sim::kv_store::MemKvStore`]/[`crate::sim::wifi::SimWifi`])
/// so a test can keep inspecting call counts and firing events after handing
/// a boxed copy to whatever owns the [`MqttPort`]. `fail_init_times`/
/// `fail_register_times`/`fail_start_times` let a test fail the first N
/// attempts at each stage (§8 scenario 6: "three `init` failures ...
/// success on the fourth").
#[derive(Clone, Default)]
pub struct SimMqtt {
    inner: Arc<Mutex<Inner>>,
}

impl SimMqtt {
    pub fn new() -> Self { Self::default() }

    pub fn fire(&self, ev: MqttEvent) {
        if let Some(tx) = &self.inner.lock().tx {
            let _ = tx.send(ev);
        }
    }

    pub fn set_fail_init_times(&self, n: u32) { self.inner.lock().fail_init_times = n; }

    pub fn set_fail_register_times(&self, n: u32) { self.inner.lock().fail_register_times = n; }

    pub fn set_fail_start_times(&self, n: u32) { self.inner.lock().fail_start_times = n; }

    pub fn init_calls(&self) -> u32 { self.inner.lock().init_calls }

    pub fn register_calls(&self) -> u32 { self.inner.lock().register_calls }

    pub fn start_calls(&self) -> u32 { self.inner.lock().start_calls }

    pub fn destroyed_count(&self) -> u32 { self.inner.lock().destroyed_count }

    pub fn subscriptions(&self) -> Vec<(String, u8)> { self.inner.lock().subscriptions.clone() }

    pub fn published(&self) -> Vec<(String, Vec<u8>, u8)> { self.inner.lock().published.clone() }
}

impl MqttPort for SimMqtt {
    fn set_event_sender(&mut self, tx: Sender<MqttEvent>) { self.inner.lock().tx = Some(tx); }

    fn init(&mut self, _config: &MqttClientConfig) -> Result<(), MqttError> {
        let mut inner = self.inner.lock();
        inner.init_calls += 1;
        if inner.init_calls <= inner.fail_init_times {
            return Err(MqttError::InitFailed("simulated failure".to_string()));
        }
        Ok(())
    }

    fn register_event(&mut self) -> Result<(), MqttError> {
        let mut inner = self.inner.lock();
        inner.register_calls += 1;
        if inner.register_calls <= inner.fail_register_times {
            return Err(MqttError::RegisterFailed("simulated failure".to_string()));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), MqttError> {
        let mut inner = self.inner.lock();
        inner.start_calls += 1;
        if inner.start_calls <= inner.fail_start_times {
            return Err(MqttError::StartFailed("simulated failure".to_string()));
        }
        Ok(())
    }

    fn destroy(&mut self) { self.inner.lock().destroyed_count += 1; }

    fn subscribe(&mut self, topic: &str, qos: u8) -> Result<(), MqttError> {
        self.inner.lock().subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: u8) -> Result<u32, MqttError> {
        let mut inner = self.inner.lock();
        inner.next_msg_id += 1;
        let id = inner.next_msg_id;
        inner.published.push((topic.to_string(), payload.to_vec(), qos));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_handle_observes_calls_made_through_the_trait_object() {
        let mut sim = SimMqtt::new();
        let handle = sim.clone();
        let _ = sim.init(&MqttClientConfig {
            broker_uri: "mqtt://x".into(),
            username: None,
            password: None,
            client_cert: None,
            client_key: None,
        });
        assert_eq!(handle.init_calls(), 1);
    }

    #[test]
    fn fail_times_gate_the_first_n_attempts_only() {
        let mut sim = SimMqtt::new();
        sim.set_fail_start_times(2);
        assert!(sim.start().is_err());
        assert!(sim.start().is_err());
        assert!(sim.start().is_ok());
    }
}
