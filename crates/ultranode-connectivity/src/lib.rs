//! Network lifecycle supervisors for UltraNode: Wi-Fi station reconnect
//! (§4.8), SNTP wallclock sync (§4.9), and MQTT client lifecycle (§4.10),
//! plus the shared [`ConnectivityState`] snapshot the health monitor and
//! status responder both read.

pub mod mqtt;
pub mod sntp;
pub mod state;
pub mod timer;
pub mod wifi;

pub use mqtt::{MqttLifecycleEvent, MqttSupervisor};
pub use sntp::SntpSupervisor;
pub use state::ConnectivityState;
pub use timer::OneShotTimer;
pub use wifi::WifiSupervisor;
