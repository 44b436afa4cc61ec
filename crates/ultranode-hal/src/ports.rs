//! Port traits — the boundary between `ultranode-engines`/`ultranode-
//! connectivity`/`ultranode-persistence` and the concrete hardware or
//! collaborator behind it. Grounded on the driven-adapter port-trait shape
//! used for sensors/actuators/storage elsewhere in this lineage's firmware.

use crate::error::{CredentialsError, DriverError, MqttError, OtaError, SntpError, StoreError, WifiError};
use crossbeam_channel::Sender;

/// One addressable (WS2812-class) strip. `write` commits a full frame;
/// implementations are expected to do the actual wire transfer off the
/// calling thread (§4.2's producer/refresher split) but this trait's
/// contract is simply "frame is queued for commit when this returns".
pub trait StripDriver: Send {
    fn pixel_count(&self) -> usize;
    fn write(&mut self, rgb: &[[u8; 3]]) -> Result<(), DriverError>;
}

/// Three PWM channels driving one analog RGB strip. Duties are 12-bit
/// (0..=4095) per §4.3.
pub trait AnalogPwmDriver: Send {
    fn write(&mut self, r: u16, g: u16, b: u16) -> Result<(), DriverError>;
}

/// One single-color PWM channel (white or relay-as-PWM). Duty is 12-bit.
pub trait WhitePwmDriver: Send {
    fn write(&mut self, duty: u16) -> Result<(), DriverError>;
}

/// A boolean relay output (SPEC_FULL.md C.1).
pub trait RelayDriver: Send {
    fn write(&mut self, on: bool) -> Result<(), DriverError>;
}

/// Namespaced key-value persistent storage (NVS).
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// Events the Wi-Fi driver reports (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    Start,
    Disconnected,
    GotIp,
}

/// Station-mode Wi-Fi. The supervisor owns the state machine; this trait is
/// just the actions it can perform and the event stream it listens to.
pub trait WifiPort: Send {
    /// Register the channel the driver pushes [`WifiEvent`]s to. Called once
    /// at supervisor construction (single-shot registration, §9).
    fn set_event_sender(&mut self, tx: Sender<WifiEvent>);
    fn set_credentials(&mut self, ssid: &str, psk: &str) -> Result<(), WifiError>;
    fn connect(&mut self) -> Result<(), WifiError>;
    fn stop(&mut self) -> Result<(), WifiError>;
    fn start(&mut self) -> Result<(), WifiError>;
}

/// Events the MQTT client reports (§4.10). `Message` carries an inbound
/// publish on a subscribed topic — the transport boundary a `ul/+/cmd/#`
/// subscription crosses into `ultranode-dispatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    Connected,
    Disconnected,
    Published(u32),
    Message(String, Vec<u8>),
}

pub struct MqttClientConfig {
    pub broker_uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_cert: Option<Vec<u8>>,
    pub client_key: Option<Vec<u8>>,
}

/// MQTT client lifecycle (§4.10's `init` / `register_event` / `start`).
pub trait MqttPort: Send {
    fn set_event_sender(&mut self, tx: Sender<MqttEvent>);
    fn init(&mut self, config: &MqttClientConfig) -> Result<(), MqttError>;
    fn register_event(&mut self) -> Result<(), MqttError>;
    fn start(&mut self) -> Result<(), MqttError>;
    fn destroy(&mut self);
    fn subscribe(&mut self, topic: &str, qos: u8) -> Result<(), MqttError>;
    fn publish(&mut self, topic: &str, payload: &[u8], qos: u8) -> Result<u32, MqttError>;
}

/// SNTP time sync (§4.9).
pub trait SntpPort: Send {
    /// Start the client; `on_sync` fires once per successful sync.
    fn start(&mut self, on_sync: Box<dyn Fn() + Send>) -> Result<(), SntpError>;
    fn now_unix_s(&self) -> u64;
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub ssid: String,
    pub psk: String,
    pub mqtt_user: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_cert: Option<Vec<u8>>,
    pub mqtt_client_key: Option<Vec<u8>>,
}

/// Provisioning/credential store (§6). Missing SSID blocks Wi-Fi startup.
pub trait CredentialsPort: Send {
    fn load(&self) -> Result<Credentials, CredentialsError>;
}

/// OTA collaborator (§6, out of scope beyond this interface).
pub trait OtaPort: Send {
    fn check(&mut self, force: bool) -> Result<(), OtaError>;
}
