//! Hardware and collaborator port traits for UltraNode, with a hosted
//! simulation backend (always compiled) and a real `espidf` backend
//! (compiled only for `target_os = "espidf"`).

pub mod error;
pub mod ports;
pub mod sim;

#[cfg(target_os = "espidf")]
pub mod espidf;

pub use error::{CredentialsError, DriverError, MqttError, OtaError, SntpError, StoreError, WifiError};
pub use ports::{
    AnalogPwmDriver, Credentials, CredentialsPort, KvStore, MqttClientConfig, MqttEvent, MqttPort, OtaPort,
    RelayDriver, SntpPort, StripDriver, WhitePwmDriver, WifiEvent, WifiPort,
};
