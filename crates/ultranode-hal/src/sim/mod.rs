//! Hosted (non-`espidf`) backends for every port trait. Always compiled —
//! used both by `cargo test` and, via the runtime's hosted build mode, as a
//! dev/bench target, mirroring the teacher's "stub to avoid breaking hosted
//! mode" split for its COM driver.

pub mod credentials;
pub mod kv_store;
pub mod mqtt;
pub mod ota;
pub mod sntp;
pub mod strip;
pub mod wifi;

pub use credentials::SimCredentials;
pub use kv_store::MemKvStore;
pub use mqtt::SimMqtt;
pub use ota::SimOta;
pub use sntp::SimSntp;
pub use strip::{MemAnalogPwm, MemRelay, MemStripDriver, MemWhitePwm};
pub use wifi::SimWifi;
