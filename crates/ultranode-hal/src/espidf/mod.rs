//! Real ESP32 bindings for every port trait, via `esp-idf-svc`/`esp-idf-hal`.
//! Only compiled for the `espidf` target — see `sim` for the hosted
//! counterpart used by `cargo test`.

mod mqtt;
mod nvs;
mod pwm;
mod sntp;
mod strip;
mod wifi;

pub use mqtt::EspidfMqtt;
pub use nvs::EspidfKvStore;
pub use pwm::{EspidfAnalogPwm, EspidfRelay, EspidfWhitePwm};
pub use sntp::EspidfSntp;
pub use strip::EspidfStripDriver;
pub use wifi::EspidfWifi;
