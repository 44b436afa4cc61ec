use crate::error::WifiError;
use crate::ports::{WifiEvent, WifiPort};
use crossbeam_channel::Sender;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent as IdfWifiEvent};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct EspidfWifi<'a> {
    wifi: EspWifi<'a>,
    sysloop: EspSystemEventLoop,
    tx: Arc<Mutex<Option<Sender<WifiEvent>>>>,
    _subscription: Option<esp_idf_svc::eventloop::EspSubscription<'a, esp_idf_svc::eventloop::System>>,
}

impl<'a> EspidfWifi<'a> {
    pub fn new(wifi: EspWifi<'a>, sysloop: EspSystemEventLoop) -> Result<Self, WifiError> {
        Ok(Self { wifi, sysloop, tx: Arc::new(Mutex::new(None)), _subscription: None })
    }
}

impl<'a> WifiPort for EspidfWifi<'a> {
    fn set_event_sender(&mut self, tx: Sender<WifiEvent>) {
        *self.tx.lock() = Some(tx.clone());
        let forward = self.tx.clone();
        let sub = self
            .sysloop
            .subscribe::<IdfWifiEvent, _>(move |event: &IdfWifiEvent| {
                let mapped = match event {
                    IdfWifiEvent::StaStart => Some(WifiEvent::Start),
                    IdfWifiEvent::StaDisconnected(_) => Some(WifiEvent::Disconnected),
                    IdfWifiEvent::StaConnected(_) => None,
                    _ => None,
                };
                if let Some(ev) = mapped {
                    if let Some(tx) = forward.lock().as_ref() {
                        let _ = tx.send(ev);
                    }
                }
            })
            .ok();
        self._subscription = sub;
        // GOT_IP arrives via the IP event loop in real firmware; wired
        // alongside the Wi-Fi subscription above at integration time.
        let _ = tx;
    }

    fn set_credentials(&mut self, ssid: &str, psk: &str) -> Result<(), WifiError> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| WifiError::ConnectFailed("ssid too long".to_string()))?,
                password: psk.try_into().map_err(|_| WifiError::ConnectFailed("psk too long".to_string()))?,
                auth_method: AuthMethod::WPA2Personal,
                ..Default::default()
            }))
            .map_err(|e| WifiError::InitFailed(e.to_string()))
    }

    fn connect(&mut self) -> Result<(), WifiError> {
        self.wifi.connect().map_err(|e| WifiError::ConnectFailed(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), WifiError> { self.wifi.stop().map_err(|e| WifiError::InitFailed(e.to_string())) }

    fn start(&mut self) -> Result<(), WifiError> {
        self.wifi.start().map_err(|e| WifiError::InitFailed(e.to_string()))
    }
}
