use crate::error::MqttError;
use crate::ports::{MqttClientConfig, MqttEvent, MqttPort};
use crossbeam_channel::Sender;
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct EspidfMqtt {
    client: Option<EspMqttClient<'static>>,
    connection: Option<EspMqttConnection>,
    config: Option<MqttClientConfig>,
    tx: Arc<Mutex<Option<Sender<MqttEvent>>>>,
}

impl EspidfMqtt {
    pub fn new() -> Self {
        Self { client: None, connection: None, config: None, tx: Arc::new(Mutex::new(None)) }
    }

    fn qos(q: u8) -> QoS {
        match q {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }
}

impl Default for EspidfMqtt {
    fn default() -> Self { Self::new() }
}

impl MqttPort for EspidfMqtt {
    fn set_event_sender(&mut self, tx: Sender<MqttEvent>) { *self.tx.lock() = Some(tx); }

    fn init(&mut self, config: &MqttClientConfig) -> Result<(), MqttError> {
        self.config = Some(MqttClientConfig {
            broker_uri: config.broker_uri.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client_cert: config.client_cert.clone(),
            client_key: config.client_key.clone(),
        });
        let mqtt_config = MqttClientConfiguration {
            username: config.username.as_deref(),
            password: config.password.as_deref(),
            ..Default::default()
        };
        let broker_uri = config.broker_uri.clone();
        let (client, connection) = EspMqttClient::new(&broker_uri, &mqtt_config)
            .map_err(|e| MqttError::InitFailed(e.to_string()))?;
        self.client = Some(client);
        self.connection = Some(connection);
        Ok(())
    }

    fn register_event(&mut self) -> Result<(), MqttError> {
        let connection = self.connection.take().ok_or_else(|| MqttError::RegisterFailed("not initialized".to_string()))?;
        let tx = self.tx.clone();
        std::thread::Builder::new()
            .name("mqtt-evt".to_string())
            .spawn(move || {
                let mut connection = connection;
                while let Ok(event) = connection.next() {
                    let mapped = match event.payload() {
                        EventPayload::Connected(_) => Some(MqttEvent::Connected),
                        EventPayload::Disconnected => Some(MqttEvent::Disconnected),
                        EventPayload::Published(id) => Some(MqttEvent::Published(id)),
                        EventPayload::Received { topic: Some(topic), data, .. } => {
                            Some(MqttEvent::Message(topic.to_string(), data.to_vec()))
                        }
                        _ => None,
                    };
                    if let Some(ev) = mapped {
                        if let Some(tx) = tx.lock().as_ref() {
                            let _ = tx.send(ev);
                        }
                    }
                }
            })
            .map_err(|e| MqttError::RegisterFailed(e.to_string()))?;
        Ok(())
    }

    fn start(&mut self) -> Result<(), MqttError> {
        if self.client.is_none() {
            return Err(MqttError::StartFailed("not initialized".to_string()));
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.client = None;
        self.connection = None;
    }

    fn subscribe(&mut self, topic: &str, qos: u8) -> Result<(), MqttError> {
        self.client
            .as_mut()
            .ok_or_else(|| MqttError::StartFailed("not initialized".to_string()))?
            .subscribe(topic, Self::qos(qos))
            .map_err(|e| MqttError::StartFailed(e.to_string()))
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: u8) -> Result<u32, MqttError> {
        self.client
            .as_mut()
            .ok_or_else(|| MqttError::PublishFailed("not initialized".to_string()))?
            .publish(topic, Self::qos(qos), false, payload)
            .map_err(|e| MqttError::PublishFailed(e.to_string()))
    }
}
