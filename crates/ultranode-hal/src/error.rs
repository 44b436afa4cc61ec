use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("hardware driver init failed: {0}")]
    InitFailed(String),
    #[error("hardware driver write failed: {0}")]
    WriteFailed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store open failed: {0}")]
    OpenFailed(String),
    #[error("key-value store write failed: {0}")]
    WriteFailed(String),
    #[error("key-value store commit failed: {0}")]
    CommitFailed(String),
}

#[derive(Debug, Error)]
pub enum WifiError {
    #[error("wifi driver init failed: {0}")]
    InitFailed(String),
    #[error("wifi connect failed: {0}")]
    ConnectFailed(String),
    #[error("no SSID configured")]
    NoCredentials,
}

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("mqtt client init failed: {0}")]
    InitFailed(String),
    #[error("mqtt event registration failed: {0}")]
    RegisterFailed(String),
    #[error("mqtt start failed: {0}")]
    StartFailed(String),
    #[error("mqtt publish failed: {0}")]
    PublishFailed(String),
}

#[derive(Debug, Error)]
pub enum SntpError {
    #[error("sntp task spawn failed: {0}")]
    SpawnFailed(String),
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum OtaError {
    #[error("ota check failed: {0}")]
    CheckFailed(String),
}
