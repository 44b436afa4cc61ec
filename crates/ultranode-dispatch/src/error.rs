use thiserror::Error;
use ultranode_proto::{CommandError, TopicError};

/// Every way a single inbound message can fail to become a state change.
/// §4.5's policy is "log and drop" for all of these — nothing here reaches
/// an MQTT ack except [`Self::UnknownEffect`], which gets a `status: "error"`
/// ack of its own.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("command addressed a slot with no index")]
    MissingIndex,
    #[error("slot index out of range for this build")]
    SlotOutOfRange,
    #[error("unknown effect name")]
    UnknownEffect,
}
