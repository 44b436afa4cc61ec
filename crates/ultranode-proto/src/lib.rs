//! Wire schemas and node configuration shared by every UltraNode crate:
//! topic grammar, JSON command/ack/snapshot bodies, slot addressing, and the
//! build-time `NodeConfig`.

pub mod ack;
pub mod command;
pub mod config;
pub mod slot;
pub mod snapshot;
pub mod topic;

pub use ack::*;
pub use command::{CommandError, FadeParams, MotionOffCommand, ParamValue, SetCommand};
pub use config::NodeConfig;
pub use slot::{OutputClass, SlotId};
pub use snapshot::{build_snapshot, SlotSnapshot};
pub use topic::{
    motion_event_topic, motion_status_topic, ota_event_topic, parse_command_topic, status_topic, subscriptions,
    CommandPath, ParsedCommand, TopicError,
};
