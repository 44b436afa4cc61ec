//! MQTT topic grammar: `ul/<node>/cmd/<path>` in, `ul/<node>/evt/...` out.

use crate::slot::OutputClass;
use std::fmt;
use thiserror::Error;

pub const TOPIC_ROOT: &str = "ul";
pub const NODE_WILDCARD: &str = "+";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic does not start with `ul/<node>/cmd/`")]
    NotACommandTopic,
    #[error("topic addressed to a different node")]
    ForeignNode,
    #[error("unrecognized command path `{0}`")]
    UnknownPath(String),
    #[error("trailing index `{0}` is not a number")]
    BadIndex(String),
}

/// The `<path>` half of a command topic, already split from any trailing
/// numeric index (§4.5 step 3: the index travels separately so it can be
/// injected into the JSON body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPath {
    Set { class: OutputClass, index: Option<u8> },
    OtaCheck,
    MotionOn,
    MotionOff,
    MotionStatus,
    Status,
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandPath::Set { class, index } => match index {
                Some(i) => write!(f, "{class}/set/{i}"),
                None => write!(f, "{class}/set"),
            },
            CommandPath::OtaCheck => write!(f, "ota/check"),
            CommandPath::MotionOn => write!(f, "motion/on"),
            CommandPath::MotionOff => write!(f, "motion/off"),
            CommandPath::MotionStatus => write!(f, "motion/status"),
            CommandPath::Status => write!(f, "status"),
        }
    }
}

/// A fully parsed incoming command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand {
    pub path: CommandPath,
}

/// Parse `topic` as a command addressed to `this_node`.
///
/// Step 1 of §4.5: the `<node>` segment must equal `this_node` or the
/// literal wildcard segment `+` — anything else is rejected before the
/// payload is even looked at.
pub fn parse_command_topic(topic: &str, this_node: &str) -> Result<ParsedCommand, TopicError> {
    let mut segs = topic.split('/');
    let root = segs.next().unwrap_or("");
    let node = segs.next().unwrap_or("");
    let cmd = segs.next().unwrap_or("");
    if root != TOPIC_ROOT || cmd != "cmd" {
        return Err(TopicError::NotACommandTopic);
    }
    if node != this_node && node != NODE_WILDCARD {
        return Err(TopicError::ForeignNode);
    }
    let rest: Vec<&str> = segs.collect();
    let path = parse_path(&rest)?;
    Ok(ParsedCommand { path })
}

fn parse_path(rest: &[&str]) -> Result<CommandPath, TopicError> {
    match rest {
        [class_seg, "set"] => {
            let class = OutputClass::from_topic_segment(class_seg)
                .ok_or_else(|| TopicError::UnknownPath(class_seg.to_string()))?;
            Ok(CommandPath::Set { class, index: None })
        }
        [class_seg, "set", idx] => {
            let class = OutputClass::from_topic_segment(class_seg)
                .ok_or_else(|| TopicError::UnknownPath(class_seg.to_string()))?;
            let index: u8 = idx.parse().map_err(|_| TopicError::BadIndex(idx.to_string()))?;
            Ok(CommandPath::Set { class, index: Some(index) })
        }
        ["ota", "check"] => Ok(CommandPath::OtaCheck),
        ["motion", "on"] => Ok(CommandPath::MotionOn),
        ["motion", "off"] => Ok(CommandPath::MotionOff),
        ["motion", "status"] => Ok(CommandPath::MotionStatus),
        ["status"] => Ok(CommandPath::Status),
        other => Err(TopicError::UnknownPath(other.join("/"))),
    }
}

/// `ul/<node>/evt/status` — acks and the full snapshot are published here.
pub fn status_topic(node: &str) -> String { format!("{TOPIC_ROOT}/{node}/evt/status") }

/// `ul/<node>/evt/<sensor>/motion`
pub fn motion_event_topic(node: &str, sensor: &str) -> String {
    format!("{TOPIC_ROOT}/{node}/evt/{sensor}/motion")
}

/// `ul/<node>/evt/ota`
pub fn ota_event_topic(node: &str) -> String { format!("{TOPIC_ROOT}/{node}/evt/ota") }

/// `ul/<node>/evt/motion/status`
pub fn motion_status_topic(node: &str) -> String { format!("{TOPIC_ROOT}/{node}/evt/motion/status") }

/// Subscriptions a node makes on MQTT connect (§4.5 "Subscription set").
pub fn subscriptions(node: &str) -> [(String, u8); 2] {
    [(format!("{TOPIC_ROOT}/{node}/cmd/#"), 1), (format!("{TOPIC_ROOT}/+/cmd/#"), 0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_indexed_set() {
        let p = parse_command_topic("ul/node1/cmd/ws/set/0", "node1").unwrap();
        assert_eq!(p.path, CommandPath::Set { class: OutputClass::Ws, index: Some(0) });
    }

    #[test]
    fn parses_unindexed_set() {
        let p = parse_command_topic("ul/node1/cmd/rgb/set", "node1").unwrap();
        assert_eq!(p.path, CommandPath::Set { class: OutputClass::Rgb, index: None });
    }

    #[test]
    fn rejects_foreign_node() {
        let err = parse_command_topic("ul/other-node/cmd/ws/set/0", "node1").unwrap_err();
        assert_eq!(err, TopicError::ForeignNode);
    }

    #[test]
    fn accepts_literal_wildcard_node_segment() {
        let p = parse_command_topic("ul/+/cmd/ws/set/0", "node1").unwrap();
        assert_eq!(p.path, CommandPath::Set { class: OutputClass::Ws, index: Some(0) });
    }

    #[test]
    fn special_paths() {
        assert_eq!(parse_command_topic("ul/node1/cmd/status", "node1").unwrap().path, CommandPath::Status);
        assert_eq!(
            parse_command_topic("ul/node1/cmd/motion/off", "node1").unwrap().path,
            CommandPath::MotionOff
        );
        assert_eq!(
            parse_command_topic("ul/node1/cmd/ota/check", "node1").unwrap().path,
            CommandPath::OtaCheck
        );
    }

    #[test]
    fn unknown_path_rejected() {
        let err = parse_command_topic("ul/node1/cmd/bogus", "node1").unwrap_err();
        assert!(matches!(err, TopicError::UnknownPath(_)));
    }
}
