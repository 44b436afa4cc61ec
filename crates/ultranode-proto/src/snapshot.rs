//! Status snapshot assembly (§4.5 "status", §6 "Status snapshot structure").
//!
//! Open question D.3 is resolved here: slot fields are emitted in a fixed
//! order (`effect`, `brightness`, `params`, class-specific fields, `color`)
//! and `params` is always present, even `[]` for a never-commanded slot.

use crate::command::ParamValue;
use crate::slot::OutputClass;
use serde_json::{json, Map, Value};

/// One enabled slot's contribution to a snapshot.
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub index: u8,
    pub effect: String,
    pub brightness: u8,
    pub params: Vec<ParamValue>,
    /// Addressable slots: pixel count of the strip.
    pub pixel_count: Option<u32>,
    /// Rendering rate this slot's engine runs at.
    pub frame_rate_hz: Option<u32>,
    /// Last rendered color, for addressable/analog slots.
    pub color: Option<[u8; 3]>,
}

impl SlotSnapshot {
    fn to_json(&self, class: OutputClass) -> Value {
        let mut obj = Map::new();
        obj.insert(class.index_field().to_string(), json!(self.index));
        obj.insert("effect".into(), json!(self.effect));
        obj.insert("brightness".into(), json!(self.brightness));
        obj.insert("params".into(), json!(self.params));
        if let Some(n) = self.pixel_count {
            obj.insert("pixel_count".into(), json!(n));
        }
        if let Some(r) = self.frame_rate_hz {
            obj.insert("frame_rate_hz".into(), json!(r));
        }
        if let Some(c) = self.color {
            obj.insert("color".into(), json!(c));
        }
        Value::Object(obj)
    }
}

/// Assemble the full node status snapshot published on `cmd/status`,
/// `ota/check`, and MQTT reconnect (via `dispatch`).
pub fn build_snapshot(
    node: &str,
    pir_enabled: bool,
    uptime_s: u64,
    ws: &[SlotSnapshot],
    rgb: &[SlotSnapshot],
    white: &[SlotSnapshot],
    relay: &[SlotSnapshot],
) -> Value {
    json!({
        "event": "snapshot",
        "node": node,
        "pir_enabled": pir_enabled,
        "uptime_s": uptime_s,
        "ws": ws.iter().map(|s| s.to_json(OutputClass::Ws)).collect::<Vec<_>>(),
        "rgb": rgb.iter().map(|s| s.to_json(OutputClass::Rgb)).collect::<Vec<_>>(),
        "white": white.iter().map(|s| s.to_json(OutputClass::White)).collect::<Vec<_>>(),
        "relay": relay.iter().map(|s| s.to_json(OutputClass::Relay)).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_commanded_slot_still_has_params_array() {
        let slot = SlotSnapshot {
            index: 0,
            effect: "solid".into(),
            brightness: 0,
            params: vec![],
            pixel_count: Some(60),
            frame_rate_hz: Some(60),
            color: Some([0, 0, 0]),
        };
        let v = slot.to_json(OutputClass::Ws);
        assert_eq!(v["params"], json!([]));
    }

    #[test]
    fn snapshot_has_expected_top_level_shape() {
        let v = build_snapshot("node1", true, 42, &[], &[], &[], &[]);
        assert_eq!(v["event"], "snapshot");
        assert_eq!(v["node"], "node1");
        assert_eq!(v["uptime_s"], 42);
        assert!(v["ws"].is_array());
        assert!(v["relay"].is_array());
    }
}
