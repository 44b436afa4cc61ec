//! Ack JSON, published on `ul/<node>/evt/status` in response to a command
//! (§4.5 step 6).

use crate::command::ParamValue;
use crate::slot::OutputClass;
use serde_json::{json, Value};

/// `{"event":"ack","status":"ok",<slot-key>:<idx>,"effect":<name>,"params":<echoed-array>,"brightness":<n>}`
///
/// `brightness` is omitted for `ws` (the addressable class has no single
/// scalar brightness reading that isn't already implied by the rendered
/// color — mirroring the boundary behavior spec.md calls out explicitly).
pub fn ack_ok(class: OutputClass, index: u8, effect: &str, params: &[ParamValue], brightness: u8) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("event".into(), json!("ack"));
    obj.insert("status".into(), json!("ok"));
    obj.insert(class.index_field().to_string(), json!(index));
    obj.insert("effect".into(), json!(effect));
    obj.insert("params".into(), json!(params));
    if class != OutputClass::Ws {
        obj.insert("brightness".into(), json!(brightness));
    }
    Value::Object(obj)
}

pub fn ack_invalid_effect() -> Value { json!({"event":"ack","status":"error","error":"invalid effect"}) }

pub fn ack_status_ok() -> Value { json!({"event":"ack","status":"ok"}) }

pub fn motion_status(pir_enabled: bool) -> Value { json!({"pir_enabled": pir_enabled}) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_ack_omits_brightness() {
        let v = ack_ok(OutputClass::Ws, 0, "solid", &[ParamValue::Number(1.0)], 255);
        assert!(v.get("brightness").is_none());
        assert_eq!(v["strip"], 0);
    }

    #[test]
    fn white_ack_includes_brightness_and_channel_key() {
        let v = ack_ok(OutputClass::White, 2, "swell", &[], 255);
        assert_eq!(v["brightness"], 255);
        assert_eq!(v["channel"], 2);
    }
}
