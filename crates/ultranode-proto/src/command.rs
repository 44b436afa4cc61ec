//! JSON command payload schemas (§4.5, §6) and the path-index-over-body-field
//! injection rule.

use crate::slot::OutputClass;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// An effect parameter: either a bare number or a string (e.g. a `#RRGGBB`
/// hex color). Effects decide how to interpret the positional array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Number(_) => None,
        }
    }
}

/// A parsed `ws/set`, `rgb/set`, `white/set`, or `relay/set` body, with the
/// topic's trailing index already merged in (path wins over body).
#[derive(Debug, Clone, Default)]
pub struct SetCommand {
    pub index: Option<u8>,
    pub effect: Option<String>,
    pub brightness: Option<i64>,
    pub params: Vec<ParamValue>,
}

/// Parse a `<class>/set` payload, injecting `path_index` over whatever the
/// body's `strip`/`channel` field says (§4.5 step 3).
pub fn parse_set_command(
    class: OutputClass,
    raw: &[u8],
    path_index: Option<u8>,
) -> Result<SetCommand, CommandError> {
    let mut value: Value = serde_json::from_slice(raw)?;
    let obj = value.as_object_mut().ok_or(CommandError::NotAnObject)?;

    if let Some(idx) = path_index {
        obj.insert(class.index_field().to_string(), Value::from(idx));
    }

    let index = obj
        .get(class.index_field())
        .and_then(Value::as_u64)
        .and_then(|n| u8::try_from(n).ok());

    let effect = obj.get("effect").and_then(Value::as_str).map(str::to_string);

    let brightness = obj.get("brightness").and_then(Value::as_i64);

    let params = obj
        .get("params")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<ParamValue>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(SetCommand { index, effect, brightness, params })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FadeParams {
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub steps: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MotionOffCommand {
    #[serde(default)]
    pub fade: Option<FadeParams>,
}

/// Parse a `motion/off` payload. An empty or malformed `fade` object falls
/// back to defaults rather than failing the command.
pub fn parse_motion_off(raw: &[u8]) -> Result<MotionOffCommand, CommandError> {
    if raw.is_empty() {
        return Ok(MotionOffCommand::default());
    }
    let cmd: MotionOffCommand = serde_json::from_slice(raw)?;
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_index_overrides_body_field() {
        let raw = br#"{"strip":1,"effect":"solid","brightness":200,"params":[0,255,0]}"#;
        let cmd = parse_set_command(OutputClass::Ws, raw, Some(0)).unwrap();
        assert_eq!(cmd.index, Some(0));
        assert_eq!(cmd.effect.as_deref(), Some("solid"));
        assert_eq!(cmd.brightness, Some(200));
        assert_eq!(cmd.params, vec![ParamValue::Number(0.0), ParamValue::Number(255.0), ParamValue::Number(0.0)]);
    }

    #[test]
    fn body_index_used_when_no_path_index() {
        let raw = br#"{"strip":1,"effect":"rainbow","params":[32]}"#;
        let cmd = parse_set_command(OutputClass::Ws, raw, None).unwrap();
        assert_eq!(cmd.index, Some(1));
    }

    #[test]
    fn hex_string_param_round_trips() {
        let raw = br#"{"effect":"solid","params":["#00FF00"]}"#;
        let cmd = parse_set_command(OutputClass::Ws, raw, Some(0)).unwrap();
        assert_eq!(cmd.params, vec![ParamValue::Text("#00FF00".to_string())]);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let raw = b"{not json";
        assert!(parse_set_command(OutputClass::Ws, raw, Some(0)).is_err());
    }

    #[test]
    fn motion_off_defaults_on_empty_body() {
        let cmd = parse_motion_off(b"{}").unwrap();
        assert!(cmd.fade.is_none());
    }

    #[test]
    fn motion_off_parses_fade_params() {
        let cmd = parse_motion_off(br#"{"fade":{"duration_ms":1000,"steps":10}}"#).unwrap();
        let fade = cmd.fade.unwrap();
        assert_eq!(fade.duration_ms, Some(1000));
        assert_eq!(fade.steps, Some(10));
    }
}
