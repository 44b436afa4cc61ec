use crate::ctx::RenderCtx;
use ultranode_proto::ParamValue;

/// A relay has no color or duty cycle — render resolves to on or off.
pub trait RelayEffect: Send {
    fn name(&self) -> &'static str;
    fn init(&mut self);
    fn render(&mut self, ctx: &RenderCtx) -> bool;
    fn apply_parameters(&mut self, params: &[ParamValue]);
}

pub struct On;

impl RelayEffect for On {
    fn name(&self) -> &'static str { "on" }
    fn init(&mut self) {}
    fn render(&mut self, _ctx: &RenderCtx) -> bool { true }
    fn apply_parameters(&mut self, _params: &[ParamValue]) {}
}

pub struct Off;

impl RelayEffect for Off {
    fn name(&self) -> &'static str { "off" }
    fn init(&mut self) {}
    fn render(&mut self, _ctx: &RenderCtx) -> bool { false }
    fn apply_parameters(&mut self, _params: &[ParamValue]) {}
}

pub type RelayEffectFactory = fn() -> Box<dyn RelayEffect>;

pub const RELAY_EFFECTS: &[(&str, RelayEffectFactory)] = &[("off", || Box::new(Off)), ("on", || Box::new(On))];

pub fn default_relay_effect_name() -> &'static str { RELAY_EFFECTS[0].0 }

pub fn make_relay_effect(name: &str) -> Option<Box<dyn RelayEffect>> {
    RELAY_EFFECTS.iter().find(|(n, _)| *n == name).map(|(_, f)| f())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderCtx { RenderCtx { frame_idx: 0, frame_rate_hz: 1 } }

    #[test]
    fn on_and_off_resolve_to_their_boolean() {
        assert!(make_relay_effect("on").unwrap().render(&ctx()));
        assert!(!make_relay_effect("off").unwrap().render(&ctx()));
    }

    #[test]
    fn default_is_off() {
        assert_eq!(default_relay_effect_name(), "off");
    }
}
