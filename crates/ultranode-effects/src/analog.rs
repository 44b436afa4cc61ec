use crate::color::parse_color;
use crate::ctx::RenderCtx;
use ultranode_proto::ParamValue;

/// A rendered effect for an analog-PWM RGB channel triple.
pub trait AnalogEffect: Send {
    fn name(&self) -> &'static str;
    fn init(&mut self);
    fn render(&mut self, ctx: &RenderCtx) -> [u8; 3];
    fn apply_parameters(&mut self, params: &[ParamValue]);
}

pub struct Solid {
    color: [u8; 3],
}

impl Default for Solid {
    fn default() -> Self { Self { color: [0, 0, 0] } }
}

impl AnalogEffect for Solid {
    fn name(&self) -> &'static str { "solid" }

    fn init(&mut self) { self.color = [0, 0, 0]; }

    fn render(&mut self, _ctx: &RenderCtx) -> [u8; 3] { self.color }

    fn apply_parameters(&mut self, params: &[ParamValue]) {
        if let Some(c) = parse_color(params) {
            self.color = c;
        }
    }
}

pub struct Rainbow {
    speed: u32,
    base_frame: Option<u64>,
}

impl Default for Rainbow {
    fn default() -> Self { Self { speed: 4, base_frame: None } }
}

impl AnalogEffect for Rainbow {
    fn name(&self) -> &'static str { "rainbow" }

    fn init(&mut self) {
        self.speed = 4;
        self.base_frame = None;
    }

    fn render(&mut self, ctx: &RenderCtx) -> [u8; 3] {
        let base = *self.base_frame.get_or_insert(ctx.frame_idx);
        let elapsed = ctx.frame_idx.saturating_sub(base);
        let hue = (elapsed.saturating_mul(self.speed as u64) % 360) as u16;
        super::ws::hue_to_rgb(hue)
    }

    fn apply_parameters(&mut self, params: &[ParamValue]) {
        if let Some(ParamValue::Number(speed)) = params.first() {
            self.speed = speed.round().clamp(1.0, 360.0) as u32;
        }
    }
}

pub type AnalogEffectFactory = fn() -> Box<dyn AnalogEffect>;

pub const ANALOG_EFFECTS: &[(&str, AnalogEffectFactory)] =
    &[("solid", || Box::new(Solid::default())), ("rainbow", || Box::new(Rainbow::default()))];

pub fn default_analog_effect_name() -> &'static str { ANALOG_EFFECTS[0].0 }

pub fn make_analog_effect(name: &str) -> Option<Box<dyn AnalogEffect>> {
    ANALOG_EFFECTS.iter().find(|(n, _)| *n == name).map(|(_, f)| f())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frame_idx: u64) -> RenderCtx { RenderCtx { frame_idx, frame_rate_hz: 60 } }

    #[test]
    fn solid_returns_the_latched_color() {
        let mut e = Solid::default();
        e.apply_parameters(&[ParamValue::Number(0.0), ParamValue::Number(128.0), ParamValue::Number(255.0)]);
        assert_eq!(e.render(&ctx(0)), [0, 128, 255]);
    }

    #[test]
    fn rainbow_advances_across_frames() {
        let mut e = Rainbow::default();
        let a = e.render(&ctx(0));
        let b = e.render(&ctx(20));
        assert_ne!(a, b);
    }

    #[test]
    fn registry_rejects_unknown_names() {
        assert!(make_analog_effect("glitter").is_none());
    }
}
