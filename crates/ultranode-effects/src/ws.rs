use crate::color::parse_color;
use crate::ctx::RenderCtx;
use ultranode_proto::ParamValue;

/// A rendered effect for an addressable (WS281x-class) strip. Instances are
/// stateful: `init` resets latched parameters to their defaults, `render` is
/// called once per frame, `apply_parameters` latches a new command's params.
pub trait WsEffect: Send {
    fn name(&self) -> &'static str;
    fn init(&mut self);
    fn render(&mut self, ctx: &RenderCtx, pixel_count: usize, out: &mut Vec<[u8; 3]>);
    fn apply_parameters(&mut self, params: &[ParamValue]);
}

pub struct Solid {
    color: [u8; 3],
}

impl Default for Solid {
    fn default() -> Self { Self { color: [0, 0, 0] } }
}

impl WsEffect for Solid {
    fn name(&self) -> &'static str { "solid" }

    fn init(&mut self) { self.color = [0, 0, 0]; }

    fn render(&mut self, _ctx: &RenderCtx, pixel_count: usize, out: &mut Vec<[u8; 3]>) {
        out.clear();
        out.resize(pixel_count, self.color);
    }

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

impl WsEffect for Rainbow {
    fn name(&self) -> &'static str { "rainbow" }

    fn init(&mut self) {
        self.speed = 4;
        self.base_frame = None;
    }

    fn render(&mut self, ctx: &RenderCtx, pixel_count: usize, out: &mut Vec<[u8; 3]>) {
        let base = *self.base_frame.get_or_insert(ctx.frame_idx);
        let elapsed = ctx.frame_idx.saturating_sub(base);
        out.clear();
        out.reserve(pixel_count);
        for i in 0..pixel_count {
            let hue = (elapsed.saturating_mul(self.speed as u64) + (i as u64 * 360 / pixel_count.max(1) as u64)) % 360;
            out.push(hue_to_rgb(hue as u16));
        }
    }

    fn apply_parameters(&mut self, params: &[ParamValue]) {
        if let Some(ParamValue::Number(speed)) = params.first() {
            self.speed = speed.round().clamp(1.0, 360.0) as u32;
        }
    }
}

pub(crate) fn hue_to_rgb(hue: u16) -> [u8; 3] {
    let h = hue % 360;
    let sector = h / 60;
    let frac = (h % 60) as u32 * 255 / 60;
    let rising = frac as u8;
    let falling = (255 - frac) as u8;
    match sector {
        0 => [255, rising, 0],
        1 => [falling, 255, 0],
        2 => [0, 255, rising],
        3 => [0, falling, 255],
        4 => [rising, 0, 255],
        _ => [255, 0, falling],
    }
}

pub type WsEffectFactory = fn() -> Box<dyn WsEffect>;

pub const WS_EFFECTS: &[(&str, WsEffectFactory)] =
    &[("solid", || Box::new(Solid::default())), ("rainbow", || Box::new(Rainbow::default()))];

pub fn default_ws_effect_name() -> &'static str { WS_EFFECTS[0].0 }

pub fn make_ws_effect(name: &str) -> Option<Box<dyn WsEffect>> {
    WS_EFFECTS.iter().find(|(n, _)| *n == name).map(|(_, f)| f())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frame_idx: u64) -> RenderCtx { RenderCtx { frame_idx, frame_rate_hz: 60 } }

    #[test]
    fn solid_fills_the_whole_strip_with_latched_color() {
        let mut e = Solid::default();
        e.apply_parameters(&[ParamValue::Text("#ff0000".into())]);
        let mut out = Vec::new();
        e.render(&ctx(0), 5, &mut out);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|p| *p == [255, 0, 0]));
    }

    #[test]
    fn rainbow_produces_a_full_length_frame_and_advances_with_time() {
        let mut e = Rainbow::default();
        let mut a = Vec::new();
        let mut b = Vec::new();
        e.render(&ctx(0), 8, &mut a);
        e.render(&ctx(10), 8, &mut b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_effect_name_is_rejected_by_the_registry() {
        assert!(make_ws_effect("does-not-exist").is_none());
        assert!(make_ws_effect(default_ws_effect_name()).is_some());
    }

    #[test]
    fn malformed_parameters_leave_the_previous_color_latched() {
        let mut e = Solid::default();
        e.apply_parameters(&[ParamValue::Text("#00ff00".into())]);
        e.apply_parameters(&[ParamValue::Number(1.0)]);
        let mut out = Vec::new();
        e.render(&ctx(0), 1, &mut out);
        assert_eq!(out[0], [0, 255, 0]);
    }
}
