use crate::ctx::RenderCtx;
use ultranode_proto::ParamValue;

/// A rendered effect for a single white-PWM channel. Render returns a raw
/// 0-255 value; the owning engine applies gamma and the slot's brightness
/// scale on top of it.
pub trait WhiteEffect: Send {
    fn name(&self) -> &'static str;
    fn init(&mut self);
    fn render(&mut self, ctx: &RenderCtx) -> u8;
    fn apply_parameters(&mut self, params: &[ParamValue]);
}

pub struct Solid {
    value: u8,
}

impl Default for Solid {
    fn default() -> Self { Self { value: 255 } }
}

impl WhiteEffect for Solid {
    fn name(&self) -> &'static str { "solid" }

    fn init(&mut self) { self.value = 255; }

    fn render(&mut self, _ctx: &RenderCtx) -> u8 { self.value }

    fn apply_parameters(&mut self, params: &[ParamValue]) {
        if let Some(ParamValue::Number(v)) = params.first() {
            self.value = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

const SWELL_DEFAULT_MS: u64 = 4000;
/// A one-shot ramp must span at least 256 frames so no integer duty step
/// gets skipped.
const SWELL_MIN_FRAMES: u64 = 256;

pub struct Swell {
    duration_ms: u64,
    base_frame: Option<u64>,
}

impl Default for Swell {
    fn default() -> Self { Self { duration_ms: SWELL_DEFAULT_MS, base_frame: None } }
}

impl WhiteEffect for Swell {
    fn name(&self) -> &'static str { "swell" }

    fn init(&mut self) {
        self.duration_ms = SWELL_DEFAULT_MS;
        self.base_frame = None;
    }

    fn render(&mut self, ctx: &RenderCtx) -> u8 {
        let base = *self.base_frame.get_or_insert(ctx.frame_idx);
        let elapsed_frames = ctx.frame_idx.saturating_sub(base);
        let rate = ctx.frame_rate_hz.max(1) as u64;
        let duration_frames = (self.duration_ms * rate / 1000).max(SWELL_MIN_FRAMES);
        let step = elapsed_frames.saturating_mul(255) / duration_frames;
        step.min(255) as u8
    }

    fn apply_parameters(&mut self, params: &[ParamValue]) {
        if let Some(ParamValue::Number(ms)) = params.first() {
            if *ms > 0.0 {
                self.duration_ms = ms.round() as u64;
            }
        }
    }
}

pub type WhiteEffectFactory = fn() -> Box<dyn WhiteEffect>;

pub const WHITE_EFFECTS: &[(&str, WhiteEffectFactory)] =
    &[("solid", || Box::new(Solid::default())), ("swell", || Box::new(Swell::default()))];

pub fn default_white_effect_name() -> &'static str { WHITE_EFFECTS[0].0 }

pub fn make_white_effect(name: &str) -> Option<Box<dyn WhiteEffect>> {
    WHITE_EFFECTS.iter().find(|(n, _)| *n == name).map(|(_, f)| f())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frame_idx: u64, frame_rate_hz: u32) -> RenderCtx { RenderCtx { frame_idx, frame_rate_hz } }

    #[test]
    fn swell_ramps_monotonically_from_zero_to_full_scale() {
        let mut e = Swell::default();
        e.apply_parameters(&[ParamValue::Number(1000.0)]);
        let mut prev = 0u8;
        for f in (0..=1000u64).step_by(50) {
            let v = e.render(&ctx(f, 1000));
            assert!(v >= prev, "expected monotonic increase, got {v} after {prev}");
            prev = v;
        }
        assert_eq!(prev, 255);
    }

    #[test]
    fn swell_never_skips_a_step_even_at_high_frame_rate() {
        let mut e = Swell::default();
        e.apply_parameters(&[ParamValue::Number(1.0)]);
        let mut seen = std::collections::HashSet::new();
        for f in 0..SWELL_MIN_FRAMES {
            seen.insert(e.render(&ctx(f, 100_000)));
        }
        assert!(seen.len() >= 200, "too many duty steps skipped: only {} distinct values", seen.len());
    }

    #[test]
    fn solid_latches_a_single_value() {
        let mut e = Solid::default();
        e.apply_parameters(&[ParamValue::Number(64.0)]);
        assert_eq!(e.render(&ctx(0, 60)), 64);
        assert_eq!(e.render(&ctx(500, 60)), 64);
    }
}
