use crate::slot_state::SlotState;
use ultranode_effects::{default_white_effect_name, gamma8, make_white_effect, RenderCtx, WhiteEffect};
use ultranode_hal::WhitePwmDriver;
use ultranode_proto::ParamValue;

const DUTY_MAX: u16 = 4095;

fn to_12bit(v: u8) -> u16 { (v as u32 * DUTY_MAX as u32 / 255) as u16 }

/// One white-PWM channel. `duty = gamma(effect.render()) * brightness / 255`
/// per §4.4; brightness defaults to zero so the channel is dark until the
/// first command latches a nonzero value.
pub struct WhiteSlot {
    effect: Box<dyn WhiteEffect>,
    state: SlotState,
    driver: Box<dyn WhitePwmDriver>,
}

impl WhiteSlot {
    pub fn new(driver: Box<dyn WhitePwmDriver>) -> Self {
        let default_name = default_white_effect_name();
        let mut effect = make_white_effect(default_name).expect("default white effect is registered");
        effect.init();
        Self { effect, state: SlotState::new(default_name), driver }
    }

    pub fn set_effect(&mut self, name: &str) -> bool {
        match make_white_effect(name) {
            Some(mut effect) => {
                effect.init();
                self.effect = effect;
                self.state.set_effect(name);
                true
            }
            None => false,
        }
    }

    pub fn apply_parameters(&mut self, params: Vec<ParamValue>) {
        self.effect.apply_parameters(&params);
        self.state.set_params(params);
    }

    pub fn set_brightness(&mut self, brightness: u8) { self.state.brightness = brightness; }

    pub fn state(&self) -> &SlotState { &self.state }

    pub fn render(&mut self, ctx: &RenderCtx) {
        let raw = self.effect.render(ctx);
        let brightness = self.state.brightness as u16;
        let value = ((gamma8(raw) as u16 * brightness) / 255) as u8;
        self.state.last_color = Some([value, value, value]);
        if let Err(e) = self.driver.write(to_12bit(value)) {
            log::warn!("white channel write failed: {e}");
        }
    }
}

pub struct WhiteEngine {
    frame_idx: u64,
    slots: [Option<WhiteSlot>; 4],
}

impl WhiteEngine {
    pub fn new() -> Self { Self { frame_idx: 0, slots: [None, None, None, None] } }

    pub fn install(&mut self, index: u8, driver: Box<dyn WhitePwmDriver>) {
        if (index as usize) < self.slots.len() {
            self.slots[index as usize] = Some(WhiteSlot::new(driver));
        }
    }

    pub fn slot_mut(&mut self, index: u8) -> Option<&mut WhiteSlot> { self.slots.get_mut(index as usize)?.as_mut() }

    pub fn slot(&self, index: u8) -> Option<&WhiteSlot> { self.slots.get(index as usize)?.as_ref() }

    pub fn enabled_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.is_some().then_some(i as u8))
    }

    pub fn render_frame(&mut self, frame_rate_hz: u32) {
        let ctx = RenderCtx { frame_idx: self.frame_idx, frame_rate_hz };
        for slot in self.slots.iter_mut().flatten() {
            slot.render(&ctx);
        }
        self.frame_idx = self.frame_idx.wrapping_add(1);
    }
}

impl Default for WhiteEngine {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultranode_hal::sim::strip::MemWhitePwm;

    #[test]
    fn default_brightness_is_zero_so_new_channels_stay_dark() {
        let mut engine = WhiteEngine::new();
        engine.install(0, Box::new(MemWhitePwm::default()));
        engine.render_frame(60);
        assert_eq!(engine.slot(0).unwrap().state().last_color, Some([0, 0, 0]));
    }

    #[test]
    fn swell_effect_reaches_full_scale_once_brightness_is_set() {
        let mut engine = WhiteEngine::new();
        engine.install(0, Box::new(MemWhitePwm::default()));
        let slot = engine.slot_mut(0).unwrap();
        assert!(slot.set_effect("swell"));
        slot.apply_parameters(vec![ParamValue::Number(10.0)]);
        slot.set_brightness(255);
        for f in 0..2000 {
            engine.render_frame(1000);
            let _ = f;
        }
        assert_eq!(engine.slot(0).unwrap().state().last_color, Some([255, 255, 255]));
    }
}
