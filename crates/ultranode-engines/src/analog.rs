use crate::slot_state::SlotState;
use ultranode_effects::{default_analog_effect_name, gamma8, make_analog_effect, AnalogEffect, RenderCtx};
use ultranode_hal::AnalogPwmDriver;
use ultranode_proto::ParamValue;

const DUTY_MAX: u16 = 4095;

fn to_12bit(v: u8) -> u16 { (v as u32 * DUTY_MAX as u32 / 255) as u16 }

/// One analog RGB strip: three PWM channels updated within the same tick
/// (§4.3's "no mid-color tearing, best effort" ordering guarantee).
pub struct AnalogSlot {
    effect: Box<dyn AnalogEffect>,
    state: SlotState,
    driver: Box<dyn AnalogPwmDriver>,
}

impl AnalogSlot {
    pub fn new(driver: Box<dyn AnalogPwmDriver>) -> Self {
        let default_name = default_analog_effect_name();
        let mut effect = make_analog_effect(default_name).expect("default analog effect is registered");
        effect.init();
        Self { effect, state: SlotState::new(default_name), driver }
    }

    pub fn set_effect(&mut self, name: &str) -> bool {
        match make_analog_effect(name) {
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
        let [r, g, b] = self.effect.render(ctx);
        let brightness = self.state.brightness as u16;
        let scale = |v: u8| ((gamma8(v) as u16 * brightness) / 255) as u8;
        let (r, g, b) = (scale(r), scale(g), scale(b));
        self.state.last_color = Some([r, g, b]);
        if let Err(e) = self.driver.write(to_12bit(r), to_12bit(g), to_12bit(b)) {
            log::warn!("analog strip write failed: {e}");
        }
    }
}

pub struct AnalogEngine {
    frame_idx: u64,
    slots: [Option<AnalogSlot>; 4],
}

impl AnalogEngine {
    pub fn new() -> Self { Self { frame_idx: 0, slots: [None, None, None, None] } }

    pub fn install(&mut self, index: u8, driver: Box<dyn AnalogPwmDriver>) {
        if (index as usize) < self.slots.len() {
            self.slots[index as usize] = Some(AnalogSlot::new(driver));
        }
    }

    pub fn slot_mut(&mut self, index: u8) -> Option<&mut AnalogSlot> { self.slots.get_mut(index as usize)?.as_mut() }

    pub fn slot(&self, index: u8) -> Option<&AnalogSlot> { self.slots.get(index as usize)?.as_ref() }

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

impl Default for AnalogEngine {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultranode_hal::sim::strip::MemAnalogPwm;

    #[test]
    fn render_frame_updates_all_three_channels_together() {
        let mut engine = AnalogEngine::new();
        engine.install(0, Box::new(MemAnalogPwm::default()));
        let slot = engine.slot_mut(0).unwrap();
        slot.apply_parameters(vec![ParamValue::Number(255.0), ParamValue::Number(0.0), ParamValue::Number(0.0)]);
        slot.set_brightness(255);
        engine.render_frame(200);
        let color = engine.slot(0).unwrap().state().last_color.unwrap();
        assert_eq!(color, [gamma8(255), 0, 0]);
    }
}
