use crate::slot_state::SlotState;
use ultranode_effects::{default_relay_effect_name, make_relay_effect, RelayEffect, RenderCtx};
use ultranode_hal::RelayDriver;

/// A relay slot has no periodic render loop — it has no time-varying
/// effect to animate, so the only output transition happens synchronously
/// when a command is applied (SPEC_FULL.md C.1).
pub struct RelaySlot {
    effect: Box<dyn RelayEffect>,
    state: SlotState,
    driver: Box<dyn RelayDriver>,
}

impl RelaySlot {
    pub fn new(driver: Box<dyn RelayDriver>) -> Self {
        let default_name = default_relay_effect_name();
        let mut effect = make_relay_effect(default_name).expect("default relay effect is registered");
        effect.init();
        Self { effect, state: SlotState::new(default_name), driver }
    }

    pub fn state(&self) -> &SlotState { &self.state }

    /// Apply a command: `on`/`off` coerces brightness to 255/0 and writes
    /// the relay immediately.
    pub fn set_effect(&mut self, name: &str) -> bool {
        let Some(mut effect) = make_relay_effect(name) else { return false };
        effect.init();
        let on = effect.render(&RenderCtx { frame_idx: 0, frame_rate_hz: 1 });
        self.effect = effect;
        self.state.set_effect(name);
        self.state.brightness = if on { 255 } else { 0 };
        if let Err(e) = self.driver.write(on) {
            log::warn!("relay write failed: {e}");
        }
        true
    }
}

pub struct RelayEngine {
    slots: [Option<RelaySlot>; 4],
}

impl RelayEngine {
    pub fn new() -> Self { Self { slots: [None, None, None, None] } }

    pub fn install(&mut self, index: u8, driver: Box<dyn RelayDriver>) {
        if (index as usize) < self.slots.len() {
            self.slots[index as usize] = Some(RelaySlot::new(driver));
        }
    }

    pub fn slot_mut(&mut self, index: u8) -> Option<&mut RelaySlot> { self.slots.get_mut(index as usize)?.as_mut() }

    pub fn slot(&self, index: u8) -> Option<&RelaySlot> { self.slots.get(index as usize)?.as_ref() }

    pub fn enabled_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.is_some().then_some(i as u8))
    }
}

impl Default for RelayEngine {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultranode_hal::sim::strip::MemRelay;

    #[test]
    fn on_and_off_coerce_brightness_and_write_through() {
        let mut engine = RelayEngine::new();
        engine.install(0, Box::new(MemRelay::default()));
        let slot = engine.slot_mut(0).unwrap();
        assert!(slot.set_effect("on"));
        assert_eq!(slot.state().brightness, 255);
        assert!(slot.set_effect("off"));
        assert_eq!(slot.state().brightness, 0);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let mut engine = RelayEngine::new();
        engine.install(0, Box::new(MemRelay::default()));
        assert!(!engine.slot_mut(0).unwrap().set_effect("strobe"));
    }
}
