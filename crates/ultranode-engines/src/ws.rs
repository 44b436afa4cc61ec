use crate::slot_state::SlotState;
use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;
use ultranode_effects::{default_ws_effect_name, gamma8, make_ws_effect, RenderCtx, WsEffect};
use ultranode_hal::StripDriver;
use ultranode_proto::ParamValue;

/// One addressable strip: effect + latched state, plus the decoupled
/// producer/refresher split from §4.2 — `render` (the producer) only ever
/// computes a frame and hands it to a dedicated commit thread (the
/// refresher) over a depth-1 channel, so a slow serial transport never
/// blocks the next slot's render.
pub struct WsSlot {
    effect: Box<dyn WsEffect>,
    state: SlotState,
    pixel_count: usize,
    frame_tx: Option<Sender<Vec<[u8; 3]>>>,
    commit_thread: Option<JoinHandle<()>>,
}

impl WsSlot {
    pub fn new(index: u8, mut driver: Box<dyn StripDriver>) -> Self {
        let pixel_count = driver.pixel_count();
        let (tx, rx) = bounded::<Vec<[u8; 3]>>(1);
        let commit_thread = std::thread::Builder::new()
            .name(format!("ws-commit-{index}"))
            .spawn(move || {
                while let Ok(frame) = rx.recv() {
                    if let Err(e) = driver.write(&frame) {
                        log::warn!("ws strip {index} commit failed: {e}");
                    }
                }
            })
            .expect("spawn ws commit thread");
        let default_name = default_ws_effect_name();
        let mut effect = make_ws_effect(default_name).expect("default ws effect is registered");
        effect.init();
        Self {
            effect,
            state: SlotState::new(default_name),
            pixel_count,
            frame_tx: Some(tx),
            commit_thread: Some(commit_thread),
        }
    }

    pub fn pixel_count(&self) -> usize { self.pixel_count }

    pub fn set_effect(&mut self, name: &str) -> bool {
        match make_ws_effect(name) {
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

    /// Render one frame and hand it to the commit thread. Applies gamma then
    /// the linear brightness scale, in that order, per §4.2.
    pub fn render(&mut self, ctx: &RenderCtx, scratch: &mut Vec<[u8; 3]>) {
        self.effect.render(ctx, self.pixel_count, scratch);
        let brightness = self.state.brightness as u16;
        for px in scratch.iter_mut() {
            for c in px.iter_mut() {
                *c = ((gamma8(*c) as u16 * brightness) / 255) as u8;
            }
        }
        self.state.last_color = scratch.first().copied();
        if let Some(tx) = &self.frame_tx {
            let _ = tx.try_send(scratch.clone());
        }
    }
}

impl Drop for WsSlot {
    fn drop(&mut self) {
        self.frame_tx.take();
        if let Some(handle) = self.commit_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Drives up to two WS strips at a shared configured frame rate (§4.2).
pub struct WsEngine {
    frame_idx: u64,
    slots: [Option<WsSlot>; 2],
}

impl WsEngine {
    pub fn new() -> Self { Self { frame_idx: 0, slots: [None, None] } }

    pub fn install(&mut self, index: u8, driver: Box<dyn StripDriver>) {
        if (index as usize) < self.slots.len() {
            self.slots[index as usize] = Some(WsSlot::new(index, driver));
        }
    }

    pub fn slot_mut(&mut self, index: u8) -> Option<&mut WsSlot> { self.slots.get_mut(index as usize)?.as_mut() }

    pub fn slot(&self, index: u8) -> Option<&WsSlot> { self.slots.get(index as usize)?.as_ref() }

    pub fn enabled_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.is_some().then_some(i as u8))
    }

    /// The producer pass: render every enabled strip for this frame.
    pub fn render_frame(&mut self, frame_rate_hz: u32) {
        let ctx = RenderCtx { frame_idx: self.frame_idx, frame_rate_hz };
        let mut scratch = Vec::new();
        for slot in self.slots.iter_mut().flatten() {
            slot.render(&ctx, &mut scratch);
        }
        self.frame_idx = self.frame_idx.wrapping_add(1);
    }
}

impl Default for WsEngine {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultranode_hal::sim::strip::MemStripDriver;

    #[test]
    fn render_frame_drives_only_enabled_slots() {
        let mut engine = WsEngine::new();
        engine.install(0, Box::new(MemStripDriver::new(4)));
        assert_eq!(engine.enabled_indices().collect::<Vec<_>>(), vec![0]);
        engine.render_frame(60);
        let slot = engine.slot(0).unwrap();
        assert_eq!(slot.state().last_color, Some([0, 0, 0]));
    }

    #[test]
    fn brightness_scale_applies_after_gamma() {
        let mut engine = WsEngine::new();
        engine.install(0, Box::new(MemStripDriver::new(1)));
        let slot = engine.slot_mut(0).unwrap();
        slot.apply_parameters(vec![ParamValue::Text("#ffffff".into())]);
        slot.set_brightness(128);
        engine.render_frame(60);
        let color = engine.slot(0).unwrap().state().last_color.unwrap();
        assert_eq!(color[0], ((gamma8(255) as u16 * 128) / 255) as u8);
    }

    #[test]
    fn unknown_effect_name_does_not_replace_the_current_effect() {
        let mut engine = WsEngine::new();
        engine.install(0, Box::new(MemStripDriver::new(1)));
        let slot = engine.slot_mut(0).unwrap();
        assert!(!slot.set_effect("not-a-real-effect"));
        assert_eq!(slot.state().effect_name, "solid");
    }
}
