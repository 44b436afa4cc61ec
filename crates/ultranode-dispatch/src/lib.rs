//! Command dispatcher and status snapshot emitter (§4.5). Receives
//! `(topic, payload)` pairs the runtime pulls off the MQTT event channel,
//! parses and routes them against the four engines, publishes acks and
//! snapshots through a `publish` closure wired to `MqttSupervisor::publish`,
//! and hands accepted payloads to the persistence pipeline. Also owns the
//! dim-on-disconnect/restore-on-reconnect bookkeeping §4.10 describes.

pub mod dim;
pub mod error;

use dim::DimState;
use error::DispatchError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use ultranode_connectivity::MqttLifecycleEvent;
use ultranode_engines::{AnalogEngine, AnalogSlot, RelayEngine, RelaySlot, SlotState, WhiteEngine, WhiteSlot, WsEngine, WsSlot};
use ultranode_hal::OtaPort;
use ultranode_motion::FadeController;
use ultranode_persistence::PersistencePipeline;
use ultranode_proto::{
    ack_invalid_effect, ack_ok, ack_status_ok, build_snapshot, motion_status, motion_status_topic,
    parse_command_topic, parse_motion_off, parse_set_command, status_topic, CommandPath, OutputClass, ParamValue,
    SetCommand, SlotId, SlotSnapshot,
};

type PublishFn = dyn Fn(&str, Vec<u8>) + Send + Sync;

/// The four engine handles a node wires up, shared with the runtime's
/// per-class render loops. Grouped here so `Dispatch::new`'s signature
/// doesn't grow a parameter every time a class is added.
pub struct EngineHandles {
    pub ws: Arc<Mutex<WsEngine>>,
    pub rgb: Arc<Mutex<AnalogEngine>>,
    pub white: Arc<Mutex<WhiteEngine>>,
    pub relay: Arc<Mutex<RelayEngine>>,
}

/// Implemented by the three time-varying engines' slot types — identical
/// method shapes, different concrete structs — so `apply_set` has one body
/// instead of three copies. Relay has no time-varying render loop and no
/// `brightness`/`params` concept (SPEC_FULL.md C.1), so it is handled
/// separately rather than forced into this trait.
trait SetTarget {
    fn try_set_effect(&mut self, name: &str) -> bool;
    fn apply_parameters(&mut self, params: Vec<ParamValue>);
    fn set_brightness(&mut self, brightness: u8);
    fn state(&self) -> &SlotState;
}

impl SetTarget for WsSlot {
    fn try_set_effect(&mut self, name: &str) -> bool { self.set_effect(name) }
    fn apply_parameters(&mut self, params: Vec<ParamValue>) { WsSlot::apply_parameters(self, params) }
    fn set_brightness(&mut self, brightness: u8) { WsSlot::set_brightness(self, brightness) }
    fn state(&self) -> &SlotState { WsSlot::state(self) }
}

impl SetTarget for AnalogSlot {
    fn try_set_effect(&mut self, name: &str) -> bool { self.set_effect(name) }
    fn apply_parameters(&mut self, params: Vec<ParamValue>) { AnalogSlot::apply_parameters(self, params) }
    fn set_brightness(&mut self, brightness: u8) { AnalogSlot::set_brightness(self, brightness) }
    fn state(&self) -> &SlotState { AnalogSlot::state(self) }
}

impl SetTarget for WhiteSlot {
    fn try_set_effect(&mut self, name: &str) -> bool { self.set_effect(name) }
    fn apply_parameters(&mut self, params: Vec<ParamValue>) { WhiteSlot::apply_parameters(self, params) }
    fn set_brightness(&mut self, brightness: u8) { WhiteSlot::set_brightness(self, brightness) }
    fn state(&self) -> &SlotState { WhiteSlot::state(self) }
}

type AckFields = (String, u8, Vec<ParamValue>);

/// §4.5 step 5: resolve `effect` if given (failure aborts before any other
/// field is touched), apply `params` if given, clamp and apply `brightness`
/// if given.
fn apply_set<T: SetTarget>(slot: &mut T, cmd: &SetCommand) -> Result<AckFields, DispatchError> {
    if let Some(name) = &cmd.effect {
        if !slot.try_set_effect(name) {
            return Err(DispatchError::UnknownEffect);
        }
    }
    if !cmd.params.is_empty() {
        slot.apply_parameters(cmd.params.clone());
    }
    if let Some(b) = cmd.brightness {
        slot.set_brightness(clamp_brightness(b));
    }
    let state = slot.state();
    Ok((state.effect_name.clone(), state.brightness, state.params.clone()))
}

/// Relay has no `params`/`brightness` of its own — `effect` (`on`/`off`)
/// is the whole command, and `RelaySlot::set_effect` already coerces
/// brightness to 0/255 as it writes through.
fn apply_relay_set(slot: &mut RelaySlot, cmd: &SetCommand) -> Result<AckFields, DispatchError> {
    if let Some(name) = &cmd.effect {
        if !slot.set_effect(name) {
            return Err(DispatchError::UnknownEffect);
        }
    }
    let state = slot.state();
    Ok((state.effect_name.clone(), state.brightness, state.params.clone()))
}

fn clamp_brightness(b: i64) -> u8 { b.clamp(0, 255) as u8 }

fn apply_brightness(engines: &EngineHandles, slot: SlotId, brightness: u8) {
    match slot.class {
        OutputClass::Ws => {
            if let Some(s) = engines.ws.lock().slot_mut(slot.index) {
                s.set_brightness(brightness);
            }
        }
        OutputClass::Rgb => {
            if let Some(s) = engines.rgb.lock().slot_mut(slot.index) {
                s.set_brightness(brightness);
            }
        }
        OutputClass::White => {
            if let Some(s) = engines.white.lock().slot_mut(slot.index) {
                s.set_brightness(brightness);
            }
        }
        OutputClass::Relay => {}
    }
}

/// Owns no transport — `publish` is wired by the runtime to
/// `MqttSupervisor::publish`, and `handle_message`/`on_mqtt_event` are
/// called by the runtime's MQTT event loop.
pub struct Dispatch {
    node: String,
    pir_enabled: bool,
    boot: Instant,
    ws_frame_rate_hz: u32,
    analog_frame_rate_hz: u32,
    engines: EngineHandles,
    persistence: Arc<PersistencePipeline>,
    fade: FadeController,
    ota: Mutex<Box<dyn OtaPort>>,
    publish: Arc<PublishFn>,
    dim: Mutex<DimState>,
    mqtt_ready: AtomicBool,
}

impl Dispatch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: impl Into<String>,
        pir_enabled: bool,
        ws_frame_rate_hz: u32,
        analog_frame_rate_hz: u32,
        engines: EngineHandles,
        persistence: Arc<PersistencePipeline>,
        ota: Box<dyn OtaPort>,
        publish: impl Fn(&str, Vec<u8>) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let node = node.into();
        let publish: Arc<PublishFn> = Arc::new(publish);

        let fade = {
            let engines = EngineHandles {
                ws: engines.ws.clone(),
                rgb: engines.rgb.clone(),
                white: engines.white.clone(),
                relay: engines.relay.clone(),
            };
            FadeController::new(move |updates| {
                for (slot, brightness) in updates {
                    apply_brightness(&engines, *slot, *brightness);
                }
            })
        };

        Arc::new(Self {
            node,
            pir_enabled,
            boot: Instant::now(),
            ws_frame_rate_hz,
            analog_frame_rate_hz,
            engines,
            persistence,
            fade,
            ota: Mutex::new(ota),
            publish,
            dim: Mutex::new(DimState::default()),
            mqtt_ready: AtomicBool::new(false),
        })
    }

    /// Whether MQTT is currently believed connected, per the last
    /// [`MqttLifecycleEvent`] observed. Exposed for diagnostics; dispatch
    /// itself never gates `handle_message` on this — a disconnected broker
    /// simply never delivers the message in the first place.
    pub fn mqtt_ready(&self) -> bool { self.mqtt_ready.load(Ordering::SeqCst) }

    /// Entry point for every inbound MQTT message. §7's policy for this
    /// subsystem is "drop silently or publish error ack; never crash" — so
    /// every rejection here is a log line, not a panic or propagated error.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.try_handle(topic, payload) {
            log::debug!("dispatch: dropping {topic}: {e}");
        }
    }

    fn try_handle(&self, topic: &str, payload: &[u8]) -> Result<(), DispatchError> {
        let parsed = parse_command_topic(topic, &self.node)?;
        match parsed.path {
            CommandPath::Set { class, index } => self.handle_set(class, index, payload),
            CommandPath::Status => {
                self.publish_snapshot();
                Ok(())
            }
            CommandPath::OtaCheck => {
                self.handle_ota_check();
                Ok(())
            }
            CommandPath::MotionOn => {
                self.fade.cancel();
                Ok(())
            }
            CommandPath::MotionOff => self.handle_motion_off(payload),
            CommandPath::MotionStatus => {
                self.publish_json(&motion_status_topic(&self.node), motion_status(self.pir_enabled));
                Ok(())
            }
        }
    }

    fn handle_set(&self, class: OutputClass, path_index: Option<u8>, payload: &[u8]) -> Result<(), DispatchError> {
        let cmd = parse_set_command(class, payload, path_index)?;
        let index = cmd.index.ok_or(DispatchError::MissingIndex)?;
        let slot_id = SlotId::new(class, index);
        if !slot_id.in_bounds() {
            return Err(DispatchError::SlotOutOfRange);
        }

        // §4.7's race note: arm the fade cancellation before the command's
        // state change lands, so a tick firing mid-handler sees active=false.
        // Only reached once the command is known parseable and in range —
        // a rejected command must never mutate fade state either (§8).
        self.fade.cancel();

        let outcome = match class {
            OutputClass::Ws => {
                let mut engine = self.engines.ws.lock();
                let slot = engine.slot_mut(index).ok_or(DispatchError::SlotOutOfRange)?;
                apply_set(slot, &cmd)
            }
            OutputClass::Rgb => {
                let mut engine = self.engines.rgb.lock();
                let slot = engine.slot_mut(index).ok_or(DispatchError::SlotOutOfRange)?;
                apply_set(slot, &cmd)
            }
            OutputClass::White => {
                let mut engine = self.engines.white.lock();
                let slot = engine.slot_mut(index).ok_or(DispatchError::SlotOutOfRange)?;
                apply_set(slot, &cmd)
            }
            OutputClass::Relay => {
                let mut engine = self.engines.relay.lock();
                let slot = engine.slot_mut(index).ok_or(DispatchError::SlotOutOfRange)?;
                apply_relay_set(slot, &cmd)
            }
        };

        match outcome {
            Ok((effect, brightness, params)) => {
                self.publish_json(&status_topic(&self.node), ack_ok(class, index, &effect, &params, brightness));
                if let Err(e) = self.persistence.record(slot_id, payload.to_vec()) {
                    log::warn!("dispatch: persistence record failed for {slot_id}: {e}");
                }
                Ok(())
            }
            Err(DispatchError::UnknownEffect) => {
                self.publish_json(&status_topic(&self.node), ack_invalid_effect());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Replay a payload previously accepted and durably stored for `slot`
    /// (§3's persistence invariant: replay reproduces effect + parameters +
    /// brightness). Applies directly to the slot's engine state without
    /// publishing an ack or re-arming the persistence pipeline — the
    /// runtime calls this once per recovered slot during boot, before MQTT
    /// subscribes and before any render task starts reading engine state.
    pub fn restore_from_persistence(&self, slot: SlotId, payload: &[u8]) {
        let cmd = match parse_set_command(slot.class, payload, Some(slot.index)) {
            Ok(cmd) => cmd,
            Err(e) => {
                log::warn!("dispatch: failed to parse persisted payload for {slot}: {e}");
                return;
            }
        };
        let outcome = match slot.class {
            OutputClass::Ws => self.engines.ws.lock().slot_mut(slot.index).map(|s| apply_set(s, &cmd)),
            OutputClass::Rgb => self.engines.rgb.lock().slot_mut(slot.index).map(|s| apply_set(s, &cmd)),
            OutputClass::White => self.engines.white.lock().slot_mut(slot.index).map(|s| apply_set(s, &cmd)),
            OutputClass::Relay => self.engines.relay.lock().slot_mut(slot.index).map(|s| apply_relay_set(s, &cmd)),
        };
        match outcome {
            Some(Err(e)) => log::warn!("dispatch: failed to apply persisted payload for {slot}: {e}"),
            Some(Ok(_)) => {}
            None => log::warn!("dispatch: persisted payload for {slot} has no matching installed slot"),
        }
    }

    fn handle_ota_check(&self) {
        self.publish_json(&status_topic(&self.node), ack_status_ok());
        if let Err(e) = self.ota.lock().check(false) {
            log::warn!("dispatch: ota check failed: {e}");
        }
        self.publish_snapshot();
    }

    fn handle_motion_off(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let cmd = parse_motion_off(payload)?;
        let slots = self.enabled_slot_brightness();
        let duration_ms = cmd.fade.as_ref().and_then(|f| f.duration_ms);
        let steps = cmd.fade.as_ref().and_then(|f| f.steps);
        self.fade.start(duration_ms, steps, &slots);
        Ok(())
    }

    /// Every enabled ws/rgb/white slot's current brightness. Relay is
    /// excluded — it has no time-varying brightness for a fade (or a dim) to
    /// ramp.
    fn enabled_slot_brightness(&self) -> Vec<(SlotId, u8)> {
        let mut out = Vec::new();
        {
            let engine = self.engines.ws.lock();
            out.extend(engine.enabled_indices().filter_map(|i| {
                Some((SlotId::new(OutputClass::Ws, i), engine.slot(i)?.state().brightness))
            }));
        }
        {
            let engine = self.engines.rgb.lock();
            out.extend(engine.enabled_indices().filter_map(|i| {
                Some((SlotId::new(OutputClass::Rgb, i), engine.slot(i)?.state().brightness))
            }));
        }
        {
            let engine = self.engines.white.lock();
            out.extend(engine.enabled_indices().filter_map(|i| {
                Some((SlotId::new(OutputClass::White, i), engine.slot(i)?.state().brightness))
            }));
        }
        out
    }

    /// §4.10's CONNECTED/DISCONNECTED dim-and-restore behavior. `HealthChanged`
    /// carries no dispatch-relevant action of its own.
    pub fn on_mqtt_event(&self, event: MqttLifecycleEvent) {
        match event {
            MqttLifecycleEvent::Connected => {
                self.mqtt_ready.store(true, Ordering::SeqCst);
                if let Some(slots) = self.dim.lock().take() {
                    for (slot, brightness) in slots {
                        apply_brightness(&self.engines, slot, brightness);
                    }
                }
            }
            MqttLifecycleEvent::Disconnected => {
                self.mqtt_ready.store(false, Ordering::SeqCst);
                let slots = self.enabled_slot_brightness();
                if self.dim.lock().begin(slots.clone()) {
                    for (slot, _) in slots {
                        apply_brightness(&self.engines, slot, 0);
                    }
                }
            }
            MqttLifecycleEvent::HealthChanged(_) => {}
            MqttLifecycleEvent::Message { topic, payload } => self.handle_message(&topic, &payload),
        }
    }

    fn publish_json(&self, topic: &str, value: serde_json::Value) {
        // Every value passed here is built by this crate from plain,
        // already-valid data (Strings, numbers, Vecs) — serialization cannot
        // fail.
        let bytes = serde_json::to_vec(&value).expect("snapshot/ack values always serialize");
        (self.publish)(topic, bytes);
    }

    fn publish_snapshot(&self) {
        let uptime_s = self.boot.elapsed().as_secs();
        let snapshot = build_snapshot(
            &self.node,
            self.pir_enabled,
            uptime_s,
            &self.ws_snapshot(),
            &self.rgb_snapshot(),
            &self.white_snapshot(),
            &self.relay_snapshot(),
        );
        self.publish_json(&status_topic(&self.node), snapshot);
    }

    fn ws_snapshot(&self) -> Vec<SlotSnapshot> {
        let engine = self.engines.ws.lock();
        engine
            .enabled_indices()
            .filter_map(|i| {
                let slot = engine.slot(i)?;
                let state = slot.state();
                Some(SlotSnapshot {
                    index: i,
                    effect: state.effect_name.clone(),
                    brightness: state.brightness,
                    params: state.params.clone(),
                    pixel_count: Some(slot.pixel_count() as u32),
                    frame_rate_hz: Some(self.ws_frame_rate_hz),
                    color: state.last_color,
                })
            })
            .collect()
    }

    fn rgb_snapshot(&self) -> Vec<SlotSnapshot> {
        let engine = self.engines.rgb.lock();
        engine
            .enabled_indices()
            .filter_map(|i| {
                let state = engine.slot(i)?.state();
                Some(SlotSnapshot {
                    index: i,
                    effect: state.effect_name.clone(),
                    brightness: state.brightness,
                    params: state.params.clone(),
                    pixel_count: None,
                    frame_rate_hz: Some(self.analog_frame_rate_hz),
                    color: state.last_color,
                })
            })
            .collect()
    }

    fn white_snapshot(&self) -> Vec<SlotSnapshot> {
        let engine = self.engines.white.lock();
        engine
            .enabled_indices()
            .filter_map(|i| {
                let state = engine.slot(i)?.state();
                Some(SlotSnapshot {
                    index: i,
                    effect: state.effect_name.clone(),
                    brightness: state.brightness,
                    params: state.params.clone(),
                    pixel_count: None,
                    frame_rate_hz: Some(self.analog_frame_rate_hz),
                    color: state.last_color,
                })
            })
            .collect()
    }

    fn relay_snapshot(&self) -> Vec<SlotSnapshot> {
        let engine = self.engines.relay.lock();
        engine
            .enabled_indices()
            .filter_map(|i| {
                let state = engine.slot(i)?.state();
                Some(SlotSnapshot {
                    index: i,
                    effect: state.effect_name.clone(),
                    brightness: state.brightness,
                    params: state.params.clone(),
                    pixel_count: None,
                    frame_rate_hz: None,
                    color: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use ultranode_hal::sim::ota::SimOta;
    use ultranode_hal::sim::strip::{MemAnalogPwm, MemRelay, MemStripDriver, MemWhitePwm};
    use ultranode_persistence::PersistencePipeline;

    fn engines_with_one_slot_each() -> EngineHandles {
        let mut ws = WsEngine::new();
        ws.install(0, Box::new(MemStripDriver::new(4)));
        let mut rgb = AnalogEngine::new();
        rgb.install(0, Box::new(MemAnalogPwm::default()));
        let mut white = WhiteEngine::new();
        white.install(0, Box::new(MemWhitePwm::default()));
        let mut relay = RelayEngine::new();
        relay.install(0, Box::new(MemRelay::default()));
        EngineHandles {
            ws: Arc::new(Mutex::new(ws)),
            rgb: Arc::new(Mutex::new(rgb)),
            white: Arc::new(Mutex::new(white)),
            relay: Arc::new(Mutex::new(relay)),
        }
    }

    fn test_dispatch() -> (Arc<Dispatch>, mpsc::Receiver<(String, Vec<u8>)>) {
        let (tx, rx) = mpsc::channel();
        let persistence = Arc::new(PersistencePipeline::new(Box::new(
            ultranode_hal::sim::kv_store::MemKvStore::default(),
        )));
        let dispatch = Dispatch::new(
            "node1",
            false,
            60,
            200,
            engines_with_one_slot_each(),
            persistence,
            Box::new(SimOta::default()),
            move |topic, payload| {
                let _ = tx.send((topic.to_string(), payload));
            },
        );
        (dispatch, rx)
    }

    fn last_json(rx: &mpsc::Receiver<(String, Vec<u8>)>) -> serde_json::Value {
        let (_, payload) = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        serde_json::from_slice(&payload).unwrap()
    }

    #[test]
    fn ws_set_applies_and_acks_without_brightness_field() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message(
            "ul/node1/cmd/ws/set/0",
            br#"{"effect":"solid","brightness":200,"params":[10,20,30]}"#,
        );
        let ack = last_json(&rx);
        assert_eq!(ack["status"], "ok");
        assert_eq!(ack["effect"], "solid");
        assert_eq!(ack["strip"], 0);
        assert!(ack.get("brightness").is_none());
    }

    #[test]
    fn white_set_includes_brightness_and_channel_key() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":128}"#);
        let ack = last_json(&rx);
        assert_eq!(ack["channel"], 0);
        assert_eq!(ack["brightness"], 128);
    }

    #[test]
    fn unknown_effect_acks_error_and_does_not_persist() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/ws/set/0", br#"{"effect":"not-a-real-effect"}"#);
        let ack = last_json(&rx);
        assert_eq!(ack["status"], "error");
        assert_eq!(ack["error"], "invalid effect");
    }

    #[test]
    fn out_of_range_index_is_silently_dropped() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/ws/set/5", br#"{"effect":"solid"}"#);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn foreign_node_is_silently_dropped() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/other/cmd/ws/set/0", br#"{"effect":"solid"}"#);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_json_publishes_nothing() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/ws/set/0", b"{not json");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_json_does_not_cancel_an_active_fade() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":200}"#);
        let _ = last_json(&rx);
        dispatch.handle_message("ul/node1/cmd/motion/off", br#"{"fade":{"duration_ms":5000,"steps":255}}"#);
        assert!(dispatch.fade.is_active());

        dispatch.handle_message("ul/node1/cmd/ws/set/0", b"{not json");
        assert!(dispatch.fade.is_active());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn out_of_range_index_does_not_cancel_an_active_fade() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":200}"#);
        let _ = last_json(&rx);
        dispatch.handle_message("ul/node1/cmd/motion/off", br#"{"fade":{"duration_ms":5000,"steps":255}}"#);
        assert!(dispatch.fade.is_active());

        dispatch.handle_message("ul/node1/cmd/ws/set/5", br#"{"effect":"solid"}"#);
        assert!(dispatch.fade.is_active());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn status_topic_publishes_a_full_snapshot() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/ws/set/0", br#"{"effect":"solid","brightness":50}"#);
        let _ = last_json(&rx); // the set's own ack
        dispatch.handle_message("ul/node1/cmd/status", b"{}");
        let snapshot = last_json(&rx);
        assert_eq!(snapshot["event"], "snapshot");
        assert_eq!(snapshot["ws"][0]["brightness"], 50);
    }

    #[test]
    fn relay_set_coerces_brightness_and_has_no_params_field() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/relay/set/0", br#"{"effect":"on"}"#);
        let ack = last_json(&rx);
        assert_eq!(ack["effect"], "on");
        assert_eq!(ack["brightness"], 255);
    }

    #[test]
    fn motion_off_starts_a_fade_over_enabled_slots() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":80}"#);
        let _ = last_json(&rx);
        dispatch.handle_message("ul/node1/cmd/motion/off", br#"{"fade":{"duration_ms":20,"steps":4}}"#);
        assert!(dispatch.fade.is_active());
    }

    #[test]
    fn destructive_set_cancels_an_active_fade() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":200}"#);
        let _ = last_json(&rx);
        dispatch.handle_message("ul/node1/cmd/motion/off", br#"{"fade":{"duration_ms":5000,"steps":255}}"#);
        assert!(dispatch.fade.is_active());
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":255}"#);
        assert!(!dispatch.fade.is_active());
    }

    #[test]
    fn motion_status_reports_pir_enabled_flag() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/motion/status", b"{}");
        let v = last_json(&rx);
        assert_eq!(v["pir_enabled"], false);
    }

    #[test]
    fn disconnect_dims_lights_and_reconnect_restores_them() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":200}"#);
        let _ = last_json(&rx);

        dispatch.on_mqtt_event(MqttLifecycleEvent::Disconnected);
        assert_eq!(dispatch.engines.white.lock().slot(0).unwrap().state().brightness, 0);

        dispatch.on_mqtt_event(MqttLifecycleEvent::Connected);
        assert_eq!(dispatch.engines.white.lock().slot(0).unwrap().state().brightness, 200);
    }

    #[test]
    fn repeated_disconnect_does_not_clobber_the_remembered_brightness() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/white/set/0", br#"{"effect":"solid","brightness":200}"#);
        let _ = last_json(&rx);

        dispatch.on_mqtt_event(MqttLifecycleEvent::Disconnected);
        dispatch.on_mqtt_event(MqttLifecycleEvent::Disconnected);
        dispatch.on_mqtt_event(MqttLifecycleEvent::Connected);
        assert_eq!(dispatch.engines.white.lock().slot(0).unwrap().state().brightness, 200);
    }

    #[test]
    fn restoring_a_persisted_payload_applies_state_without_publishing_or_repersisting() {
        let (dispatch, rx) = test_dispatch();
        let slot = SlotId::new(OutputClass::White, 0);
        dispatch.restore_from_persistence(slot, br#"{"effect":"solid","brightness":90}"#);
        assert!(rx.try_recv().is_err());
        assert!(!dispatch.persistence.is_dirty(slot));
        assert_eq!(dispatch.engines.white.lock().slot(0).unwrap().state().brightness, 90);
    }

    #[test]
    fn ota_check_acks_then_invokes_the_collaborator_then_publishes_a_snapshot() {
        let (dispatch, rx) = test_dispatch();
        dispatch.handle_message("ul/node1/cmd/ota/check", b"{}");
        let ack = last_json(&rx);
        assert_eq!(ack["status"], "ok");
        let snapshot = last_json(&rx);
        assert_eq!(snapshot["event"], "snapshot");
    }
}
