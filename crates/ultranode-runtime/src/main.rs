//! UltraNode firmware entry point.
//!
//! Constructs every singleton in the order §3's Lifecycle names (storage →
//! task scaffolding → persistence → engines → supervisor → MQTT) and wires
//! them together. Everything past construction is event-driven: MQTT
//! deliveries reach [`ultranode_dispatch::Dispatch`] through
//! [`ultranode_connectivity::MqttSupervisor`]'s lifecycle callback, engine
//! render loops free-run at their configured rate, and the health monitor
//! and connectivity supervisors drive recovery/reboot on their own threads.
//! `main` itself does nothing after boot but block.

mod heap;
mod tasks;

#[cfg(target_os = "espidf")]
mod pins;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ultranode_connectivity::{ConnectivityState, MqttLifecycleEvent, MqttSupervisor, SntpSupervisor, WifiSupervisor};
use ultranode_dispatch::{Dispatch, EngineHandles};
use ultranode_engines::{AnalogEngine, FramePacer, RelayEngine, WhiteEngine, WsEngine};
use ultranode_hal::sim::credentials::SimCredentials;
use ultranode_hal::sim::ota::SimOta;
use ultranode_hal::{Credentials, CredentialsPort, KvStore, MqttClientConfig, OtaPort};
use ultranode_health::{HealthMonitor, HealthThresholds, RecoveryRequest};
use ultranode_persistence::{recover_all, PersistencePipeline};
use ultranode_proto::NodeConfig;

/// Build-time config surface is out of scope (§1); this is just where the
/// runtime looks for it (SPEC_FULL.md B, "Configuration").
const CONFIG_PATH: &str = "config.toml";

/// §4.9 leaves the resync period a "configured interval" without pinning a
/// value; held fixed here rather than added to `NodeConfig`, since the
/// per-node config surface itself is out of scope (§1).
const SNTP_RESYNC_INTERVAL: Duration = Duration::from_secs(3600);

fn init_logger() {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
    }
    #[cfg(not(target_os = "espidf"))]
    {
        env_logger::init();
    }
}

/// Background subsystems `main` owns directly and can stop on the way to a
/// reboot (SPEC_FULL.md C.2). The connectivity supervisors and health
/// monitor's background threads are not included: none of them expose a
/// stop/destroy call beyond `HealthMonitor::request_stop`, so a reboot's
/// real teardown is "stop what we can, then actually reset" rather than a
/// full symmetric unwind of the boot order.
struct Runtime {
    render_stop: Arc<AtomicBool>,
    health: Arc<HealthMonitor>,
}

impl Runtime {
    /// Best-effort reverse-order teardown: stop the render loops this
    /// binary owns, then the health monitor's check loop. Engines,
    /// persistence, and storage need no explicit stop — they hold no
    /// background thread of their own beyond what's already quiesced by the
    /// time render loops exit (the ws per-strip commit threads park on an
    /// empty channel once their producer stops sending).
    fn shutdown(&self, reason: &str) {
        log::warn!("runtime: shutting down ({reason})");
        self.render_stop.store(true, Ordering::SeqCst);
        self.health.request_stop();
        log::warn!(
            "runtime: wifi/mqtt/sntp supervisors have no explicit stop; leaving their daemon threads for process exit to reap"
        );
    }
}

fn reboot(runtime: &Runtime, reason: &str) -> ! {
    runtime.shutdown(reason);
    #[cfg(target_os = "espidf")]
    {
        esp_idf_hal::reset::restart();
    }
    #[cfg(not(target_os = "espidf"))]
    {
        log::error!("ultranode: hosted build has no real reboot; exiting process ({reason})");
        std::process::exit(1);
    }
}

fn mqtt_client_config(config: &NodeConfig, creds: &Credentials) -> MqttClientConfig {
    MqttClientConfig {
        broker_uri: config.mqtt_broker_uri.clone(),
        username: creds.mqtt_user.clone().or_else(|| config.mqtt_username.clone()),
        password: creds.mqtt_password.clone().or_else(|| config.mqtt_password.clone()),
        client_cert: creds.mqtt_client_cert.clone(),
        client_key: creds.mqtt_client_key.clone(),
    }
}

#[cfg(not(target_os = "espidf"))]
fn build_kv_store(_config: &NodeConfig) -> Result<Box<dyn KvStore + Send>> {
    Ok(Box::new(ultranode_hal::sim::kv_store::MemKvStore::new()))
}

#[cfg(target_os = "espidf")]
fn build_kv_store(_config: &NodeConfig) -> Result<Box<dyn KvStore + Send>> {
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use ultranode_hal::espidf::EspidfKvStore;

    let partition = EspDefaultNvsPartition::take().context("taking default NVS partition")?;
    let store = EspidfKvStore::new(partition, "ultranode").context("opening ultranode NVS namespace")?;
    Ok(Box::new(store))
}

#[cfg(not(target_os = "espidf"))]
fn build_engines(config: &NodeConfig) -> Result<EngineHandles> {
    use ultranode_hal::sim::strip::{MemAnalogPwm, MemRelay, MemStripDriver, MemWhitePwm};

    let mut ws = WsEngine::new();
    for (i, strip) in config.ws.iter().enumerate() {
        if strip.enabled {
            ws.install(i as u8, Box::new(MemStripDriver::new(strip.pixel_count as usize)));
        }
    }

    let mut rgb = AnalogEngine::new();
    for (i, enabled) in config.rgb_enabled.iter().enumerate() {
        if *enabled {
            rgb.install(i as u8, Box::new(MemAnalogPwm::default()));
        }
    }

    let mut white = WhiteEngine::new();
    for (i, enabled) in config.white_enabled.iter().enumerate() {
        if *enabled {
            white.install(i as u8, Box::new(MemWhitePwm::default()));
        }
    }

    let mut relay = RelayEngine::new();
    for (i, enabled) in config.relay_enabled.iter().enumerate() {
        if *enabled {
            relay.install(i as u8, Box::new(MemRelay::default()));
        }
    }

    Ok(EngineHandles {
        ws: Arc::new(Mutex::new(ws)),
        rgb: Arc::new(Mutex::new(rgb)),
        white: Arc::new(Mutex::new(white)),
        relay: Arc::new(Mutex::new(relay)),
    })
}

/// PWM channels are a fixed, scarce hardware resource (§5: "LEDC timer 0 is
/// shared across PWM channels") — only the first 8 enabled analog/white
/// slots in class order get a real channel; anything past that is logged
/// and left uninstalled (§7's driver-error policy: "log and mark that
/// channel disabled; remaining channels operate").
#[cfg(target_os = "espidf")]
fn build_engines(config: &NodeConfig, ledc: esp_idf_hal::peripheral::LEDC) -> Result<EngineHandles> {
    use crate::pins;
    use esp_idf_hal::gpio::AnyOutputPin;
    use esp_idf_hal::ledc::config::TimerConfig;
    use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
    use esp_idf_hal::prelude::*;
    use ultranode_hal::espidf::{EspidfAnalogPwm, EspidfRelay, EspidfStripDriver, EspidfWhitePwm};

    let timer_config = TimerConfig::default().frequency(pins::PWM_FREQUENCY_HZ.Hz()).resolution(Resolution::Bits12);
    // Every LEDC channel driver below borrows this timer; it needs to
    // outlive all of them, which in practice means leaking it the same way
    // the hardware singleton it wraps already outlives the whole program.
    let timer: &'static LedcTimerDriver<'static> = Box::leak(Box::new(
        LedcTimerDriver::new(ledc.timer0, &timer_config).context("configuring shared LEDC timer 0")?,
    ));

    let mut ws = WsEngine::new();
    for (i, strip) in config.ws.iter().enumerate() {
        if !strip.enabled {
            continue;
        }
        match EspidfStripDriver::new(pins::WS_RMT_CHANNEL[i], pins::WS_GPIO[i], strip.pixel_count as usize) {
            Ok(driver) => ws.install(i as u8, Box::new(driver)),
            Err(e) => log::error!("ultranode: ws strip {i} driver init failed, leaving disabled: {e}"),
        }
    }

    // Each LEDC channel is its own peripheral-singleton type, so the 8
    // available channels (channel0..channel7 on a typical ESP32) are wired
    // to fixed slots rather than handed out from a runtime pool: rgb0 and
    // rgb1 take three apiece, white0/white1 take the last two. rgb2/rgb3
    // and white2/white3 have no channel left and stay disabled — the same
    // "log and leave the rest running" policy §7 prescribes for driver
    // failures.
    macro_rules! pwm_channel {
        ($channel:expr, $gpio:expr) => {{
            let pin = unsafe { AnyOutputPin::new($gpio) };
            match LedcDriver::new($channel, timer, pin) {
                Ok(d) => Some(d),
                Err(e) => {
                    log::error!("ultranode: ledc channel init failed: {e}");
                    None
                }
            }
        }};
    }

    let mut rgb = AnalogEngine::new();
    if config.rgb_enabled[0] {
        let (r, g, b) = pins::RGB_GPIO[0];
        match (
            pwm_channel!(ledc.channel0, r),
            pwm_channel!(ledc.channel1, g),
            pwm_channel!(ledc.channel2, b),
        ) {
            (Some(r), Some(g), Some(b)) => rgb.install(0, Box::new(EspidfAnalogPwm::new(r, g, b))),
            _ => log::warn!("ultranode: ledc init failed for rgb slot 0, leaving disabled"),
        }
    }
    if config.rgb_enabled[1] {
        let (r, g, b) = pins::RGB_GPIO[1];
        match (
            pwm_channel!(ledc.channel3, r),
            pwm_channel!(ledc.channel4, g),
            pwm_channel!(ledc.channel5, b),
        ) {
            (Some(r), Some(g), Some(b)) => rgb.install(1, Box::new(EspidfAnalogPwm::new(r, g, b))),
            _ => log::warn!("ultranode: ledc init failed for rgb slot 1, leaving disabled"),
        }
    }
    for i in 2..4 {
        if config.rgb_enabled[i] {
            log::warn!("ultranode: no LEDC channels left for rgb slot {i}, leaving disabled");
        }
    }

    let mut white = WhiteEngine::new();
    if config.white_enabled[0] {
        match pwm_channel!(ledc.channel6, pins::WHITE_GPIO[0]) {
            Some(ledc) => white.install(0, Box::new(EspidfWhitePwm::new(ledc))),
            None => log::warn!("ultranode: ledc init failed for white slot 0, leaving disabled"),
        }
    }
    if config.white_enabled[1] {
        match pwm_channel!(ledc.channel7, pins::WHITE_GPIO[1]) {
            Some(ledc) => white.install(1, Box::new(EspidfWhitePwm::new(ledc))),
            None => log::warn!("ultranode: ledc init failed for white slot 1, leaving disabled"),
        }
    }
    for i in 2..4 {
        if config.white_enabled[i] {
            log::warn!("ultranode: no LEDC channels left for white slot {i}, leaving disabled");
        }
    }

    let mut relay = RelayEngine::new();
    for (i, enabled) in config.relay_enabled.iter().enumerate() {
        if !*enabled {
            continue;
        }
        let pin = unsafe { AnyOutputPin::new(pins::RELAY_GPIO[i]) };
        match esp_idf_hal::gpio::PinDriver::output(pin) {
            Ok(pin) => relay.install(i as u8, Box::new(EspidfRelay::new(pin))),
            Err(e) => log::error!("ultranode: relay {i} pin init failed, leaving disabled: {e}"),
        }
    }

    Ok(EngineHandles {
        ws: Arc::new(Mutex::new(ws)),
        rgb: Arc::new(Mutex::new(rgb)),
        white: Arc::new(Mutex::new(white)),
        relay: Arc::new(Mutex::new(relay)),
    })
}

/// One producer thread per time-varying class, each paced by its own
/// [`FramePacer`] at the class's configured rate (§4.2-§4.4). Relay has no
/// periodic render — it writes through synchronously from `Dispatch`.
fn spawn_render_threads(engines: &EngineHandles, config: &NodeConfig, stop: Arc<AtomicBool>) {
    let ws = engines.ws.clone();
    let rate = config.ws_frame_rate_hz;
    let ws_stop = stop.clone();
    tasks::spawn("ws-producer", tasks::Priority::AddressableProducer, tasks::Core::Rendering, move || {
        let mut pacer = FramePacer::new(rate);
        while !ws_stop.load(Ordering::Relaxed) {
            ws.lock().render_frame(rate);
            pacer.tick();
        }
    });

    let rgb = engines.rgb.clone();
    let rate = config.analog_frame_rate_hz;
    let rgb_stop = stop.clone();
    tasks::spawn("rgb-render", tasks::Priority::AnalogOrWhite, tasks::Core::Rendering, move || {
        let mut pacer = FramePacer::new(rate);
        while !rgb_stop.load(Ordering::Relaxed) {
            rgb.lock().render_frame(rate);
            pacer.tick();
        }
    });

    let white = engines.white.clone();
    let rate = config.analog_frame_rate_hz;
    let white_stop = stop;
    tasks::spawn("white-render", tasks::Priority::AnalogOrWhite, tasks::Core::Rendering, move || {
        let mut pacer = FramePacer::new(rate);
        while !white_stop.load(Ordering::Relaxed) {
            white.lock().render_frame(rate);
            pacer.tick();
        }
    });
}

#[cfg(not(target_os = "espidf"))]
fn build_wifi_port() -> Result<Box<dyn ultranode_hal::WifiPort>> {
    Ok(Box::new(ultranode_hal::sim::wifi::SimWifi::new()))
}

#[cfg(target_os = "espidf")]
fn build_wifi_port() -> Result<Box<dyn ultranode_hal::WifiPort>> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::wifi::EspWifi;
    use esp_idf_hal::peripherals::Peripherals;
    use ultranode_hal::espidf::EspidfWifi;

    let peripherals = Peripherals::take().context("taking esp32 peripherals for wifi")?;
    let sysloop = EspSystemEventLoop::take().context("taking esp system event loop")?;
    let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None).context("constructing EspWifi")?;
    let port = EspidfWifi::new(wifi, sysloop).context("constructing EspidfWifi port")?;
    Ok(Box::new(port))
}

#[cfg(not(target_os = "espidf"))]
fn build_mqtt_port() -> Box<dyn ultranode_hal::MqttPort> {
    Box::new(ultranode_hal::sim::mqtt::SimMqtt::new())
}

#[cfg(target_os = "espidf")]
fn build_mqtt_port() -> Box<dyn ultranode_hal::MqttPort> {
    Box::new(ultranode_hal::espidf::EspidfMqtt::new())
}

#[cfg(not(target_os = "espidf"))]
fn build_sntp_port() -> Box<dyn ultranode_hal::SntpPort> {
    Box::new(ultranode_hal::sim::sntp::SimSntp::new(0))
}

#[cfg(target_os = "espidf")]
fn build_sntp_port() -> Box<dyn ultranode_hal::SntpPort> {
    Box::new(ultranode_hal::espidf::EspidfSntp::new())
}

#[cfg(not(target_os = "espidf"))]
fn build_heap_source() -> Box<dyn ultranode_health::HeapSource> {
    Box::new(heap::HostedHeap)
}

#[cfg(target_os = "espidf")]
fn build_heap_source() -> Box<dyn ultranode_health::HeapSource> {
    Box::new(heap::EspidfHeap)
}

fn main() -> Result<()> {
    init_logger();
    log::info!("ultranode: booting");

    // ── 1. Configuration + credentials (read before any singleton) ──────
    let config = NodeConfig::load(std::path::Path::new(CONFIG_PATH)).context("loading node config")?;
    log::info!("ultranode: node_id={}", config.node_id);
    let credentials = SimCredentials::default().load().context("loading provisioning credentials")?;

    // ── 2. Storage + persistence ──────────────────────────────────────
    let kv = build_kv_store(&config)?;
    let recovered = recover_all(kv.as_ref());
    let persistence = Arc::new(PersistencePipeline::new(kv));

    // ── 3. Task scaffolding is `tasks::spawn`, used by every thread this
    //       binary spawns from here on; nothing to construct up front. ──

    // ── 4. Engines ─────────────────────────────────────────────────────
    let engines = build_engines(&config)?;
    // `Dispatch` owns one copy of the handles for command dispatch; the
    // render loops spawned below need their own clone of the same `Arc`s.
    let render_engines = EngineHandles {
        ws: engines.ws.clone(),
        rgb: engines.rgb.clone(),
        white: engines.white.clone(),
        relay: engines.relay.clone(),
    };

    // ── 5. Dispatch (glue): publish is wired through a cell populated
    //       once the MQTT supervisor exists below, breaking the
    //       construction cycle (dispatch needs to publish via MQTT; MQTT's
    //       event callback needs to hand inbound messages to dispatch). ──
    let mqtt_cell: Arc<Mutex<Option<Arc<MqttSupervisor>>>> = Arc::new(Mutex::new(None));
    let publish_cell = mqtt_cell.clone();
    let dispatch = Dispatch::new(
        config.node_id.clone(),
        config.pir_enabled,
        config.ws_frame_rate_hz,
        config.analog_frame_rate_hz,
        engines,
        persistence.clone(),
        Box::new(SimOta::default()) as Box<dyn OtaPort>,
        move |topic: &str, payload: Vec<u8>| match publish_cell.lock().as_ref() {
            Some(mqtt) => {
                if let Err(e) = mqtt.publish(topic, &payload, 0) {
                    log::warn!("ultranode: publish to {topic} failed: {e}");
                }
            }
            None => log::debug!("ultranode: dropping publish to {topic}, mqtt not started yet"),
        },
    );

    // Replay durable state before MQTT subscribes or any render task reads
    // engine state (`Dispatch::restore_from_persistence`'s own ordering
    // requirement).
    for (slot, payload) in recovered {
        dispatch.restore_from_persistence(slot, &payload);
    }

    // ── 6. Supervisor: Wi-Fi, SNTP, health ─────────────────────────────
    let connectivity = Arc::new(ConnectivityState::new());

    let wifi_connectivity = connectivity.clone();
    let wifi_mqtt_cell = mqtt_cell.clone();
    let wifi_config = config.clone();
    let wifi_credentials = credentials.clone();
    let wifi = WifiSupervisor::new(build_wifi_port()?, move |up| {
        wifi_connectivity.set_wifi(up);
        if up {
            if let Some(mqtt) = wifi_mqtt_cell.lock().as_ref() {
                mqtt.start(mqtt_client_config(&wifi_config, &wifi_credentials));
            }
        }
    });

    let _sntp = SntpSupervisor::start(build_sntp_port(), wifi.clone(), connectivity.clone(), SNTP_RESYNC_INTERVAL);

    let render_stop = Arc::new(AtomicBool::new(false));
    // Populated once `Runtime` is assembled at the very end of boot; the
    // reboot path below only has something to tear down after that point.
    let runtime_cell: Arc<Mutex<Option<Runtime>>> = Arc::new(Mutex::new(None));
    let runtime_for_reboot = runtime_cell.clone();
    let health_wifi = wifi.clone();
    let health_mqtt_cell = mqtt_cell.clone();
    let health_config = config.clone();
    let health_credentials = credentials.clone();
    let health = HealthMonitor::start(
        connectivity.clone(),
        build_heap_source(),
        HealthThresholds::default(),
        move |request| match request {
            RecoveryRequest::Wifi => {
                if let Err(e) = health_wifi.restart() {
                    log::warn!("ultranode: wifi recovery restart failed: {e}");
                }
            }
            RecoveryRequest::Mqtt => {
                if let Some(mqtt) = health_mqtt_cell.lock().as_ref() {
                    mqtt.start(mqtt_client_config(&health_config, &health_credentials));
                }
            }
        },
        move |reason: &str| {
            if let Some(rt) = runtime_for_reboot.lock().as_ref() {
                reboot(rt, reason);
            } else {
                log::error!("ultranode: reboot requested before runtime handle was installed ({reason})");
                std::process::exit(1);
            }
        },
    );

    // ── 7. Supervisor: MQTT (constructed last per §3's boot order) ─────
    let mqtt_connectivity = connectivity.clone();
    let mqtt_dispatch = dispatch.clone();
    let mqtt = MqttSupervisor::new(build_mqtt_port(), wifi.clone(), config.node_id.clone(), move |event| {
        if let MqttLifecycleEvent::HealthChanged(ready) = &event {
            mqtt_connectivity.set_mqtt(*ready);
        }
        mqtt_dispatch.on_mqtt_event(event);
    });
    *mqtt_cell.lock() = Some(mqtt.clone());

    // ── 8. Kick connectivity now that both supervisors exist ───────────
    if credentials.ssid.is_empty() {
        log::warn!("ultranode: no SSID configured, wifi startup blocked (§6)");
    } else if let Err(e) = wifi.set_credentials(&credentials.ssid, &credentials.psk) {
        log::error!("ultranode: invalid wifi credentials: {e}");
    } else if let Err(e) = wifi.start() {
        log::error!("ultranode: wifi start failed: {e}");
    }

    // ── 9. Render loops ─────────────────────────────────────────────────
    spawn_render_threads(&render_engines, &config, render_stop.clone());

    *runtime_cell.lock() = Some(Runtime { render_stop, health });
    log::info!("ultranode: boot complete, node {} running", config.node_id);

    // Block the main thread forever; every subsystem above runs on its own
    // thread. A real reboot request (`reboot()`) terminates the process
    // directly rather than unwinding this loop.
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
