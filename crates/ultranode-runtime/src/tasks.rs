//! Uniform task spawning (§5's "Task scaffolding", §2's component table).
//!
//! §5's relative-priority ladder (pixel-refresh > addressable-producer >
//! analog-rgb ≈ white ≫ MQTT > OTA ≈ sensors > health > SNTP) and core
//! pinning (networking on core 0, rendering on core 1 on dual-core parts)
//! only has real teeth on `espidf`, where `ThreadSpawnConfiguration` lets a
//! spawned `std::thread` carry an RTOS priority and core affinity. On a
//! hosted build every task is just a named `std::thread` at the OS
//! scheduler's default priority — there is no dual-core pinning to emulate.

use std::thread::{Builder, JoinHandle};

/// §5's ladder, highest first. Numeric values only matter relative to each
/// other; `espidf` maps them onto FreeRTOS priorities, hosted builds ignore
/// them entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    PixelRefresh,
    AddressableProducer,
    AnalogOrWhite,
    Mqtt,
    OtaOrSensor,
    Health,
    Sntp,
}

impl Priority {
    #[cfg(target_os = "espidf")]
    fn rtos_priority(self) -> u8 {
        match self {
            Priority::PixelRefresh => 18,
            Priority::AddressableProducer => 17,
            Priority::AnalogOrWhite => 15,
            Priority::Mqtt => 10,
            Priority::OtaOrSensor => 8,
            Priority::Health => 5,
            Priority::Sntp => 3,
        }
    }
}

/// Dual-core pinning per §5: rendering on core 1, networking on core 0.
/// Single-core parts ignore this (there is only one core to pin to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core {
    Networking,
    Rendering,
}

#[cfg(target_os = "espidf")]
fn idf_core(core: Core) -> esp_idf_hal::cpu::Core {
    match core {
        Core::Networking => esp_idf_hal::cpu::Core::Core0,
        Core::Rendering => esp_idf_hal::cpu::Core::Core1,
    }
}

/// Spawn a named, long-running task with the given priority/core hints.
/// Panics on spawn failure, matching every other supervisor in this tree
/// (`.expect("spawn ... thread")`) — a failed task spawn at boot is not a
/// condition the firmware can run without.
pub fn spawn(name: &str, priority: Priority, core: Core, f: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    #[cfg(target_os = "espidf")]
    {
        use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
        ThreadSpawnConfiguration {
            name: Some(name.as_bytes()),
            priority: priority.rtos_priority(),
            pin_to_core: Some(idf_core(core)),
            ..Default::default()
        }
        .set()
        .expect("apply thread spawn configuration");
    }
    #[cfg(not(target_os = "espidf"))]
    let _ = (priority, core);

    Builder::new().name(name.to_string()).spawn(f).expect("spawn task thread")
}
