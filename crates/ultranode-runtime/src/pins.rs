//! Board wiring for the `espidf` build.
//!
//! §1 puts "GPIO/LEDC/SPI/RMT driver particulars" out of scope for the rest
//! of the tree, but a concrete pin assignment still has to live somewhere
//! for the firmware to come up on real hardware. This is that one place —
//! swap these constants for the target board's actual schematic. Nothing
//! outside this module and `main.rs`'s `espidf` branch reads them.

#![cfg(target_os = "espidf")]

/// One RMT channel + GPIO pair per WS slot (§3: ws class bound 0-1).
pub const WS_RMT_CHANNEL: [u8; 2] = [0, 1];
pub const WS_GPIO: [i32; 2] = [16, 17];

/// Three GPIOs per RGB slot (§3: rgb class bound 0-3), sharing LEDC timer 0
/// (§5: "LEDC timer 0 is shared across PWM channels").
pub const RGB_GPIO: [(i32, i32, i32); 4] = [(4, 5, 6), (7, 8, 9), (10, 11, 12), (13, 14, 15)];

/// One GPIO per white slot (§3: white class bound 0-3).
pub const WHITE_GPIO: [i32; 4] = [21, 22, 23, 25];

/// One digital output GPIO per relay slot (SPEC_FULL.md C.1).
pub const RELAY_GPIO: [i32; 4] = [26, 27, 32, 33];

pub const PWM_FREQUENCY_HZ: u32 = 5_000;
