//! Effect registries for the four output classes. Each class has its own
//! small trait (the render signature differs: a pixel buffer for `ws`, an
//! RGB triple for `rgb`, a scalar for `white`, a boolean for `relay`) and a
//! static table of named factories that the dispatch and engine crates look
//! effect names up in.

pub mod analog;
pub mod color;
pub mod ctx;
pub mod relay;
pub mod white;
pub mod ws;

pub use analog::{default_analog_effect_name, make_analog_effect, AnalogEffect, ANALOG_EFFECTS};
pub use color::{gamma8, parse_color};
pub use ctx::RenderCtx;
pub use relay::{default_relay_effect_name, make_relay_effect, RelayEffect, RELAY_EFFECTS};
pub use white::{default_white_effect_name, make_white_effect, WhiteEffect, WHITE_EFFECTS};
pub use ws::{default_ws_effect_name, make_ws_effect, WsEffect, WS_EFFECTS};
