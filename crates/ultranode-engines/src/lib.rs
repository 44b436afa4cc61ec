//! Rendering engines for the four output classes (§4.2-4.4, SPEC_FULL.md
//! C.1 for relay). `ws`/`rgb`/`white` run their own frame loop paced by
//! [`pacing::FramePacer`]; `relay` has no time-varying effect and writes
//! through synchronously on command.

pub mod analog;
pub mod pacing;
pub mod relay;
pub mod slot_state;
pub mod white;
pub mod ws;

pub use analog::{AnalogEngine, AnalogSlot};
pub use pacing::FramePacer;
pub use relay::{RelayEngine, RelaySlot};
pub use slot_state::SlotState;
pub use white::{WhiteEngine, WhiteSlot};
pub use ws::{WsEngine, WsSlot};
