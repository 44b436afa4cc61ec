//! Debounced per-slot persistence (§4.6): a bounded pending-payload buffer
//! and timer per slot, draining through one bounded writer queue into the
//! key-value store.

pub mod error;
pub mod pipeline;

pub use error::PersistError;
pub use pipeline::{recover_all, PersistencePipeline, MAX_PAYLOAD_BYTES};
