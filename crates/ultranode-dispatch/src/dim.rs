//! Dim-on-disconnect bookkeeping (§4.10: "dim all lights to zero while
//! remembering their brightness" on DISCONNECTED, "restore any dimmed-on-
//! disconnect lights" on CONNECTED). Pure data; [`super::Dispatch`] owns the
//! engine writes this drives.

use ultranode_proto::SlotId;

#[derive(Default)]
pub struct DimState {
    remembered: Option<Vec<(SlotId, u8)>>,
}

impl DimState {
    /// Record `current` as the pre-dim brightness set, unless a dim is
    /// already in progress (a second DISCONNECTED before the matching
    /// CONNECTED must not overwrite the original brightness with zeroes).
    pub fn begin(&mut self, current: Vec<(SlotId, u8)>) -> bool {
        if self.remembered.is_some() {
            return false;
        }
        self.remembered = Some(current);
        true
    }

    /// Take back the remembered brightness set, if a dim was in progress.
    pub fn take(&mut self) -> Option<Vec<(SlotId, u8)>> { self.remembered.take() }
}
