use ultranode_proto::ParamValue;

/// Bookkeeping an engine keeps per slot so `ultranode-dispatch` can assemble
/// a status snapshot without reaching into the effect trait object itself.
#[derive(Debug, Clone)]
pub struct SlotState {
    pub effect_name: String,
    pub brightness: u8,
    pub params: Vec<ParamValue>,
    pub last_color: Option<[u8; 3]>,
}

impl SlotState {
    pub fn new(effect_name: &str) -> Self {
        Self { effect_name: effect_name.to_string(), brightness: 0, params: Vec::new(), last_color: None }
    }

    pub fn set_effect(&mut self, name: &str) {
        self.effect_name = name.to_string();
        self.params.clear();
    }

    pub fn set_params(&mut self, params: Vec<ParamValue>) { self.params = params; }
}
