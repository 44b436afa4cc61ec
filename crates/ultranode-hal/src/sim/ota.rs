use crate::error::OtaError;
use crate::ports::OtaPort;

#[derive(Default)]
pub struct SimOta {
    pub checks: Vec<bool>,
}

impl OtaPort for SimOta {
    fn check(&mut self, force: bool) -> Result<(), OtaError> {
        self.checks.push(force);
        Ok(())
    }
}
