use crate::error::DriverError;
use crate::ports::{AnalogPwmDriver, RelayDriver, StripDriver, WhitePwmDriver};

pub struct MemStripDriver {
    pixel_count: usize,
    pub last_frame: Vec<[u8; 3]>,
    pub write_count: u64,
}

impl MemStripDriver {
    pub fn new(pixel_count: usize) -> Self { Self { pixel_count, last_frame: Vec::new(), write_count: 0 } }
}

impl StripDriver for MemStripDriver {
    fn pixel_count(&self) -> usize { self.pixel_count }

    fn write(&mut self, rgb: &[[u8; 3]]) -> Result<(), DriverError> {
        if rgb.len() != self.pixel_count {
            return Err(DriverError::WriteFailed(format!(
                "expected {} pixels, got {}",
                self.pixel_count,
                rgb.len()
            )));
        }
        self.last_frame = rgb.to_vec();
        self.write_count += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemAnalogPwm {
    pub last: (u16, u16, u16),
    pub write_count: u64,
}

impl AnalogPwmDriver for MemAnalogPwm {
    fn write(&mut self, r: u16, g: u16, b: u16) -> Result<(), DriverError> {
        self.last = (r, g, b);
        self.write_count += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemWhitePwm {
    pub last: u16,
    pub write_count: u64,
}

impl WhitePwmDriver for MemWhitePwm {
    fn write(&mut self, duty: u16) -> Result<(), DriverError> {
        self.last = duty;
        self.write_count += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemRelay {
    pub last: bool,
}

impl RelayDriver for MemRelay {
    fn write(&mut self, on: bool) -> Result<(), DriverError> {
        self.last = on;
        Ok(())
    }
}
