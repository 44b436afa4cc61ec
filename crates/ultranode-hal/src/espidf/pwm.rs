use crate::error::DriverError;
use crate::ports::{AnalogPwmDriver, RelayDriver, WhitePwmDriver};
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_hal::ledc::LedcDriver;

/// Three LEDC channels sharing timer 0 (§5 "LEDC timer 0 is shared across
/// PWM channels").
pub struct EspidfAnalogPwm<'a> {
    r: LedcDriver<'a>,
    g: LedcDriver<'a>,
    b: LedcDriver<'a>,
}

impl<'a> EspidfAnalogPwm<'a> {
    pub fn new(r: LedcDriver<'a>, g: LedcDriver<'a>, b: LedcDriver<'a>) -> Self { Self { r, g, b } }
}

impl<'a> AnalogPwmDriver for EspidfAnalogPwm<'a> {
    fn write(&mut self, r: u16, g: u16, b: u16) -> Result<(), DriverError> {
        self.r.set_duty(r as u32).map_err(|e| DriverError::WriteFailed(e.to_string()))?;
        self.g.set_duty(g as u32).map_err(|e| DriverError::WriteFailed(e.to_string()))?;
        self.b.set_duty(b as u32).map_err(|e| DriverError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

pub struct EspidfWhitePwm<'a> {
    ledc: LedcDriver<'a>,
}

impl<'a> EspidfWhitePwm<'a> {
    pub fn new(ledc: LedcDriver<'a>) -> Self { Self { ledc } }
}

impl<'a> WhitePwmDriver for EspidfWhitePwm<'a> {
    fn write(&mut self, duty: u16) -> Result<(), DriverError> {
        self.ledc.set_duty(duty as u32).map_err(|e| DriverError::WriteFailed(e.to_string()))
    }
}

pub struct EspidfRelay {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl EspidfRelay {
    pub fn new(pin: PinDriver<'static, AnyOutputPin, Output>) -> Self { Self { pin } }
}

impl RelayDriver for EspidfRelay {
    fn write(&mut self, on: bool) -> Result<(), DriverError> {
        if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
        .map_err(|e| DriverError::WriteFailed(e.to_string()))
    }
}
