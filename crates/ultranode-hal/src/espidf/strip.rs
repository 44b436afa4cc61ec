use crate::error::DriverError;
use crate::ports::StripDriver;
use smart_leds_trait::RGB8;
use ws2812_esp32_rmt_driver::Ws2812Esp32Rmt;

pub struct EspidfStripDriver {
    driver: Ws2812Esp32Rmt<'static>,
    pixel_count: usize,
}

impl EspidfStripDriver {
    pub fn new(rmt_channel: u8, gpio: i32, pixel_count: usize) -> Result<Self, DriverError> {
        let driver = Ws2812Esp32Rmt::new(rmt_channel, gpio as u32)
            .map_err(|e| DriverError::InitFailed(e.to_string()))?;
        Ok(Self { driver, pixel_count })
    }
}

impl StripDriver for EspidfStripDriver {
    fn pixel_count(&self) -> usize { self.pixel_count }

    fn write(&mut self, rgb: &[[u8; 3]]) -> Result<(), DriverError> {
        let pixels = rgb.iter().map(|[r, g, b]| RGB8::new(*r, *g, *b));
        self.driver.write(pixels).map_err(|e| DriverError::WriteFailed(e.to_string()))
    }
}
