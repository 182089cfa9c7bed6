//! The two HX711 lines: PD_SCK (clock, output) and DOUT (data, input)

use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// Clock and data line pair. A constructed `Lines` is always configured.
///
/// The two pins may come from different HAL types and fail with different
/// error types.
pub struct Lines<SCK, DOUT> {
    sck: SCK,
    dout: DOUT,
}

impl<SCK, DOUT> Lines<SCK, DOUT>
where
    SCK: OutputPin,
    DOUT: InputPin,
{
    /// Take ownership of both pins and drive the clock low.
    pub fn new(sck: SCK, dout: DOUT) -> Result<Self, SCK::Error> {
        let mut lines = Self { sck, dout };
        lines.configure()?;
        Ok(lines)
    }

    /// Put the clock in its idle (low) state. DOUT is an input by type.
    pub fn configure(&mut self) -> Result<(), SCK::Error> {
        self.sck.set_low()
    }

    #[inline(always)]
    pub fn set_clock(&mut self, level: bool) -> Result<(), SCK::Error> {
        self.sck.set_state(PinState::from(level))
    }

    #[inline(always)]
    pub fn read_data(&mut self) -> Result<bool, DOUT::Error> {
        self.dout.is_high()
    }
}

impl<SCK, DOUT> Lines<SCK, DOUT> {
    pub fn release(self) -> (SCK, DOUT) {
        (self.sck, self.dout)
    }
}
