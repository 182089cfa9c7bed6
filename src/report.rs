//! Diagnostic output for a readout
//!
//! The driver hands every sampled bit and the final reading to a
//! [`Reporter`] once the pulse train is over, so reporting never stretches a
//! clock pulse. `()` ignores everything, [`SerialReporter`] prints text.

use core::fmt;

/// Which clock pulse a sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    /// Data pulse, 0 is the MSB
    Data(u8),
    /// The gain-select pulse after the data
    Gain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// DOUT level seen before the first pulse
    Ready { level: bool },
    Sample { pulse: Pulse, level: bool },
    /// The 24-bit accumulator and its sign-extended value
    Reading { raw: u32, value: i32 },
}

pub trait Reporter {
    fn report(&mut self, event: Event);
}

impl Reporter for () {
    #[inline(always)]
    fn report(&mut self, _event: Event) {}
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, event: Event) {
        (**self).report(event)
    }
}

/// Prints events as text lines
pub struct SerialReporter<W> {
    out: W,
}

impl<W: fmt::Write> SerialReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: fmt::Write> Reporter for SerialReporter<W> {
    fn report(&mut self, event: Event) {
        // a lost diagnostic line must not fail the reading
        let _ = match event {
            Event::Ready { level } => writeln!(self.out, "DOUT INIT: {}", level as u8),
            Event::Sample { pulse: Pulse::Data(_), level } => {
                writeln!(self.out, "DOUT: {}", level as u8)
            }
            Event::Sample { pulse: Pulse::Gain, level } => {
                writeln!(self.out, "GAIN: {}", level as u8)
            }
            Event::Reading { raw, value } => writeln!(
                self.out,
                "adcVal: {} raw 0x{} ({})",
                Digits::new(value as u32, 2, 32),
                Digits::new(raw, 16, 6),
                value
            ),
        };
    }
}

// ============================================================================
// NUMBER FORMATTING
// ============================================================================

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// `value` in `base` (2..=16), zero-padded to at least `min_digits`.
/// Zero always prints at least one digit.
#[derive(Debug, Clone, Copy)]
pub struct Digits {
    value: u32,
    base: u32,
    min_digits: usize,
}

impl Digits {
    pub const fn new(value: u32, base: u32, min_digits: usize) -> Self {
        assert!(base >= 2 && base <= 16, "base must be 2..=16");
        Self { value, base, min_digits }
    }

    pub const fn binary(value: u32, min_digits: usize) -> Self {
        Self::new(value, 2, min_digits)
    }
}

impl fmt::Display for Digits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [b'0'; 32];
        let mut pos = buf.len();
        let mut val = self.value;
        let min_digits = self.min_digits.clamp(1, buf.len());

        while val > 0 || buf.len() - pos < min_digits {
            pos -= 1;
            buf[pos] = HEX_DIGITS[(val % self.base) as usize];
            val /= self.base;
        }

        // Safety: only ASCII digits were written
        f.write_str(unsafe { core::str::from_utf8_unchecked(&buf[pos..]) })
    }
}
