//! HX711 Bit-Banged Readout
//! =========================
//!
//! The HX711 has no register interface. A conversion is read by clocking
//! PD_SCK 25 times and sampling DOUT while the clock is high:
//!
//! ```text
//!          ready                      24 data pulses                   gain
//! DOUT  ‾‾‾\_____ <b23><b22> ... <b0> ______________________________  ‾‾‾‾‾
//! SCK   _________/‾‾\__/‾‾\__ ... __/‾‾\___________________________/‾‾\___
//!                 |  |
//!                 |  +-- sample after SETTLE_US, hold HOLD_US, low LOW_US
//!                 +----- rising edge, device shifts out the next bit
//! ```
//!
//! DOUT doubles as the data-ready flag: it is held low when a conversion is
//! waiting. Bits come out MSB first as a 24-bit two's complement number. The
//! single pulse after the data selects channel A, gain 128 for the next
//! conversion.
//!
//! If PD_SCK stays high for more than 60 us the device powers down and the
//! rest of the frame reads as ones, so the pulse train runs inside a
//! critical section.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::lines::Lines;
use crate::report::{Event, Pulse, Reporter};

// ============================================================================
// PROTOCOL CONSTANTS
// ============================================================================

/// Data bits per conversion
pub const DATA_BITS: u8 = 24;

/// Extra pulses after the data: 1 selects channel A, gain 128
pub const GAIN_PULSES: u8 = 1;

/// Clock high time before DOUT is sampled (datasheet T3 >= 0.2 us)
pub const SETTLE_US: u32 = 2;

/// Rest of the clock high time after sampling
pub const HOLD_US: u32 = 2;

/// Clock low time before the next rising edge (datasheet T4 >= 0.2 us)
pub const LOW_US: u32 = 4;

/// PD_SCK high longer than this powers the device down
pub const POWER_DOWN_US: u32 = 60;

const _: () = assert!(SETTLE_US >= 1);
const _: () = assert!(LOW_US >= 1);
const _: () = assert!(SETTLE_US + HOLD_US < POWER_DOWN_US);

const RAW_MASK: u32 = 0x00FF_FFFF;

/// Largest reading the device can report
pub const MAX_VALUE: i32 = (1 << 23) - 1;

/// Smallest reading the device can report
pub const MIN_VALUE: i32 = -(1 << 23);

/// Sign-extend a 24-bit two's complement value to 32 bits
#[inline]
pub const fn sign_extend(raw: u32) -> i32 {
    (((raw & RAW_MASK) << 8) as i32) >> 8
}

// ============================================================================
// ERRORS
// ============================================================================

/// Driver errors. `CE` comes from the clock pin, `DE` from the data pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<CE, DE = CE> {
    /// Driving PD_SCK failed
    Clock(CE),
    /// Reading DOUT failed
    Data(DE),
    /// DOUT was high, no conversion is waiting
    NotReady,
}

impl<CE: fmt::Debug, DE: fmt::Debug> fmt::Display for Error<CE, DE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Clock(e) => write!(f, "PD_SCK pin error: {e:?}"),
            Error::Data(e) => write!(f, "DOUT pin error: {e:?}"),
            Error::NotReady => f.write_str("HX711 conversion not ready"),
        }
    }
}

impl<CE: fmt::Debug, DE: fmt::Debug> core::error::Error for Error<CE, DE> {}

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Position in the readout sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ClockHigh(u8),
    ClockLow(u8),
    GainHigh,
    GainLow,
    Done,
}

impl Phase {
    pub const fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::ClockHigh(0),
            Phase::ClockHigh(i) => Phase::ClockLow(i),
            Phase::ClockLow(i) if i + 1 < DATA_BITS => Phase::ClockHigh(i + 1),
            Phase::ClockLow(_) => Phase::GainHigh,
            Phase::GainHigh => Phase::GainLow,
            Phase::GainLow => Phase::Done,
            Phase::Done => Phase::Idle,
        }
    }
}

/// Bits clocked out so far, MSB first
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bits: u32,
    len: u8,
}

impl Frame {
    pub const fn new() -> Self {
        Self { bits: 0, len: 0 }
    }

    #[inline(always)]
    pub fn push(&mut self, bit: bool) {
        self.bits = (self.bits << 1) | bit as u32;
        self.len += 1;
    }

    pub const fn len(&self) -> u8 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Level of data pulse `index`, 0 being the first (MSB). Pulses not
    /// clocked yet read as low.
    pub const fn bit(&self, index: u8) -> bool {
        index < self.len && (self.bits >> (self.len - 1 - index)) & 1 != 0
    }

    /// The unsigned 24-bit accumulator
    pub const fn raw(&self) -> u32 {
        self.bits & RAW_MASK
    }

    pub const fn value(&self) -> i32 {
        sign_extend(self.raw())
    }
}

/// Everything one readout sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub frame: Frame,
    /// DOUT during the gain pulse, not part of the reading
    pub gain_level: bool,
}

// ============================================================================
// DRIVER
// ============================================================================

/// HX711 driver, owns its lines, its delay and an optional reporter
pub struct Hx711<SCK, DOUT, D, R = ()> {
    lines: Lines<SCK, DOUT>,
    delay: D,
    reporter: R,
}

impl<SCK, DOUT, D> Hx711<SCK, DOUT, D> {
    pub fn new(lines: Lines<SCK, DOUT>, delay: D) -> Self {
        Self {
            lines,
            delay,
            reporter: (),
        }
    }
}

impl<SCK, DOUT, D, R> Hx711<SCK, DOUT, D, R> {
    /// Send diagnostics to `reporter` after every readout
    pub fn with_reporter<R2>(self, reporter: R2) -> Hx711<SCK, DOUT, D, R2> {
        Hx711 {
            lines: self.lines,
            delay: self.delay,
            reporter,
        }
    }

    pub fn release(self) -> (SCK, DOUT, D, R) {
        let (sck, dout) = self.lines.release();
        (sck, dout, self.delay, self.reporter)
    }
}

/// [`Error`] for a given clock and data pin pair
pub type DriverError<SCK, DOUT> = Error<<SCK as ErrorType>::Error, <DOUT as ErrorType>::Error>;

impl<SCK, DOUT, D, R> Hx711<SCK, DOUT, D, R>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
    R: Reporter,
{
    /// True when DOUT is low, i.e. a conversion can be clocked out
    pub fn is_ready(&mut self) -> Result<bool, DriverError<SCK, DOUT>> {
        let high = self.lines.read_data().map_err(Error::Data)?;
        Ok(!high)
    }

    /// Poll once per millisecond for up to `max_ms` milliseconds
    pub fn wait_ready(&mut self, max_ms: u32) -> Result<(), DriverError<SCK, DOUT>> {
        for _ in 0..max_ms {
            if self.is_ready()? {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        if self.is_ready()? {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    /// Clock out one conversion and return it sign-extended.
    ///
    /// Fails with [`Error::NotReady`] without touching the clock if DOUT is
    /// high.
    pub fn read_sample(&mut self) -> Result<i32, DriverError<SCK, DOUT>> {
        // the ready check leaves the clock low, so it doubles as DOUT INIT
        let ready_level = self.lines.read_data().map_err(Error::Data)?;
        if ready_level {
            return Err(Error::NotReady);
        }

        let capture = critical_section::with(|_| {
            let capture = self.clock_out();
            if capture.is_err() {
                // park PD_SCK low so the device does not power down
                let _ = self.lines.set_clock(false);
            }
            capture
        })?;
        let value = capture.frame.value();

        self.reporter.report(Event::Ready { level: ready_level });
        for i in 0..DATA_BITS {
            self.reporter.report(Event::Sample {
                pulse: Pulse::Data(i),
                level: capture.frame.bit(i),
            });
        }
        self.reporter.report(Event::Sample {
            pulse: Pulse::Gain,
            level: capture.gain_level,
        });
        self.reporter.report(Event::Reading {
            raw: capture.frame.raw(),
            value,
        });

        log::trace!("hx711 raw {:#08x} -> {}", capture.frame.raw(), value);
        Ok(value)
    }

    /// Walk the readout sequence from `Idle` to `Done`
    fn clock_out(&mut self) -> Result<Capture, DriverError<SCK, DOUT>> {
        let mut frame = Frame::new();
        let mut gain_level = false;
        let mut sampled = false;
        let mut phase = Phase::Idle;

        loop {
            phase = phase.next();
            match phase {
                Phase::ClockHigh(_) => sampled = self.pulse_high()?,
                Phase::ClockLow(_) => {
                    self.pulse_low()?;
                    frame.push(sampled);
                }
                Phase::GainHigh => gain_level = self.pulse_high()?,
                Phase::GainLow => self.pulse_low()?,
                Phase::Done => return Ok(Capture { frame, gain_level }),
                Phase::Idle => unreachable!("readout never returns to idle before done"),
            }
        }
    }

    #[inline(always)]
    fn pulse_high(&mut self) -> Result<bool, DriverError<SCK, DOUT>> {
        self.lines.set_clock(true).map_err(Error::Clock)?;
        self.delay.delay_us(SETTLE_US);
        let level = self.lines.read_data().map_err(Error::Data)?;
        self.delay.delay_us(HOLD_US);
        Ok(level)
    }

    #[inline(always)]
    fn pulse_low(&mut self) -> Result<(), DriverError<SCK, DOUT>> {
        self.lines.set_clock(false).map_err(Error::Clock)?;
        self.delay.delay_us(LOW_US);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use std::io::ErrorKind;

    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
    use embedded_hal_mock::eh1::MockError;

    fn level(bit: bool) -> State {
        if bit {
            State::High
        } else {
            State::Low
        }
    }

    /// Pin expectations for one full readout of `bits`, ready check included
    fn readout(bits: &[bool; 24], gain: bool) -> (Vec<PinTransaction>, Vec<PinTransaction>) {
        let mut sck = vec![];
        let mut dout = vec![PinTransaction::get(State::Low)];
        for &bit in bits.iter().chain(core::iter::once(&gain)) {
            sck.push(PinTransaction::set(State::High));
            dout.push(PinTransaction::get(level(bit)));
            sck.push(PinTransaction::set(State::Low));
        }
        (sck, dout)
    }

    fn bits_of(word: u32) -> [bool; 24] {
        core::array::from_fn(|i| (word >> (23 - i)) & 1 != 0)
    }

    fn read_word(word: u32) -> i32 {
        let (sck_tx, dout_tx) = readout(&bits_of(word), false);
        let mut sck_expect = vec![PinTransaction::set(State::Low)];
        sck_expect.extend(sck_tx);

        let sck = PinMock::new(&sck_expect);
        let dout = PinMock::new(&dout_tx);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        let value = hx711.read_sample().unwrap();

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
        value
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x000001), 1);
        assert_eq!(sign_extend(0x7FFFFF), MAX_VALUE);
        assert_eq!(sign_extend(0x800000), MIN_VALUE);
        assert_eq!(sign_extend(0xFFFFFF), -1);
        assert_eq!(sign_extend(0xFFFFF3), -13);
        assert!(sign_extend(1 << (DATA_BITS - 1)) < 0);
        // bits above 23 are not part of the reading
        assert_eq!(sign_extend(0xAB00_0005), 5);
    }

    #[test]
    fn test_phase_walk() {
        let mut phase = Phase::Idle;
        let mut steps = 0;
        let mut highs = 0;
        while phase != Phase::Done {
            phase = phase.next();
            if matches!(phase, Phase::ClockHigh(_) | Phase::GainHigh) {
                highs += 1;
            }
            steps += 1;
        }
        assert_eq!(steps, 2 * (DATA_BITS as usize + GAIN_PULSES as usize) + 1);
        assert_eq!(highs, 25);
        assert_eq!(Phase::Done.next(), Phase::Idle);
        assert_eq!(Phase::ClockLow(22).next(), Phase::ClockHigh(23));
        assert_eq!(Phase::ClockLow(23).next(), Phase::GainHigh);
    }

    #[test]
    fn test_frame_msb_first() {
        let mut frame = Frame::new();
        assert!(frame.is_empty());
        for bit in [true, false, true] {
            frame.push(bit);
        }
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.raw(), 0b101);
        assert!(frame.bit(0));
        assert!(!frame.bit(1));
        assert!(frame.bit(2));
        // pulses past the end read low
        assert!(!frame.bit(3));
        assert!(!frame.bit(u8::MAX));
    }

    #[test]
    fn test_empty_frame_bits_read_low() {
        let frame = Frame::new();
        assert!(!frame.bit(0));
        assert!(!frame.bit(23));
        assert_eq!(frame.value(), 0);
    }

    #[test]
    fn test_read_all_zeros() {
        assert_eq!(read_word(0x000000), 0);
    }

    #[test]
    fn test_read_all_ones() {
        assert_eq!(read_word(0xFFFFFF) as u32, 0xFFFF_FFFF);
    }

    #[test]
    fn test_read_sign_bit_only() {
        assert_eq!(read_word(0x800000) as u32, 0xFF80_0000);
    }

    #[test]
    fn test_read_positive_pattern() {
        assert_eq!(read_word(0x123456), 0x123456);
        assert_eq!(read_word(0x7FFFFF), MAX_VALUE);
    }

    #[test]
    fn test_not_ready_leaves_clock_alone() {
        let sck = PinMock::new(&[PinTransaction::set(State::Low)]);
        let dout = PinMock::new(&[PinTransaction::get(State::High)]);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        assert_eq!(hx711.read_sample(), Err(Error::NotReady));

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
    }

    #[test]
    fn test_wait_ready_timeout() {
        let dout_tx = vec![PinTransaction::get(State::High); 4];
        let sck = PinMock::new(&[PinTransaction::set(State::Low)]);
        let dout = PinMock::new(&dout_tx);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        assert_eq!(hx711.wait_ready(3), Err(Error::NotReady));

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
    }

    #[test]
    fn test_wait_ready_success() {
        let sck = PinMock::new(&[PinTransaction::set(State::Low)]);
        let dout = PinMock::new(&[
            PinTransaction::get(State::High),
            PinTransaction::get(State::High),
            PinTransaction::get(State::Low),
        ]);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        assert_eq!(hx711.wait_ready(10), Ok(()));

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
    }

    #[test]
    fn test_clock_error_propagates() {
        let sck = PinMock::new(&[
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High).with_error(MockError::Io(ErrorKind::Other)),
            PinTransaction::set(State::Low),
        ]);
        let dout = PinMock::new(&[PinTransaction::get(State::Low)]);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        assert_eq!(
            hx711.read_sample(),
            Err(Error::Clock(MockError::Io(ErrorKind::Other)))
        );

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
    }

    #[test]
    fn test_data_error_parks_clock_low() {
        // DOUT fails mid-pulse with PD_SCK high, the driver must still
        // bring the clock back down
        let sck = PinMock::new(&[
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
        ]);
        let dout = PinMock::new(&[
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low).with_error(MockError::Io(ErrorKind::Other)),
        ]);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        assert_eq!(
            hx711.read_sample(),
            Err(Error::Data(MockError::Io(ErrorKind::Other)))
        );

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
    }

    #[test]
    fn test_back_to_back_reads() {
        let (sck_a, dout_a) = readout(&bits_of(0xFFFFFF), true);
        let (sck_b, dout_b) = readout(&bits_of(0x000001), false);
        let mut sck_expect = vec![PinTransaction::set(State::Low)];
        sck_expect.extend(sck_a);
        sck_expect.extend(sck_b);
        let mut dout_expect = dout_a;
        dout_expect.extend(dout_b);

        let sck = PinMock::new(&sck_expect);
        let dout = PinMock::new(&dout_expect);
        let lines = Lines::new(sck, dout).unwrap();
        let mut hx711 = Hx711::new(lines, NoopDelay::new());

        assert_eq!(hx711.read_sample(), Ok(-1));
        assert_eq!(hx711.read_sample(), Ok(1));

        let (mut sck, mut dout, _, _) = hx711.release();
        sck.done();
        dout.done();
    }

    #[test]
    fn test_error_display() {
        let err: Error<MockError> = Error::NotReady;
        assert_eq!(std::format!("{err}"), "HX711 conversion not ready");

        let err: Error<MockError> = Error::Data(MockError::Io(ErrorKind::Other));
        assert!(std::format!("{err}").starts_with("DOUT pin error"));
    }
}
