//! Busy-wait timing on a free-running cycle counter
//!
//! Every wait resets the counter to zero and spins until it reaches a
//! threshold derived from the counter's tick frequency. Millisecond waits are
//! a series of one-millisecond thresholds so the counter never has to hold
//! more than one millisecond worth of ticks.

use embedded_hal::delay::DelayNs;

/// A counter that ticks at a fixed rate and can be zeroed.
pub trait CycleCounter {
    /// Reset the counter to zero
    fn reset(&mut self);

    /// Ticks elapsed since the last reset
    fn count(&self) -> u32;
}

/// Spin-wait delay driven by a [`CycleCounter`]
pub struct CycleDelay<C> {
    counter: C,
    ticks_per_us: u32,
    ticks_per_ms: u32,
}

impl<C: CycleCounter> CycleDelay<C> {
    /// `tick_hz` is the rate the counter advances at. Thresholds round up, so
    /// a wait is never shorter than requested.
    pub fn new(counter: C, tick_hz: u32) -> Self {
        Self {
            counter,
            ticks_per_us: tick_hz.div_ceil(1_000_000),
            ticks_per_ms: tick_hz.div_ceil(1_000),
        }
    }

    pub fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }

    pub fn ticks_per_ms(&self) -> u32 {
        self.ticks_per_ms
    }

    /// Give back the counter
    pub fn release(self) -> C {
        self.counter
    }

    fn wait_ticks(&mut self, ticks: u32) {
        self.counter.reset();
        while self.counter.count() < ticks {
            core::hint::spin_loop();
        }
    }
}

impl<C: CycleCounter> DelayNs for CycleDelay<C> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_ms(us / 1_000);
        let rest = us % 1_000;
        if rest > 0 {
            self.wait_ticks(rest.saturating_mul(self.ticks_per_us));
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.wait_ticks(self.ticks_per_ms);
        }
    }
}

// ============================================================================
// ESP32-C3 PERFORMANCE COUNTER
// ============================================================================

/// ESP32-C3 machine performance counter, configured to count CPU cycles.
///
/// The counter lives in custom CSRs: `mpcer` (0x7E0) selects the event,
/// `mpcmr` (0x7E1) enables counting and `mpccr` (0x7E2) holds the count.
#[cfg(target_arch = "riscv32")]
pub struct PerfCounter {
    _private: (),
}

#[cfg(target_arch = "riscv32")]
impl PerfCounter {
    /// Select the cycle event and start counting
    pub fn enable() -> Self {
        unsafe {
            core::arch::asm!(
                "csrw 0x7e0, {0}",
                "csrw 0x7e1, {0}",
                in(reg) 1u32,
            );
        }
        Self { _private: () }
    }
}

#[cfg(target_arch = "riscv32")]
impl CycleCounter for PerfCounter {
    #[inline(always)]
    fn reset(&mut self) {
        unsafe { core::arch::asm!("csrw 0x7e2, zero") }
    }

    #[inline(always)]
    fn count(&self) -> u32 {
        let count: u32;
        unsafe { core::arch::asm!("csrr {0}, 0x7e2", out(reg) count) }
        count
    }
}
