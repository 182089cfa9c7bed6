//! Bare-metal HX711 load-cell acquisition for the ESP32-C3
//!
//! The driver bit-bangs the HX711 two-wire readout over two GPIO lines,
//! timing every clock edge with busy-wait delays on a cycle counter.
//!
//! - [`timing`]: cycle-counter delays (`embedded_hal::delay::DelayNs`)
//! - [`lines`]: the clock/data line pair over `embedded-hal` pins
//! - [`hx711`]: the readout state machine
//! - [`report`]: diagnostic text for each readout
//! - [`gpio`], [`console`]: ESP32-C3 register-level pins and UART0
//!
//! Everything above the register modules is hardware independent and is
//! tested on the host with simulated pins and counters.

#![cfg_attr(not(test), no_std)]

pub mod console;
pub mod gpio;
pub mod hx711;
pub mod lines;
pub mod report;
pub mod timing;

pub use hx711::{sign_extend, Error, Hx711};
pub use lines::Lines;
pub use report::{Digits, Event, Pulse, Reporter, SerialReporter};
pub use timing::{CycleCounter, CycleDelay};
