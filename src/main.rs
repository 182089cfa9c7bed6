//! Bare-metal application entry point
//! ESP-IDF bootloader does minimal initialization, then calls this
//!
//! Boot sequence:
//! - Chip and CPU clock bring-up (esp-hal)
//! - UART0 console at 115200 8N1
//! - HX711 lines: DOUT on GPIO4, PD_SCK on GPIO5
//! - One single-shot acquisition, reported over the console
//!
//! After the reading the console echoes whatever is typed.

#![no_std]
#![no_main]

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::prelude::*;

use hx711_bare_metal::console::Uart0;
use hx711_bare_metal::gpio::{self, InputLine, OutputLine};
use hx711_bare_metal::timing::PerfCounter;
use hx711_bare_metal::{CycleDelay, Digits, Error, Hx711, Lines, SerialReporter};

// HX711 wiring (XIAO ESP32-C3 D2/D3)
const DOUT_GPIO: u8 = 4;
const SCK_GPIO: u8 = 5;

/// Board configuration
struct BoardConfig {
    baud_rate: u32,
    /// Perf counter rate, equal to the CPU clock
    cpu_hz: u32,
    /// Time for a terminal to attach before anything is printed
    startup_delay_ms: u32,
    /// The HX711 converts at 10 Hz, so a conversion is ready within 100 ms
    ready_timeout_ms: u32,
}

const BOARD: BoardConfig = BoardConfig {
    baud_rate: 115_200,
    cpu_hz: 160_000_000,
    startup_delay_ms: 500,
    ready_timeout_ms: 500,
};

const LINE_BUFFER_SIZE: usize = 64;

#[entry]
fn main() -> ! {
    // Initialize ESP-HAL at full CPU speed
    esp_hal::init({
        let mut config = esp_hal::Config::default();
        config.cpu_clock = CpuClock::max();
        config
    });

    esp_println::logger::init_logger_from_env();

    let mut uart = Uart0::init(BOARD.baud_rate);

    let dout = InputLine::<DOUT_GPIO>::new();
    let sck = OutputLine::<SCK_GPIO>::new();
    let lines = match Lines::new(sck, dout) {
        Ok(lines) => lines,
        Err(never) => match never {},
    };

    let mut delay = CycleDelay::new(PerfCounter::enable(), BOARD.cpu_hz);

    // Give the terminal a chance to start
    delay.delay_ms(BOARD.startup_delay_ms);

    uart.puts("\n=== HX711 ACQUISITION ===\n");
    let _ = writeln!(uart, "GPIO IN: {}", Digits::binary(gpio::input_levels(), 32));

    let mut hx711 = Hx711::new(lines, delay).with_reporter(SerialReporter::new(&mut uart));
    let reading = hx711
        .wait_ready(BOARD.ready_timeout_ms)
        .and_then(|()| hx711.read_sample());

    match reading {
        Ok(value) => log::info!("HX711 reading: {} counts", value),
        Err(Error::NotReady) => log::warn!(
            "HX711 not ready after {} ms, check DOUT/PD_SCK wiring",
            BOARD.ready_timeout_ms
        ),
        Err(Error::Clock(never)) => match never {},
        Err(Error::Data(never)) => match never {},
    }
    drop(hx711);

    uart.puts("Echo mode, type a line and press enter\n");

    let mut line = [0u8; LINE_BUFFER_SIZE];
    loop {
        let len = uart.read_line(&mut line);
        uart.puts("\n");
        match core::str::from_utf8(&line[..len]) {
            Ok(text) => log::debug!("rx {} bytes: {}", len, text),
            Err(_) => log::debug!("rx {} bytes (not utf-8)", len),
        }
    }
}
