//! ESP32-C3 UART0 Console Driver
//! =============================
//!
//! Diagnostic serial link for the acquisition firmware. UART0 is the port
//! wired to the board's USB-UART bridge, the same one the ROM bootloader
//! prints on.
//!
//! How It Works:
//! -------------
//! 1. `init` selects the 80 MHz APB clock as the UART source and programs the
//!    baud divider (integer part plus a 4-bit fraction)
//! 2. Frame format is fixed at 8 data bits, no parity, 1 stop bit
//! 3. Writes wait for room in the 128-byte TX FIFO, then push one byte
//! 4. Reads pop the RX FIFO, `read_line` echoes every byte back verbatim

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

// ============================================================================
// HARDWARE REGISTER DEFINITIONS
// ============================================================================

const UART0_BASE: u32 = 0x60000000;

// FIFO_REG: read pops RX, write pushes TX (offset 0x0000)
const UART_FIFO_REG: u32 = UART0_BASE + 0x0000;

// CLKDIV_REG: integer divider [11:0], fractional divider [23:20]
const UART_CLKDIV_REG: u32 = UART0_BASE + 0x0014;
const UART_CLKDIV_MASK: u32 = 0xFFF;
const UART_FRAG_SHIFT: u32 = 20;

// STATUS_REG: RX FIFO count [9:0], TX FIFO count [25:16]
const UART_STATUS_REG: u32 = UART0_BASE + 0x001C;
const UART_RXFIFO_CNT_MASK: u32 = 0x3FF;
const UART_TXFIFO_CNT_SHIFT: u32 = 16;
const UART_TXFIFO_CNT_MASK: u32 = 0x3FF;

// CONF0_REG: parity enable bit 1, data bits [3:2], stop bits [5:4]
const UART_CONF0_REG: u32 = UART0_BASE + 0x0020;
const UART_PARITY_EN: u32 = 1 << 1;
const UART_BIT_NUM_SHIFT: u32 = 2;
const UART_STOP_BIT_NUM_SHIFT: u32 = 4;

// CLK_CONF_REG: divider fields [19:0], source select [21:20]
const UART_CLK_CONF_REG: u32 = UART0_BASE + 0x0078;
const UART_SCLK_DIV_MASK: u32 = 0xFFFFF;
const UART_SCLK_SEL_SHIFT: u32 = 20;
const UART_SCLK_SEL_APB: u32 = 1;

// ID_REG: bit 31 latches the configuration into the UART core clock domain
const UART_ID_REG: u32 = UART0_BASE + 0x0080;
const UART_REG_UPDATE: u32 = 1 << 31;

const APB_CLK_HZ: u32 = 80_000_000;
const FIFO_SIZE: u32 = 128;

// ============================================================================
// REGISTER ACCESS FUNCTIONS
// ============================================================================

#[inline(always)]
fn reg_read(addr: u32) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

#[inline(always)]
fn reg_write(addr: u32, val: u32) {
    unsafe { write_volatile(addr as *mut u32, val) }
}

/// Baud divider for `sclk_hz` as (integer, sixteenths)
pub const fn clock_divider(sclk_hz: u32, baud: u32) -> (u32, u32) {
    let div = (sclk_hz as u64 * 16) / baud as u64;
    ((div >> 4) as u32, (div & 0xF) as u32)
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Owned handle to UART0
pub struct Uart0 {
    _private: (),
}

impl Uart0 {
    /// Configure UART0 for `baud`, 8N1
    pub fn init(baud: u32) -> Self {
        let clk_conf = reg_read(UART_CLK_CONF_REG)
            & !(UART_SCLK_DIV_MASK | (0x3 << UART_SCLK_SEL_SHIFT));
        reg_write(
            UART_CLK_CONF_REG,
            clk_conf | (UART_SCLK_SEL_APB << UART_SCLK_SEL_SHIFT),
        );

        let (int, frag) = clock_divider(APB_CLK_HZ, baud);
        reg_write(
            UART_CLKDIV_REG,
            (int & UART_CLKDIV_MASK) | (frag << UART_FRAG_SHIFT),
        );

        let mut conf0 = reg_read(UART_CONF0_REG);
        conf0 &= !(UART_PARITY_EN | (0x3 << UART_BIT_NUM_SHIFT) | (0x3 << UART_STOP_BIT_NUM_SHIFT));
        conf0 |= 3 << UART_BIT_NUM_SHIFT;       // 8 data bits
        conf0 |= 1 << UART_STOP_BIT_NUM_SHIFT;  // 1 stop bit
        reg_write(UART_CONF0_REG, conf0);

        reg_write(UART_ID_REG, reg_read(UART_ID_REG) | UART_REG_UPDATE);
        while reg_read(UART_ID_REG) & UART_REG_UPDATE != 0 {
            core::hint::spin_loop();
        }

        Self { _private: () }
    }

    /// Write a single byte, waiting for FIFO space
    pub fn putc(&mut self, c: u8) {
        while (reg_read(UART_STATUS_REG) >> UART_TXFIFO_CNT_SHIFT) & UART_TXFIFO_CNT_MASK
            >= FIFO_SIZE - 1
        {
            core::hint::spin_loop();
        }
        reg_write(UART_FIFO_REG, c as u32);
    }

    /// Write a string, `\n` goes out as `\r\n`
    pub fn puts(&mut self, s: &str) {
        for c in s.bytes() {
            if c == b'\n' {
                self.putc(b'\r');
            }
            self.putc(c);
        }
    }

    /// Read a single byte (non-blocking)
    pub fn getc(&mut self) -> Option<u8> {
        if reg_read(UART_STATUS_REG) & UART_RXFIFO_CNT_MASK != 0 {
            Some(reg_read(UART_FIFO_REG) as u8)
        } else {
            None
        }
    }

    /// Block until a carriage return or until `buf` is full, echoing every
    /// byte. The `\r` is echoed but not stored. Returns the bytes stored.
    pub fn read_line(&mut self, buf: &mut [u8]) -> usize {
        let mut len = 0;
        while len < buf.len() {
            let c = loop {
                if let Some(c) = self.getc() {
                    break c;
                }
                core::hint::spin_loop();
            };
            self.putc(c);

            if c == b'\r' {
                break;
            }
            buf[len] = c;
            len += 1;
        }
        len
    }
}

impl fmt::Write for Uart0 {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}
