//! ESP32-C3 GPIO Driver
//! Direct register access for the HX711 clock and data lines

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

// GPIO register base addresses
const GPIO_BASE: u32 = 0x60004000;
const IO_MUX_BASE: u32 = 0x60009000;

// GPIO registers
const GPIO_OUT_W1TS_REG: u32 = GPIO_BASE + 0x0008;  // Write 1 to set
const GPIO_OUT_W1TC_REG: u32 = GPIO_BASE + 0x000C;  // Write 1 to clear
const GPIO_ENABLE_W1TS_REG: u32 = GPIO_BASE + 0x0024;
const GPIO_ENABLE_W1TC_REG: u32 = GPIO_BASE + 0x0028;
const GPIO_IN_REG: u32 = GPIO_BASE + 0x003C;

// ESP32-C3 has GPIO 0-21
const GPIO_MAX: u8 = 21;

// IO MUX registers (one per GPIO)
#[inline(always)]
fn gpio_pin_mux_reg(n: u32) -> u32 {
    IO_MUX_BASE + 0x0004 + (n * 4)
}

// IO MUX configuration bits
const FUN_WPU: u32 = 1 << 7;          // Weak pull-up
const FUN_WPD: u32 = 1 << 8;          // Weak pull-down
const FUN_IE: u32 = 1 << 9;           // Input enable
const FUN_DRV_SHIFT: u32 = 10;        // Drive strength
const MCU_SEL_SHIFT: u32 = 12;        // Function select

// Register access functions
#[inline(always)]
fn reg_write(addr: u32, val: u32) {
    unsafe { write_volatile(addr as *mut u32, val) }
}

#[inline(always)]
fn reg_read(addr: u32) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

/// Route a pad to the GPIO matrix and set its input and pull bits
fn mux_as_gpio(gpio_num: u32, input: bool) {
    let mux_reg = gpio_pin_mux_reg(gpio_num);
    let mut mux_val = reg_read(mux_reg);

    // Set function to GPIO (function 1)
    mux_val &= !(0x7 << MCU_SEL_SHIFT);
    mux_val |= 1 << MCU_SEL_SHIFT;

    // Set drive strength to medium (2)
    mux_val &= !(0x3 << FUN_DRV_SHIFT);
    mux_val |= 2 << FUN_DRV_SHIFT;

    // HX711 DOUT is push-pull, no pulls on either line
    mux_val &= !(FUN_WPU | FUN_WPD);
    if input {
        mux_val |= FUN_IE;
    } else {
        mux_val &= !FUN_IE;
    }

    reg_write(mux_reg, mux_val);
}

/// Raw snapshot of every GPIO input level, bit n is GPIO n
pub fn input_levels() -> u32 {
    reg_read(GPIO_IN_REG)
}

/// Push-pull output pin, driven low when created
pub struct OutputLine<const GPIO: u8> {
    _private: (),
}

impl<const GPIO: u8> OutputLine<GPIO> {
    const MASK: u32 = {
        assert!(GPIO <= GPIO_MAX, "ESP32-C3 has GPIO 0-21");
        1 << GPIO
    };

    pub fn new() -> Self {
        mux_as_gpio(GPIO as u32, false);
        reg_write(GPIO_OUT_W1TC_REG, Self::MASK);
        reg_write(GPIO_ENABLE_W1TS_REG, Self::MASK);
        Self { _private: () }
    }
}

impl<const GPIO: u8> ErrorType for OutputLine<GPIO> {
    type Error = Infallible;
}

impl<const GPIO: u8> OutputPin for OutputLine<GPIO> {
    #[inline(always)]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        reg_write(GPIO_OUT_W1TC_REG, Self::MASK);
        Ok(())
    }

    #[inline(always)]
    fn set_high(&mut self) -> Result<(), Self::Error> {
        reg_write(GPIO_OUT_W1TS_REG, Self::MASK);
        Ok(())
    }
}

/// Floating input pin
pub struct InputLine<const GPIO: u8> {
    _private: (),
}

impl<const GPIO: u8> InputLine<GPIO> {
    const MASK: u32 = {
        assert!(GPIO <= GPIO_MAX, "ESP32-C3 has GPIO 0-21");
        1 << GPIO
    };

    pub fn new() -> Self {
        reg_write(GPIO_ENABLE_W1TC_REG, Self::MASK);
        mux_as_gpio(GPIO as u32, true);
        Self { _private: () }
    }
}

impl<const GPIO: u8> ErrorType for InputLine<GPIO> {
    type Error = Infallible;
}

impl<const GPIO: u8> InputPin for InputLine<GPIO> {
    #[inline(always)]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(input_levels() & Self::MASK != 0)
    }

    #[inline(always)]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(input_levels() & Self::MASK == 0)
    }
}
