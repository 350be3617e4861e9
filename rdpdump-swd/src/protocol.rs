// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM SWD Wire Protocol Implementation
//!
//! This module implements the signal level of SWD - the `SwdProtocol` struct
//! drives SWDIO and SWCLK through the board's [`SwdPins`].  It detects no
//! failures: it only generates (and samples) bits.
//!
//! Every operation leaves SWCLK low.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::hal::{Direction, Level, SwdLine, SwdPins};

#[doc(inline)]
pub use crate::debug::DebugInterface;
#[doc(inline)]
pub use crate::interface::SwdInterface;

// 50+ clock cycles with SWDIO high, plus margin
const LINE_RESET_SWDIO_HIGH_CYCLES: u32 = 60;

// 2+ clock cycles with SWDIO low
const LINE_RESET_SWDIO_LOW_CYCLES: u32 = 3;

/// SWD protocol speed setting.
///
/// The settle delay is a busy-wait, so the resulting clock rate depends on
/// the host's CPU clock.  Use [`SwdProtocol::set_settle_cycles()`] to
/// calibrate for a particular board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Speed {
    /// Long settle delay, for long or noisy wiring
    Slow,

    /// The delay the attack was originally tuned with
    #[default]
    Medium,

    /// Short settle delay
    Fast,

    /// No settle delay - as fast as the GPIOs can be toggled
    Turbo,
}

impl Speed {
    /// Returns the busy-wait, in CPU cycles, used around each line
    /// transition at this speed.
    pub fn settle_cycles(&self) -> u32 {
        match self {
            Speed::Slow => 128,
            Speed::Medium => 32,
            Speed::Fast => 8,
            Speed::Turbo => 0,
        }
    }
}

/// SWD Protocol object
///
/// This is used by [`SwdInterface`] to communicate with the target.  Most
/// applications should use [`DebugInterface`] (preferred) or
/// [`SwdInterface`] instead.
///
/// Create using `SwdProtocol::new()` passing in the board's pins.
///
/// ```rust,ignore
/// use rdpdump_swd::SwdProtocol;
///
/// let swd = SwdProtocol::new(pins);
/// ```
#[derive(Debug)]
pub struct SwdProtocol<P: SwdPins> {
    pins: P,
    speed: Speed,
    settle_cycles: u32,
}

impl<P: SwdPins> SwdProtocol<P> {
    /// Create a new SWD protocol instance.
    ///
    /// SWCLK is driven low, and SWDIO left as an input until the first line
    /// reset.
    pub fn new(mut pins: P) -> Self {
        pins.set_direction(SwdLine::Swclk, Direction::Output);
        pins.set_line(SwdLine::Swclk, Level::Low);
        pins.set_direction(SwdLine::Swdio, Direction::Input);

        let speed = Speed::default();
        debug!("SWD protocol created, SWDIO input, SWCLK output low, speed {speed:?}");

        Self {
            pins,
            speed,
            settle_cycles: speed.settle_cycles(),
        }
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
        self.settle_cycles = speed.settle_cycles();
        debug!("SWD speed set to {speed:?}");
    }

    /// Returns the current settle delay in CPU cycles.
    pub fn settle_cycles(&self) -> u32 {
        self.settle_cycles
    }

    /// Overrides the settle delay with an explicitly calibrated value.  The
    /// [`Speed`] setting is left as it was.
    pub fn set_settle_cycles(&mut self, cycles: u32) {
        self.settle_cycles = cycles;
        debug!("SWD settle delay set to {cycles} cycles");
    }

    /// Direct access to the pins, for board specific tweaks.
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Releases the pins.
    pub fn into_inner(self) -> P {
        self.pins
    }

    #[inline]
    fn settle(&mut self) {
        self.pins.delay_cycles(self.settle_cycles);
    }

    #[inline]
    fn pulse(&mut self) {
        self.pins.set_line(SwdLine::Swclk, Level::High);
        self.settle();
        self.pins.set_line(SwdLine::Swclk, Level::Low);
        self.settle();
    }

    /// Drives SWDIO high briefly, then floats it.  Required before the
    /// target takes the line.
    pub fn idle(&mut self) {
        self.pins.set_line(SwdLine::Swdio, Level::High);
        self.settle();
        self.pins.set_direction(SwdLine::Swdio, Direction::Input);
        self.settle();
    }

    /// Takes SWDIO back, driving it low.
    pub fn drive_low(&mut self) {
        self.settle();
        self.pins.set_line(SwdLine::Swdio, Level::Low);
        self.pins.set_direction(SwdLine::Swdio, Direction::Output);
        self.settle();
    }

    /// One SWCLK pulse, with SWDIO left alone.
    pub fn turnaround(&mut self) {
        self.pulse();
    }

    /// `count` consecutive turnaround pulses.
    pub fn turnarounds(&mut self, count: u32) {
        for _ in 0..count {
            self.pulse();
        }
    }

    /// Clocks out the first `count` bits of `data`, LSB of `data[0]` first.
    ///
    /// SWDIO must already be an output (see [`Self::drive_low()`]).  Bits
    /// beyond the end of `data` are sent as zero.
    pub fn shift_out(&mut self, data: &[u8], count: usize) {
        let mut byte = 0u8;
        for ii in 0..count {
            if ii & 0x7 == 0 {
                byte = data.get(ii >> 3).copied().unwrap_or(0);
            }

            self.pins.set_line(SwdLine::Swdio, Level::from(byte & 1 == 1));
            self.settle();
            self.pulse();
            byte >>= 1;
        }
    }

    /// Floats SWDIO and clocks in `count` bits.
    ///
    /// Bits are packed so that the first sampled bits land in the *last*
    /// byte used: bit `i` goes to byte `ceil(count/8) - 1 - i/8`.  Within a
    /// byte each new bit enters at bit 7 and earlier bits shift down, so a
    /// full byte reads LSB-first, and a partial trailing group of `n` bits
    /// ends up in the top `n` bits of `buf[0]`.  A 3-bit acknowledge of OK
    /// (0b001) therefore reads back as `0x20`.
    ///
    /// Bytes that would fall outside `buf` are clocked but dropped.
    pub fn shift_in(&mut self, buf: &mut [u8], count: usize) {
        let bytes = count.div_ceil(8);

        self.settle();
        self.idle();
        self.settle();

        let mut acc = 0u8;
        for ii in 0..count {
            acc >>= 1;
            if self.pins.read_line(SwdLine::Swdio) == Level::High {
                acc |= 0x80;
            }
            if let Some(byte) = buf.get_mut(bytes - 1 - (ii >> 3)) {
                *byte = acc;
            }

            self.pulse();

            // Clear the accumulator after every 8 bits
            if ii & 0x7 == 0x7 {
                acc = 0;
            }
        }
    }

    /// Line reset - at least 50 clocks with SWDIO high, followed by clocks
    /// with SWDIO low.
    pub fn line_reset(&mut self) {
        trace!("Exec:  Line reset");
        self.settle();
        self.pins.set_line(SwdLine::Swclk, Level::Low);
        self.pins.set_direction(SwdLine::Swdio, Direction::Output);
        self.pins.set_line(SwdLine::Swdio, Level::High);
        self.settle();

        self.turnarounds(LINE_RESET_SWDIO_HIGH_CYCLES);

        self.pins.set_line(SwdLine::Swdio, Level::Low);
        self.turnarounds(LINE_RESET_SWDIO_LOW_CYCLES);
    }
}
