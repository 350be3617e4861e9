// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Board collaborator traits
//!
//! The SWD engine and the glitch controller never touch hardware directly.
//! The board implements [`SwdPins`] for the two SWD lines, and
//! [`TargetControl`] for the target's power, reset and an indicator LED.
//!
//! Implementations must not yield or take interrupts while bits are being
//! shifted - an interrupt mid-shift corrupts the line timing.

use serde::{Deserialize, Serialize};

/// The two SWD signal lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdLine {
    /// Clock, always driven by the host
    Swclk,

    /// Bidirectional data
    Swdio,
}

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        level == Level::High
    }
}

/// Direction of a line, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Target power supply state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    On,
    Off,
}

/// Target reset line state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reset {
    /// Target held in reset
    Asserted,

    /// Target allowed to run
    Released,
}

/// GPIO access to the SWD lines, plus a calibrated busy-wait.
pub trait SwdPins {
    /// Drives `line` to `level`.  Has no visible effect on SWDIO while it is
    /// an input, other than being the level driven once it becomes an output.
    fn set_line(&mut self, line: SwdLine, level: Level);

    /// Switches `line` between input and output.
    fn set_direction(&mut self, line: SwdLine, direction: Direction);

    /// Samples `line`.
    fn read_line(&mut self, line: SwdLine) -> Level;

    /// Spins for `cycles` CPU cycles.  Sub-microsecond; used for bit timing.
    fn delay_cycles(&mut self, cycles: u32);
}

/// Power, reset and indicator control of the target board.
pub trait TargetControl {
    /// Switches the target's supply.
    fn set_power(&mut self, power: Power);

    /// Drives the target's reset line.
    fn set_reset(&mut self, reset: Reset);

    /// Switches the status indicator.
    fn set_indicator(&mut self, on: bool);

    /// Blocks for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted pin mock.  Records every bit the host clocks out and feeds
    //! back queued bits whenever SWDIO is sampled.

    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    #[derive(Debug)]
    pub(crate) struct MockPins {
        pub swclk: Level,
        pub swdio: Level,
        pub swdio_dir: Direction,

        /// SWDIO as driven by the host at each rising SWCLK edge
        pub written: Vec<bool>,

        /// Rising SWCLK edges while SWDIO was an input
        pub input_edges: usize,

        /// Bits returned by successive SWDIO samples.  Once empty, SWDIO
        /// reads high, like an undriven line with a pull-up.
        pub to_read: VecDeque<bool>,

        /// Number of SWDIO samples taken
        pub samples: usize,

        /// Total cycles spent in `delay_cycles`
        pub delayed_cycles: u64,
    }

    impl MockPins {
        pub(crate) fn new() -> Self {
            Self {
                swclk: Level::Low,
                swdio: Level::Low,
                swdio_dir: Direction::Input,
                written: Vec::new(),
                input_edges: 0,
                to_read: VecDeque::new(),
                samples: 0,
                delayed_cycles: 0,
            }
        }

        /// Queues `count` bits of `value`, LSB first, for the host to read.
        pub(crate) fn queue_bits(&mut self, value: u64, count: usize) {
            for ii in 0..count {
                self.to_read.push_back((value >> ii) & 1 == 1);
            }
        }

        /// Takes the recorded host bits, leaving the record empty.
        pub(crate) fn take_written(&mut self) -> Vec<bool> {
            core::mem::take(&mut self.written)
        }
    }

    impl SwdPins for MockPins {
        fn set_line(&mut self, line: SwdLine, level: Level) {
            match line {
                SwdLine::Swclk => {
                    if self.swclk == Level::Low && level == Level::High {
                        match self.swdio_dir {
                            Direction::Output => self.written.push(self.swdio.into()),
                            Direction::Input => self.input_edges += 1,
                        }
                    }
                    self.swclk = level;
                }
                SwdLine::Swdio => self.swdio = level,
            }
        }

        fn set_direction(&mut self, line: SwdLine, direction: Direction) {
            if line == SwdLine::Swdio {
                self.swdio_dir = direction;
            }
        }

        fn read_line(&mut self, line: SwdLine) -> Level {
            match line {
                SwdLine::Swclk => self.swclk,
                SwdLine::Swdio => {
                    self.samples += 1;
                    self.to_read.pop_front().unwrap_or(true).into()
                }
            }
        }

        fn delay_cycles(&mut self, cycles: u32) {
            self.delayed_cycles += cycles as u64;
        }
    }

    /// Converts the low `count` bits of `value` to a bit vector, LSB first.
    pub(crate) fn bits(value: u64, count: usize) -> Vec<bool> {
        (0..count).map(|ii| (value >> ii) & 1 == 1).collect()
    }
}
