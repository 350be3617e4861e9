// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! rdpdump-glitch library
//!
//! Reads words out of a read-protected STM32's flash by racing an SWD memory
//! read against the readout protection check that runs after the target is
//! released from reset.
//!
//! * [`GlitchReader`] runs the per-word power/reset/attempt loop, with an
//!   adaptive delay ("jitter") that drifts across the whole session.
//! * [`dump::dump()`] walks an address range, word by word.
//! * [`report::Report`] receives the results - [`report::SerialReporter`]
//!   produces the line protocol understood by the host side dump tooling.
//! * [`GlitchConfig`] holds the run-time settings.
//!
//! ```rust,ignore
//! use rdpdump_glitch::{GlitchConfig, GlitchReader};
//! use rdpdump_glitch::dump::dump;
//! use rdpdump_glitch::report::SerialReporter;
//!
//! let config = GlitchConfig::default();
//! let mut reader = GlitchReader::from_pins(pins, board, config.clone())?;
//! let mut reporter = SerialReporter::new(uart);
//! let result = dump(&mut reader, &mut reporter);
//! ```
//!
//! It is `no_std` and requires an `alloc` implementation.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod dump;
pub mod reader;
pub mod report;

#[doc(inline)]
pub use crate::config::{DumpPolicy, GlitchConfig, JitterConfig};
#[doc(inline)]
pub use crate::reader::{GlitchReader, JitterDelay, ReadStats};

extern crate alloc;
use alloc::format;
use alloc::string::String;
use core::fmt;
use serde::Serialize;

use rdpdump_swd::Status;

/// Error type used by rdpdump-glitch objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlitchError {
    /// Every attempt to read the word failed.  `status` is the status of the
    /// final attempt.
    AttemptsExhausted {
        address: u32,
        status: Status,
        attempts: u32,
    },

    /// The configuration was rejected.  Includes the reason.
    InvalidConfig(String),
}

impl GlitchError {
    /// Returns true if trying the same word again could succeed.  Exhaustion
    /// only means this run of attempts did not hit the protection window.
    pub fn requires_retry(&self) -> bool {
        matches!(self, GlitchError::AttemptsExhausted { .. })
    }

    /// Returns the status of the final attempt, if there was one.
    pub fn status(&self) -> Option<Status> {
        match self {
            GlitchError::AttemptsExhausted { status, .. } => Some(*status),
            GlitchError::InvalidConfig(_) => None,
        }
    }

    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            GlitchError::AttemptsExhausted { .. } => "Attempts Exhausted",
            GlitchError::InvalidConfig(_) => "Invalid Config",
        }
    }
}

impl Serialize for GlitchError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("GlitchError", 2)?;

        let kind = match self {
            GlitchError::AttemptsExhausted { .. } => "attempts exhausted",
            GlitchError::InvalidConfig(_) => "invalid config",
        };
        state.serialize_field("kind", kind)?;

        let detail = match self {
            GlitchError::AttemptsExhausted {
                address,
                status,
                attempts,
            } => format!("{address:#010x} status {} after {attempts}", status.raw()),
            GlitchError::InvalidConfig(msg) => msg.clone(),
        };
        state.serialize_field("detail", &detail)?;
        state.end()
    }
}

impl fmt::Display for GlitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlitchError::AttemptsExhausted {
                address,
                status,
                attempts,
            } => write!(
                f,
                "{}: {address:#010x}: {status} after {attempts} attempts",
                self.as_str()
            ),
            GlitchError::InvalidConfig(msg) => write!(f, "{}: {msg}", self.as_str()),
        }
    }
}
