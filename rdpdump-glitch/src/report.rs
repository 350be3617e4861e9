// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Dump progress reporting
//!
//! [`SerialReporter`] writes the line protocol read by the host side of a
//! dump:
//!
//! ```text
//! Starting
//! 08000000: 20001000
//! 08000004: 080000c1
//! Error reading: 160
//! DONE
//! ```
//!
//! Lines end `\r\n`.  Values are lower case hex, zero padded to 8 digits.
//! The error line carries the raw status of the final attempt, in decimal.
//!
//! [`parse_line()`] is the host side of the same protocol.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use core::fmt;

use rdpdump_swd::Status;

use crate::dump::Word;

/// Receives dump progress.
pub trait Report {
    /// The dump is about to start.
    fn start(&mut self);

    /// A word was read.
    fn word(&mut self, address: u32, value: u32);

    /// A word could not be read.  `status` is that of the final attempt.
    fn error(&mut self, address: u32, status: Status);

    /// The dump has finished, whether or not every word was read.
    fn done(&mut self);
}

/// Writes the dump line protocol to any [`fmt::Write`], typically a UART.
#[derive(Debug)]
pub struct SerialReporter<W: fmt::Write> {
    writer: W,
    write_errors: u32,
}

impl<W: fmt::Write> SerialReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            write_errors: 0,
        }
    }

    /// Number of lines that failed to write
    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.writer.write_fmt(args).is_err() || self.writer.write_str("\r\n").is_err() {
            self.write_errors += 1;
            warn!("Error: Failed to write report line");
        }
    }
}

impl<W: fmt::Write> Report for SerialReporter<W> {
    fn start(&mut self) {
        self.line(format_args!("Starting"));
    }

    fn word(&mut self, address: u32, value: u32) {
        self.line(format_args!("{address:08x}: {value:08x}"));
    }

    fn error(&mut self, _address: u32, status: Status) {
        self.line(format_args!("Error reading: {}", status.raw()));
    }

    fn done(&mut self) {
        self.line(format_args!("DONE"));
    }
}

/// Reports dump progress through `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Report for LogReporter {
    fn start(&mut self) {
        info!("Dump starting");
    }

    fn word(&mut self, address: u32, value: u32) {
        info!("{address:08x}: {value:08x}");
    }

    fn error(&mut self, address: u32, status: Status) {
        warn!("Error: Failed to read {address:#010x}: {status}");
    }

    fn done(&mut self) {
        info!("Dump done");
    }
}

/// One line of the dump line protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Starting,
    Word(Word),

    /// Raw status of the failed read
    Error(u8),
    Done,

    /// Anything else, such as log output sharing the port
    Other,
}

/// Parses one line of reporter output.  Surrounding whitespace, including
/// the `\r`, is ignored.
pub fn parse_line(line: &str) -> Line {
    let line = line.trim();
    match line {
        "Starting" => return Line::Starting,
        "DONE" => return Line::Done,
        _ => (),
    }

    if let Some(status) = line.strip_prefix("Error reading:") {
        return match status.trim().parse::<u8>() {
            Ok(status) => Line::Error(status),
            Err(_) => Line::Other,
        };
    }

    let Some((address, value)) = line.split_once(':') else {
        return Line::Other;
    };
    match (
        u32::from_str_radix(address.trim(), 16),
        u32::from_str_radix(value.trim(), 16),
    ) {
        (Ok(address), Ok(value)) => Line::Word(Word { address, value }),
        _ => Line::Other,
    }
}
