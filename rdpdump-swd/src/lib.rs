// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! rdpdump-swd library
//!
//! Bit-banged ARM Serial Wire Debug (SWD), cut down to exactly what is needed
//! to race a debug memory read against an STM32's readout protection check.
//!
//! The following diagram shows the key `rdpdump-swd` concepts.
//!
//! ```text
//!   rdpdump-glitch        |  GlitchReader  ==  power/reset  ==   Target
//! ----------------------                                    ------------
//!     DebugInterface      \
//! ----------------------   \
//!      SwdInterface         |--  Status (OR-accumulated)
//! ----------------------   /
//!      SwdProtocol        /
//! ----------------------
//!      SwdPins           >======================<       SWD Target
//!                          SWDIO/SWCLK/GND
//! ```
//!
//! * [`DebugInterface`] sequences DP/AP register accesses - bring-up, MEM-AP
//!   configuration and pipelined memory reads.
//! * [`SwdInterface`] frames and executes individual register transactions.
//! * [`SwdProtocol`] drives the SWDIO and SWCLK lines.
//! * [`hal::SwdPins`] and [`hal::TargetControl`] are implemented by the board.
//!
//! Every operation reports a [`Status`].  Statuses are never turned into
//! early returns inside this crate: they are OR-combined on the way up, and
//! success is exactly [`Status::OK`].
//!
//! It is `no_std` and requires an `alloc` implementation.

#![cfg_attr(not(test), no_std)]

pub mod debug;
#[cfg(feature = "esp32c3")]
pub mod esp;
pub mod hal;
pub mod interface;
pub mod protocol;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

#[doc(inline)]
pub use crate::debug::DebugInterface;
#[doc(inline)]
pub use crate::interface::{SwdInterface, SwdTransport};
#[doc(inline)]
pub use crate::protocol::SwdProtocol;

extern crate alloc;
use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use serde::Serialize;

/// Composite result of one or more SWD operations.
///
/// A single transaction produces the raw 3-bit acknowledge, as shifted in
/// from the wire (so OK is `0x20`, not `0x01`).  A sequence of operations
/// produces the bitwise union of every step's status, which is why combined
/// codes such as [`Status::WAIT_AFTER_OK`] exist.
///
/// Success is tested by equality with [`Status::OK`] (see
/// [`Status::is_ok()`]), never by testing the OK bit, as any admixed WAIT or
/// FAULT bit means part of the sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Status(u8);

impl Status {
    /// No status available (yet)
    pub const NONE: Status = Status(0x00);
    /// OK
    pub const OK: Status = Status(0x20);
    /// Wait/retry requested - bus access was not granted in time
    pub const WAIT: Status = Status(0x40);
    /// A previous operation was OK, a later one was asked to wait
    pub const WAIT_AFTER_OK: Status = Status(0x60);
    /// Fault during command execution, e.g. access denied
    pub const FAULT: Status = Status(0x80);
    /// A previous operation was OK, a later one faulted
    pub const FAULT_AFTER_OK: Status = Status(0xA0);
    /// No valid reply was sampled - check wiring and timing
    pub const LINK_FAILURE: Status = Status(0xE0);

    /// Creates a status from a raw acknowledge byte.  Only bits 7:5 carry
    /// acknowledge information.
    pub const fn from_raw(raw: u8) -> Self {
        Status(raw & 0xE0)
    }

    /// Returns the raw status byte.
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// The only success test.
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// Returns the union of two statuses.
    pub const fn combine(self, other: Status) -> Status {
        Status(self.0 | other.0)
    }

    /// Returns the single acknowledge this status represents, if it is one.
    pub fn ack(&self) -> Option<Ack> {
        match *self {
            Self::OK => Some(Ack::Ok),
            Self::WAIT => Some(Ack::Wait),
            Self::FAULT => Some(Ack::Fault),
            Self::LINK_FAILURE => Some(Ack::LinkFailure),
            _ => None,
        }
    }

    /// Returns the name of this status, if it is one of the named codes.
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::NONE => Some("None"),
            Self::OK => Some("OK"),
            Self::WAIT => Some("Wait"),
            Self::WAIT_AFTER_OK => Some("Wait after OK"),
            Self::FAULT => Some("Fault"),
            Self::FAULT_AFTER_OK => Some("Fault after OK"),
            Self::LINK_FAILURE => Some("Link failure"),
            _ => None,
        }
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        self.combine(rhs)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        *self = self.combine(rhs);
    }
}

impl BitOr<Ack> for Status {
    type Output = Status;

    fn bitor(self, rhs: Ack) -> Status {
        self.combine(rhs.into())
    }
}

impl FromIterator<Status> for Status {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        iter.into_iter().fold(Status::NONE, Status::combine)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:02X})", self.0),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Outcome of a single SWD acknowledge phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ack {
    /// Target accepted the request
    Ok,

    /// Target asked for the request to be retried
    Wait,

    /// Target reported an access fault.  Only redoing the whole bring-up
    /// recovers from this.
    Fault,

    /// Nothing valid was sampled.  SWDIO floating high reads as all three
    /// bits set.
    LinkFailure,
}

impl Ack {
    /// Returns the status this acknowledge contributes to a sequence.
    pub const fn status(&self) -> Status {
        match self {
            Ack::Ok => Status::OK,
            Ack::Wait => Status::WAIT,
            Ack::Fault => Status::FAULT,
            Ack::LinkFailure => Status::LINK_FAILURE,
        }
    }
}

impl From<Ack> for Status {
    fn from(ack: Ack) -> Self {
        ack.status()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const NAMED: [Status; 7] = [
        Status::NONE,
        Status::OK,
        Status::WAIT,
        Status::WAIT_AFTER_OK,
        Status::FAULT,
        Status::FAULT_AFTER_OK,
        Status::LINK_FAILURE,
    ];

    #[test]
    fn status_algebra() {
        assert_eq!(Status::OK | Status::FAULT, Status::FAULT_AFTER_OK);
        assert_eq!((Status::OK | Status::FAULT).raw(), 0xA0);
        assert_eq!(Status::WAIT | Status::OK, Status::WAIT_AFTER_OK);
        assert_eq!((Status::WAIT | Status::OK).raw(), 0x60);
        assert_eq!(Status::NONE | Status::OK, Status::OK);
        assert_eq!(Status::OK | Status::OK, Status::OK);
        assert_eq!(Status::OK | Status::LINK_FAILURE, Status::LINK_FAILURE);
    }

    #[test]
    fn only_pure_ok_is_success() {
        for status in NAMED {
            assert_eq!(status.is_ok(), status == Status::OK, "{status}");
        }

        // Every combination that carries a non-OK bit fails
        for a in NAMED {
            for b in NAMED {
                let combined = a | b;
                let has_error_bit = (a.raw() | b.raw()) & 0xC0 != 0;
                if has_error_bit {
                    assert!(!combined.is_ok(), "{a} | {b}");
                }
            }
        }
    }

    #[test]
    fn fold_is_union() {
        let folded: Status = [Ack::Ok, Ack::Ok, Ack::Wait]
            .into_iter()
            .map(Status::from)
            .collect();
        assert_eq!(folded, Status::WAIT_AFTER_OK);

        let empty: Status = core::iter::empty::<Status>().collect();
        assert_eq!(empty, Status::NONE);
        assert!(!empty.is_ok());

        let mut status = Status::NONE;
        status |= Status::OK;
        status |= Ack::Fault.into();
        assert_eq!(status, Status::FAULT_AFTER_OK);
        assert_eq!(Status::OK | Ack::Wait, Status::WAIT_AFTER_OK);
    }

    #[test]
    fn ack_classification() {
        assert_eq!(Status::from_raw(0x20).ack(), Some(Ack::Ok));
        assert_eq!(Status::from_raw(0x40).ack(), Some(Ack::Wait));
        assert_eq!(Status::from_raw(0x80).ack(), Some(Ack::Fault));
        assert_eq!(Status::from_raw(0xE0).ack(), Some(Ack::LinkFailure));
        assert_eq!(Status::WAIT_AFTER_OK.ack(), None);
        // Low bits are not part of the acknowledge
        assert_eq!(Status::from_raw(0x3F), Status::OK);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Status::OK), "OK (0x20)");
        assert_eq!(format!("{}", Status::FAULT_AFTER_OK), "Fault after OK (0xA0)");
        assert_eq!(format!("{}", Status::from_raw(0xC0)), "0xC0");
    }
}
