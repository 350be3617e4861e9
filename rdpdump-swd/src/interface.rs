// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM SWD Packet Framing and Transactions
//!
//! This module contains [`SwdInterface`], which executes one register
//! transaction at a time over [`SwdProtocol`], and [`SwdTransport`], the seam
//! between transactions and the register layer in [`DebugInterface`].
//!
//! Transactions never fail in the `Result` sense.  Each one returns the raw
//! acknowledge as a [`Status`], for the caller to OR-accumulate.

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::Serialize;

use crate::Status;
use crate::hal::SwdPins;
use crate::protocol::{Speed, SwdProtocol};

#[doc(inline)]
pub use crate::debug::DebugInterface;

// Clocks issued with SWDIO driven low after the data phase of a read
const POST_READ_TURNAROUNDS: u32 = 3;

// Clocks issued with SWDIO driven low after the data phase of a write
const POST_WRITE_TURNAROUNDS: u32 = 20;

/// Which of the two register spaces a packet addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortSelect {
    /// Debug Port
    Dp,

    /// Access Port, in the bank last written to DP SELECT
    Ap,
}

/// Direction of a packet's data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessDirection {
    Read,
    Write,
}

/// SWD Operations
///
/// Each operation contains the register address as a u8 (0x0, 0x4, 0x8 or
/// 0xC).  Only address bits 3:2 are sent, as the packet's address slot.
///
/// SWD header format
/// Bit 0: Start (1)
/// Bit 1: APnDP (0=DP, 1=AP)
/// Bit 2: RnW (0=write, 1=read)
/// Bit 3: A2 (address bit 2)
/// Bit 4: A3 (address bit 3)
/// Bit 5: Parity
/// Bit 6: Stop (0)
/// Bit 7: Park (1)
///
/// ```rust
/// use rdpdump_core::arm::register::RegisterDescriptor;
/// use rdpdump_swd::interface::SwdOp;
///
/// let op = SwdOp::ApRead(rdpdump_core::arm::map::DrwRegister::ADDRESS);
/// assert_eq!(op.slot(), 0b11);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwdOp {
    DpRead(u8),
    DpWrite(u8),
    ApRead(u8),
    ApWrite(u8),
}

impl SwdOp {
    pub fn port(&self) -> PortSelect {
        match self {
            SwdOp::DpRead(_) | SwdOp::DpWrite(_) => PortSelect::Dp,
            SwdOp::ApRead(_) | SwdOp::ApWrite(_) => PortSelect::Ap,
        }
    }

    pub fn direction(&self) -> AccessDirection {
        match self {
            SwdOp::DpRead(_) | SwdOp::ApRead(_) => AccessDirection::Read,
            SwdOp::DpWrite(_) | SwdOp::ApWrite(_) => AccessDirection::Write,
        }
    }

    /// Register byte address
    pub fn address(&self) -> u8 {
        match self {
            SwdOp::DpRead(a) | SwdOp::DpWrite(a) | SwdOp::ApRead(a) | SwdOp::ApWrite(a) => *a,
        }
    }

    /// 2-bit address slot, as sent on the wire
    pub fn slot(&self) -> u8 {
        (self.address() >> 2) & 0b11
    }

    /// Returns the 8-bit packet header for this operation.
    #[allow(clippy::wrong_self_convention)]
    pub fn to_cmd(&self) -> u8 {
        build_header(self.direction(), self.port(), self.slot())
    }
}

impl fmt::Display for SwdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdOp::DpRead(a) => write!(f, "DP Read 0x{a:02X}"),
            SwdOp::DpWrite(a) => write!(f, "DP Write 0x{a:02X}"),
            SwdOp::ApRead(a) => write!(f, "AP Read 0x{a:02X}"),
            SwdOp::ApWrite(a) => write!(f, "AP Write 0x{a:02X}"),
        }
    }
}

/// Builds an SWD packet header.
///
/// `slot` is the 2-bit register address slot; higher bits are ignored.
/// Parity is the XOR of the APnDP, RnW and address bits.
pub fn build_header(direction: AccessDirection, port: PortSelect, slot: u8) -> u8 {
    let mut header = 0u8;

    if port == PortSelect::Ap {
        header |= 0x02;
    }
    if direction == AccessDirection::Read {
        header |= 0x04;
    }
    header |= (slot & 0b11) << 3;

    // Start and park bits are not yet set, so only bits 1-4 contribute
    header |= compute_parity(&[header], 7) << 5;

    header | 0x01 | 0x80
}

/// Returns the XOR of the first `bit_count` bits of `data`, taken LSB first
/// from `data[0]` onwards.  Bits beyond the end of `data` count as zero.
pub fn compute_parity(data: &[u8], bit_count: usize) -> u8 {
    data.iter()
        .flat_map(|byte| (0..8).map(move |bit| (byte >> bit) & 1))
        .take(bit_count)
        .fold(0, |parity, bit| parity ^ bit)
}

/// Result of a single register transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Transfer {
    /// Raw acknowledge
    pub status: Status,

    /// Data phase value.  For writes, always 0.  For an AP read, this is the
    /// result of the *previous* AP read, and should not be used.
    pub value: u32,
}

impl Transfer {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// A means of executing SWD register transactions.
///
/// Implemented by [`SwdInterface`] over real (or mocked) pins, and by the
/// simulated target used for testing code layered on top of this crate.
pub trait SwdTransport {
    /// Executes one register transaction.  `data` is ignored for reads.
    fn transfer(&mut self, op: SwdOp, data: u32) -> Transfer;

    /// Issues an SWD line reset.
    fn line_reset(&mut self);
}

/// SWD Interface object
///
/// This is used by [`DebugInterface`] to perform individual SWD operations on
/// the target.  Most applications will prefer to use [`DebugInterface`],
/// which sequences groups of operations.
///
/// Create using `SwdInterface::new()` passing in an [`SwdProtocol`] instance,
/// or `SwdInterface::from_pins()`.
///
/// ```rust,ignore
/// use rdpdump_swd::{SwdInterface, SwdTransport};
/// use rdpdump_swd::interface::SwdOp;
///
/// let mut swd_if = SwdInterface::from_pins(pins);
/// swd_if.line_reset();
/// let idcode = swd_if.transfer(SwdOp::DpRead(0x0), 0);
/// ```
#[derive(Debug)]
pub struct SwdInterface<P: SwdPins> {
    protocol: SwdProtocol<P>,
}

impl<P: SwdPins> SwdInterface<P> {
    /// Create a new SWD interface from an existing [`SwdProtocol`].
    pub fn new(protocol: SwdProtocol<P>) -> Self {
        Self { protocol }
    }

    /// Create a new SWD interface directly from the board's pins.
    pub fn from_pins(pins: P) -> Self {
        Self::new(SwdProtocol::new(pins))
    }

    pub fn set_swd_speed(&mut self, speed: Speed) {
        trace!("Exec:  Set {speed:?}");
        self.protocol.set_speed(speed);
    }

    pub fn swd_speed(&self) -> Speed {
        self.protocol.speed()
    }

    pub fn protocol_mut(&mut self) -> &mut SwdProtocol<P> {
        &mut self.protocol
    }

    pub fn into_inner(self) -> SwdProtocol<P> {
        self.protocol
    }

    /// Executes one register read.
    pub fn read(&mut self, op: SwdOp) -> Transfer {
        self.transfer(op, 0)
    }

    /// Executes one register write.
    pub fn write(&mut self, op: SwdOp, data: u32) -> Status {
        self.transfer(op, data).status
    }
}

impl<P: SwdPins> SwdTransport for SwdInterface<P> {
    fn transfer(&mut self, op: SwdOp, data: u32) -> Transfer {
        match op.direction() {
            AccessDirection::Read => self.read_packet(op),
            AccessDirection::Write => self.write_packet(op, data),
        }
    }

    fn line_reset(&mut self) {
        self.protocol.line_reset();
    }
}

// Internal functions
impl<P: SwdPins> SwdInterface<P> {
    // Header, handover to the target, and the acknowledge.  Common to reads
    // and writes.  Leaves SWDIO floating.
    fn request(&mut self, op: SwdOp) -> Status {
        let cmd = op.to_cmd();
        self.protocol.shift_out(&[cmd], 8);
        self.protocol.idle();
        self.protocol.turnaround();

        let mut ack = [0u8; 1];
        self.protocol.shift_in(&mut ack, 3);
        Status::from_raw(ack[0])
    }

    // Lowest level read operation.  The data phase is clocked in whatever the
    // acknowledge, straight after it, with no turnaround in between.
    fn read_packet(&mut self, op: SwdOp) -> Transfer {
        trace!("Exec:  {op}  SWD: {:#04X}", op.to_cmd());

        let status = self.request(op);

        let mut resp = [0u8; 5];
        self.protocol.shift_in(&mut resp, 33);

        self.protocol.drive_low();
        self.protocol.turnarounds(POST_READ_TURNAROUNDS);

        let value = resp[4] as u32
            | (resp[3] as u32) << 8
            | (resp[2] as u32) << 16
            | (resp[1] as u32) << 24;

        if status.is_ok() {
            let parity = resp[0] >> 7;
            if compute_parity(&value.to_le_bytes(), 32) != parity {
                debug!("Error: {op} parity mismatch: data={value:#010X}, parity={parity}");
            }
            trace!("OK:    {op}            {value:#010X}");
        } else {
            debug!("Error: {op}  {status}");
        }

        Transfer { status, value }
    }

    fn write_packet(&mut self, op: SwdOp, data: u32) -> Transfer {
        trace!("Exec:  {op} SWD: {:#04X} {data:#010X}", op.to_cmd());

        let status = self.request(op);

        // Take the line back
        self.protocol.idle();
        self.protocol.turnaround();
        self.protocol.drive_low();

        let [b0, b1, b2, b3] = data.to_le_bytes();
        let parity = compute_parity(&[b0, b1, b2, b3], 32);
        self.protocol.shift_out(&[b0, b1, b2, b3, parity], 33);

        self.protocol.drive_low();
        self.protocol.turnarounds(POST_WRITE_TURNAROUNDS);

        if status.is_ok() {
            trace!("OK:    {op}");
        } else {
            debug!("Error: {op} {data:#010X}: {status}");
        }

        Transfer { status, value: 0 }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::mock::{MockPins, bits};
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn interface() -> SwdInterface<MockPins> {
        let mut swd_if = SwdInterface::from_pins(MockPins::new());
        // Leaves SWDIO as an output, as it is before every packet
        swd_if.line_reset();
        swd_if.protocol_mut().pins_mut().take_written();
        swd_if.protocol_mut().pins_mut().input_edges = 0;
        swd_if
    }

    fn with_parity(value: u32) -> u64 {
        value as u64 | ((value.count_ones() as u64 & 1) << 32)
    }

    #[test_case(SwdOp::DpRead(0x0), 0xA5; "dp read idcode")]
    #[test_case(SwdOp::DpWrite(0x0), 0x81; "dp write abort")]
    #[test_case(SwdOp::ApRead(0x0), 0x87; "ap read csw")]
    #[test_case(SwdOp::ApWrite(0x0), 0xA3; "ap write csw")]
    #[test_case(SwdOp::DpRead(0x4), 0x8D; "dp read ctrl stat")]
    #[test_case(SwdOp::DpWrite(0x4), 0xA9; "dp write ctrl stat")]
    #[test_case(SwdOp::DpWrite(0x8), 0xB1; "dp write select")]
    #[test_case(SwdOp::DpRead(0xC), 0xBD; "dp read rdbuff")]
    #[test_case(SwdOp::ApWrite(0x4), 0x8B; "ap write tar")]
    #[test_case(SwdOp::ApRead(0x4), 0xAF; "ap read tar")]
    #[test_case(SwdOp::ApRead(0xC), 0x9F; "ap read drw")]
    fn header_table(op: SwdOp, expected: u8) {
        assert_eq!(op.to_cmd(), expected, "{op}");
        assert_eq!(build_header(op.direction(), op.port(), op.slot()), expected);
    }

    #[test]
    fn header_ignores_high_slot_bits() {
        assert_eq!(
            build_header(AccessDirection::Read, PortSelect::Dp, 0b111),
            build_header(AccessDirection::Read, PortSelect::Dp, 0b11),
        );
    }

    #[test]
    fn parity() {
        assert_eq!(compute_parity(&[0x00], 8), 0);
        assert_eq!(compute_parity(&[0x01], 8), 1);
        assert_eq!(compute_parity(&[0xFF, 0x01], 9), 1);
        assert_eq!(compute_parity(&[0xFF, 0x01], 8), 0);
        assert_eq!(compute_parity(&0x1234_5678u32.to_le_bytes(), 32), 1);
        // Beyond the buffer counts as zero
        assert_eq!(compute_parity(&[0x01], 64), 1);
    }

    #[test]
    fn read_transaction_bit_stream() {
        let mut swd_if = interface();
        let pins = swd_if.protocol_mut().pins_mut();
        pins.queue_bits(0b001, 3);
        pins.queue_bits(with_parity(0x0BB1_1477), 33);

        let transfer = swd_if.read(SwdOp::DpRead(0x0));
        assert_eq!(
            transfer,
            Transfer {
                status: Status::OK,
                value: 0x0BB1_1477
            }
        );

        let pins = swd_if.into_inner().into_inner();
        let mut expected: Vec<bool> = bits(0xA5, 8);
        expected.extend([false; 3]);
        assert_eq!(pins.written, expected);

        // Turnaround, 3 ack bits, 32 data bits and parity
        assert_eq!(pins.input_edges, 37);
        assert_eq!(pins.samples, 36);
        assert_eq!(pins.swclk, crate::hal::Level::Low);
    }

    #[test]
    fn write_transaction_bit_stream() {
        let mut swd_if = interface();
        swd_if.protocol_mut().pins_mut().queue_bits(0b001, 3);

        let status = swd_if.write(SwdOp::DpWrite(0x4), 0x5000_0000);
        assert_eq!(status, Status::OK);

        let pins = swd_if.into_inner().into_inner();
        let mut expected: Vec<bool> = bits(0xA9, 8);
        expected.extend(bits(with_parity(0x5000_0000), 33));
        expected.extend([false; 20]);
        assert_eq!(pins.written, expected);

        // Turnaround, 3 ack bits, turnaround back
        assert_eq!(pins.input_edges, 5);
        assert_eq!(pins.samples, 3);
    }

    #[test]
    fn wait_still_clocks_data_phase() {
        let mut swd_if = interface();
        swd_if.protocol_mut().pins_mut().queue_bits(0b010, 3);

        let transfer = swd_if.read(SwdOp::ApRead(0xC));
        assert_eq!(transfer.status, Status::WAIT);
        assert_eq!(swd_if.protocol_mut().pins_mut().input_edges, 37);
    }

    #[test]
    fn undriven_line_is_link_failure() {
        let mut swd_if = interface();

        let transfer = swd_if.read(SwdOp::DpRead(0x0));
        assert_eq!(transfer.status, Status::LINK_FAILURE);
        assert_eq!(transfer.value, 0xFFFF_FFFF);

        let status = swd_if.write(SwdOp::DpWrite(0x8), 0);
        assert_eq!(status, Status::LINK_FAILURE);
    }

    #[test]
    fn bad_parity_keeps_status() {
        let mut swd_if = interface();
        let pins = swd_if.protocol_mut().pins_mut();
        pins.queue_bits(0b001, 3);
        pins.queue_bits(with_parity(0x1234_5678) ^ (1 << 32), 33);

        let transfer = swd_if.read(SwdOp::DpRead(0xC));
        assert_eq!(transfer.status, Status::OK);
        assert_eq!(transfer.value, 0x1234_5678);
    }

    #[test]
    fn op_fields() {
        let op = SwdOp::ApWrite(0x04);
        assert_eq!(op.port(), PortSelect::Ap);
        assert_eq!(op.direction(), AccessDirection::Write);
        assert_eq!(op.slot(), 0b01);
        assert_eq!(op.address(), 0x04);
        assert_eq!(alloc::format!("{op}"), "AP Write 0x04");
    }
}
