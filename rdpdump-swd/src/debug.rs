// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD (Wire) Debug Interface
//!
//! This module sequences Debug Port and Access Port register accesses into
//! the handful of operations needed to read a word of target memory:
//! bring-up, debug power-up, MEM-AP configuration and the memory read
//! itself.
//!
//! Access Port reads are posted.  The value an AP read returns belongs to the
//! *previous* AP read, and the real value only arrives with the next
//! transaction - here, always a DP RDBUFF read.  [`DebugInterface`] never
//! hands out an AP read's immediate value.
//!
//! If this module does not give you the control you need, you can use the
//! underlying [`SwdTransport`] directly via [`DebugInterface::swd_if()`].

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use rdpdump_core::arm::dp::{
    CtrlStat, CtrlStatRegister, IdCode, IdCodeRegister, RdBuffRegister, Select, SelectRegister,
};
use rdpdump_core::arm::map::{CswRegister, DrwRegister, Tar, TarRegister};
use rdpdump_core::arm::register::{ApRegister, DpRegister, ReadableRegister, WritableRegister};

use crate::Status;
use crate::hal::SwdPins;
use crate::interface::{SwdInterface, SwdOp, SwdTransport};

/// The memory access port is always AP 0 on the targeted parts
pub const AHB_AP_INDEX: u8 = 0;

/// ARM Debug Interface object
///
/// Every operation returns the OR of the statuses of all the transactions it
/// performed.  Nothing short-circuits here: a caller wanting to stop at the
/// first failure checks each returned status for exactly [`Status::OK`].
///
/// The simplest way to create a `DebugInterface` is to use the
/// [`DebugInterface::from_pins()`] method:
///
/// ```rust,ignore
/// use rdpdump_swd::DebugInterface;
///
/// let mut debug = DebugInterface::from_pins(pins);
///
/// let (status, idcode) = debug.bring_up();
/// let status = status | debug.enable_debug() | debug.configure_memory_access();
/// let (read_status, value) = debug.read_memory_word(0x0800_0000);
/// ```
#[derive(Debug)]
pub struct DebugInterface<T: SwdTransport> {
    swd: T,
    idcode: Option<IdCode>,
}

impl<P: SwdPins> DebugInterface<SwdInterface<P>> {
    /// Creates a new `DebugInterface` driving the given pins.
    pub fn from_pins(pins: P) -> Self {
        Self::new(SwdInterface::from_pins(pins))
    }
}

impl<T: SwdTransport> DebugInterface<T> {
    /// Creates a new `DebugInterface` with the given transport.
    pub fn new(swd: T) -> Self {
        Self { swd, idcode: None }
    }

    /// Returns a mutable reference to the underlying transport.
    pub fn swd_if(&mut self) -> &mut T {
        &mut self.swd
    }

    pub fn into_inner(self) -> T {
        self.swd
    }

    /// IDCODE from the last successful bring-up.
    pub fn idcode(&self) -> Option<IdCode> {
        self.idcode
    }

    /// Line reset, then IDCODE read.  Validating the IDCODE is up to the
    /// caller.
    pub fn bring_up(&mut self) -> (Status, IdCode) {
        trace!("Exec:  Bring up");
        self.swd.line_reset();

        let (status, idcode) = self.read_dp_register(IdCodeRegister);
        if status.is_ok() {
            debug!("Value: IDCODE: {idcode}");
            self.idcode = Some(idcode);
        } else {
            debug!("Error: Bring up: {status}");
            self.idcode = None;
        }

        (status, idcode)
    }

    /// Requests debug and system power-up.
    pub fn enable_debug(&mut self) -> Status {
        trace!("Exec:  Power up debug domain");
        self.write_dp_register(CtrlStatRegister, CtrlStat::power_up_request())
    }

    /// Selects access port `ap`, register bank `bank`.  The selection is held
    /// by the target until the next call.
    pub fn select_bank(&mut self, ap: u8, bank: u8) -> Status {
        let select = Select::new(ap, bank);
        trace!("Exec:  Update DP SELECT {select}");
        self.write_dp_register(SelectRegister, select)
    }

    /// Selects the AHB-AP, bank 0.
    pub fn select_ahb_ap(&mut self) -> Status {
        self.select_bank(AHB_AP_INDEX, 0)
    }

    /// Configures the MEM-AP for 32-bit accesses.
    ///
    /// Reads CSW, switches it to word size and writes it back, then reads it
    /// again to confirm.  The confirmation is logged only.
    pub fn configure_memory_access(&mut self) -> Status {
        trace!("Exec:  Configure MEM-AP");
        let mut status = self.select_ahb_ap();

        let (read_status, csw) = self.read_ap_register(CswRegister);
        status |= read_status;

        let csw = csw.with_word_access();
        status |= self.write_ap_register(CswRegister, csw);

        let (read_status, csw_readback) = self.read_ap_register(CswRegister);
        status |= read_status;
        trace!("Value: CSW readback {csw_readback} {}", csw_readback.transfer_config());

        status
    }

    /// Reads one 32-bit word of target memory.  The low two address bits are
    /// ignored.
    ///
    /// Requires a prior [`Self::configure_memory_access()`] and
    /// [`Self::select_ahb_ap()`].
    pub fn read_memory_word(&mut self, address: u32) -> (Status, u32) {
        let tar = Tar::word_aligned(address);
        trace!("Exec:  Read memory {tar}");

        let mut status = self.write_ap_register(TarRegister, tar);
        let (read_status, drw) = self.read_ap_register(DrwRegister);
        status |= read_status;

        if status.is_ok() {
            trace!("Value: {tar}: {drw}");
        }

        (status, drw.data())
    }

    /// Write a Debug Port register
    pub fn write_dp_register<R>(&mut self, _reg: R, value: R::Value) -> Status
    where
        R: WritableRegister + DpRegister,
    {
        let op = SwdOp::DpWrite(R::ADDRESS);
        self.swd.transfer(op, R::to_raw(value)).status
    }

    /// Write an Access Port register, in the currently selected bank
    pub fn write_ap_register<R>(&mut self, _reg: R, value: R::Value) -> Status
    where
        R: WritableRegister + ApRegister,
    {
        let op = SwdOp::ApWrite(R::ADDRESS);
        self.swd.transfer(op, R::to_raw(value)).status
    }

    /// Read a Debug Port register.
    pub fn read_dp_register<R>(&mut self, _reg: R) -> (Status, R::Value)
    where
        R: ReadableRegister + DpRegister,
    {
        let transfer = self.swd.transfer(SwdOp::DpRead(R::ADDRESS), 0);
        (transfer.status, R::from_raw(transfer.value))
    }

    /// Read an Access Port register, in the currently selected bank.
    ///
    /// The result is collected from DP RDBUFF.  The returned status is the OR
    /// of both transactions.
    pub fn read_ap_register<R>(&mut self, _reg: R) -> (Status, R::Value)
    where
        R: ReadableRegister + ApRegister,
    {
        let status = self.post_ap_read(SwdOp::ApRead(R::ADDRESS));
        let (rdbuff_status, rdbuff) = self.read_dp_register(RdBuffRegister);
        (status | rdbuff_status, R::from_raw(rdbuff.data()))
    }

    // Issues an AP read.  Its data phase carries the previous AP read's
    // result, so is dropped here.
    fn post_ap_read(&mut self, op: SwdOp) -> Status {
        self.swd.transfer(op, 0).status
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{Protection, Simulator};
    use alloc::vec;
    use pretty_assertions::assert_eq;
    use rdpdump_core::arm::Cortex;

    const FIXTURE: u32 = 0xC0DE_F00D;

    fn connected() -> (Simulator, DebugInterface<crate::sim::SimTarget>) {
        let sim = Simulator::new();
        sim.power_on();
        let debug = DebugInterface::new(sim.target());
        (sim, debug)
    }

    #[test]
    fn bring_up_reads_idcode() {
        let (sim, mut debug) = connected();
        let (status, idcode) = debug.bring_up();
        assert_eq!(status, Status::OK);
        assert_eq!(idcode, Cortex::IDCODE_M0);
        assert_eq!(debug.idcode(), Some(Cortex::IDCODE_M0));
        assert_eq!(sim.line_resets(), 1);
        assert_eq!(sim.ops(), vec![SwdOp::DpRead(0x0)]);
    }

    #[test]
    fn bring_up_unpowered_fails() {
        let sim = Simulator::new();
        let mut debug = DebugInterface::new(sim.target());
        let (status, _) = debug.bring_up();
        assert_eq!(status, Status::LINK_FAILURE);
        assert_eq!(debug.idcode(), None);
    }

    #[test]
    fn enable_and_select() {
        let (sim, mut debug) = connected();
        debug.bring_up();
        sim.clear_ops();

        assert_eq!(debug.enable_debug(), Status::OK);
        assert_eq!(sim.ctrl_stat() & 0x5000_0000, 0x5000_0000);

        assert_eq!(debug.select_bank(1, 0xF), Status::OK);
        assert_eq!(sim.select(), 0x0100_000F);

        assert_eq!(debug.select_ahb_ap(), Status::OK);
        assert_eq!(sim.select(), 0);

        assert_eq!(
            sim.ops(),
            vec![SwdOp::DpWrite(0x4), SwdOp::DpWrite(0x8), SwdOp::DpWrite(0x8)]
        );
    }

    #[test]
    fn configure_memory_access_sequence() {
        let (sim, mut debug) = connected();
        debug.bring_up();
        debug.enable_debug();
        sim.clear_ops();

        assert_eq!(debug.configure_memory_access(), Status::OK);
        assert_eq!(sim.csw() & 0x7, 0b010);
        assert_eq!(
            sim.ops(),
            vec![
                SwdOp::DpWrite(0x8),
                SwdOp::ApRead(0x0),
                SwdOp::DpRead(0xC),
                SwdOp::ApWrite(0x0),
                SwdOp::ApRead(0x0),
                SwdOp::DpRead(0xC),
            ]
        );
    }

    #[test]
    fn configure_without_power_up_faults() {
        let (_sim, mut debug) = connected();
        debug.bring_up();
        let status = debug.configure_memory_access();
        assert!(!status.is_ok());
        assert_eq!(status.raw() & Status::FAULT.raw(), Status::FAULT.raw());
    }

    #[test]
    fn read_memory_word_trusts_rdbuff_only() {
        let (sim, mut debug) = connected();
        sim.write_word(0x0800_0000, FIXTURE);
        sim.write_word(0x0800_0004, 0x1111_2222);
        debug.bring_up();
        debug.enable_debug();
        debug.configure_memory_access();
        debug.select_ahb_ap();

        let (status, value) = debug.read_memory_word(0x0800_0000);
        assert_eq!(status, Status::OK);
        assert_eq!(value, FIXTURE);

        // Had the DRW read's immediate value been used, this would return
        // the previous word
        let (status, value) = debug.read_memory_word(0x0800_0006);
        assert_eq!(status, Status::OK);
        assert_eq!(value, 0x1111_2222);
    }

    #[test]
    fn protected_read_faults() {
        let (sim, mut debug) = connected();
        sim.write_word(0x0800_0000, FIXTURE);
        sim.set_protection(Protection::Locked);
        debug.bring_up();
        debug.enable_debug();
        debug.configure_memory_access();

        let (status, value) = debug.read_memory_word(0x0800_0000);
        assert_eq!(status, Status::FAULT_AFTER_OK);
        assert_ne!(value, FIXTURE);
    }

    #[test]
    fn statuses_accumulate() {
        let (sim, mut debug) = connected();
        debug.bring_up();
        debug.enable_debug();
        debug.configure_memory_access();

        sim.push_ack(Status::WAIT);
        let (status, _) = debug.read_memory_word(0x0800_0000);
        assert_eq!(status, Status::WAIT_AFTER_OK);
    }
}
