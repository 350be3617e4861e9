// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated SWD target and board
//!
//! A register level model of an STM32 debug port, AHB-AP and flash, together
//! with the board's power and reset lines, for testing code built on
//! [`SwdTransport`] and [`TargetControl`] without hardware.
//!
//! [`Simulator`] owns the shared state and hands out a [`SimTarget`] (the
//! transport) and a [`SimBoard`] (the power/reset control), both of which
//! can be moved into the code under test while the test keeps inspecting
//! the simulator.
//!
//! Modelled behaviour:
//! - All transactions fail with [`Status::LINK_FAILURE`] unless the target is
//!   powered and a line reset has been issued since power on.
//! - AP accesses fault unless debug power-up has been requested and AP 0,
//!   bank 0 is selected.
//! - AP reads are posted: they return the previous AP read result, and DP
//!   RDBUFF returns the latest.
//! - DRW reads are subject to [`Protection`].
//!
//! Enabled with the `sim` feature.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::ops::Range;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use rdpdump_core::arm::Cortex;

use crate::Status;
use crate::hal::{Power, Reset, TargetControl};
use crate::interface::{SwdOp, SwdTransport, Transfer};

const CSW_RESET_VALUE: u32 = 0x0300_0040;
const POWER_UP_REQUEST: u32 = 0x5000_0000;
const POWER_UP_ACK: u32 = 0xA000_0000;
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Readout protection model applied to DRW reads
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Protection {
    /// Every read succeeds
    #[default]
    None,

    /// Every read faults
    Locked,

    /// A read succeeds only if the time since reset was last released, in
    /// ms, falls within the range.  Models a successful glitch.
    Window(Range<u32>),
}

/// Board activity, as recorded by [`SimBoard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    Power(Power),
    Reset(Reset),
    Indicator(bool),
    Delay(u32),
}

#[derive(Debug)]
struct SimState {
    idcode: u32,
    protection: Protection,
    memory: BTreeMap<u32, u32>,

    powered: bool,
    reset: Reset,
    indicator: bool,
    ms_since_release: Option<u32>,
    connected: bool,

    ctrl_stat: u32,
    select: u32,
    csw: u32,
    tar: u32,
    ap_buffer: u32,

    ack_overrides: VecDeque<Status>,
    ops: Vec<SwdOp>,
    events: Vec<BoardEvent>,
    line_resets: u32,
    power_ons: u32,
}

impl SimState {
    fn new() -> Self {
        Self {
            idcode: Cortex::IDCODE_M0.data(),
            protection: Protection::None,
            memory: BTreeMap::new(),
            powered: false,
            reset: Reset::Asserted,
            indicator: false,
            ms_since_release: None,
            connected: false,
            ctrl_stat: 0,
            select: 0,
            csw: CSW_RESET_VALUE,
            tar: 0,
            ap_buffer: 0,
            ack_overrides: VecDeque::new(),
            ops: Vec::new(),
            events: Vec::new(),
            line_resets: 0,
            power_ons: 0,
        }
    }

    // Debug logic loses all state with power
    fn power_down(&mut self) {
        self.connected = false;
        self.ctrl_stat = 0;
        self.select = 0;
        self.csw = CSW_RESET_VALUE;
        self.tar = 0;
        self.ap_buffer = 0;
        self.ms_since_release = None;
    }

    fn read_permitted(&self) -> bool {
        match &self.protection {
            Protection::None => true,
            Protection::Locked => false,
            Protection::Window(window) => self
                .ms_since_release
                .is_some_and(|elapsed| window.contains(&elapsed)),
        }
    }

    fn ap_accessible(&self) -> bool {
        self.ctrl_stat & POWER_UP_REQUEST == POWER_UP_REQUEST && self.select == 0
    }

    fn transfer(&mut self, op: SwdOp, data: u32) -> Transfer {
        self.ops.push(op);

        if let Some(status) = self.ack_overrides.pop_front() {
            trace!("Sim:   {op} forced {status}");
            return Transfer {
                status,
                value: ERASED_WORD,
            };
        }

        if !self.powered || !self.connected {
            return Transfer {
                status: Status::LINK_FAILURE,
                value: ERASED_WORD,
            };
        }

        match op {
            SwdOp::DpRead(_) | SwdOp::DpWrite(_) => self.dp_access(op, data),
            SwdOp::ApRead(_) | SwdOp::ApWrite(_) => {
                if self.ap_accessible() {
                    self.ap_access(op, data)
                } else {
                    Transfer {
                        status: Status::FAULT,
                        value: 0,
                    }
                }
            }
        }
    }

    fn dp_access(&mut self, op: SwdOp, data: u32) -> Transfer {
        let value = match op {
            SwdOp::DpRead(0x0) => self.idcode,
            SwdOp::DpRead(0x4) => self.ctrl_stat,
            SwdOp::DpRead(0xC) => self.ap_buffer,
            SwdOp::DpWrite(0x4) => {
                // Acknowledge whatever power-up is requested
                self.ctrl_stat = (data & POWER_UP_REQUEST) | ((data & POWER_UP_REQUEST) << 1);
                0
            }
            SwdOp::DpWrite(0x8) => {
                self.select = data;
                0
            }
            _ => 0,
        };

        Transfer {
            status: Status::OK,
            value,
        }
    }

    fn ap_access(&mut self, op: SwdOp, data: u32) -> Transfer {
        let mut status = Status::OK;
        let posted = self.ap_buffer;

        match op {
            SwdOp::ApRead(0x0) => self.ap_buffer = self.csw,
            SwdOp::ApRead(0x4) => self.ap_buffer = self.tar,
            SwdOp::ApRead(0xC) => {
                if self.read_permitted() {
                    self.ap_buffer = self.memory.get(&self.tar).copied().unwrap_or(ERASED_WORD);
                } else {
                    trace!("Sim:   read of {:#010X} blocked", self.tar);
                    status = Status::FAULT;
                }
            }
            SwdOp::ApRead(_) => self.ap_buffer = 0,
            SwdOp::ApWrite(0x0) => self.csw = data,
            SwdOp::ApWrite(0x4) => self.tar = data,
            SwdOp::ApWrite(0xC) => {
                self.memory.insert(self.tar, data);
            }
            _ => (),
        }

        let value = match op {
            SwdOp::ApRead(_) => posted,
            _ => 0,
        };

        Transfer { status, value }
    }
}

/// Owner of the simulated target's state.
///
/// ```rust
/// use rdpdump_swd::{DebugInterface, Status};
/// use rdpdump_swd::sim::Simulator;
///
/// let sim = Simulator::new();
/// sim.power_on();
/// let mut debug = DebugInterface::new(sim.target());
/// let (status, _idcode) = debug.bring_up();
/// assert_eq!(status, Status::OK);
/// ```
#[derive(Debug, Clone)]
pub struct Simulator {
    state: Rc<RefCell<SimState>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Creates an unpowered, unprotected target reporting the Cortex-M0
    /// SW-DP IDCODE, with erased memory.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::new())),
        }
    }

    /// Returns the SWD transport side of the simulator.
    pub fn target(&self) -> SimTarget {
        SimTarget {
            state: self.state.clone(),
        }
    }

    /// Returns the power/reset side of the simulator.
    pub fn board(&self) -> SimBoard {
        SimBoard {
            state: self.state.clone(),
        }
    }

    pub fn set_idcode(&self, idcode: u32) {
        self.state.borrow_mut().idcode = idcode;
    }

    pub fn set_protection(&self, protection: Protection) {
        self.state.borrow_mut().protection = protection;
    }

    pub fn write_word(&self, address: u32, value: u32) {
        self.state.borrow_mut().memory.insert(address, value);
    }

    /// Loads consecutive words starting at `base`.
    pub fn load(&self, base: u32, words: &[u32]) {
        let mut state = self.state.borrow_mut();
        for (ii, word) in words.iter().enumerate() {
            state.memory.insert(base + 4 * ii as u32, *word);
        }
    }

    /// Forces the next transaction to return `status`, with no effect on
    /// the target.  Queued overrides are used in order.
    pub fn push_ack(&self, status: Status) {
        self.state.borrow_mut().ack_overrides.push_back(status);
    }

    /// Powers the target without going through [`SimBoard`].
    pub fn power_on(&self) {
        self.board().set_power(Power::On);
    }

    pub fn powered(&self) -> bool {
        self.state.borrow().powered
    }

    pub fn reset(&self) -> Reset {
        self.state.borrow().reset
    }

    pub fn indicator(&self) -> bool {
        self.state.borrow().indicator
    }

    pub fn ctrl_stat(&self) -> u32 {
        self.state.borrow().ctrl_stat
    }

    pub fn select(&self) -> u32 {
        self.state.borrow().select
    }

    pub fn csw(&self) -> u32 {
        self.state.borrow().csw
    }

    /// Transactions issued so far, oldest first.
    pub fn ops(&self) -> Vec<SwdOp> {
        self.state.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }

    /// Board activity so far, oldest first.
    pub fn events(&self) -> Vec<BoardEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn line_resets(&self) -> u32 {
        self.state.borrow().line_resets
    }

    /// Number of times the target has been switched on.
    pub fn power_ons(&self) -> u32 {
        self.state.borrow().power_ons
    }
}

/// Simulated SWD transport.  See [`Simulator`].
#[derive(Debug)]
pub struct SimTarget {
    state: Rc<RefCell<SimState>>,
}

impl SwdTransport for SimTarget {
    fn transfer(&mut self, op: SwdOp, data: u32) -> Transfer {
        self.state.borrow_mut().transfer(op, data)
    }

    fn line_reset(&mut self) {
        let mut state = self.state.borrow_mut();
        state.line_resets += 1;
        state.connected = state.powered;
    }
}

/// Simulated board power and reset control.  See [`Simulator`].
#[derive(Debug)]
pub struct SimBoard {
    state: Rc<RefCell<SimState>>,
}

impl TargetControl for SimBoard {
    fn set_power(&mut self, power: Power) {
        let mut state = self.state.borrow_mut();
        state.events.push(BoardEvent::Power(power));
        match power {
            Power::On => {
                if !state.powered {
                    state.power_ons += 1;
                }
                state.powered = true;
                if state.reset == Reset::Released {
                    state.ms_since_release = Some(0);
                }
            }
            Power::Off => {
                state.powered = false;
                state.power_down();
            }
        }
    }

    fn set_reset(&mut self, reset: Reset) {
        let mut state = self.state.borrow_mut();
        state.events.push(BoardEvent::Reset(reset));
        if reset == Reset::Released && state.reset == Reset::Asserted && state.powered {
            state.ms_since_release = Some(0);
        }
        if reset == Reset::Asserted {
            state.ms_since_release = None;
        }
        state.reset = reset;
    }

    fn set_indicator(&mut self, on: bool) {
        let mut state = self.state.borrow_mut();
        state.events.push(BoardEvent::Indicator(on));
        state.indicator = on;
    }

    fn delay_ms(&mut self, ms: u32) {
        let mut state = self.state.borrow_mut();
        state.events.push(BoardEvent::Delay(ms));
        if let Some(elapsed) = state.ms_since_release.as_mut() {
            *elapsed += ms;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ap_reads_are_posted() {
        let sim = Simulator::new();
        sim.power_on();
        sim.write_word(0x100, 0xAAAA_5555);
        let mut target = sim.target();
        target.line_reset();
        target.transfer(SwdOp::DpWrite(0x4), POWER_UP_REQUEST);
        target.transfer(SwdOp::ApWrite(0x4), 0x100);

        let immediate = target.transfer(SwdOp::ApRead(0xC), 0);
        assert_eq!(immediate.status, Status::OK);
        assert_ne!(immediate.value, 0xAAAA_5555);

        let rdbuff = target.transfer(SwdOp::DpRead(0xC), 0);
        assert_eq!(rdbuff.value, 0xAAAA_5555);
    }

    #[test]
    fn power_cycle_disconnects() {
        let sim = Simulator::new();
        let mut board = sim.board();
        let mut target = sim.target();

        board.set_power(Power::On);
        target.line_reset();
        assert!(target.transfer(SwdOp::DpRead(0x0), 0).is_ok());

        board.set_power(Power::Off);
        board.set_power(Power::On);
        assert_eq!(
            target.transfer(SwdOp::DpRead(0x0), 0).status,
            Status::LINK_FAILURE
        );
        assert_eq!(sim.power_ons(), 2);
    }

    #[test]
    fn glitch_window_tracks_release_time() {
        let sim = Simulator::new();
        sim.set_protection(Protection::Window(3..4));
        let mut board = sim.board();
        board.set_power(Power::On);

        board.set_reset(Reset::Released);
        board.delay_ms(2);
        assert!(!sim.state.borrow().read_permitted());
        board.delay_ms(1);
        assert!(sim.state.borrow().read_permitted());
        board.delay_ms(1);
        assert!(!sim.state.borrow().read_permitted());

        board.set_reset(Reset::Asserted);
        assert!(!sim.state.borrow().read_permitted());
    }
}
