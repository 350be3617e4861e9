// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Port Registers

use crate::arm::register::{DpRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_value;
use core::fmt;

/// JEDEC designer code for ARM Ltd
const DESIGNER_ARM: u16 = 0x23B;

/// IDCODE Register descriptor (read-only)
pub struct IdCodeRegister;

impl RegisterDescriptor for IdCodeRegister {
    const ADDRESS: u8 = 0x00;
    type Value = IdCode;
}

impl ReadableRegister for IdCodeRegister {}
impl DpRegister for IdCodeRegister {}

/// ARM Debug Port IDCODE register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct IdCode(u32);

impl IdCode {
    pub const fn new(value: u32) -> Self {
        IdCode(value)
    }

    pub fn data(&self) -> u32 {
        self.0
    }

    /// Get part number (bits 27:20)
    pub fn part_number(&self) -> u8 {
        ((self.0 >> 20) & 0xFF) as u8
    }

    /// Get version (bits 15:12)
    pub fn version(&self) -> u8 {
        ((self.0 >> 12) & 0xF) as u8
    }

    /// Get JEDEC designer ID (bits 11:1)
    pub fn designer_id(&self) -> u16 {
        ((self.0 >> 1) & 0x7FF) as u16
    }

    /// Check if LSB is set (should always be 1 for valid IDCODE)
    pub fn is_valid(&self) -> bool {
        (self.0 & 1) == 1
    }

    /// Get part description if known
    pub fn part_description(&self) -> &'static str {
        if self.designer_id() != DESIGNER_ARM {
            return "unknown";
        }
        match (self.part_number(), self.version()) {
            (0xBA, _) => "ARM SW-DP (Cortex-M3/M4)",
            (0xBB, _) => "ARM SW-DP (Cortex-M0)",
            (0xBC, _) => "ARM SW-DP v2 (Cortex-M0+)",
            (_, 0) => "ARM Debug Port v0",
            (_, 1) => "ARM Debug Port v1",
            (_, 2) => "ARM Debug Port v2",
            _ => "Unknown ARM Debug Port Version",
        }
    }

    /// Check if this is an ARM designed Debug Port.  A line stuck high or low
    /// during the IDCODE read produces an all-ones or all-zeros value, neither
    /// of which passes.
    pub fn is_arm_debug_port(&self) -> bool {
        self.is_valid() && self.designer_id() == DESIGNER_ARM
    }
}

impl From<u32> for IdCode {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<IdCode> for u32 {
    fn from(value: IdCode) -> u32 {
        value.0
    }
}

impl fmt::Display for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            if !self.is_valid() {
                return write!(f, "Invalid IDCODE: 0x{:08X} (LSB not set)", self.0);
            }

            write!(f, "0x{:08X} {}", self.0, self.part_description())
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

/// CTRL/STAT Register descriptor (read-write)
pub struct CtrlStatRegister;

impl RegisterDescriptor for CtrlStatRegister {
    const ADDRESS: u8 = 0x04;
    type Value = CtrlStat;
}

impl ReadableRegister for CtrlStatRegister {}
impl WritableRegister for CtrlStatRegister {}
impl DpRegister for CtrlStatRegister {}

/// ARM Debug Port CTRL/STAT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlStat(u32);

register_value!(CtrlStat);

impl CtrlStat {
    const CDBGPWRUPREQ: u32 = 1 << 28;
    const CSYSPWRUPREQ: u32 = 1 << 30;

    /// Requests both the debug and system power domains, and nothing else.
    /// This is the value written when enabling the debug interface
    /// (0x5000_0000).
    pub const fn power_up_request() -> Self {
        CtrlStat(Self::CDBGPWRUPREQ | Self::CSYSPWRUPREQ)
    }
}

/// SELECT Register descriptor (read-write)
pub struct SelectRegister;

impl RegisterDescriptor for SelectRegister {
    const ADDRESS: u8 = 0x08;
    type Value = Select;
}

impl WritableRegister for SelectRegister {}
impl DpRegister for SelectRegister {}

/// ARM Debug Port SELECT register data
///
/// The bank number is carried in the low nibble, the layout used by the
/// STM32 AHB-AP this crate targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select(u32);

register_value!(Select);

impl Select {
    const APSEL_MASK: u32 = 0xFF;
    const APSEL_SHIFT: u32 = 24;

    const BANK_MASK: u32 = 0xF;
    const BANK_SHIFT: u32 = 0;

    /// Selects access port `ap` and register bank `bank`.
    pub const fn new(ap: u8, bank: u8) -> Self {
        Select(
            ((ap as u32 & Self::APSEL_MASK) << Self::APSEL_SHIFT)
                | ((bank as u32 & Self::BANK_MASK) << Self::BANK_SHIFT),
        )
    }
}

/// RDBUFF Register descriptor (read-only)
pub struct RdBuffRegister;

impl RegisterDescriptor for RdBuffRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = RdBuff;
}

impl ReadableRegister for RdBuffRegister {}
impl DpRegister for RdBuffRegister {}

/// ARM Debug Port RDBUFF register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RdBuff(u32);

register_value!(RdBuff);

impl RdBuff {
    /// Get the buffered data
    pub fn data(&self) -> u32 {
        self.0
    }
}
