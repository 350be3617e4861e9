// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Memory Access Port Registers

use crate::arm::register::{ApRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_value;
use alloc::{format, string::String};
use core::fmt;

/// Control/Status Word Register descriptor (read-write)
pub struct CswRegister;

impl RegisterDescriptor for CswRegister {
    const ADDRESS: u8 = 0x00;
    type Value = Csw;
}

impl ReadableRegister for CswRegister {}
impl WritableRegister for CswRegister {}
impl ApRegister for CswRegister {}

/// Control/Status Word register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Csw(u32);

register_value!(Csw);

impl Csw {
    const SIZE_MASK: u32 = 0b111;
    const SIZE_SHIFT: u32 = 0;

    const ADDRINC_MASK: u32 = 0b11;
    const ADDRINC_SHIFT: u32 = 4;

    const DEVICE_EN: u32 = 1 << 6;

    // Size values
    pub const SIZE_8BIT: u32 = 0b000;
    pub const SIZE_16BIT: u32 = 0b001;
    pub const SIZE_32BIT: u32 = 0b010;

    /// Get size field
    pub fn size(&self) -> u32 {
        (self.0 >> Self::SIZE_SHIFT) & Self::SIZE_MASK
    }

    /// Get address increment field
    pub fn addrinc(&self) -> u32 {
        (self.0 >> Self::ADDRINC_SHIFT) & Self::ADDRINC_MASK
    }

    /// Get device enable flag
    pub fn device_en(&self) -> bool {
        self.0 & Self::DEVICE_EN != 0
    }

    /// Set size field
    pub fn set_size(&mut self, size: u32) {
        self.0 = (self.0 & !(Self::SIZE_MASK << Self::SIZE_SHIFT))
            | ((size & Self::SIZE_MASK) << Self::SIZE_SHIFT);
    }

    /// Returns this CSW value switched to 32-bit word accesses, leaving every
    /// other field as the target reported it.
    pub fn with_word_access(mut self) -> Self {
        self.set_size(Self::SIZE_32BIT);
        self
    }

    /// Get transfer configuration description
    pub fn transfer_config(&self) -> String {
        let size = match self.size() {
            Self::SIZE_8BIT => "8-bit",
            Self::SIZE_16BIT => "16-bit",
            Self::SIZE_32BIT => "32-bit",
            _ => "Reserved",
        };

        let addrinc = match self.addrinc() {
            0b00 => "Off",
            0b01 => "Single",
            0b10 => "Packed",
            _ => "Reserved",
        };

        format!(
            "Size: {size}, AddrInc: {addrinc}, DeviceEn: {}",
            if self.device_en() { "Y" } else { "N" }
        )
    }
}

/// Transfer Address Register descriptor (read-write)
pub struct TarRegister;

impl RegisterDescriptor for TarRegister {
    const ADDRESS: u8 = 0x04;
    type Value = Tar;
}

impl ReadableRegister for TarRegister {}
impl WritableRegister for TarRegister {}
impl ApRegister for TarRegister {}

/// Transfer Address Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tar(u32);

register_value!(Tar);

impl Tar {
    /// Creates a TAR value for a word access.  The low two address bits are
    /// dropped, as the MEM-AP is configured for 32-bit transfers.
    pub const fn word_aligned(address: u32) -> Self {
        Tar(address & !0x3)
    }
}

/// Data Read/Write Register descriptor (read-write)
pub struct DrwRegister;

impl RegisterDescriptor for DrwRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = Drw;
}

impl ReadableRegister for DrwRegister {}
impl WritableRegister for DrwRegister {}
impl ApRegister for DrwRegister {}

/// Data Read/Write Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drw(u32);

register_value!(Drw);

impl Drw {
    /// Get data value
    pub fn data(&self) -> u32 {
        self.0
    }
}
