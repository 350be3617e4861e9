// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM debug architecture: DP and MEM-AP registers, and the SW-DP IDCODEs
//! reported by the Cortex-M cores found in STM32 parts.

pub mod dp;
pub mod map;
pub mod register;

use core::fmt;

use dp::IdCode;

/// Cortex-M core, as identified by its SW-DP IDCODE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cortex {
    /// STM32F0
    M0,
    /// STM32F1
    M3,
    /// STM32F3, STM32F4
    M4,
}

impl Cortex {
    pub const IDCODE_M0: IdCode = IdCode::new(0x0BB1_1477);
    pub const IDCODE_M3: IdCode = IdCode::new(0x1BA0_1477);
    pub const IDCODE_M4: IdCode = IdCode::new(0x2BA0_1477);

    const SIGNATURES: [(IdCode, Cortex); 3] = [
        (Self::IDCODE_M0, Cortex::M0),
        (Self::IDCODE_M3, Cortex::M3),
        (Self::IDCODE_M4, Cortex::M4),
    ];

    /// Looks up the core reporting `idcode`.  Returns `None` for anything
    /// else, including a corrupted read of a known IDCODE.
    pub fn from_idcode(idcode: IdCode) -> Option<Cortex> {
        Self::SIGNATURES
            .iter()
            .find(|(signature, _)| *signature == idcode)
            .map(|(_, core)| *core)
    }
}

impl fmt::Display for Cortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cortex::M0 => "Cortex-M0",
            Cortex::M3 => "Cortex-M3",
            Cortex::M4 => "Cortex-M4",
        };
        f.write_str(name)
    }
}
