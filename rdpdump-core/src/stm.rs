// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! rdpdump-core - STM32 memory layout

use static_assertions::const_assert;

/// Flash base address, common to the STM32F0, F1 and F4 lines
pub const STM32_FLASH_BASE: u32 = 0x0800_0000;

/// Flash size of the smallest STM32F0 parts, in bytes
pub const STM32F0_FLASH_SIZE_DEFAULT: u32 = 32 * 1024;

const_assert!(STM32_FLASH_BASE & 0x3 == 0);
const_assert!(STM32F0_FLASH_SIZE_DEFAULT % 4 == 0);
