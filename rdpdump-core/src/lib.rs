// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! rdpdump-core - Core ARM debug and MCU concepts used by rdpdump.
//!
//! Designed to be used in conjunction with the `rdpdump-swd` library, which
//! drives these registers over Serial Wire Debug (SWD).
//!
//! * [`arm`] - strongly typed Debug Port and Memory Access Port registers.
//! * [`stm`] - memory layout of the STM32 targets rdpdump is aimed at.
//!
//! This library is `no_std` compatible, and requires an `alloc`
//! implementation.

#![cfg_attr(not(test), no_std)]

pub mod arm;
pub mod stm;

extern crate alloc;
