// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Typed register descriptors
//!
//! Each DP or AP register the dumper touches is a zero sized descriptor type
//! naming its byte offset within the port and the type its 32-bit contents
//! decode to.  `rdpdump_swd::debug::DebugInterface` only accepts descriptors
//! for the right port and direction, so a DP register cannot be sent as an AP
//! access, nor a read-only register written.

/// A DP or AP register
pub trait RegisterDescriptor {
    /// Byte offset within the port: 0x0, 0x4, 0x8 or 0xC
    const ADDRESS: u8;

    /// Decoded contents
    type Value: Copy + From<u32> + Into<u32>;
}

/// A register that can be read.
pub trait ReadableRegister: RegisterDescriptor {
    fn from_raw(data: u32) -> Self::Value {
        Self::Value::from(data)
    }
}

/// A register that can be written.
pub trait WritableRegister: RegisterDescriptor {
    fn to_raw(value: Self::Value) -> u32 {
        value.into()
    }
}

/// Lives in the Debug Port
pub trait DpRegister: RegisterDescriptor {}

/// Lives in the currently selected Access Port
pub trait ApRegister: RegisterDescriptor {}

/// Implements raw `u32` conversion and hex `Display` for a single field
/// register value newtype.
#[macro_export]
macro_rules! register_value {
    ($name:ident) => {
        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
}
