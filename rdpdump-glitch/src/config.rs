// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Run-time configuration
//!
//! [`GlitchConfig`] can be built in code, or loaded from JSON.  Every field
//! is optional in JSON, defaulting to the values the attack was tuned with
//! against STM32F0 parts.

use alloc::format;
use alloc::string::String;
use serde::{Deserialize, Serialize};

use rdpdump_core::stm::{STM32_FLASH_BASE, STM32F0_FLASH_SIZE_DEFAULT};
use rdpdump_swd::protocol::Speed;

use crate::GlitchError;

/// Default maximum attempts per word
pub const MAX_ATTEMPTS_DEFAULT: u32 = 100;

/// Default wait after powering the target, before bring-up, in ms
pub const POWER_ON_SETTLE_MS_DEFAULT: u32 = 5;

/// What to do when a word cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DumpPolicy {
    /// Stop the dump at the first word that cannot be read
    #[default]
    HaltOnFailure,

    /// Record the failed address and carry on with the next word
    RecordGaps,
}

/// Bounds and step of the delay between releasing reset and the memory
/// read, all in ms.
///
/// The delay starts at `min_ms`, grows by `increment_ms` after each failed
/// attempt, and wraps back to `min_ms` once it reaches `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub min_ms: u32,
    pub max_ms: u32,
    pub increment_ms: u32,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            min_ms: 0,
            max_ms: 50,
            increment_ms: 1,
        }
    }
}

/// Glitch session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlitchConfig {
    /// First address to dump.  Must be word aligned.
    pub base_address: u32,

    /// Number of bytes to dump.  Must be a non-zero multiple of 4.
    pub size: u32,

    /// Attempts per word before giving up on it
    pub max_attempts: u32,

    pub jitter: JitterConfig,

    /// Wait after powering the target on, before bring-up, in ms
    pub power_on_settle_ms: u32,

    pub policy: DumpPolicy,

    /// SW-DP IDCODE the target is expected to report.  A mismatch is logged,
    /// but does not stop the attempt.
    pub expected_idcode: Option<u32>,

    /// SWD clock speed, when the reader drives its own pins
    pub speed: Speed,
}

impl Default for GlitchConfig {
    fn default() -> Self {
        Self {
            base_address: STM32_FLASH_BASE,
            size: STM32F0_FLASH_SIZE_DEFAULT,
            max_attempts: MAX_ATTEMPTS_DEFAULT,
            jitter: JitterConfig::default(),
            power_on_settle_ms: POWER_ON_SETTLE_MS_DEFAULT,
            policy: DumpPolicy::default(),
            expected_idcode: None,
            speed: Speed::default(),
        }
    }
}

impl GlitchConfig {
    /// Checks the configuration is usable.
    pub fn validate(&self) -> Result<(), GlitchError> {
        let reason = if self.base_address & 0x3 != 0 {
            format!("base address {:#010x} is not word aligned", self.base_address)
        } else if self.size == 0 {
            String::from("size is zero")
        } else if self.size & 0x3 != 0 {
            format!("size {} is not a multiple of 4", self.size)
        } else if self.base_address.checked_add(self.size - 1).is_none() {
            format!(
                "range {:#010x} + {} passes the end of the address space",
                self.base_address, self.size
            )
        } else if self.max_attempts == 0 {
            String::from("max attempts is zero")
        } else if self.jitter.min_ms >= self.jitter.max_ms {
            format!(
                "jitter min {}ms is not below max {}ms",
                self.jitter.min_ms, self.jitter.max_ms
            )
        } else if self.jitter.increment_ms == 0 {
            String::from("jitter increment is zero")
        } else {
            return Ok(());
        };

        Err(GlitchError::InvalidConfig(reason))
    }

    /// Parses and validates a JSON configuration.  Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, GlitchError> {
        let config: GlitchConfig = serde_json::from_str(json)
            .map_err(|e| GlitchError::InvalidConfig(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the configuration as JSON.
    pub fn to_json(&self) -> Result<String, GlitchError> {
        serde_json::to_string(self)
            .map_err(|e| GlitchError::InvalidConfig(format!("cannot serialize: {e}")))
    }

    /// Number of words covered by `size`
    pub fn word_count(&self) -> u32 {
        self.size / 4
    }

    /// Addresses of every word to dump, in order
    pub fn addresses(&self) -> impl Iterator<Item = u32> + use<> {
        let base = self.base_address;
        (0..self.word_count()).map(move |ii| base.wrapping_add(ii * 4))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = GlitchConfig::default();
        assert_eq!(config.base_address, 0x0800_0000);
        assert_eq!(config.size, 32768);
        assert_eq!(config.max_attempts, 100);
        assert_eq!(
            config.jitter,
            JitterConfig {
                min_ms: 0,
                max_ms: 50,
                increment_ms: 1
            }
        );
        assert_eq!(config.power_on_settle_ms, 5);
        assert_eq!(config.policy, DumpPolicy::HaltOnFailure);
        assert_eq!(config.expected_idcode, None);
        assert_eq!(config.word_count(), 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects() {
        let cases: [(fn(&mut GlitchConfig), &str); 7] = [
            (|c| c.base_address = 0x0800_0002, "not word aligned"),
            (|c| c.size = 0, "size is zero"),
            (|c| c.size = 6, "not a multiple of 4"),
            (|c| c.base_address = 0xFFFF_FFF0, "end of the address space"),
            (|c| c.max_attempts = 0, "max attempts is zero"),
            (|c| c.jitter.min_ms = 50, "not below max"),
            (|c| c.jitter.increment_ms = 0, "increment is zero"),
        ];

        for (modify, reason) in cases {
            let mut config = GlitchConfig::default();
            modify(&mut config);
            match config.validate() {
                Err(GlitchError::InvalidConfig(msg)) => assert!(msg.contains(reason), "{msg}"),
                other => panic!("expected InvalidConfig ({reason}), got {other:?}"),
            }
        }
    }

    #[test]
    fn range_ending_at_top_of_memory_is_valid() {
        let config = GlitchConfig {
            base_address: 0xFFFF_FFF0,
            size: 16,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.addresses().last(), Some(0xFFFF_FFFC));
    }

    #[test]
    fn json_round_trip() {
        let config = GlitchConfig {
            base_address: 0x0800_1000,
            size: 64,
            policy: DumpPolicy::RecordGaps,
            expected_idcode: Some(0x0BB1_1477),
            speed: Speed::Fast,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(GlitchConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn json_fields_default() {
        let config =
            GlitchConfig::from_json(r#"{"size": 1024, "jitter": {"max_ms": 20}}"#).unwrap();
        assert_eq!(config.size, 1024);
        assert_eq!(config.base_address, 0x0800_0000);
        assert_eq!(config.jitter.max_ms, 20);
        assert_eq!(config.jitter.increment_ms, 1);
        assert_eq!(config.policy, DumpPolicy::HaltOnFailure);
    }

    #[test]
    fn json_is_validated() {
        assert!(matches!(
            GlitchConfig::from_json(r#"{"size": 3}"#),
            Err(GlitchError::InvalidConfig(_))
        ));
        assert!(matches!(
            GlitchConfig::from_json("not json"),
            Err(GlitchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn addresses_step_by_word() {
        let config = GlitchConfig {
            size: 12,
            ..Default::default()
        };
        assert_eq!(
            config.addresses().collect::<Vec<_>>(),
            vec![0x0800_0000, 0x0800_0004, 0x0800_0008]
        );
    }
}
