// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Dumps an address range word by word.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

use rdpdump_swd::hal::TargetControl;
use rdpdump_swd::{Status, SwdTransport};

use crate::GlitchError;
use crate::config::DumpPolicy;
use crate::reader::GlitchReader;
use crate::report::Report;

/// A word read from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub address: u32,
    pub value: u32,
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}: {:08x}", self.address, self.value)
    }
}

/// A word that could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub address: u32,

    /// Status of the final attempt
    pub status: Status,
}

/// Outcome of a dump
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DumpResult {
    /// First address of the dumped range
    pub base_address: u32,

    /// Words read, in address order
    pub words: Vec<Word>,

    /// Words skipped under [`DumpPolicy::RecordGaps`], in address order
    pub gaps: Vec<Gap>,

    /// The error that stopped the dump under [`DumpPolicy::HaltOnFailure`]
    pub halted: Option<GlitchError>,
}

impl DumpResult {
    /// Returns true if every word in the range was read.
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty() && self.halted.is_none()
    }

    /// Returns the words read as a little-endian image, starting at the base
    /// address.
    ///
    /// Returns `None` if any word was skipped, as the words after it would
    /// not sit at their offset.  A halted dump gives the image up to the
    /// failed word.
    pub fn to_le_bytes(&self) -> Option<Vec<u8>> {
        if !self.gaps.is_empty() {
            return None;
        }
        Some(
            self.words
                .iter()
                .flat_map(|word| word.value.to_le_bytes())
                .collect(),
        )
    }

    /// Returns a little-endian image with every word at its offset from the
    /// base address, and each gap filled with `fill`.
    ///
    /// The image runs to the last word read or skipped.
    pub fn to_le_bytes_filled(&self, fill: u32) -> Vec<u8> {
        let last = self
            .words
            .iter()
            .map(|word| word.address)
            .chain(self.gaps.iter().map(|gap| gap.address))
            .max();
        let Some(last) = last else {
            return Vec::new();
        };

        let len = (last.wrapping_sub(self.base_address) as usize).saturating_add(4);
        let mut image: Vec<u8> = fill.to_le_bytes().into_iter().cycle().take(len).collect();
        for word in &self.words {
            let offset = word.address.wrapping_sub(self.base_address) as usize;
            let slot = offset
                .checked_add(4)
                .and_then(|end| image.get_mut(offset..end));
            if let Some(slot) = slot {
                slot.copy_from_slice(&word.value.to_le_bytes());
            }
        }
        image
    }
}

/// Dumps the range set by the reader's configuration.
///
/// Reports each word as it is read.  On failure the dump either stops, or
/// records a gap and carries on, according to the configured
/// [`DumpPolicy`].  `done` is reported in both cases.
pub fn dump<T, C, R>(reader: &mut GlitchReader<T, C>, report: &mut R) -> DumpResult
where
    T: SwdTransport,
    C: TargetControl,
    R: Report + ?Sized,
{
    let policy = reader.config().policy;
    let addresses = reader.config().addresses();
    let mut result = DumpResult {
        base_address: reader.config().base_address,
        ..Default::default()
    };

    info!(
        "Dumping {} words from {:#010x}",
        reader.config().word_count(),
        reader.config().base_address
    );
    report.start();

    for address in addresses {
        match reader.read_word(address) {
            Ok(value) => {
                report.word(address, value);
                result.words.push(Word { address, value });
            }
            Err(e) => {
                let status = e.status().unwrap_or(Status::NONE);
                report.error(address, status);

                match policy {
                    DumpPolicy::HaltOnFailure => {
                        warn!("Error: Dump halted: {e}");
                        result.halted = Some(e);
                        break;
                    }
                    DumpPolicy::RecordGaps => {
                        debug!("Recording gap at {address:#010x}");
                        result.gaps.push(Gap { address, status });
                    }
                }
            }
        }
    }

    report.done();

    let stats = reader.stats();
    info!(
        "Dump done: {} words read, {} failed, {} attempts",
        result.words.len(),
        result.gaps.len() + usize::from(result.halted.is_some()),
        stats.attempts
    );

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn le_image() {
        let result = DumpResult {
            base_address: 0x0800_0000,
            words: vec![
                Word {
                    address: 0x0800_0000,
                    value: 0x2000_1000,
                },
                Word {
                    address: 0x0800_0004,
                    value: 0x0800_00C1,
                },
            ],
            ..Default::default()
        };
        assert!(result.is_complete());
        assert_eq!(
            result.to_le_bytes(),
            Some(vec![0x00, 0x10, 0x00, 0x20, 0xC1, 0x00, 0x00, 0x08])
        );
        assert_eq!(result.to_le_bytes_filled(0), result.to_le_bytes().unwrap());
    }

    #[test]
    fn gaps_keep_later_words_at_their_offset() {
        let result = DumpResult {
            base_address: 0x0800_0000,
            words: vec![
                Word {
                    address: 0x0800_0000,
                    value: 0x1111_1111,
                },
                Word {
                    address: 0x0800_0008,
                    value: 0x3333_3333,
                },
            ],
            gaps: vec![Gap {
                address: 0x0800_0004,
                status: Status::FAULT_AFTER_OK,
            }],
            halted: None,
        };

        assert_eq!(result.to_le_bytes(), None);
        assert_eq!(
            result.to_le_bytes_filled(0xFFFF_FFFF),
            vec![
                0x11, 0x11, 0x11, 0x11, 0xFF, 0xFF, 0xFF, 0xFF, 0x33, 0x33, 0x33, 0x33
            ]
        );
    }

    #[test]
    fn trailing_gap_is_filled() {
        let result = DumpResult {
            base_address: 0x0800_0000,
            words: vec![Word {
                address: 0x0800_0000,
                value: 0x0403_0201,
            }],
            gaps: vec![Gap {
                address: 0x0800_0004,
                status: Status::FAULT,
            }],
            halted: None,
        };
        assert_eq!(
            result.to_le_bytes_filled(0xA5A5_A5A5),
            vec![0x01, 0x02, 0x03, 0x04, 0xA5, 0xA5, 0xA5, 0xA5]
        );
    }

    #[test]
    fn incomplete() {
        let result = DumpResult {
            gaps: vec![Gap {
                address: 0x0800_0000,
                status: Status::FAULT,
            }],
            ..Default::default()
        };
        assert!(!result.is_complete());
        assert_eq!(result.to_le_bytes(), None);
    }

    #[test]
    fn word_display() {
        let word = Word {
            address: 0x0800_00FC,
            value: 0xDEAD_BEEF,
        };
        assert_eq!(word.to_string(), "080000fc: deadbeef");
    }
}
