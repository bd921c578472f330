use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a boot sector was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootFault {
    BadOemId,
    BadEndMarker,
    BadGeometry,
}

impl fmt::Display for BootFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootFault::BadOemId => f.write_str("OEM id is not \"NTFS    \""),
            BootFault::BadEndMarker => f.write_str("end marker is not 0xAA55"),
            BootFault::BadGeometry => f.write_str("implausible volume geometry"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("sector read failed at {start_sector} (+{sector_count}): {source}")]
    Io {
        start_sector: u64,
        sector_count: u32,
        #[source]
        source: io::Error,
    },

    #[error("not an NTFS volume: {0}")]
    NotNtfsVolume(BootFault),

    #[error("assumed sector size {0} is too small to hold a boot sector")]
    InvalidSectorSize(u16),

    #[error("file record {record} is invalid: {reason}")]
    InvalidRecord { record: u64, reason: &'static str },

    #[error("update sequence mismatch in sector {sector}: expected {expected:#06x}, found {found:#06x}")]
    FixupMismatch { sector: usize, expected: u16, found: u16 },

    #[error("file record {record} lies outside the reserved range and no MFT run map is loaded")]
    NotSupported { record: u64 },

    #[error("unsupported on-disk layout: {0}")]
    Unsupported(&'static str),

    #[error("offset {offset} is out of bounds for a {len} byte buffer")]
    OutOfBounds { offset: usize, len: usize },

    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("corrupt MFT run list: {0}")]
    CorruptRuns(&'static str),

    #[error("file record {record} is beyond the end of the MFT ({count} records)")]
    RecordOutOfRange { record: u64, count: u64 },
}
