//! Read-only NTFS metadata access over a caller-supplied sector reader.
//!
//! [`NtfsVolume::init`] validates the boot sector and derives the volume
//! geometry; [`NtfsVolume::read_file_record`] returns MFT records that have
//! passed the magic check and update sequence repair.

pub mod error;
pub mod io;
pub mod mft;
pub mod volume;

pub use crate::error::{BootFault, Error, Result};
pub use crate::io::{BufferAlloc, FileImage, HeapAlloc, MemoryImage, SectorReader};
pub use crate::mft::boot::VolumeGeometry;
pub use crate::mft::record::{FileRecord, FileRecordHeader, FIRST_USER_RECORD};
pub use crate::volume::{NtfsVolume, VolumeOptions, MFT_RECORD};
