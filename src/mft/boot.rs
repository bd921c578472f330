use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{BootFault, Error, Result};

pub const NTFS_OEM_ID: &[u8; 8] = b"NTFS    ";
pub const BOOT_END_MARKER: u16 = 0xAA55;

/// Size of the on-disk boot sector structure, independent of the device's
/// physical sector size.
pub const BOOT_SECTOR_LEN: usize = 512;

/// Raw fields of the NTFS volume boot record.
#[derive(Debug, Clone)]
pub struct NtfsBootSector {
    pub oem_id: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster_raw: u8,
    pub total_sectors: u64,
    pub mft_lcn: u64,
    pub mft_mirror_lcn: u64,
    pub clusters_per_file_record: i8,
    pub clusters_per_index_block: i8,
    pub volume_serial_number: u64,
    pub end_marker: u16,
}

impl NtfsBootSector {
    /// Decodes the fields without judging them; see [`NtfsBootSector::validate`].
    pub fn parse(vbr: &[u8]) -> Result<Self> {
        if vbr.len() < BOOT_SECTOR_LEN {
            return Err(Error::OutOfBounds {
                offset: BOOT_SECTOR_LEN,
                len: vbr.len(),
            });
        }

        let mut oem_id = [0u8; 8];
        oem_id.copy_from_slice(&vbr[3..11]);

        Ok(Self {
            oem_id,
            bytes_per_sector: LittleEndian::read_u16(&vbr[0x0B..0x0D]),
            sectors_per_cluster_raw: vbr[0x0D],
            total_sectors: LittleEndian::read_u64(&vbr[0x28..0x30]),
            mft_lcn: LittleEndian::read_u64(&vbr[0x30..0x38]),
            mft_mirror_lcn: LittleEndian::read_u64(&vbr[0x38..0x40]),
            clusters_per_file_record: vbr[0x40] as i8,
            clusters_per_index_block: vbr[0x44] as i8,
            volume_serial_number: LittleEndian::read_u64(&vbr[0x48..0x50]),
            end_marker: LittleEndian::read_u16(&vbr[0x1FE..0x200]),
        })
    }

    /// Signature checks. Nothing else in the sector is trusted until both pass.
    pub fn validate(&self) -> Result<()> {
        if &self.oem_id != NTFS_OEM_ID {
            return Err(Error::NotNtfsVolume(BootFault::BadOemId));
        }
        if self.end_marker != BOOT_END_MARKER {
            return Err(Error::NotNtfsVolume(BootFault::BadEndMarker));
        }
        Ok(())
    }

    /// Values above 0x80 encode `2^(256 - n)` sectors, used by volumes with
    /// clusters larger than 64 KiB.
    pub fn sectors_per_cluster(&self) -> u32 {
        let raw = self.sectors_per_cluster_raw;
        if raw > 0x80 {
            let shift = 256 - raw as u32;
            if shift > 31 {
                0
            } else {
                1u32 << shift
            }
        } else {
            raw as u32
        }
    }

    pub fn oem_id_lossy(&self) -> String {
        String::from_utf8_lossy(&self.oem_id).into_owned()
    }
}

/// Converts a signed "clusters per structure" field into bytes.
///
/// Non-negative counts are whole clusters; negative counts are a power of
/// two byte size (`-10` means 1024 bytes). `None` on overflow.
pub fn clusters_to_bytes(count: i8, bytes_per_sector: u16, sectors_per_cluster: u32) -> Option<u32> {
    if count >= 0 {
        (bytes_per_sector as u32)
            .checked_mul(sectors_per_cluster)?
            .checked_mul(count as u32)
    } else {
        let pow = -(count as i32) as u32;
        if pow > 31 {
            None
        } else {
            Some(1u32 << pow)
        }
    }
}

/// Geometry derived from a validated boot sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u32,
    pub file_record_size: u32,
    pub index_block_size: u32,
    pub mft_start_sector: u64,
    pub mft_lcn: u64,
    pub mft_mirror_lcn: u64,
    pub total_sectors: u64,
    pub volume_serial_number: u64,
}

impl VolumeGeometry {
    pub fn from_boot_sector(boot: &NtfsBootSector) -> Result<Self> {
        boot.validate()?;

        let bad = || Error::NotNtfsVolume(BootFault::BadGeometry);

        let bps = boot.bytes_per_sector;
        if !bps.is_power_of_two() || !(256..=4096).contains(&bps) {
            return Err(bad());
        }
        let spc = boot.sectors_per_cluster();
        if spc == 0 {
            return Err(bad());
        }

        let file_record_size = clusters_to_bytes(boot.clusters_per_file_record, bps, spc).ok_or_else(bad)?;
        let index_block_size = clusters_to_bytes(boot.clusters_per_index_block, bps, spc).ok_or_else(bad)?;
        if file_record_size == 0 || file_record_size % bps as u32 != 0 || index_block_size == 0 {
            return Err(bad());
        }

        let mft_start_sector = boot.mft_lcn.checked_mul(spc as u64).ok_or_else(bad)?;

        Ok(Self {
            bytes_per_sector: bps,
            sectors_per_cluster: spc,
            file_record_size,
            index_block_size,
            mft_start_sector,
            mft_lcn: boot.mft_lcn,
            mft_mirror_lcn: boot.mft_mirror_lcn,
            total_sectors: boot.total_sectors,
            volume_serial_number: boot.volume_serial_number,
        })
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    pub fn sectors_per_file_record(&self) -> u32 {
        self.file_record_size / self.bytes_per_sector as u32
    }
}
