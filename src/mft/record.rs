use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mft::attributes::AttributeIter;

pub const FILE_RECORD_MAGIC: &[u8; 4] = b"FILE";

/// Length of the fixed part of a file record header (NTFS 3.1).
pub const FILE_RECORD_HEADER_LEN: usize = 0x2A;

/// Reserved system records: `$MFT` through `$Extend` and the spares after
/// it. Everything up to and including this number is located without the
/// MFT run map.
pub const FIRST_USER_RECORD: u64 = 16;

pub const RECORD_IN_USE: u16 = 0x01;
pub const RECORD_IS_DIRECTORY: u16 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecordHeader {
    pub update_sequence_offset: u16,
    pub update_sequence_count: u16,
    pub logfile_sequence_number: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub first_attribute_offset: u16,
    pub flags: u16,
    pub bytes_in_use: u32,
    pub bytes_allocated: u32,
    pub base_record_reference: u64,
    pub next_attribute_id: u16,
}

impl FileRecordHeader {
    /// Parses the header of record `record`. Only the magic is checked here.
    pub fn parse(record: u64, data: &[u8]) -> Result<Self> {
        if data.len() < FILE_RECORD_HEADER_LEN {
            return Err(Error::InvalidRecord {
                record,
                reason: "record shorter than its header",
            });
        }
        if &data[0..4] != FILE_RECORD_MAGIC {
            return Err(Error::InvalidRecord {
                record,
                reason: "magic is not FILE",
            });
        }

        Ok(Self {
            update_sequence_offset: LittleEndian::read_u16(&data[4..6]),
            update_sequence_count: LittleEndian::read_u16(&data[6..8]),
            logfile_sequence_number: LittleEndian::read_u64(&data[8..16]),
            sequence_number: LittleEndian::read_u16(&data[16..18]),
            hard_link_count: LittleEndian::read_u16(&data[18..20]),
            first_attribute_offset: LittleEndian::read_u16(&data[20..22]),
            flags: LittleEndian::read_u16(&data[22..24]),
            bytes_in_use: LittleEndian::read_u32(&data[24..28]),
            bytes_allocated: LittleEndian::read_u32(&data[28..32]),
            base_record_reference: LittleEndian::read_u64(&data[32..40]),
            next_attribute_id: LittleEndian::read_u16(&data[40..42]),
        })
    }

    /// Checks that the update sequence array fits inside a record of
    /// `record_len` bytes and covers all `sectors`.
    pub fn check_update_sequence(&self, record: u64, record_len: usize, sectors: usize) -> Result<()> {
        let usa_offset = self.update_sequence_offset as usize;
        let usa_count = self.update_sequence_count as usize;

        if usa_offset < 8 || usa_offset % 2 != 0 {
            return Err(Error::InvalidRecord {
                record,
                reason: "misaligned update sequence offset",
            });
        }
        if usa_count < sectors + 1 {
            return Err(Error::InvalidRecord {
                record,
                reason: "update sequence array does not cover every sector",
            });
        }
        if usa_offset + usa_count * 2 > record_len {
            return Err(Error::InvalidRecord {
                record,
                reason: "update sequence array runs past the record",
            });
        }
        Ok(())
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & RECORD_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & RECORD_IS_DIRECTORY != 0
    }

    /// Record number of the base record, or `None` if this is a base record.
    pub fn base_record(&self) -> Option<u64> {
        let number = self.base_record_reference & 0xFFFF_FFFF_FFFF;
        if number == 0 {
            None
        } else {
            Some(number)
        }
    }
}

/// A file record that passed the magic check and fixup repair.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub number: u64,
    pub header: FileRecordHeader,
    pub data: Vec<u8>,
}

impl FileRecord {
    pub fn attributes(&self) -> AttributeIter<'_> {
        AttributeIter::new(self.number, &self.data, &self.header)
    }
}
