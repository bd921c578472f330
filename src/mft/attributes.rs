use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mft::record::FileRecordHeader;

pub const ATTR_STANDARD_INFORMATION: u32 = 0x10;
pub const ATTR_ATTRIBUTE_LIST: u32 = 0x20;
pub const ATTR_FILE_NAME: u32 = 0x30;
pub const ATTR_DATA: u32 = 0x80;
pub const ATTR_END: u32 = 0xFFFF_FFFF;

/// Short name for the attribute types a reader is likely to meet.
pub fn type_name(attr_type: u32) -> &'static str {
    match attr_type {
        0x10 => "$STANDARD_INFORMATION",
        0x20 => "$ATTRIBUTE_LIST",
        0x30 => "$FILE_NAME",
        0x40 => "$OBJECT_ID",
        0x50 => "$SECURITY_DESCRIPTOR",
        0x60 => "$VOLUME_NAME",
        0x70 => "$VOLUME_INFORMATION",
        0x80 => "$DATA",
        0x90 => "$INDEX_ROOT",
        0xA0 => "$INDEX_ALLOCATION",
        0xB0 => "$BITMAP",
        0xC0 => "$REPARSE_POINT",
        0x100 => "$LOGGED_UTILITY_STREAM",
        _ => "unknown",
    }
}

/// Where an attribute's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum AttributeForm {
    /// Value is inside the record at `value_offset..value_offset + value_len`
    /// (offsets relative to the record start).
    Resident { value_offset: usize, value_len: usize },
    /// Value lives in clusters described by the run list at `runs_offset`
    /// (relative to the record start) and ending at the attribute end.
    NonResident {
        lowest_vcn: u64,
        highest_vcn: u64,
        runs_offset: usize,
        allocated_size: u64,
        data_size: u64,
    },
}

/// One attribute header, located within a record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeHeader {
    pub attr_type: u32,
    pub offset: usize,
    pub length: usize,
    pub name_length: u8,
    pub attribute_id: u16,
    pub form: AttributeForm,
}

impl AttributeHeader {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn is_named(&self) -> bool {
        self.name_length != 0
    }

    pub fn is_resident(&self) -> bool {
        matches!(self.form, AttributeForm::Resident { .. })
    }

    /// Resident value bytes, or `None` for non-resident attributes.
    pub fn value<'a>(&self, record: &'a [u8]) -> Option<&'a [u8]> {
        match self.form {
            AttributeForm::Resident { value_offset, value_len } => {
                record.get(value_offset..value_offset + value_len)
            }
            AttributeForm::NonResident { .. } => None,
        }
    }
}

/// Walks the attribute headers of a fixed-up record.
///
/// Bounded by the record's bytes-in-use; a header that overruns it or does
/// not advance ends the walk with [`Error::InvalidRecord`].
pub struct AttributeIter<'a> {
    record: u64,
    data: &'a [u8],
    offset: usize,
    used_end: usize,
    done: bool,
}

impl<'a> AttributeIter<'a> {
    pub fn new(record: u64, data: &'a [u8], header: &FileRecordHeader) -> Self {
        let used_end = std::cmp::min(header.bytes_in_use as usize, data.len());
        Self {
            record,
            data,
            offset: header.first_attribute_offset as usize,
            used_end,
            done: false,
        }
    }

    fn invalid(&mut self, reason: &'static str) -> Option<Result<AttributeHeader>> {
        self.done = true;
        Some(Err(Error::InvalidRecord {
            record: self.record,
            reason,
        }))
    }

    fn parse_at(&self, off: usize, attr_type: u32, attr_len: usize) -> std::result::Result<AttributeHeader, &'static str> {
        let buf = self.data;
        let end = off + attr_len;
        if attr_len < 0x18 {
            return Err("attribute header too short");
        }

        let non_resident = buf[off + 8] != 0;
        let name_length = buf[off + 9];
        let attribute_id = LittleEndian::read_u16(&buf[off + 14..off + 16]);

        let form = if non_resident {
            if attr_len < 0x40 {
                return Err("non-resident attribute header too short");
            }
            let runs_rel = LittleEndian::read_u16(&buf[off + 0x20..off + 0x22]) as usize;
            if runs_rel < 0x40 || runs_rel > attr_len {
                return Err("run list offset outside attribute");
            }
            AttributeForm::NonResident {
                lowest_vcn: LittleEndian::read_u64(&buf[off + 0x10..off + 0x18]),
                highest_vcn: LittleEndian::read_u64(&buf[off + 0x18..off + 0x20]),
                runs_offset: off + runs_rel,
                allocated_size: LittleEndian::read_u64(&buf[off + 0x28..off + 0x30]),
                data_size: LittleEndian::read_u64(&buf[off + 0x30..off + 0x38]),
            }
        } else {
            let value_len = LittleEndian::read_u32(&buf[off + 0x10..off + 0x14]) as usize;
            let value_rel = LittleEndian::read_u16(&buf[off + 0x14..off + 0x16]) as usize;
            let value_offset = off + value_rel;
            if value_offset.checked_add(value_len).map_or(true, |v_end| v_end > end) {
                return Err("resident value outside attribute");
            }
            AttributeForm::Resident {
                value_offset,
                value_len,
            }
        };

        Ok(AttributeHeader {
            attr_type,
            offset: off,
            length: attr_len,
            name_length,
            attribute_id,
            form,
        })
    }
}

impl<'a> Iterator for AttributeIter<'a> {
    type Item = Result<AttributeHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let off = self.offset;
        if off + 4 > self.used_end {
            return self.invalid("attributes run past bytes in use");
        }

        let attr_type = LittleEndian::read_u32(&self.data[off..off + 4]);
        if attr_type == ATTR_END {
            self.done = true;
            return None;
        }
        if off + 8 > self.used_end {
            return self.invalid("attributes run past bytes in use");
        }

        let attr_len = LittleEndian::read_u32(&self.data[off + 4..off + 8]) as usize;
        if attr_len == 0 || off.checked_add(attr_len).map_or(true, |end| end > self.used_end) {
            return self.invalid("attribute length runs past bytes in use");
        }

        match self.parse_at(off, attr_type, attr_len) {
            Ok(header) => {
                self.offset = header.end();
                Some(Ok(header))
            }
            Err(reason) => self.invalid(reason),
        }
    }
}

/// One entry of a resident `$ATTRIBUTE_LIST` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeListEntry {
    pub attr_type: u32,
    pub name_length: u8,
    pub lowest_vcn: u64,
    pub record: u64,
    pub sequence_number: u16,
}

/// Decodes the entries of an attribute list value.
pub fn parse_attribute_list(record: u64, value: &[u8]) -> Result<Vec<AttributeListEntry>> {
    let invalid = |reason| Error::InvalidRecord { record, reason };
    let mut entries = Vec::new();
    let mut cur = 0usize;

    while cur + 26 <= value.len() {
        let attr_type = LittleEndian::read_u32(&value[cur..cur + 4]);
        if attr_type == 0 || attr_type == ATTR_END {
            break;
        }
        let entry_len = LittleEndian::read_u16(&value[cur + 4..cur + 6]) as usize;
        if entry_len < 26 || cur + entry_len > value.len() {
            return Err(invalid("attribute list entry runs past its value"));
        }
        let name_length = value[cur + 6];
        let name_offset = value[cur + 7] as usize;
        if name_offset + name_length as usize * 2 > entry_len {
            return Err(invalid("attribute list name runs past its entry"));
        }

        let reference = LittleEndian::read_u64(&value[cur + 16..cur + 24]);
        entries.push(AttributeListEntry {
            attr_type,
            name_length,
            lowest_vcn: LittleEndian::read_u64(&value[cur + 8..cur + 16]),
            record: reference & 0xFFFF_FFFF_FFFF,
            sequence_number: (reference >> 48) as u16,
        });
        cur += entry_len;
    }

    Ok(entries)
}
