use serde::Serialize;

use ntfs_meta::mft::attributes::{type_name, AttributeHeader};
use ntfs_meta::{Error, FileRecord, FileRecordHeader, VolumeGeometry};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeInfo {
    pub source: String,
    pub partition_offset: u64,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u64,
    pub file_record_size: u32,
    pub index_block_size: u32,
    pub mft_lcn: u64,
    pub mft_mirror_lcn: u64,
    pub mft_start_sector: u64,
    pub total_sectors: u64,
    pub volume_serial_number: String,
    pub mft_records: Option<u64>,
    pub mft_runs: Option<usize>,
}

impl VolumeInfo {
    pub fn new(source: &str, partition_offset: u64, geo: &VolumeGeometry, records: Option<u64>, runs: Option<usize>) -> Self {
        Self {
            source: source.to_string(),
            partition_offset,
            bytes_per_sector: geo.bytes_per_sector,
            sectors_per_cluster: geo.sectors_per_cluster,
            bytes_per_cluster: geo.bytes_per_cluster(),
            file_record_size: geo.file_record_size,
            index_block_size: geo.index_block_size,
            mft_lcn: geo.mft_lcn,
            mft_mirror_lcn: geo.mft_mirror_lcn,
            mft_start_sector: geo.mft_start_sector,
            total_sectors: geo.total_sectors,
            volume_serial_number: format!("{:016X}", geo.volume_serial_number),
            mft_records: records,
            mft_runs: runs,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeSummary {
    pub type_name: &'static str,
    pub named: bool,
    pub resident: bool,
    #[serde(flatten)]
    pub header: AttributeHeader,
}

/// Header view of one successfully read record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordReport {
    pub entry_number: u64,
    pub update_sequence_number: u16,
    pub in_use: bool,
    pub is_directory: bool,
    pub base_record: Option<u64>,
    #[serde(flatten)]
    pub header: FileRecordHeader,
    pub attributes: Vec<AttributeSummary>,
    /// Set when the attribute walk stopped on a malformed header.
    pub attribute_error: Option<String>,
}

impl RecordReport {
    pub fn new(record: &FileRecord, usn: u16) -> Self {
        let mut attributes = Vec::new();
        let mut attribute_error = None;
        for attr in record.attributes() {
            match attr {
                Ok(header) => attributes.push(AttributeSummary {
                    type_name: type_name(header.attr_type),
                    named: header.is_named(),
                    resident: header.is_resident(),
                    header,
                }),
                Err(e) => attribute_error = Some(e.to_string()),
            }
        }

        Self {
            entry_number: record.number,
            update_sequence_number: usn,
            in_use: record.header.is_in_use(),
            is_directory: record.header.is_directory(),
            base_record: record.header.base_record(),
            header: record.header.clone(),
            attributes,
            attribute_error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    Invalid,
    FixupMismatch,
    OutOfRange,
    Error,
}

impl From<&Error> for RecordStatus {
    fn from(e: &Error) -> Self {
        match e {
            Error::InvalidRecord { .. } => RecordStatus::Invalid,
            Error::FixupMismatch { .. } => RecordStatus::FixupMismatch,
            Error::RecordOutOfRange { .. } | Error::NotSupported { .. } => RecordStatus::OutOfRange,
            _ => RecordStatus::Error,
        }
    }
}

/// One line of a dump: either a record report or the reason it was rejected.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DumpEntry {
    pub entry_number: u64,
    pub status: RecordStatus,
    pub error: Option<String>,
    pub record: Option<RecordReport>,
}
