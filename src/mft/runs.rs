//! Non-resident run lists and the `$MFT` record map built from them.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::mft::boot::VolumeGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataRun {
    pub vcn_start: u64,
    pub length: u64,
    pub lcn: u64,
    pub is_sparse: bool,
}

impl DataRun {
    pub fn vcn_end(&self) -> u64 {
        self.vcn_start + self.length
    }
}

/// Decodes the run list in `bytes`, starting at VCN `start_vcn`.
///
/// Each run is a header byte (low nibble: size of the length field, high
/// nibble: size of the LCN delta field) followed by an unsigned length and a
/// signed delta from the previous run's LCN. A zero header ends the list; a
/// zero-size delta marks a sparse run.
pub fn decode_runs(bytes: &[u8], start_vcn: u64) -> Result<Vec<DataRun>> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    let mut current_vcn = start_vcn;
    let mut current_lcn: i64 = 0;

    loop {
        let Some(&header) = bytes.get(pos) else {
            return Err(Error::CorruptRuns("run list has no terminator"));
        };
        if header == 0 {
            break;
        }
        pos += 1;

        let len_bytes = (header & 0x0F) as usize;
        let off_bytes = (header >> 4) as usize;
        if len_bytes == 0 || len_bytes > 8 || off_bytes > 8 {
            return Err(Error::CorruptRuns("bad field sizes in run header"));
        }
        if pos + len_bytes + off_bytes > bytes.len() {
            return Err(Error::CorruptRuns("run fields past end of attribute"));
        }

        let mut length: u64 = 0;
        for (i, &b) in bytes[pos..pos + len_bytes].iter().enumerate() {
            length |= (b as u64) << (i * 8);
        }
        pos += len_bytes;
        if length == 0 {
            return Err(Error::CorruptRuns("zero-length run"));
        }

        let mut delta: i64 = 0;
        if off_bytes > 0 {
            let field = &bytes[pos..pos + off_bytes];
            for (i, &b) in field.iter().enumerate() {
                delta |= (b as i64) << (i * 8);
            }
            if off_bytes < 8 && field[off_bytes - 1] & 0x80 != 0 {
                delta |= -1i64 << (off_bytes * 8);
            }
        }
        pos += off_bytes;

        let is_sparse = off_bytes == 0;
        let lcn = if is_sparse {
            0
        } else {
            current_lcn = current_lcn
                .checked_add(delta)
                .ok_or(Error::CorruptRuns("LCN overflow"))?;
            if current_lcn < 0 {
                return Err(Error::CorruptRuns("negative LCN"));
            }
            current_lcn as u64
        };

        runs.push(DataRun {
            vcn_start: current_vcn,
            length,
            lcn,
            is_sparse,
        });
        current_vcn = current_vcn
            .checked_add(length)
            .ok_or(Error::CorruptRuns("VCN overflow"))?;
    }

    Ok(runs)
}

/// A contiguous piece of a record on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectorSpan {
    pub start_sector: u64,
    pub sector_count: u32,
}

/// Cluster layout of the `$MFT` data stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MftMap {
    runs: Vec<DataRun>,
    total_clusters: u64,
    record_count: u64,
}

impl MftMap {
    /// Sorts `runs` by VCN and checks that they cover `0..n` without gaps or
    /// overlaps.
    pub fn new(mut runs: Vec<DataRun>, geometry: &VolumeGeometry) -> Result<Self> {
        if runs.is_empty() {
            return Err(Error::CorruptRuns("no runs for $MFT data"));
        }
        runs.sort_by_key(|r| r.vcn_start);

        let mut expected = 0u64;
        for run in &runs {
            if run.vcn_start > expected {
                return Err(Error::CorruptRuns("gap in $MFT VCN range"));
            }
            if run.vcn_start < expected {
                return Err(Error::CorruptRuns("overlapping $MFT runs"));
            }
            expected = expected
                .checked_add(run.length)
                .ok_or(Error::CorruptRuns("VCN overflow"))?;
        }

        let record_count = expected
            .checked_mul(geometry.bytes_per_cluster())
            .ok_or(Error::CorruptRuns("$MFT size overflow"))?
            / geometry.file_record_size as u64;

        Ok(Self {
            runs,
            total_clusters: expected,
            record_count,
        })
    }

    /// Caps the record count at the stream's `data_size`. Allocated
    /// clusters past it hold no records.
    pub fn with_data_size(mut self, data_size: u64, geometry: &VolumeGeometry) -> Self {
        let records = data_size / geometry.file_record_size as u64;
        self.record_count = self.record_count.min(records);
        self
    }

    pub fn runs(&self) -> &[DataRun] {
        &self.runs
    }

    pub fn total_clusters(&self) -> u64 {
        self.total_clusters
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Translates a record number into the sector spans holding it.
    ///
    /// A record larger than a cluster may straddle two runs, so more than
    /// one span can come back.
    pub fn locate(&self, record: u64, geometry: &VolumeGeometry) -> Result<Vec<SectorSpan>> {
        if record >= self.record_count {
            return Err(Error::RecordOutOfRange {
                record,
                count: self.record_count,
            });
        }

        let bps = geometry.bytes_per_sector as u64;
        let spc = geometry.sectors_per_cluster as u64;
        let overflow = || Error::CorruptRuns("sector number overflow");
        let mut sector_in_mft = record
            .checked_mul(geometry.file_record_size as u64 / bps)
            .ok_or_else(overflow)?;
        let mut remaining = geometry.sectors_per_file_record() as u64;
        let mut spans: Vec<SectorSpan> = Vec::new();

        while remaining > 0 {
            let vcn = sector_in_mft / spc;
            let run = self
                .runs
                .iter()
                .find(|r| vcn >= r.vcn_start && vcn < r.vcn_end())
                .ok_or(Error::RecordOutOfRange {
                    record,
                    count: self.record_count,
                })?;
            if run.is_sparse {
                return Err(Error::InvalidRecord {
                    record,
                    reason: "record lies in a sparse region of $MFT",
                });
            }

            let run_sector = run.vcn_start.checked_mul(spc).ok_or_else(overflow)?;
            let offset_in_run = sector_in_mft - run_sector;
            let available = run.length.checked_mul(spc).ok_or_else(overflow)? - offset_in_run;
            let take = remaining.min(available);
            let start_sector = run
                .lcn
                .checked_mul(spc)
                .and_then(|s| s.checked_add(offset_in_run))
                .ok_or_else(overflow)?;

            match spans.last_mut() {
                Some(last) if last.start_sector.checked_add(last.sector_count as u64) == Some(start_sector) => {
                    last.sector_count += take as u32;
                }
                _ => spans.push(SectorSpan {
                    start_sector,
                    sector_count: take as u32,
                }),
            }

            sector_in_mft += take;
            remaining -= take;
        }

        Ok(spans)
    }
}
