use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::io::{BufferAlloc, HeapAlloc, SectorReader};
use crate::mft::attributes::{
    parse_attribute_list, AttributeForm, AttributeHeader, AttributeListEntry, ATTR_ATTRIBUTE_LIST, ATTR_DATA,
};
use crate::mft::boot::{NtfsBootSector, VolumeGeometry, BOOT_SECTOR_LEN};
use crate::mft::fixup;
use crate::mft::record::{FileRecord, FileRecordHeader, FIRST_USER_RECORD};
use crate::mft::runs::{decode_runs, DataRun, MftMap, SectorSpan};

/// Record number of `$MFT` itself.
pub const MFT_RECORD: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeOptions {
    /// Sector size used for the boot sector read, before the real one is known.
    pub assumed_bytes_per_sector: u16,
    /// Decode `$MFT`'s run list at init so records past the reserved range
    /// can be read.
    pub map_mft: bool,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            assumed_bytes_per_sector: 512,
            map_mft: false,
        }
    }
}

/// An initialized, read-only NTFS volume.
pub struct NtfsVolume<R, A = HeapAlloc> {
    reader: R,
    alloc: A,
    geometry: VolumeGeometry,
    mft_map: Option<MftMap>,
}

impl<R: SectorReader> NtfsVolume<R, HeapAlloc> {
    /// Reads and validates the boot sector. Records past the reserved range
    /// are not readable on a volume opened this way.
    pub fn init(reader: R, assumed_bytes_per_sector: u16) -> Result<Self> {
        Self::with_options(
            reader,
            HeapAlloc,
            VolumeOptions {
                assumed_bytes_per_sector,
                ..VolumeOptions::default()
            },
        )
    }
}

impl<R: SectorReader, A: BufferAlloc> NtfsVolume<R, A> {
    pub fn with_options(reader: R, alloc: A, options: VolumeOptions) -> Result<Self> {
        let geometry = read_geometry(&reader, &alloc, options.assumed_bytes_per_sector)?;

        info!(
            "NTFS volume: {} bytes/sector, {} sectors/cluster, file record {} bytes, index block {} bytes, MFT at sector {}",
            geometry.bytes_per_sector,
            geometry.sectors_per_cluster,
            geometry.file_record_size,
            geometry.index_block_size,
            geometry.mft_start_sector,
        );

        let mut volume = Self {
            reader,
            alloc,
            geometry,
            mft_map: None,
        };
        if options.map_mft {
            let map = volume.load_mft_map()?;
            debug!(
                "$MFT mapped: {} runs, {} clusters, {} records",
                map.runs().len(),
                map.total_clusters(),
                map.record_count()
            );
            volume.mft_map = Some(map);
        }
        Ok(volume)
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn mft_map(&self) -> Option<&MftMap> {
        self.mft_map.as_ref()
    }

    /// Number of records covered by the `$MFT` map, if one was loaded.
    pub fn record_count(&self) -> Option<u64> {
        self.mft_map.as_ref().map(MftMap::record_count)
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Sector spans holding `record`.
    ///
    /// With a run map every record but `$MFT` itself goes through the map.
    /// Without one, reserved records are assumed contiguous at the start of
    /// the MFT and anything else fails with [`Error::NotSupported`] before
    /// any I/O.
    pub fn locate_record(&self, record: u64) -> Result<Vec<SectorSpan>> {
        match &self.mft_map {
            Some(map) if record != MFT_RECORD => map.locate(record, &self.geometry),
            _ if record <= FIRST_USER_RECORD => self.locate_reserved(record).map(|span| vec![span]),
            _ => Err(Error::NotSupported { record }),
        }
    }

    /// Reads, checks and fixes up `record` into a freshly allocated buffer.
    pub fn read_file_record(&self, record: u64) -> Result<FileRecord> {
        let spans = self.locate_record(record)?;
        self.read_record_spans(record, &spans)
    }

    /// Same as [`NtfsVolume::read_file_record`] but into a caller buffer of at
    /// least `file_record_size` bytes. On error the buffer content is
    /// unspecified and must not be used.
    pub fn read_file_record_into(&self, record: u64, buf: &mut [u8]) -> Result<FileRecordHeader> {
        let size = self.geometry.file_record_size as usize;
        if buf.len() < size {
            return Err(Error::BufferTooSmall {
                needed: size,
                got: buf.len(),
            });
        }
        let spans = self.locate_record(record)?;
        self.fill_record(record, &spans, &mut buf[..size])
    }

    fn locate_reserved(&self, record: u64) -> Result<SectorSpan> {
        let per_record = self.geometry.sectors_per_file_record();
        let start_sector = record
            .checked_mul(per_record as u64)
            .and_then(|off| off.checked_add(self.geometry.mft_start_sector))
            .ok_or(Error::RecordOutOfRange {
                record,
                count: FIRST_USER_RECORD + 1,
            })?;
        Ok(SectorSpan {
            start_sector,
            sector_count: per_record,
        })
    }

    fn read_record_spans(&self, record: u64, spans: &[SectorSpan]) -> Result<FileRecord> {
        let mut data = self.alloc.allocate(self.geometry.file_record_size as usize);
        match self.fill_record(record, spans, &mut data) {
            Ok(header) => Ok(FileRecord {
                number: record,
                header,
                data,
            }),
            Err(e) => {
                self.alloc.release(data);
                Err(e)
            }
        }
    }

    fn fill_record(&self, record: u64, spans: &[SectorSpan], buf: &mut [u8]) -> Result<FileRecordHeader> {
        let bps = self.geometry.bytes_per_sector;
        let mut filled = 0usize;
        for span in spans {
            let len = span.sector_count as usize * bps as usize;
            let dst = buf.get_mut(filled..filled + len).ok_or(Error::OutOfBounds {
                offset: filled + len,
                len: self.geometry.file_record_size as usize,
            })?;
            self.reader
                .read_sectors(span.start_sector, span.sector_count, bps, dst)
                .map_err(|source| {
                    warn!("unable to read file record {}: {}", record, source);
                    Error::Io {
                        start_sector: span.start_sector,
                        sector_count: span.sector_count,
                        source,
                    }
                })?;
            filled += len;
        }

        self.verify_record(record, buf).map_err(|e| {
            warn!("file record {} rejected: {}", record, e);
            e
        })
    }

    fn verify_record(&self, record: u64, buf: &mut [u8]) -> Result<FileRecordHeader> {
        let header = FileRecordHeader::parse(record, buf)?;
        let sectors = self.geometry.sectors_per_file_record() as usize;
        header.check_update_sequence(record, buf.len(), sectors)?;
        fixup::verify_and_repair(
            buf,
            sectors,
            header.update_sequence_offset as usize,
            self.geometry.bytes_per_sector as usize,
        )?;
        Ok(header)
    }

    /// Builds the `$MFT` run map from record 0, following a resident
    /// `$ATTRIBUTE_LIST` into extension records when the run list is split.
    fn load_mft_map(&self) -> Result<MftMap> {
        let spans = [self.locate_reserved(MFT_RECORD)?];
        let mft = self.read_record_spans(MFT_RECORD, &spans)?;

        let mut runs = Vec::new();
        let mut data_size = None;
        let mut extents = Vec::new();
        for attr in mft.attributes() {
            let attr = attr?;
            match attr.attr_type {
                ATTR_ATTRIBUTE_LIST => {
                    let value = attr
                        .value(&mft.data)
                        .ok_or(Error::Unsupported("non-resident $ATTRIBUTE_LIST on $MFT"))?;
                    extents.extend(
                        parse_attribute_list(MFT_RECORD, value)?
                            .into_iter()
                            .filter(|e| e.attr_type == ATTR_DATA && e.name_length == 0 && e.record != MFT_RECORD),
                    );
                }
                ATTR_DATA if !attr.is_named() => {
                    if let AttributeForm::NonResident {
                        lowest_vcn: 0,
                        data_size: size,
                        ..
                    } = attr.form
                    {
                        data_size = Some(size);
                    }
                    runs.extend(data_runs(&mft.data, &attr)?);
                }
                _ => {}
            }
        }
        if runs.is_empty() {
            return Err(Error::CorruptRuns("$MFT has no unnamed $DATA run list"));
        }
        if !extents.is_empty() {
            self.collect_extension_runs(&mut runs, extents)?;
        }

        let map = MftMap::new(runs, &self.geometry)?;
        Ok(match data_size {
            Some(size) => map.with_data_size(size, &self.geometry),
            None => map,
        })
    }

    /// Appends the `$DATA` runs held by `$MFT` extension records. They are
    /// located through the runs already known from record 0.
    fn collect_extension_runs(&self, runs: &mut Vec<DataRun>, extents: Vec<AttributeListEntry>) -> Result<()> {
        let base = MftMap::new(runs.clone(), &self.geometry)?;
        for target in extents {
            let spans = base.locate(target.record, &self.geometry)?;
            let ext = self.read_record_spans(target.record, &spans)?;
            if ext.header.sequence_number != target.sequence_number {
                return Err(Error::InvalidRecord {
                    record: target.record,
                    reason: "$MFT extension record has a stale sequence number",
                });
            }

            for attr in ext.attributes() {
                let attr = attr?;
                if attr.attr_type != ATTR_DATA || attr.is_named() {
                    continue;
                }
                if let AttributeForm::NonResident { lowest_vcn, .. } = attr.form {
                    if lowest_vcn == target.lowest_vcn {
                        runs.extend(data_runs(&ext.data, &attr)?);
                    }
                }
            }
        }
        Ok(())
    }
}

fn data_runs(record: &[u8], attr: &AttributeHeader) -> Result<Vec<DataRun>> {
    match attr.form {
        AttributeForm::NonResident {
            lowest_vcn,
            runs_offset,
            ..
        } => {
            let bytes = record.get(runs_offset..attr.end()).ok_or(Error::OutOfBounds {
                offset: attr.end(),
                len: record.len(),
            })?;
            decode_runs(bytes, lowest_vcn)
        }
        AttributeForm::Resident { .. } => Err(Error::CorruptRuns("$MFT $DATA is resident")),
    }
}

fn read_geometry<R: SectorReader, A: BufferAlloc>(reader: &R, alloc: &A, assumed_bytes_per_sector: u16) -> Result<VolumeGeometry> {
    if (assumed_bytes_per_sector as usize) < BOOT_SECTOR_LEN {
        return Err(Error::InvalidSectorSize(assumed_bytes_per_sector));
    }

    let mut scratch = alloc.allocate(assumed_bytes_per_sector as usize);
    let result = match reader.read_sectors(0, 1, assumed_bytes_per_sector, &mut scratch) {
        Ok(()) => NtfsBootSector::parse(&scratch).and_then(|boot| {
            VolumeGeometry::from_boot_sector(&boot).map_err(|e| {
                warn!(
                    "volume isn't NTFS [OemId: {:?}] [EndMarker: {:#06X}]: {}",
                    boot.oem_id_lossy(),
                    boot.end_marker,
                    e
                );
                e
            })
        }),
        Err(source) => {
            warn!("failed to read boot sector: {}", source);
            Err(Error::Io {
                start_sector: 0,
                sector_count: 1,
                source,
            })
        }
    };
    alloc.release(scratch);
    result
}
