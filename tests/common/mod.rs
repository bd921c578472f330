//! Synthetic NTFS volumes for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

pub const BPS: usize = 512;
pub const SPC: usize = 8;
pub const CLUSTER: usize = BPS * SPC;
pub const RECORD_SIZE: usize = 1024;
pub const SECTORS_PER_RECORD: usize = RECORD_SIZE / BPS;

pub const USA_OFFSET: usize = 0x30;
pub const FIRST_ATTR: usize = 0x38;

/// `$MFT` layout used by most tests: records 0..20 at LCN 4, records 20..32
/// at LCN 40.
pub const MFT_RUNS: &[(u64, u64)] = &[(4, 5), (40, 3)];
pub const MFT_RECORDS: u64 = 32;
pub const IMAGE_CLUSTERS: usize = 48;

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

pub fn resident_attr(attr_type: u32, id: u16, value: &[u8]) -> Vec<u8> {
    let len = align8(0x18 + value.len());
    let mut a = vec![0u8; len];
    a[0..4].copy_from_slice(&attr_type.to_le_bytes());
    a[4..8].copy_from_slice(&(len as u32).to_le_bytes());
    a[0x0A..0x0C].copy_from_slice(&0x18u16.to_le_bytes());
    a[0x0E..0x10].copy_from_slice(&id.to_le_bytes());
    a[0x10..0x14].copy_from_slice(&(value.len() as u32).to_le_bytes());
    a[0x14..0x16].copy_from_slice(&0x18u16.to_le_bytes());
    a[0x18..0x18 + value.len()].copy_from_slice(value);
    a
}

fn unsigned_le(v: u64) -> Vec<u8> {
    let mut out = v.to_le_bytes().to_vec();
    while out.len() > 1 && out[out.len() - 1] == 0 {
        out.pop();
    }
    out
}

fn signed_le(v: i64) -> Vec<u8> {
    let bytes = v.to_le_bytes();
    let mut n = 8;
    while n > 1 {
        let top = bytes[n - 1];
        let sign = bytes[n - 2] & 0x80;
        if (top == 0 && sign == 0) || (top == 0xFF && sign != 0) {
            n -= 1;
        } else {
            break;
        }
    }
    bytes[..n].to_vec()
}

/// Encodes `(lcn, length)` runs as a mapping-pairs list with terminator.
pub fn encode_runs(runs: &[(u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev = 0i64;
    for &(lcn, len) in runs {
        let len_bytes = unsigned_le(len);
        let off_bytes = signed_le(lcn as i64 - prev);
        out.push(((off_bytes.len() as u8) << 4) | len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(&off_bytes);
        prev = lcn as i64;
    }
    out.push(0);
    out
}

/// Unnamed non-resident `$DATA`. `data_size` is only meaningful on the
/// extent starting at VCN 0; later extents carry 0 like real volumes do.
pub fn nonresident_data_attr(id: u16, lowest_vcn: u64, runs: &[(u64, u64)], data_size: u64) -> Vec<u8> {
    let encoded = encode_runs(runs);
    let clusters: u64 = runs.iter().map(|r| r.1).sum();
    let len = align8(0x40 + encoded.len());
    let allocated = (lowest_vcn + clusters) * CLUSTER as u64;

    let mut a = vec![0u8; len];
    a[0..4].copy_from_slice(&0x80u32.to_le_bytes());
    a[4..8].copy_from_slice(&(len as u32).to_le_bytes());
    a[8] = 1;
    a[0x0A..0x0C].copy_from_slice(&0x40u16.to_le_bytes());
    a[0x0E..0x10].copy_from_slice(&id.to_le_bytes());
    a[0x10..0x18].copy_from_slice(&lowest_vcn.to_le_bytes());
    a[0x18..0x20].copy_from_slice(&(lowest_vcn + clusters - 1).to_le_bytes());
    a[0x20..0x22].copy_from_slice(&0x40u16.to_le_bytes());
    a[0x28..0x30].copy_from_slice(&allocated.to_le_bytes());
    a[0x30..0x38].copy_from_slice(&data_size.to_le_bytes());
    a[0x38..0x40].copy_from_slice(&data_size.to_le_bytes());
    a[0x40..0x40 + encoded.len()].copy_from_slice(&encoded);
    a
}

/// `(type, lowest_vcn, record, sequence)` entries of a resident attribute list.
pub fn attribute_list_attr(entries: &[(u32, u64, u64, u16)]) -> Vec<u8> {
    let mut value = Vec::new();
    for (i, &(attr_type, lowest_vcn, record, seq)) in entries.iter().enumerate() {
        let mut e = vec![0u8; 32];
        e[0..4].copy_from_slice(&attr_type.to_le_bytes());
        e[4..6].copy_from_slice(&32u16.to_le_bytes());
        e[7] = 0x1A;
        e[8..16].copy_from_slice(&lowest_vcn.to_le_bytes());
        e[16..24].copy_from_slice(&(((seq as u64) << 48) | record).to_le_bytes());
        e[24..26].copy_from_slice(&(i as u16).to_le_bytes());
        value.extend_from_slice(&e);
    }
    resident_attr(0x20, 0, &value)
}

pub fn standard_information() -> Vec<u8> {
    resident_attr(0x10, 0, &[0x11u8; 0x48])
}

/// A file record as it looks after fixup (`expected`) and as stored on disk
/// with every sector tail replaced by the USN (`on_disk`).
pub struct BuiltRecord {
    pub expected: Vec<u8>,
    pub on_disk: Vec<u8>,
}

pub fn file_record(number: u64, seq: u16, flags: u16, usn: u16, attrs: &[Vec<u8>]) -> BuiltRecord {
    let mut rec = vec![0u8; RECORD_SIZE];
    for (i, b) in rec.iter_mut().enumerate() {
        *b = (i as u8) ^ (number as u8) ^ 0x5A;
    }

    let mut off = FIRST_ATTR;
    for attr in attrs {
        rec[off..off + attr.len()].copy_from_slice(attr);
        off += attr.len();
    }
    rec[off..off + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    rec[off + 4..off + 8].fill(0);
    let bytes_in_use = off + 8;

    rec[0..4].copy_from_slice(b"FILE");
    rec[4..6].copy_from_slice(&(USA_OFFSET as u16).to_le_bytes());
    rec[6..8].copy_from_slice(&((SECTORS_PER_RECORD + 1) as u16).to_le_bytes());
    rec[8..16].copy_from_slice(&(0x1000 + number).to_le_bytes());
    rec[16..18].copy_from_slice(&seq.to_le_bytes());
    rec[18..20].copy_from_slice(&1u16.to_le_bytes());
    rec[20..22].copy_from_slice(&(FIRST_ATTR as u16).to_le_bytes());
    rec[22..24].copy_from_slice(&flags.to_le_bytes());
    rec[24..28].copy_from_slice(&(bytes_in_use as u32).to_le_bytes());
    rec[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    rec[32..40].fill(0);
    rec[40..42].copy_from_slice(&(attrs.len() as u16).to_le_bytes());
    rec[42..44].fill(0);
    rec[44..48].copy_from_slice(&(number as u32).to_le_bytes());

    rec[USA_OFFSET..USA_OFFSET + 2].copy_from_slice(&usn.to_le_bytes());
    for s in 0..SECTORS_PER_RECORD {
        let tail = (s + 1) * BPS - 2;
        let entry = USA_OFFSET + 2 + s * 2;
        let real = [rec[tail], rec[tail + 1]];
        rec[entry..entry + 2].copy_from_slice(&real);
    }
    let expected = rec.clone();

    for s in 0..SECTORS_PER_RECORD {
        let tail = (s + 1) * BPS - 2;
        rec[tail..tail + 2].copy_from_slice(&usn.to_le_bytes());
    }

    BuiltRecord {
        expected,
        on_disk: rec,
    }
}

pub struct ImageBuilder {
    pub image: Vec<u8>,
    pub mft_runs: Vec<(u64, u64)>,
    pub expected: BTreeMap<u64, Vec<u8>>,
}

impl ImageBuilder {
    pub fn new(mft_runs: &[(u64, u64)]) -> Self {
        let mut b = Self {
            image: vec![0u8; IMAGE_CLUSTERS * CLUSTER],
            mft_runs: mft_runs.to_vec(),
            expected: BTreeMap::new(),
        };
        b.write_boot_sector();
        b
    }

    fn write_boot_sector(&mut self) {
        let mft_lcn = self.mft_runs[0].0;
        let vbr = &mut self.image[0..BPS];
        vbr[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
        vbr[3..11].copy_from_slice(b"NTFS    ");
        vbr[0x0B..0x0D].copy_from_slice(&(BPS as u16).to_le_bytes());
        vbr[0x0D] = SPC as u8;
        vbr[0x28..0x30].copy_from_slice(&((IMAGE_CLUSTERS * SPC - 1) as u64).to_le_bytes());
        vbr[0x30..0x38].copy_from_slice(&mft_lcn.to_le_bytes());
        vbr[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
        vbr[0x40] = (-10i8) as u8;
        vbr[0x44] = 1;
        vbr[0x48..0x50].copy_from_slice(&0x0BAD_F00D_CAFE_BEEFu64.to_le_bytes());
        vbr[0x1FE] = 0x55;
        vbr[0x1FF] = 0xAA;
    }

    /// Byte offset of each sector of `number` inside the image.
    pub fn record_sectors(&self, number: u64) -> Vec<usize> {
        let mut sectors = Vec::new();
        let first = number as usize * SECTORS_PER_RECORD;
        for s in first..first + SECTORS_PER_RECORD {
            let vcn = (s / SPC) as u64;
            let mut run_vcn = 0u64;
            let mut lcn = None;
            for &(run_lcn, len) in &self.mft_runs {
                if vcn < run_vcn + len {
                    lcn = Some(run_lcn + (vcn - run_vcn));
                    break;
                }
                run_vcn += len;
            }
            let lcn = lcn.expect("record outside the MFT runs") as usize;
            sectors.push(lcn * CLUSTER + (s % SPC) * BPS);
        }
        sectors
    }

    pub fn put_record(&mut self, number: u64, record: BuiltRecord) {
        for (i, off) in self.record_sectors(number).into_iter().enumerate() {
            self.image[off..off + BPS].copy_from_slice(&record.on_disk[i * BPS..(i + 1) * BPS]);
        }
        self.expected.insert(number, record.expected);
    }

    /// Flips one byte of the stored tail of `sector` within `number`.
    pub fn tear(&mut self, number: u64, sector: usize) {
        let off = self.record_sectors(number)[sector] + BPS - 1;
        self.image[off] ^= 0xFF;
    }
}

/// Records kept blank (zeroed) in [`standard_volume`].
pub const BLANK_RESERVED: u64 = 12;
pub const BLANK_USER: u64 = 26;

pub const MFT_BYTES: u64 = MFT_RECORDS * RECORD_SIZE as u64;

/// A volume whose `$MFT` spans two runs and whose run list sits entirely in
/// record 0.
pub fn standard_volume() -> ImageBuilder {
    let mut b = ImageBuilder::new(MFT_RUNS);
    b.put_record(
        0,
        file_record(
            0,
            1,
            0x01,
            0x0002,
            &[standard_information(), nonresident_data_attr(1, 0, MFT_RUNS, MFT_BYTES)],
        ),
    );
    for n in 1..MFT_RECORDS {
        if n == BLANK_RESERVED || n == BLANK_USER {
            continue;
        }
        let flags = if n == 5 { 0x03 } else { 0x01 };
        b.put_record(n, file_record(n, n as u16, flags, 0x0010 + n as u16, &[standard_information()]));
    }
    b
}

/// A volume whose `$MFT` run list is split between record 0 (first run) and
/// extension record 18 (second run), tied together by a resident
/// `$ATTRIBUTE_LIST`. `listed_seq` is the sequence number the list expects
/// for record 18, which is stored with sequence 1.
pub fn attribute_list_volume(listed_seq: u16) -> ImageBuilder {
    let mut b = ImageBuilder::new(MFT_RUNS);
    let list = attribute_list_attr(&[
        (0x10, 0, 0, 1),
        (0x80, 0, 0, 1),
        (0x80, MFT_RUNS[0].1, 18, listed_seq),
    ]);
    b.put_record(
        0,
        file_record(
            0,
            1,
            0x01,
            0x0002,
            &[standard_information(), list, nonresident_data_attr(2, 0, &MFT_RUNS[..1], MFT_BYTES)],
        ),
    );
    b.put_record(
        18,
        file_record(18, 1, 0x01, 0x0004, &[nonresident_data_attr(0, MFT_RUNS[0].1, &MFT_RUNS[1..], 0)]),
    );
    for n in (1..MFT_RECORDS).filter(|&n| n != 18) {
        b.put_record(n, file_record(n, n as u16, 0x01, 0x0020, &[standard_information()]));
    }
    b
}

/// Every record written, with record 0 describing `runs` and a `$DATA` of
/// `data_size` bytes.
fn populated_volume(runs: &[(u64, u64)], data_size: u64) -> ImageBuilder {
    let mut b = ImageBuilder::new(runs);
    b.put_record(
        0,
        file_record(
            0,
            1,
            0x01,
            0x0002,
            &[standard_information(), nonresident_data_attr(1, 0, runs, data_size)],
        ),
    );
    for n in 1..MFT_RECORDS {
        b.put_record(n, file_record(n, n as u16, 0x01, 0x0030, &[standard_information()]));
    }
    b
}

/// First `$MFT` run holds only records 0..8, so part of the reserved range
/// lives in the second run at LCN 40.
pub const FRAGMENTED_RUNS: &[(u64, u64)] = &[(4, 2), (40, 6)];

pub fn fragmented_volume() -> ImageBuilder {
    populated_volume(FRAGMENTED_RUNS, MFT_BYTES)
}

/// Records stored past `$DATA`'s `data_size` but inside its allocation.
pub const IN_USE_RECORDS: u64 = 24;

pub fn short_data_volume() -> ImageBuilder {
    populated_volume(MFT_RUNS, IN_USE_RECORDS * RECORD_SIZE as u64)
}
