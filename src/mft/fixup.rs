//! Update sequence ("fixup") verification.
//!
//! NTFS overwrites the last two bytes of every sector of a multi-sector
//! structure with the structure's update sequence number (USN) and stashes
//! the real bytes in the update sequence array. A sector whose tail does not
//! carry the USN was not written together with the rest: a torn write.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Reads the USN at the start of the update sequence array.
pub fn usn(buf: &[u8], usa_offset: usize) -> Result<u16> {
    let bytes = usa_offset
        .checked_add(2)
        .and_then(|end| buf.get(usa_offset..end))
        .ok_or(Error::OutOfBounds {
            offset: usa_offset,
            len: buf.len(),
        })?;
    Ok(LittleEndian::read_u16(bytes))
}

/// Verifies every sector tail against the USN, then restores the real tail
/// bytes from the array.
///
/// All sectors are checked before anything is written, so on error `buf`
/// is left exactly as it was read.
pub fn verify_and_repair(
    buf: &mut [u8],
    sector_count: usize,
    usa_offset: usize,
    bytes_per_sector: usize,
) -> Result<()> {
    if bytes_per_sector < 2 {
        return Err(Error::OutOfBounds { offset: 0, len: buf.len() });
    }
    let span_ok = sector_count
        .checked_mul(bytes_per_sector)
        .map_or(false, |span| span <= buf.len());
    if !span_ok {
        return Err(Error::OutOfBounds {
            offset: sector_count.saturating_mul(bytes_per_sector),
            len: buf.len(),
        });
    }
    let usa_ok = sector_count
        .checked_add(1)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| n.checked_add(usa_offset))
        .map_or(false, |end| end <= buf.len());
    if !usa_ok {
        return Err(Error::OutOfBounds {
            offset: usa_offset,
            len: buf.len(),
        });
    }

    let expected = usn(buf, usa_offset)?;

    for sector in 0..sector_count {
        let tail = (sector + 1) * bytes_per_sector - 2;
        let found = LittleEndian::read_u16(&buf[tail..tail + 2]);
        if found != expected {
            return Err(Error::FixupMismatch {
                sector,
                expected,
                found,
            });
        }
    }

    for sector in 0..sector_count {
        let tail = (sector + 1) * bytes_per_sector - 2;
        let entry = usa_offset + 2 + sector * 2;
        let real = [buf[entry], buf[entry + 1]];
        buf[tail..tail + 2].copy_from_slice(&real);
    }

    Ok(())
}
