//! Sector access and scratch allocation seams.
//!
//! The volume never touches a device directly: every byte comes through a
//! [`SectorReader`] supplied by the embedder, and every scratch buffer comes
//! from a [`BufferAlloc`].

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// Reads whole logical sectors.
///
/// Implementations must fill exactly `sector_count * bytes_per_sector`
/// bytes of `buf` or return an error. Any per-embedder state (a disk
/// handle, a partition offset, a controller context) lives in the
/// implementing value itself.
pub trait SectorReader {
    fn read_sectors(
        &self,
        start_sector: u64,
        sector_count: u32,
        bytes_per_sector: u16,
        buf: &mut [u8],
    ) -> io::Result<()>;
}

impl<F> SectorReader for F
where
    F: Fn(u64, u32, u16, &mut [u8]) -> io::Result<()>,
{
    fn read_sectors(
        &self,
        start_sector: u64,
        sector_count: u32,
        bytes_per_sector: u16,
        buf: &mut [u8],
    ) -> io::Result<()> {
        self(start_sector, sector_count, bytes_per_sector, buf)
    }
}

/// Scratch buffer provider.
pub trait BufferAlloc {
    /// Returns a zeroed buffer of exactly `size` bytes.
    fn allocate(&self, size: usize) -> Vec<u8>;
    fn release(&self, buf: Vec<u8>);
}

impl<A: BufferAlloc + ?Sized> BufferAlloc for &A {
    fn allocate(&self, size: usize) -> Vec<u8> {
        (**self).allocate(size)
    }

    fn release(&self, buf: Vec<u8>) {
        (**self).release(buf)
    }
}

/// Plain global-heap allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAlloc;

impl BufferAlloc for HeapAlloc {
    fn allocate(&self, size: usize) -> Vec<u8> {
        vec![0u8; size]
    }

    fn release(&self, buf: Vec<u8>) {
        drop(buf);
    }
}

fn request_len(sector_count: u32, bytes_per_sector: u16, buf: &[u8]) -> io::Result<usize> {
    let len = sector_count as usize * bytes_per_sector as usize;
    if buf.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("buffer holds {} bytes, request needs {}", buf.len(), len),
        ));
    }
    Ok(len)
}

/// A whole volume held in memory.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    data: Vec<u8>,
}

impl MemoryImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl SectorReader for MemoryImage {
    fn read_sectors(
        &self,
        start_sector: u64,
        sector_count: u32,
        bytes_per_sector: u16,
        buf: &mut [u8],
    ) -> io::Result<()> {
        let len = request_len(sector_count, bytes_per_sector, buf)?;
        let start = start_sector
            .checked_mul(bytes_per_sector as u64)
            .and_then(|off| usize::try_from(off).ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sector offset overflow"))?;
        let src = start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of image"))?;
        buf[..len].copy_from_slice(src);
        Ok(())
    }
}

/// A disk image or raw device opened as a file.
///
/// `partition_offset` is the byte offset of the NTFS volume inside the file,
/// so sector 0 is the volume boot record rather than the disk's MBR.
#[derive(Debug)]
pub struct FileImage {
    file: Mutex<File>,
    partition_offset: u64,
}

impl FileImage {
    pub fn open(path: impl AsRef<Path>, partition_offset: u64) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_file(file, partition_offset))
    }

    pub fn from_file(file: File, partition_offset: u64) -> Self {
        Self {
            file: Mutex::new(file),
            partition_offset,
        }
    }
}

impl SectorReader for FileImage {
    fn read_sectors(
        &self,
        start_sector: u64,
        sector_count: u32,
        bytes_per_sector: u16,
        buf: &mut [u8],
    ) -> io::Result<()> {
        let len = request_len(sector_count, bytes_per_sector, buf)?;
        let offset = start_sector
            .checked_mul(bytes_per_sector as u64)
            .and_then(|off| off.checked_add(self.partition_offset))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sector offset overflow"))?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "image handle poisoned"))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..len])
    }
}
