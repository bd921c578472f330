pub mod dump;
pub mod info;
pub mod record;

use anyhow::Context;

use ntfs_meta::{FileImage, HeapAlloc, NtfsVolume, VolumeOptions};

use crate::cli::ImageArgs;

pub type ImageVolume = NtfsVolume<FileImage, HeapAlloc>;

pub fn open_volume(source: &ImageArgs, map_mft: bool) -> anyhow::Result<ImageVolume> {
    let image = FileImage::open(&source.image, source.offset)
        .with_context(|| format!("failed to open {}", source.image))?;

    let options = VolumeOptions {
        assumed_bytes_per_sector: source.sector_size,
        map_mft,
    };
    NtfsVolume::with_options(image, HeapAlloc, options)
        .with_context(|| format!("failed to initialize NTFS volume at offset {:#X} of {}", source.offset, source.image))
}
