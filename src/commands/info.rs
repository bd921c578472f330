use log::warn;

use crate::cli::ImageArgs;
use crate::models::VolumeInfo;

use super::open_volume;

pub fn run(source: &ImageArgs, json: bool) -> anyhow::Result<()> {
    let volume = match open_volume(source, true) {
        Ok(volume) => volume,
        Err(e) => {
            warn!("$MFT could not be mapped, showing boot sector geometry only: {:#}", e);
            open_volume(source, false)?
        }
    };
    let info = VolumeInfo::new(
        &source.image,
        source.offset,
        volume.geometry(),
        volume.record_count(),
        volume.mft_map().map(|m| m.runs().len()),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("[+] NTFS volume {} (offset {:#X})", info.source, info.partition_offset);
    println!("    bytes_per_sector: {}", info.bytes_per_sector);
    println!("    sectors_per_cluster: {}", info.sectors_per_cluster);
    println!("    bytes_per_cluster: {}", info.bytes_per_cluster);
    println!("    file_record_size: {}", info.file_record_size);
    println!("    index_block_size: {}", info.index_block_size);
    println!("    mft_lcn: {} (mirror {})", info.mft_lcn, info.mft_mirror_lcn);
    println!("    mft_start_sector: {}", info.mft_start_sector);
    println!("    total_sectors: {}", info.total_sectors);
    println!("    serial: {}", info.volume_serial_number);
    if let (Some(records), Some(runs)) = (info.mft_records, info.mft_runs) {
        println!("    mft: {} records in {} runs", records, runs);
    }
    Ok(())
}
