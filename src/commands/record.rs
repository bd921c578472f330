use anyhow::Context;

use ntfs_meta::mft::fixup;

use crate::cli::ImageArgs;
use crate::models::RecordReport;

use super::open_volume;

pub fn run(source: &ImageArgs, number: u64, map_mft: bool, json: bool) -> anyhow::Result<()> {
    let volume = open_volume(source, map_mft)?;
    let record = volume
        .read_file_record(number)
        .with_context(|| format!("failed to read file record {}", number))?;
    let usn = fixup::usn(&record.data, record.header.update_sequence_offset as usize)?;
    let report = RecordReport::new(&record, usn);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let h = &report.header;
    println!("[+] File record {}", report.entry_number);
    println!("    sequence_number: {}", h.sequence_number);
    println!("    update_sequence_number: {:#06X}", report.update_sequence_number);
    println!("    logfile_sequence_number: {}", h.logfile_sequence_number);
    println!("    in_use: {}  directory: {}", report.in_use, report.is_directory);
    println!("    hard_links: {}", h.hard_link_count);
    println!("    bytes: {} used / {} allocated", h.bytes_in_use, h.bytes_allocated);
    if let Some(base) = report.base_record {
        println!("    base_record: {}", base);
    }
    println!("    attributes:");
    for attr in &report.attributes {
        println!(
            "      {:#06X} {:<24} {:>6} bytes  {}{}",
            attr.header.attr_type,
            attr.type_name,
            attr.header.length,
            if attr.resident { "resident" } else { "non-resident" },
            if attr.named { " (named)" } else { "" },
        );
    }
    if let Some(err) = &report.attribute_error {
        println!("    [!] attribute walk stopped: {}", err);
    }
    Ok(())
}
