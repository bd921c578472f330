use std::fs::File;
use std::io::BufWriter;

use anyhow::Context;
use log::info;

use ntfs_meta::mft::fixup;
use ntfs_meta::FIRST_USER_RECORD;

use crate::cli::ImageArgs;
use crate::models::{DumpEntry, RecordReport, RecordStatus};
use crate::output::JsonlWriter;

use super::open_volume;

pub fn run(source: &ImageArgs, out: &str, count: Option<u64>) -> anyhow::Result<()> {
    let volume = open_volume(source, true)?;
    let total = count
        .or_else(|| volume.record_count())
        .unwrap_or(FIRST_USER_RECORD + 1);

    let file = File::create(out).with_context(|| format!("failed to create {}", out))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    let mut rejected = 0u64;

    for number in 0..total {
        let entry = match volume.read_file_record(number) {
            Ok(record) => {
                let usn = fixup::usn(&record.data, record.header.update_sequence_offset as usize)?;
                DumpEntry {
                    entry_number: number,
                    status: RecordStatus::Ok,
                    error: None,
                    record: Some(RecordReport::new(&record, usn)),
                }
            }
            Err(e) => {
                rejected += 1;
                DumpEntry {
                    entry_number: number,
                    status: RecordStatus::from(&e),
                    error: Some(e.to_string()),
                    record: None,
                }
            }
        };
        writer
            .write_line(&entry)
            .with_context(|| format!("failed to write {}", out))?;
    }

    let (_, lines) = writer.finish().with_context(|| format!("failed to flush {}", out))?;
    info!("dumped {} records ({} rejected) to {}", lines, rejected, out);
    println!("[+] {} records written to {} ({} rejected)", lines, out, rejected);
    Ok(())
}
