use clap::{Args, Parser, Subcommand};

const EXAMPLES: &str = r#"
EXAMPLES:

  1. Volume geometry of a raw partition image:
     ntfs-meta info --image volume.img

  2. Same, for a whole-disk image whose NTFS partition starts at LBA 2048:
     ntfs-meta info -i disk.img --offset 1048576 --json

  3. Header and attribute list of the root directory record:
     ntfs-meta record -i volume.img -n 5

  4. Status of the first 4096 MFT records as JSON Lines:
     ntfs-meta dump -i volume.img -o records.jsonl --count 4096
"#;

#[derive(Parser, Debug)]
#[command(name = "ntfs-meta")]
#[command(version)]
#[command(about = "Read-only NTFS boot sector and MFT record inspector")]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Log verbosity when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the volume comes from.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Raw volume or disk image
    #[arg(short, long)]
    pub image: String,
    /// Byte offset of the NTFS partition inside the image
    #[arg(long, default_value_t = 0)]
    pub offset: u64,
    /// Sector size assumed for the boot sector read
    #[arg(short, long, default_value_t = 512)]
    pub sector_size: u16,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validates the boot sector and prints the volume geometry
    Info {
        #[command(flatten)]
        source: ImageArgs,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Reads one MFT record and prints its header and attribute headers
    Record {
        #[command(flatten)]
        source: ImageArgs,
        /// Record number
        #[arg(short, long)]
        number: u64,
        /// Do not map $MFT; only the reserved records are readable
        #[arg(long)]
        no_map: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Reads records in order and writes one JSON line per record
    Dump {
        #[command(flatten)]
        source: ImageArgs,
        /// Output JSONL path
        #[arg(short, long)]
        out: String,
        /// Number of records to read (default: every record $MFT maps)
        #[arg(short, long)]
        count: Option<u64>,
    },
}
