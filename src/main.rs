mod cli;
mod commands;
mod models;
mod output;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .format_timestamp(None)
        .init();

    match &cli.command {
        Commands::Info { source, json } => commands::info::run(source, *json),
        Commands::Record {
            source,
            number,
            no_map,
            json,
        } => commands::record::run(source, *number, !*no_map, *json),
        Commands::Dump { source, out, count } => commands::dump::run(source, out, *count),
    }
}
