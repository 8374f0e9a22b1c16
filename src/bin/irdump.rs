//! Cache dump binary.
//!
//! Reads a JIT cache image (little-endian 16-bit words holding a sequence of
//! cache entries) and pretty-prints every block in it.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use dynir::cache::{words_from_le_bytes, BlockCache};
use dynir::{dump_block, LocationDescriptor};

/// CLI for `irdump`.
#[derive(Parser)]
#[command(name = "irdump", about = "Pretty-print the blocks stored in a JIT cache image", version)]
struct Cli {
    /// Cache image to read; stdin when omitted.
    input: Option<PathBuf>,

    /// Only print the block at this location (hex, `0x` prefix optional).
    #[arg(long, value_parser = parse_location)]
    location: Option<LocationDescriptor>,

    /// Check every decoded block's invariants.
    #[arg(long)]
    verify: bool,

    /// Print cache statistics after the blocks.
    #[arg(long)]
    stats: bool,
}

fn parse_location(text: &str) -> Result<LocationDescriptor, String> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map(LocationDescriptor::new)
        .map_err(|e| format!("invalid location '{}': {}", text, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let bytes = match &cli.input {
        Some(path) => fs::read(path)?,
        None => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    let (mut cache, load_error) = BlockCache::from_words(&words_from_le_bytes(&bytes));
    if let Some(err) = &load_error {
        eprintln!("warning: stopped reading cache image: {}", err);
    }

    let locations = match cli.location {
        Some(location) => vec![location],
        None => cache.locations(),
    };

    let mut failures = 0;
    for location in locations {
        let Some(block) = cache.lookup(location)? else {
            eprintln!("{}: no usable entry", location);
            failures += 1;
            continue;
        };

        println!("{}", dump_block(&block));
        if cli.verify {
            if let Err(e) = block.verify() {
                eprintln!("{}: {}", location, e);
                failures += 1;
            }
        }
    }

    if cli.stats {
        print!("{}", cache.stats());
    }

    if failures > 0 || load_error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}
