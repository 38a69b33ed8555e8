//! Standalone export decoder tool
//!
//! Decodes a logic analyzer export with one of the built-in analyses and prints
//! a short summary of what was reconstructed.
//!
//! Usage:
//!   decode_export <export.csv> [spi|can|i2c <address>] [--device <name>]
//!
//! Example:
//!   decode_export flash_dump.csv spi --device W25Q64FW

use logic_trace_decoder::{
    encode_srecords, Decoder, DecoderConfig, Protocol, Reconstruction, SpiOutput,
};
use std::env;
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <export.csv> [spi|can|i2c <address>] [--device <name>]", args[0]);
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let mut config = DecoderConfig::new();
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "spi" => {
                config = config
                    .with_protocol(Protocol::Spi)
                    .with_spi_output(SpiOutput::SRecord);
            }
            "can" => {
                config = config.with_protocol(Protocol::Can).with_can_special(true);
            }
            "i2c" if i + 1 < args.len() => {
                config = config.with_protocol(Protocol::I2c).with_address(&args[i + 1]);
                i += 1;
            }
            "--device" if i + 1 < args.len() => {
                config = config.with_device(&args[i + 1]);
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let decoder = match Decoder::new(config) {
        Ok(decoder) => decoder,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let decoded = match decoder.decode_file(&path) {
        Ok(decoded) => decoded,
        Err(e) => {
            eprintln!("Failed to decode {:?}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("=== {:?} ===", path);
    println!("Columns: {}", decoded.header.names().join(", "));

    match &decoded.reconstruction {
        Reconstruction::Records { records } => {
            println!("Records: {}", records.len());
        }
        Reconstruction::SpiReads { device, transactions, .. } => {
            println!("Device: {} ({} bytes)", device.name, device.size);
            println!("Reads: {}", transactions.len());
            for tx in transactions.iter().take(10) {
                println!("  {} @ 0x{} ({} bytes)", tx.command, tx.address_hex(), tx.data.len());
            }
            println!("S-records: {}", encode_srecords(transactions).len());
        }
        Reconstruction::CanFrames { grouping } => {
            println!("Frames: {}", grouping.frames.len());
            let mut ids: Vec<_> = grouping.tally.iter().collect();
            ids.sort_by(|a, b| b.1.cmp(&a.1));
            for (id, count) in ids.iter().take(10) {
                println!("  {}: {} times", id, count);
            }
        }
        Reconstruction::I2cScan { address, transactions } => {
            println!("Transactions for {}: {}", address, transactions.len());
        }
    }

    println!("\nDiagnostics: {}", decoded.diagnostics.len());
    for diagnostic in decoded.diagnostics.iter().take(10) {
        println!("  {}", diagnostic);
    }
}
