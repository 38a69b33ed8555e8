//! Logic Trace Decoder Library
//!
//! Reconstructs bus transactions from the table exports of a logic analyzer
//! (one row per decoded protocol event, in capture order).
//!
//! # Architecture
//!
//! - [`formats`] reads the export into a header plus an ordered record stream,
//!   re-joining rows split by embedded newlines
//! - [`window`] optionally keeps only rows matching a pattern, with context
//! - [`protocols`] holds the state machines: SPI flash reads, CAN frame
//!   grouping and the I2C address scan
//! - [`encoders`] turns SPI reads into S-records or binary images
//!
//! The library does NOT print or write files; presenting results is left to
//! the application layer (logic-trace-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use logic_trace_decoder::{encode_srecords, Decoder, DecoderConfig, Protocol, Reconstruction, SpiOutput};
//! use std::path::Path;
//!
//! let config = DecoderConfig::new()
//!     .with_protocol(Protocol::Spi)
//!     .with_device("W25Q128JVSQ")
//!     .with_spi_output(SpiOutput::SRecord);
//!
//! let decoder = Decoder::new(config).unwrap();
//! let decoded = decoder.decode_file(Path::new("spi_export.csv")).unwrap();
//!
//! if let Reconstruction::SpiReads { transactions, .. } = &decoded.reconstruction {
//!     for record in encode_srecords(transactions) {
//!         println!("{}", record);
//!     }
//! }
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod devices;
pub mod diagnostics;
pub mod encoders;
pub mod formats;
pub mod protocols;
pub mod types;
pub mod window;

// Re-export main types for convenience
pub use config::{Analysis, DecoderConfig, Protocol, SpiOutput};
pub use decoder::{Decoded, Decoder, Reconstruction};
pub use devices::{DeviceProfile, DeviceRegistry, DEFAULT_DEVICE};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use encoders::{encode_binary, encode_srecords, BinaryArtifacts, SRecord};
pub use types::{
    CanFrame, CanGrouping, DecoderError, I2cTransaction, IdentifierTally, Result, SpiCommand,
    SpiTransaction, TraceHeader, TraceRecord,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: ensure we can create a decoder
        let decoder = Decoder::new(DecoderConfig::new()).unwrap();
        assert_eq!(decoder.config().protocol, Protocol::Plain);
        assert!(decoder.devices().get(DEFAULT_DEVICE).is_some());
    }
}
