//! Decoder configuration types
//!
//! This module defines the configuration consumed by the decoder library. It is
//! resolved once, before any row is read: every option is an explicit field
//! with a defined meaning when absent.

use crate::types::{DecoderError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Columns every analyzer export may carry
pub const UNIVERSAL_COLUMNS: &[&str] = &["Time [s]", "name", "type", "start_time", "duration"];

/// Analyzer that produced the export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    Plain,
    AsyncSerial,
    Spi,
    I2c,
    Can,
}

impl Protocol {
    /// Columns specific to this analyzer's exports
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Protocol::Plain => &[],
            Protocol::AsyncSerial => &["data", "error", "Value", "Parity Error", "Framing Error"],
            Protocol::Spi => &["mosi", "miso", "Packet ID", "MOSI", "MISO"],
            Protocol::I2c => &[
                "ack",
                "address",
                "read",
                "data",
                "Packet ID",
                "Address",
                "Data",
                "Read/Write",
                "ACK/NAK",
            ],
            Protocol::Can => &["data", "identifier", "num_data_bytes", "crc", "ack"],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Plain => write!(f, "plain"),
            Protocol::AsyncSerial => write!(f, "async-serial"),
            Protocol::Spi => write!(f, "spi"),
            Protocol::I2c => write!(f, "i2c"),
            Protocol::Can => write!(f, "can"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Protocol::Plain),
            "async_serial" | "async-serial" => Ok(Protocol::AsyncSerial),
            "spi" => Ok(Protocol::Spi),
            "i2c" => Ok(Protocol::I2c),
            "can" => Ok(Protocol::Can),
            other => Err(format!(
                "unknown analyzer '{}' (expected plain, async-serial, spi, i2c or can)",
                other
            )),
        }
    }
}

/// Artifact produced from reconstructed SPI reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpiOutput {
    /// S2 records, 32 data bytes per line
    SRecord,
    /// Sequential read stream plus address-indexed memory image
    Binary,
}

/// The analysis a configuration resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// Rows (optionally filtered with context) listed as they are
    Listing,
    /// SPI flash reads reconstructed into transactions
    SpiReads(SpiOutput),
    /// CAN rows grouped into frames with an identifier tally
    CanFrames,
    /// I2C rows scanned for an address
    I2cScan { address: String },
}

/// Configuration for the decoder library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Analyzer that produced the export
    #[serde(default)]
    pub protocol: Protocol,

    /// Extra column names to accept besides the analyzer's own
    #[serde(default)]
    pub custom_columns: Vec<String>,

    /// Case-insensitive pattern selecting anchor rows
    #[serde(default)]
    pub filter: Option<String>,

    /// Rows of context kept before each anchor (None or 0 = none)
    #[serde(default)]
    pub before: Option<usize>,

    /// Rows of context kept after each anchor (None or 0 = none)
    #[serde(default)]
    pub after: Option<usize>,

    /// Only list this column's values
    #[serde(default)]
    pub column: Option<String>,

    /// Flash device profile name (SPI only)
    #[serde(default)]
    pub device: Option<String>,

    /// Address substring to scan for (I2C only)
    #[serde(default)]
    pub address: Option<String>,

    /// Group CAN rows into frames
    #[serde(default)]
    pub can_special: bool,

    /// Reconstruct SPI reads into this artifact
    #[serde(default)]
    pub spi_output: Option<SpiOutput>,
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the analyzer
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Builder method: add a custom column name
    pub fn add_custom_column(mut self, column: impl Into<String>) -> Self {
        self.custom_columns.push(column.into());
        self
    }

    /// Builder method: set the anchor pattern
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Builder method: set the before/after context sizes
    pub fn with_context(mut self, before: usize, after: usize) -> Self {
        self.before = Some(before);
        self.after = Some(after);
        self
    }

    /// Builder method: project a single column
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Builder method: select a device profile
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Builder method: set the I2C address to scan for
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Builder method: enable CAN frame grouping
    pub fn with_can_special(mut self, enabled: bool) -> Self {
        self.can_special = enabled;
        self
    }

    /// Builder method: reconstruct SPI reads into an artifact
    pub fn with_spi_output(mut self, output: SpiOutput) -> Self {
        self.spi_output = Some(output);
        self
    }

    /// Before-context capacity (0 disables buffering)
    pub fn before_capacity(&self) -> usize {
        self.before.unwrap_or(0)
    }

    /// After-context capacity (0 disables buffering)
    pub fn after_capacity(&self) -> usize {
        self.after.unwrap_or(0)
    }

    /// True when matches are printed with context blocks around them
    pub fn has_context(&self) -> bool {
        self.filter.is_some() && (self.before_capacity() > 0 || self.after_capacity() > 0)
    }

    /// Compile the anchor pattern, if any
    pub fn compiled_filter(&self) -> Result<Option<Regex>> {
        self.filter
            .as_deref()
            .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
            .transpose()
            .map_err(DecoderError::from)
    }

    /// Every column name this configuration expects to see
    pub fn known_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = UNIVERSAL_COLUMNS.to_vec();
        columns.extend_from_slice(self.protocol.columns());
        columns.extend(self.custom_columns.iter().map(String::as_str));
        columns
    }

    /// Check that the options can be combined
    pub fn validate(&self) -> Result<()> {
        if self.can_special && self.protocol != Protocol::Can {
            return Err(DecoderError::InvalidConfig(format!(
                "CAN special output requires the can analyzer, not {}",
                self.protocol
            )));
        }
        if self.address.is_some() && self.protocol != Protocol::I2c {
            return Err(DecoderError::InvalidConfig(format!(
                "An address scan requires the i2c analyzer, not {}",
                self.protocol
            )));
        }
        if let Some(output) = self.spi_output {
            if self.protocol != Protocol::Spi {
                return Err(DecoderError::InvalidConfig(format!(
                    "{:?} output requires the spi analyzer, not {}",
                    output, self.protocol
                )));
            }
            if self.filter.is_some() || self.column.is_some() {
                return Err(DecoderError::InvalidConfig(
                    "SPI output modes do not work with row or column filters".to_string(),
                ));
            }
        }
        self.compiled_filter()?;
        Ok(())
    }

    /// Resolve which analysis to run
    pub fn analysis(&self) -> Analysis {
        match (self.protocol, self.spi_output, &self.address) {
            (Protocol::Spi, Some(output), _) => Analysis::SpiReads(output),
            (Protocol::Can, _, _) if self.can_special => Analysis::CanFrames,
            (Protocol::I2c, _, Some(address)) => Analysis::I2cScan {
                address: address.clone(),
            },
            _ => Analysis::Listing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_config_builder() {
        let config = DecoderConfig::new()
            .with_protocol(Protocol::Spi)
            .with_device("W25Q16JV")
            .with_spi_output(SpiOutput::SRecord)
            .add_custom_column("IO2");

        assert!(config.validate().is_ok());
        assert_eq!(config.analysis(), Analysis::SpiReads(SpiOutput::SRecord));
        assert!(config.known_columns().contains(&"IO2"));
        assert!(config.known_columns().contains(&"MISO"));
    }

    #[test]
    fn test_spi_output_excludes_filters() {
        let config = DecoderConfig::new()
            .with_protocol(Protocol::Spi)
            .with_spi_output(SpiOutput::Binary)
            .with_filter("A5");
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));

        let config = DecoderConfig::new().with_spi_output(SpiOutput::Binary);
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = DecoderConfig::new().with_filter("(A5");
        assert!(matches!(config.validate(), Err(DecoderError::InvalidPattern(_))));
    }

    #[test]
    fn test_analysis_resolution() {
        assert_eq!(DecoderConfig::new().analysis(), Analysis::Listing);
        assert_eq!(
            DecoderConfig::new().with_protocol(Protocol::Spi).analysis(),
            Analysis::Listing
        );
        assert_eq!(
            DecoderConfig::new()
                .with_protocol(Protocol::Can)
                .with_can_special(true)
                .analysis(),
            Analysis::CanFrames
        );
        assert_eq!(
            DecoderConfig::new()
                .with_protocol(Protocol::I2c)
                .with_address("0x50")
                .analysis(),
            Analysis::I2cScan {
                address: "0x50".to_string()
            }
        );
    }

    #[test]
    fn test_protocol_specific_flags_need_their_analyzer() {
        let config = DecoderConfig::new().with_address("0x50");
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));

        let config = DecoderConfig::new()
            .with_protocol(Protocol::Spi)
            .with_can_special(true);
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));

        let config = DecoderConfig::new()
            .with_protocol(Protocol::Can)
            .with_can_special(true);
        assert!(config.validate().is_ok());
        // Disabled flag is not a request
        assert!(DecoderConfig::new().with_can_special(false).validate().is_ok());
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("async_serial".parse::<Protocol>(), Ok(Protocol::AsyncSerial));
        assert_eq!("SPI".parse::<Protocol>(), Ok(Protocol::Spi));
        assert!("uart".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_zero_context_means_none() {
        let config = DecoderConfig::new().with_filter("A5").with_context(0, 2);
        assert_eq!(config.before_capacity(), 0);
        assert_eq!(config.after_capacity(), 2);
        assert_eq!(DecoderConfig::new().after_capacity(), 0);
    }

    #[test]
    fn test_context_needs_filter_and_capacity() {
        assert!(DecoderConfig::new().with_filter("A5").with_context(0, 2).has_context());
        assert!(!DecoderConfig::new().with_filter("A5").has_context());
        assert!(!DecoderConfig::new().with_filter("A5").with_context(0, 0).has_context());
        assert!(!DecoderConfig::new().with_context(1, 1).has_context());
    }
}
