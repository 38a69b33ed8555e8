//! Main decoder API
//!
//! This module provides the primary interface for the decoder library. The
//! Decoder resolves a [`DecoderConfig`] once, opens the export and dispatches
//! the record stream to the analysis the configuration selects.

use crate::config::{Analysis, DecoderConfig, SpiOutput};
use crate::devices::{DeviceProfile, DeviceRegistry};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::formats::TraceSource;
use crate::protocols::{run, CanGrouper, I2cScanner, SpiReconstructor};
use crate::types::{
    CanGrouping, DecoderError, I2cTransaction, Result, SpiTransaction, TraceHeader, TraceRecord,
};
use crate::window::ContextWindow;
use serde::Serialize;
use std::io::BufRead;
use std::path::Path;

/// Output of one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum Reconstruction {
    /// Rows as exported, with context when a filter is active
    Records { records: Vec<TraceRecord> },
    /// Reconstructed flash reads
    SpiReads {
        output: SpiOutput,
        device: DeviceProfile,
        transactions: Vec<SpiTransaction>,
    },
    /// Grouped CAN frames
    CanFrames { grouping: CanGrouping },
    /// Rows addressed to one I2C target
    I2cScan {
        address: String,
        transactions: Vec<I2cTransaction>,
    },
}

/// A decoded export: its header, the reconstruction and what went wrong on the way
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub header: TraceHeader,
    pub reconstruction: Reconstruction,
    pub diagnostics: Vec<Diagnostic>,
}

/// The main decoder struct - entry point for all decoding operations
pub struct Decoder {
    config: DecoderConfig,
    devices: DeviceRegistry,
}

impl Decoder {
    /// Create a decoder with the built-in device profiles
    ///
    /// # Example
    /// ```no_run
    /// use logic_trace_decoder::{Decoder, DecoderConfig, Protocol, SpiOutput};
    /// use std::path::Path;
    ///
    /// let config = DecoderConfig::new()
    ///     .with_protocol(Protocol::Spi)
    ///     .with_device("W25Q64FW")
    ///     .with_spi_output(SpiOutput::SRecord);
    /// let decoder = Decoder::new(config).unwrap();
    /// let decoded = decoder.decode_file(Path::new("flash.csv")).unwrap();
    /// println!("{:?}", decoded.reconstruction);
    /// ```
    pub fn new(config: DecoderConfig) -> Result<Self> {
        Self::with_devices(config, DeviceRegistry::builtin())
    }

    /// Create a decoder with a custom device registry
    pub fn with_devices(config: DecoderConfig, devices: DeviceRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, devices })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Decode an export file
    pub fn decode_file(&self, path: &Path) -> Result<Decoded> {
        log::info!("Decoding export: {:?} ({})", path, self.config.protocol);
        self.decode(TraceSource::open(path)?)
    }

    /// Decode an export from any buffered reader
    pub fn decode_reader<R: BufRead>(&self, reader: R) -> Result<Decoded> {
        self.decode(TraceSource::from_reader(reader)?)
    }

    fn decode<R: BufRead>(&self, source: TraceSource<R>) -> Result<Decoded> {
        let header = source.header().clone();
        self.check_columns(&header)?;

        let mut diagnostics = Diagnostics::new();
        let reconstruction = match self.config.analysis() {
            Analysis::Listing => {
                let records = self.window(source)?.collect::<Result<Vec<_>>>()?;
                log::info!("Listing {} records", records.len());
                Reconstruction::Records { records }
            }
            Analysis::SpiReads(output) => {
                let device = self
                    .devices
                    .resolve(self.config.device.as_deref(), &mut diagnostics);
                let spi = SpiReconstructor::new(&header, device.clone())?;
                let transactions = run(spi, source, &mut diagnostics)?;
                Reconstruction::SpiReads {
                    output,
                    device,
                    transactions,
                }
            }
            Analysis::CanFrames => {
                let grouper = CanGrouper::new(&header)?;
                let grouping = run(grouper, source, &mut diagnostics)?;
                Reconstruction::CanFrames { grouping }
            }
            Analysis::I2cScan { address } => {
                let scanner = I2cScanner::new(&header, address.as_str())?;
                let transactions = run(scanner, self.window(source)?, &mut diagnostics)?;
                Reconstruction::I2cScan {
                    address,
                    transactions,
                }
            }
        };

        if !diagnostics.is_empty() {
            log::info!(
                "{} diagnostics ({} rows skipped)",
                diagnostics.len(),
                diagnostics.rows_skipped()
            );
        }

        Ok(Decoded {
            header,
            reconstruction,
            diagnostics: diagnostics.into_vec(),
        })
    }

    fn window<R: BufRead>(&self, source: TraceSource<R>) -> Result<ContextWindow<TraceSource<R>>> {
        Ok(ContextWindow::new(
            source,
            self.config.compiled_filter()?,
            self.config.before_capacity(),
            self.config.after_capacity(),
        ))
    }

    /// Report unexpected header columns and fail on a missing projected column
    fn check_columns(&self, header: &TraceHeader) -> Result<()> {
        let known = self.config.known_columns();
        for name in header.names() {
            if !known.contains(&name.as_str()) {
                log::debug!("Column '{}' is not a known {} column", name, self.config.protocol);
            }
        }

        if let Some(column) = &self.config.column {
            if !header.contains(column) {
                return Err(DecoderError::MissingColumn {
                    column: column.clone(),
                    available: header.names(),
                });
            }
        }
        Ok(())
    }
}
