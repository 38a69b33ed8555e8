//! Core types for the logic trace decoder library
//!
//! This module defines the record model shared by every analysis (header, field
//! index, trace records with optional context) and the higher-level
//! transactions the protocol reconstructors emit.

use byteorder::{BigEndian, ByteOrder};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Export file has no header line")]
    EmptyExport,

    #[error("Required column '{}' not found (available: {})", .column, .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Address overflow: offset 0x{offset:X} is outside the 0x{size:X} byte image")]
    AddressOverflow { offset: u64, size: usize },

    #[error("Transaction at line {line} has {data_len} data bytes but an incomplete address '{address}'")]
    IncompleteAddress {
        line: usize,
        address: String,
        data_len: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Strip wrapping quote characters from a raw field
pub fn unquote(field: &str) -> &str {
    field.trim_matches('"')
}

/// Parse a hex byte as exported by the analyzer (`0xA5`, `A5`, `"0xA5"`)
pub fn parse_hex_byte(field: &str) -> Option<u8> {
    let value = unquote(field).trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// Header row of an export: raw column strings plus the name -> position index
///
/// Built once from the first line and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceHeader {
    columns: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TraceHeader {
    /// Parse a header line, indexing every column by its quote-stripped name
    pub fn parse(line: &str) -> Self {
        let columns: Vec<String> = line.split(',').map(str::to_string).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(pos, column)| (unquote(column).to_string(), pos))
            .collect();
        Self { columns, index }
    }

    /// Number of fields every record is expected to carry
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw column strings, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Quote-stripped column names, in order
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| unquote(c).to_string()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resolve a column that must exist
    pub fn require(&self, name: &str) -> Result<usize> {
        self.resolve_any(&[name])
    }

    /// Resolve the first present column out of several spellings
    pub fn resolve_any(&self, candidates: &[&str]) -> Result<usize> {
        candidates
            .iter()
            .find_map(|name| self.position(name))
            .ok_or_else(|| DecoderError::MissingColumn {
                column: candidates.join("' or '"),
                available: self.names(),
            })
    }
}

/// Ordered field list captured from an export row
pub type Fields = Vec<String>;

/// One exported row, optionally carrying the rows around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    /// Physical line (1-based) the record starts on
    pub line: usize,
    pub fields: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Vec<Fields>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Vec<Fields>>,
}

impl TraceRecord {
    pub fn new(line: usize, fields: Fields) -> Self {
        Self {
            line,
            fields,
            before: None,
            after: None,
        }
    }

    /// Raw field at a position
    pub fn field(&self, pos: usize) -> Option<&str> {
        self.fields.get(pos).map(String::as_str)
    }

    /// Quote-stripped field at a position
    pub fn value(&self, pos: usize) -> Option<&str> {
        self.field(pos).map(unquote)
    }

    /// The row as it appeared in the export
    pub fn raw_line(&self) -> String {
        self.fields.join(",")
    }

    /// True if the field count agrees with the header
    pub fn matches(&self, header: &TraceHeader) -> bool {
        self.fields.len() == header.len()
    }
}

/// SPI flash read commands understood by the reconstructor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiCommand {
    Read,
    FastRead,
    FastDualRead,
    FastQuadRead,
}

impl SpiCommand {
    /// Detection order when several opcodes share a value
    pub const PRIORITY: [SpiCommand; 4] = [
        SpiCommand::Read,
        SpiCommand::FastRead,
        SpiCommand::FastDualRead,
        SpiCommand::FastQuadRead,
    ];

    /// Wait-state cycles between the address and the first data cycle
    pub fn dummy_cycles(self) -> u32 {
        match self {
            SpiCommand::Read => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for SpiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpiCommand::Read => write!(f, "READ"),
            SpiCommand::FastRead => write!(f, "FAST_READ"),
            SpiCommand::FastDualRead => write!(f, "FAST_DUAL_READ"),
            SpiCommand::FastQuadRead => write!(f, "FAST_QUAD_READ"),
        }
    }
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode_upper(bytes))
}

fn serialize_hex_list<S: Serializer>(
    bytes: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(bytes.iter().map(|b| hex::encode_upper([*b])))
}

/// A reconstructed flash read: 24-bit address plus the bytes read from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpiTransaction {
    pub command: SpiCommand,
    /// Address bytes, big-endian, as clocked out on the command line
    #[serde(serialize_with = "serialize_hex")]
    pub address: Vec<u8>,
    #[serde(serialize_with = "serialize_hex_list")]
    pub data: Vec<u8>,
    /// Line of the command cycle
    pub line: usize,
}

impl SpiTransaction {
    pub fn new(command: SpiCommand, line: usize) -> Self {
        Self {
            command,
            address: Vec::with_capacity(3),
            data: Vec::new(),
            line,
        }
    }

    /// Address as 6 uppercase hex characters (shorter if the read was cut off)
    pub fn address_hex(&self) -> String {
        hex::encode_upper(&self.address)
    }

    /// Address as an integer, once all three address cycles were seen
    pub fn address_value(&self) -> Option<u32> {
        (self.address.len() == 3).then(|| BigEndian::read_u24(&self.address))
    }

    /// Data bytes as uppercase 2-character hex strings
    pub fn data_hex(&self) -> Vec<String> {
        self.data.iter().map(|b| hex::encode_upper([*b])).collect()
    }
}

/// A CAN frame grouped from one identifier row and its data rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanFrame {
    /// Identifier exactly as captured (quotes preserved)
    pub identifier: String,
    /// Data bytes exactly as captured, in source order
    pub data: Vec<String>,
    pub line: usize,
}

impl CanFrame {
    pub fn new(identifier: impl Into<String>, line: usize) -> Self {
        Self {
            identifier: identifier.into(),
            data: Vec::new(),
            line,
        }
    }
}

/// Identifier occurrence counts, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierTally {
    counts: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
}

impl IdentifierTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identifier: &str) {
        match self.positions.get(identifier) {
            Some(&pos) => self.counts[pos].1 += 1,
            None => {
                self.positions.insert(identifier.to_string(), self.counts.len());
                self.counts.push((identifier.to_string(), 1));
            }
        }
    }

    pub fn count(&self, identifier: &str) -> usize {
        self.positions
            .get(identifier)
            .map(|&pos| self.counts[pos].1)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(id, count)| (id.as_str(), *count))
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    /// Number of distinct identifiers
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Serialize for IdentifierTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (identifier, count) in &self.counts {
            map.serialize_entry(identifier, count)?;
        }
        map.end()
    }
}

/// Output of the CAN grouper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanGrouping {
    pub tally: IdentifierTally,
    pub frames: Vec<CanFrame>,
}

/// An I2C address row plus the data rows that immediately follow it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct I2cTransaction {
    pub address_row: TraceRecord,
    pub data_rows: Vec<TraceRecord>,
}

impl I2cTransaction {
    pub fn new(address_row: TraceRecord) -> Self {
        Self {
            address_row,
            data_rows: Vec::new(),
        }
    }
}
