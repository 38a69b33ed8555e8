//! Motorola S-record encoding
//!
//! Every transaction is split into chunks of at most 32 data bytes and each
//! chunk becomes one S2 (24-bit address) line:
//!
//! ```text
//! S2 | count | address (3 bytes) | data (n bytes) | checksum
//!      count    = n + 3 + 1
//!      checksum = !(low byte of count + address bytes + data bytes)
//! ```
//!
//! Only data records are produced; there is no S0 header or S8/S9 trailer.

use crate::types::SpiTransaction;
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Maximum data bytes per record
pub const SRECORD_DATA_SIZE: usize = 32;

const ADDRESS_SIZE: usize = 3;
const CHECKSUM_SIZE: usize = 1;
const ADDRESS_MASK: u32 = 0xFF_FFFF;

/// One S2 data record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SRecord {
    pub address: u32,
    pub data: Vec<u8>,
}

impl SRecord {
    fn address_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let mut bytes = [0u8; ADDRESS_SIZE];
        BigEndian::write_u24(&mut bytes, self.address & ADDRESS_MASK);
        bytes
    }

    /// Bytes following the count field
    pub fn byte_count(&self) -> u8 {
        (self.data.len() + ADDRESS_SIZE + CHECKSUM_SIZE) as u8
    }

    pub fn checksum(&self) -> u8 {
        let sum = self
            .address_bytes()
            .iter()
            .chain(&self.data)
            .fold(self.byte_count(), |acc, &b| acc.wrapping_add(b));
        !sum
    }
}

impl fmt::Display for SRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S2{:02X}{}{}{:02X}",
            self.byte_count(),
            hex::encode_upper(self.address_bytes()),
            hex::encode_upper(&self.data),
            self.checksum()
        )
    }
}

/// Encode the reads of one transaction
fn encode_transaction(tx: &SpiTransaction) -> Vec<SRecord> {
    if tx.data.is_empty() {
        return Vec::new();
    }
    let Some(start) = tx.address_value() else {
        log::warn!(
            "Skipping {} bytes read at line {}: incomplete address '{}'",
            tx.data.len(),
            tx.line,
            tx.address_hex()
        );
        return Vec::new();
    };

    let mut address = start;
    tx.data
        .chunks(SRECORD_DATA_SIZE)
        .map(|chunk| {
            let record = SRecord {
                address,
                data: chunk.to_vec(),
            };
            let next = address + chunk.len() as u32;
            if next > ADDRESS_MASK + 1 {
                log::warn!("Read at line {} wraps past 0xFFFFFF", tx.line);
            }
            address = next & ADDRESS_MASK;
            record
        })
        .collect()
}

/// Encode every transaction, in order
pub fn encode_srecords(transactions: &[SpiTransaction]) -> Vec<SRecord> {
    let records: Vec<SRecord> = transactions.iter().flat_map(encode_transaction).collect();
    log::info!(
        "Encoded {} transactions into {} S-records",
        transactions.len(),
        records.len()
    );
    records
}
