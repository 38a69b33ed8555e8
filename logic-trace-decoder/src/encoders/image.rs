//! Flat binary artifacts
//!
//! Two byte streams are produced from the same transactions:
//! - the sequential read stream: every data byte in the order it was read
//! - the memory image: a zero-filled buffer of the device size with each byte
//!   written at `address + offset`
//!
//! A byte that falls outside the image is a reconstruction error and fails the
//! whole encoding; nothing is truncated or wrapped.

use crate::types::{DecoderError, Result, SpiTransaction};

/// Address-indexed memory image of a fixed size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    buffer: Vec<u8>,
}

impl MemoryImage {
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0u8; size],
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write bytes starting at an absolute offset
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let size = self.buffer.len();
        let end = offset + bytes.len() as u64;
        if end > size as u64 {
            return Err(DecoderError::AddressOverflow {
                offset: offset.max(size as u64),
                size,
            });
        }
        let start = offset as usize;
        self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Both binary artifacts, built in memory before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryArtifacts {
    /// Data bytes in read order
    pub sequential: Vec<u8>,
    /// Data bytes at their flash addresses
    pub image: Vec<u8>,
}

/// Build the sequential stream and the memory image for a device size
pub fn encode_binary(transactions: &[SpiTransaction], size: usize) -> Result<BinaryArtifacts> {
    let mut image = MemoryImage::new(size);
    let mut sequential = Vec::new();

    for tx in transactions.iter().filter(|tx| !tx.data.is_empty()) {
        let address = tx.address_value().ok_or_else(|| DecoderError::IncompleteAddress {
            line: tx.line,
            address: tx.address_hex(),
            data_len: tx.data.len(),
        })?;
        log::trace!("Writing {} bytes at 0x{:06X}", tx.data.len(), address);

        image.write(address as u64, &tx.data)?;
        sequential.extend_from_slice(&tx.data);
    }

    log::info!(
        "Built {} byte read stream and {} byte memory image",
        sequential.len(),
        image.len()
    );

    Ok(BinaryArtifacts {
        sequential,
        image: image.into_bytes(),
    })
}
