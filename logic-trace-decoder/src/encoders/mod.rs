//! Artifact encoders for reconstructed SPI reads

pub mod image;
pub mod srecord;

pub use image::{encode_binary, BinaryArtifacts, MemoryImage};
pub use srecord::{encode_srecords, SRecord, SRECORD_DATA_SIZE};
