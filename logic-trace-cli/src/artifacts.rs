//! Binary artifact files
//!
//! Both files are written only once the decoder library has built both
//! buffers, so a failed reconstruction never leaves a half-written pair.

use anyhow::{Context, Result};
use logic_trace_decoder::BinaryArtifacts;
use std::fs;
use std::path::{Path, PathBuf};

/// Sequential read stream
pub const SEQUENTIAL_FILE: &str = "seq_read.bin";
/// Address-indexed memory image
pub const IMAGE_FILE: &str = "mem_map.bin";

/// Write `seq_read.bin` and `mem_map.bin` into `dir`, returning their paths
pub fn write_binary_artifacts(dir: &Path, artifacts: &BinaryArtifacts) -> Result<[PathBuf; 2]> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let sequential = dir.join(SEQUENTIAL_FILE);
    log::info!("Writing {:?} ({} bytes)", sequential, artifacts.sequential.len());
    fs::write(&sequential, &artifacts.sequential)
        .with_context(|| format!("Failed to write {:?}", sequential))?;

    let image = dir.join(IMAGE_FILE);
    log::info!("Writing {:?} ({} bytes)", image, artifacts.image.len());
    fs::write(&image, &artifacts.image).with_context(|| format!("Failed to write {:?}", image))?;

    Ok([sequential, image])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dump");
        let artifacts = BinaryArtifacts {
            sequential: vec![0xDE, 0xAD],
            image: vec![0, 0, 0, 0, 0xDE, 0xAD, 0, 0],
        };

        let [sequential, image] = write_binary_artifacts(&out, &artifacts).unwrap();
        assert_eq!(sequential, out.join(SEQUENTIAL_FILE));
        assert_eq!(fs::read(&sequential).unwrap(), artifacts.sequential);
        assert_eq!(fs::read(&image).unwrap(), artifacts.image);
    }
}
