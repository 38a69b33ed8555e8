//! Configuration file loading
//!
//! The optional TOML file supplies defaults for options that are tedious to
//! repeat on every invocation, plus extra flash device profiles. Command-line
//! flags always take precedence over `[defaults]`.

use anyhow::{Context, Result};
use logic_trace_decoder::{DeviceProfile, DeviceRegistry, Protocol};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub devices: Vec<DeviceProfile>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DefaultsConfig {
    pub protocol: Option<Protocol>,
    pub device: Option<String>,
    /// Directory receiving seq_read.bin and mem_map.bin
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Built-in device profiles plus the ones declared in the file
    pub fn device_registry(&self) -> DeviceRegistry {
        let mut registry = DeviceRegistry::builtin();
        for profile in &self.devices {
            log::debug!("Registering device profile {} ({} bytes)", profile.name, profile.size);
            registry.register(profile.clone());
        }
        registry
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for profile in &config.devices {
        if profile.size == 0 {
            anyhow::bail!("Device profile '{}' in {:?} has zero size", profile.name, path);
        }
    }

    Ok(config)
}
