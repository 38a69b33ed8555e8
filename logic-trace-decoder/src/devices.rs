//! Flash device profiles
//!
//! A profile binds the four read opcodes and the addressable size of a flash
//! part. The size includes 256 bytes of slack past the last address so a
//! page-sized read starting at the top of the array still fits the image.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::types::SpiCommand;
use serde::{Deserialize, Serialize};

/// Name of the fallback profile
pub const DEFAULT_DEVICE: &str = "DEFAULT";

/// Bytes allowed past the last array address
pub const IMAGE_SLACK: usize = 256;

const READ: u8 = 0x03;
const FAST_READ: u8 = 0x0B;
const FAST_DUAL_READ: u8 = 0x3B;
const FAST_QUAD_READ: u8 = 0xEB;

fn default_read() -> u8 {
    READ
}

fn default_fast_read() -> u8 {
    FAST_READ
}

fn default_fast_dual_read() -> u8 {
    FAST_DUAL_READ
}

fn default_fast_quad_read() -> u8 {
    FAST_QUAD_READ
}

/// Opcodes and size of one flash part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    #[serde(default = "default_read")]
    pub read: u8,
    #[serde(default = "default_fast_read")]
    pub fast_read: u8,
    #[serde(default = "default_fast_dual_read")]
    pub fast_dual_read: u8,
    #[serde(default = "default_fast_quad_read")]
    pub fast_quad_read: u8,
    /// Size of the memory image in bytes
    pub size: usize,
}

impl DeviceProfile {
    /// Profile with the common 03/0B/3B/EB opcodes, sized for `last_address`
    pub fn standard(name: impl Into<String>, last_address: usize) -> Self {
        Self {
            name: name.into(),
            read: READ,
            fast_read: FAST_READ,
            fast_dual_read: FAST_DUAL_READ,
            fast_quad_read: FAST_QUAD_READ,
            size: last_address + IMAGE_SLACK,
        }
    }

    pub fn opcode(&self, command: SpiCommand) -> u8 {
        match command {
            SpiCommand::Read => self.read,
            SpiCommand::FastRead => self.fast_read,
            SpiCommand::FastDualRead => self.fast_dual_read,
            SpiCommand::FastQuadRead => self.fast_quad_read,
        }
    }

    /// Command for an opcode byte, checked in priority order
    pub fn command_for(&self, opcode: u8) -> Option<SpiCommand> {
        SpiCommand::PRIORITY
            .into_iter()
            .find(|&command| self.opcode(command) == opcode)
    }
}

/// Known device profiles
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    profiles: Vec<DeviceProfile>,
}

impl DeviceRegistry {
    /// Registry holding the built-in Winbond parts
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                DeviceProfile::standard(DEFAULT_DEVICE, 0x3FF_FFFF),
                DeviceProfile::standard("W25Q64FW", 0x7F_FFFF),
                DeviceProfile::standard("W25Q16JV", 0x1F_FFFF),
                DeviceProfile::standard("W25Q128JVSQ", 0xFF_FFFF),
                DeviceProfile::standard("W25Q256JV", 0x1FF_FFFF),
                DeviceProfile::standard("W25Q512JV", 0x3FF_FFFF),
            ],
        }
    }

    /// Add a profile, replacing any profile with the same name
    pub fn register(&mut self, profile: DeviceProfile) {
        log::debug!("Registering device profile {}", profile.name);
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// Profile for a name, falling back to DEFAULT for unknown names
    pub fn resolve(&self, name: Option<&str>, diagnostics: &mut Diagnostics) -> DeviceProfile {
        if let Some(name) = name {
            if let Some(profile) = self.get(name) {
                return profile.clone();
            }
            diagnostics.push(Diagnostic::UnknownDevice {
                name: name.to_string(),
            });
        }
        self.get(DEFAULT_DEVICE)
            .cloned()
            .unwrap_or_else(|| DeviceProfile::standard(DEFAULT_DEVICE, 0x3FF_FFFF))
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sizes() {
        let registry = DeviceRegistry::builtin();
        assert_eq!(registry.get("W25Q16JV").unwrap().size, 0x1F_FFFF + 256);
        assert_eq!(registry.get(DEFAULT_DEVICE).unwrap().size, 0x3FF_FFFF + 256);
        assert_eq!(registry.names().count(), 6);
    }

    #[test]
    fn test_command_priority() {
        let mut profile = DeviceProfile::standard("ODD", 0xFFFF);
        profile.fast_read = READ;
        assert_eq!(profile.command_for(0x03), Some(SpiCommand::Read));
        assert_eq!(profile.command_for(0x3B), Some(SpiCommand::FastDualRead));
        assert_eq!(profile.command_for(0xEB), Some(SpiCommand::FastQuadRead));
        assert_eq!(profile.command_for(0xFF), None);
    }

    #[test]
    fn test_unknown_device_falls_back() {
        let registry = DeviceRegistry::builtin();
        let mut diagnostics = Diagnostics::new();

        let profile = registry.resolve(Some("AT25SF041"), &mut diagnostics);
        assert_eq!(profile.name, DEFAULT_DEVICE);
        assert_eq!(
            diagnostics.entries(),
            &[Diagnostic::UnknownDevice {
                name: "AT25SF041".to_string()
            }]
        );

        let profile = registry.resolve(None, &mut diagnostics);
        assert_eq!(profile.name, DEFAULT_DEVICE);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = DeviceRegistry::builtin();
        registry.register(DeviceProfile::standard("W25Q16JV", 0xFFF));
        registry.register(DeviceProfile::standard("MX25L8006E", 0xF_FFFF));
        assert_eq!(registry.get("W25Q16JV").unwrap().size, 0xFFF + 256);
        assert_eq!(registry.names().count(), 7);
    }
}
