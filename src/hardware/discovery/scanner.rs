//! Block Device Scanner
//!
//! Enumerates whole-disk block devices from sysfs and reports them as the
//! node's drive inventory.

use super::smart::SmartHealth;
use crate::crd::{DriveStatus, DriveType, Health};
use crate::domain::ports::{DriveDescriptor, InventorySource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// =============================================================================
// Scanner Configuration
// =============================================================================

/// Configuration for the sysfs inventory
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Include loopback devices
    pub include_loopback: bool,
    /// Minimum device size to include (bytes)
    pub min_size_bytes: u64,
    /// Path to sysfs (for testing)
    pub sysfs_path: PathBuf,
    /// Directory holding device nodes
    pub dev_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            include_loopback: false,
            min_size_bytes: 1_000_000_000, // 1GB minimum
            sysfs_path: PathBuf::from("/sys"),
            dev_path: PathBuf::from("/dev"),
        }
    }
}

// =============================================================================
// Sysfs Inventory
// =============================================================================

/// Inventory source reading drives from sysfs
pub struct SysfsInventory {
    config: ScannerConfig,
    smart: Option<SmartHealth>,
}

impl SysfsInventory {
    /// Create an inventory; without a SMART reader every drive reports GOOD
    pub fn new(config: ScannerConfig, smart: Option<SmartHealth>) -> Self {
        Self { config, smart }
    }

    /// Whole-disk devices found under `class/block`
    pub fn scan(&self) -> Result<Vec<DriveDescriptor>> {
        let block_path = self.config.sysfs_path.join("class/block");
        if !block_path.exists() {
            return Err(Error::HardwareDiscovery(format!(
                "Block device sysfs not found at {}",
                block_path.display()
            )));
        }

        let mut drives = Vec::new();
        for entry in fs::read_dir(&block_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            if !self.should_include_device(&name) || is_partition(&entry.path()) {
                continue;
            }

            match self.scan_block_device(&entry.path(), &name) {
                Ok(drive) if drive.size >= self.config.min_size_bytes => drives.push(drive),
                Ok(drive) => debug!(device = %name, size = drive.size, "Skipping small device"),
                Err(e) => warn!(device = %name, error = %e, "Failed to scan device"),
            }
        }

        drives.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(drives)
    }

    fn scan_block_device(&self, sysfs_path: &Path, name: &str) -> Result<DriveDescriptor> {
        // Size is in 512-byte sectors
        let size_str = read_sysfs_attr(sysfs_path, "size")?;
        let sectors: u64 = size_str
            .trim()
            .parse()
            .map_err(|_| Error::HardwareDiscovery(format!("Invalid size: {}", size_str)))?;

        let serial = read_sysfs_attr(sysfs_path, "device/serial")
            .or_else(|_| read_sysfs_attr(sysfs_path, "serial"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Ok(DriveDescriptor {
            uuid: None,
            serial_number: serial,
            size: sectors * 512,
            drive_type: detect_drive_type(sysfs_path, name),
            path: self.config.dev_path.join(name).display().to_string(),
            status: DriveStatus::Online,
            health: Health::Unknown,
            is_system: false,
        })
    }

    /// Check if a device should be included
    fn should_include_device(&self, name: &str) -> bool {
        if !self.config.include_loopback && name.starts_with("loop") {
            return false;
        }

        const VIRTUAL_PREFIXES: [&str; 5] = ["ram", "dm-", "md", "zram", "sr"];
        !VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
    }
}

#[async_trait]
impl InventorySource for SysfsInventory {
    async fn list_drives(&self, node_id: &str) -> Result<Vec<DriveDescriptor>> {
        let mut drives = self.scan()?;
        for drive in drives.iter_mut() {
            drive.health = match &self.smart {
                Some(smart) => smart.health(&drive.path).await,
                None => Health::Good,
            };
        }
        info!(node = %node_id, count = drives.len(), "Drive inventory scanned");
        Ok(drives)
    }
}

/// Partitions have a "partition" file
fn is_partition(sysfs_path: &Path) -> bool {
    sysfs_path.join("partition").exists()
}

fn detect_drive_type(sysfs_path: &Path, name: &str) -> DriveType {
    if name.starts_with("nvme") {
        return DriveType::Nvme;
    }
    match read_sysfs_attr(sysfs_path, "queue/rotational") {
        Ok(rotational) if rotational.trim() == "0" => DriveType::Ssd,
        _ => DriveType::Hdd,
    }
}

fn read_sysfs_attr(base_path: &Path, attr: &str) -> Result<String> {
    let path = base_path.join(attr);
    fs::read_to_string(&path).map_err(|e| {
        Error::HardwareDiscovery(format!("Failed to read {}: {}", path.display(), e))
    })
}
