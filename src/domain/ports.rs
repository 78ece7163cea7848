//! Domain Ports - Core trait definitions for the node controller
//!
//! These traits define the boundaries between the reconciliation logic and
//! external systems: the drive manager, the OS probe layer, LVM, the volume
//! provisioners, the event sink and the command runner. Adapters implement
//! these traits to provide concrete functionality.

use crate::crd::{Drive, DriveStatus, DriveType, Health, VolumeSpec};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

// =============================================================================
// Inventory Types
// =============================================================================

/// A physical drive as reported by the drive manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveDescriptor {
    /// Controller UUID, absent for never-seen hardware
    pub uuid: Option<String>,
    /// Serial number, the cross-reference key between snapshots
    pub serial_number: String,
    /// Size in bytes
    pub size: u64,
    /// Media type
    pub drive_type: DriveType,
    /// Device path (e.g., /dev/sda)
    pub path: String,
    /// Presence
    pub status: DriveStatus,
    /// Health
    pub health: Health,
    /// Drive manager already knows the drive hosts the OS
    pub is_system: bool,
}

// =============================================================================
// Probe Types
// =============================================================================

/// A block device and its children as listed by the probe layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDevice {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub device_type: String,
    pub serial: String,
    pub mount_point: String,
    pub fs_type: String,
    pub children: Vec<BlockDevice>,
}

impl BlockDevice {
    /// Whether this device or any descendant is mounted at `mount_point`
    pub fn is_mounted_at(&self, mount_point: &str) -> bool {
        self.mount_point == mount_point
            || self.children.iter().any(|c| c.is_mounted_at(mount_point))
    }
}

/// Outcome of probing a drive for pre-existing data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverResult {
    pub has_data: bool,
    pub message: String,
}

/// Output of an external command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code, None when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

// =============================================================================
// Event Types
// =============================================================================

/// Severity of an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
    Error,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Warning => write!(f, "Warning"),
            EventType::Error => write!(f, "Error"),
        }
    }
}

/// Reason code of an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventReason {
    DriveDiscovered,
    DriveHealthGood,
    DriveHealthBad,
    DriveHealthUnknown,
    DriveHealthSuspect,
    DriveStatusOnline,
    DriveStatusOffline,
}

impl EventReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventReason::DriveDiscovered => "DriveDiscovered",
            EventReason::DriveHealthGood => "DriveHealthGood",
            EventReason::DriveHealthBad => "DriveHealthBad",
            EventReason::DriveHealthUnknown => "DriveHealthUnknown",
            EventReason::DriveHealthSuspect => "DriveHealthSuspect",
            EventReason::DriveStatusOnline => "DriveStatusOnline",
            EventReason::DriveStatusOffline => "DriveStatusOffline",
        }
    }
}

impl std::fmt::Display for EventReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Inventory Source Port
// =============================================================================

/// Port for the drive manager that enumerates physical drives
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Current drives attached to the node
    async fn list_drives(&self, node_id: &str) -> Result<Vec<DriveDescriptor>>;
}

// =============================================================================
// Probe Ports
// =============================================================================

/// Port for block device enumeration
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlockDeviceLister: Send + Sync {
    /// List the device at `path` (or every device when empty) with children
    async fn list_block_devices(&self, path: &str) -> Result<Vec<BlockDevice>>;
}

/// Port for filesystem, partition table, partition and PV detection
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataDiscoverer: Send + Sync {
    async fn discover_data(&self, path: &str, serial: &str) -> Result<DiscoverResult>;
}

/// Port for LVM queries and logical volume operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LvmOps: Send + Sync {
    /// Physical volume device names
    async fn list_physical_volumes(&self) -> Result<Vec<String>>;

    /// Volume group a physical volume belongs to
    async fn volume_group_of(&self, pv: &str) -> Result<String>;

    /// Free bytes in a volume group
    async fn free_space(&self, vg: &str) -> Result<u64>;

    /// Logical volume names in a volume group
    async fn logical_volumes_in(&self, vg: &str) -> Result<Vec<String>>;

    async fn create_lv(&self, vg: &str, name: &str, size: u64) -> Result<()>;

    async fn remove_lv(&self, vg: &str, name: &str) -> Result<()>;

    async fn expand_lv(&self, path: &str, size: u64) -> Result<()>;
}

// =============================================================================
// Provisioner Port
// =============================================================================

/// Port for the low-level provisioners that realize a volume on a drive or LVG.
///
/// Operations must be re-entrant: the reconciler may call `prepare_volume`
/// again for a volume it already prepared when a status write races.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn prepare_volume(&self, volume: &VolumeSpec) -> Result<()>;

    async fn release_volume(&self, volume: &VolumeSpec) -> Result<()>;

    async fn get_volume_path(&self, volume: &VolumeSpec) -> Result<String>;

    async fn expand(&self, path: &str, size: u64) -> Result<()>;
}

// =============================================================================
// Event Sink Port
// =============================================================================

/// Port for user-facing notifications about drives
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(
        &self,
        drive: &Drive,
        event_type: EventType,
        reason: EventReason,
        message: &str,
    ) -> Result<()>;
}

// =============================================================================
// Command Executor Port
// =============================================================================

/// Port for running host commands
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type InventorySourceRef = Arc<dyn InventorySource>;
pub type BlockDeviceListerRef = Arc<dyn BlockDeviceLister>;
pub type DataDiscovererRef = Arc<dyn DataDiscoverer>;
pub type LvmOpsRef = Arc<dyn LvmOps>;
pub type ProvisionerRef = Arc<dyn Provisioner>;
pub type EventRecorderRef = Arc<dyn EventRecorder>;
pub type ExecutorRef = Arc<dyn Executor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_reason_display() {
        assert_eq!(format!("{}", EventReason::DriveDiscovered), "DriveDiscovered");
        assert_eq!(format!("{}", EventReason::DriveHealthBad), "DriveHealthBad");
        assert_eq!(format!("{}", EventType::Warning), "Warning");
    }

    #[test]
    fn test_block_device_mounted_at() {
        let dev = BlockDevice {
            name: "sda".into(),
            children: vec![
                BlockDevice {
                    name: "sda1".into(),
                    mount_point: "/boot".into(),
                    ..Default::default()
                },
                BlockDevice {
                    name: "sda2".into(),
                    children: vec![BlockDevice {
                        name: "root".into(),
                        mount_point: "/hostroot".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert!(dev.is_mounted_at("/hostroot"));
        assert!(dev.is_mounted_at("/boot"));
        assert!(!dev.is_mounted_at("/var/lib/kubelet"));
    }
}
