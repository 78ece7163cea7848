//! Drive CRD
//!
//! One record per physical drive ever seen on a node. Records are keyed by a
//! controller-assigned UUID and cross-referenced with inventory snapshots by
//! serial number.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{DriveStatus, DriveType, DriveUsage, Health};

// =============================================================================
// Drive CRD
// =============================================================================

/// Drive tracks a physical drive attached to a node, its presence, health and
/// whether it carries pre-existing data.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "baremetal.csi.io",
    version = "v1",
    kind = "Drive",
    plural = "drives",
    shortname = "drv",
    printcolumn = r#"{"name": "Serial", "type": "string", "jsonPath": ".spec.serialNumber"}"#,
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.nodeId"}"#,
    printcolumn = r#"{"name": "Type", "type": "string", "jsonPath": ".spec.type"}"#,
    printcolumn = r#"{"name": "Health", "type": "string", "jsonPath": ".spec.health"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".spec.status"}"#,
    printcolumn = r#"{"name": "Usage", "type": "string", "jsonPath": ".spec.usage"}"#,
    printcolumn = r#"{"name": "Clean", "type": "boolean", "jsonPath": ".spec.isClean"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DriveSpec {
    /// Controller-assigned identifier, immutable once set
    pub uuid: String,

    /// Serial number reported by the drive manager
    #[serde(default)]
    pub serial_number: String,

    /// Size in bytes
    #[serde(default)]
    pub size: u64,

    /// Media type
    #[serde(default, rename = "type")]
    pub drive_type: DriveType,

    /// Presence on the node
    #[serde(default)]
    pub status: DriveStatus,

    /// Health reported by the drive manager
    #[serde(default)]
    pub health: Health,

    /// Device path; may be empty once the device is gone
    #[serde(default)]
    pub path: String,

    /// Node the drive is attached to
    #[serde(default)]
    pub node_id: String,

    /// Drive hosts the operating system
    #[serde(default)]
    pub is_system: bool,

    /// No filesystem, partition table, partitions or PV found on the drive
    #[serde(default)]
    pub is_clean: bool,

    /// Consumer lifecycle
    #[serde(default)]
    pub usage: DriveUsage,
}

impl DriveSpec {
    /// Whether the drive can offer capacity for new placements
    pub fn is_usable(&self) -> bool {
        self.health == Health::Good
            && self.status == DriveStatus::Online
            && self.is_clean
            && !self.is_system
            && self.usage == DriveUsage::InUse
    }

    /// Whether any field observed from inventory differs from `other`
    pub fn inventory_differs(&self, other: &DriveSpec) -> bool {
        self.health != other.health
            || self.status != other.status
            || self.size != other.size
            || self.path != other.path
            || self.drive_type != other.drive_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_drive() -> DriveSpec {
        DriveSpec {
            uuid: "uuid-1".into(),
            serial_number: "hdd1-serial".into(),
            size: 500 * 1024 * 1024 * 1024,
            drive_type: DriveType::Hdd,
            status: DriveStatus::Online,
            health: Health::Good,
            path: "/dev/sda".into(),
            node_id: "node-1".into(),
            is_clean: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_usable_drive() {
        let drive = online_drive();
        assert!(drive.is_usable());

        let mut system = drive.clone();
        system.is_system = true;
        assert!(!system.is_usable());

        let mut bad = drive.clone();
        bad.health = Health::Bad;
        assert!(!bad.is_usable());

        let mut dirty = drive;
        dirty.is_clean = false;
        assert!(!dirty.is_usable());
    }

    #[test]
    fn test_inventory_differs_ignores_controller_fields() {
        let drive = online_drive();

        let mut flags_changed = drive.clone();
        flags_changed.is_clean = false;
        flags_changed.usage = DriveUsage::Releasing;
        assert!(!drive.inventory_differs(&flags_changed));

        let mut moved = drive.clone();
        moved.path = "/dev/sdc".into();
        assert!(drive.inventory_differs(&moved));
    }

    #[test]
    fn test_drive_wire_format() {
        let json = serde_json::to_value(online_drive()).unwrap();
        assert_eq!(json["serialNumber"], "hdd1-serial");
        assert_eq!(json["type"], "HDD");
        assert_eq!(json["usage"], "IN_USE");
        assert_eq!(json["isClean"], true);
    }
}
