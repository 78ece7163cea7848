//! LogicalVolumeGroup CRD
//!
//! An LVM volume group modeled as a storage pool, backed by one or more drives.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{CsiStatus, Health};

// =============================================================================
// LogicalVolumeGroup CRD
// =============================================================================

/// LogicalVolumeGroup records a volume group, the drives it spans and the
/// volumes carved from it.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "baremetal.csi.io",
    version = "v1",
    kind = "LogicalVolumeGroup",
    plural = "logicalvolumegroups",
    shortname = "lvg",
    printcolumn = r#"{"name": "VG", "type": "string", "jsonPath": ".spec.name"}"#,
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.node"}"#,
    printcolumn = r#"{"name": "Size", "type": "integer", "jsonPath": ".spec.size"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".spec.status"}"#,
    printcolumn = r#"{"name": "Health", "type": "string", "jsonPath": ".spec.health"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LogicalVolumeGroupSpec {
    /// Volume group name on the host
    pub name: String,

    /// Node the group lives on
    #[serde(default)]
    pub node: String,

    /// Backing drive UUIDs, in order
    #[serde(default)]
    pub locations: Vec<String>,

    /// Size in bytes
    #[serde(default)]
    pub size: u64,

    /// Provisioning status
    #[serde(default)]
    #[schemars(with = "String")]
    pub status: CsiStatus,

    /// Volume ids carved from the group, without duplicates
    #[serde(default)]
    pub volume_refs: Vec<String>,

    /// Health derived from the backing drives
    #[serde(default)]
    pub health: Health,
}

impl LogicalVolumeGroupSpec {
    /// Append a volume id unless it is already referenced.
    /// Returns whether the list changed.
    pub fn add_volume_ref(&mut self, volume_id: &str) -> bool {
        if self.volume_refs.iter().any(|r| r == volume_id) {
            return false;
        }
        self.volume_refs.push(volume_id.to_string());
        true
    }

    /// Drop a volume id. Returns whether the list changed.
    pub fn remove_volume_ref(&mut self, volume_id: &str) -> bool {
        let before = self.volume_refs.len();
        self.volume_refs.retain(|r| r != volume_id);
        before != self.volume_refs.len()
    }

    /// Whether the group spans the given drive
    pub fn contains_drive(&self, drive_uuid: &str) -> bool {
        self.locations.iter().any(|l| l == drive_uuid)
    }
}
