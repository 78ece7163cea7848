//! Volume CRD
//!
//! A logical volume requested on this node, placed either on a whole drive or
//! inside a logical volume group.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{CsiStatus, Health, StorageClass, VolumeMode};

/// Finalizer protecting a volume until its status is terminal
pub const VOLUME_FINALIZER: &str = "baremetal.csi.io/volume-protection";

// =============================================================================
// Volume CRD
// =============================================================================

/// Volume is driven from CREATING to CREATED (or FAILED) by the node controller,
/// and from REMOVING to REMOVED on deletion.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "baremetal.csi.io",
    version = "v1",
    kind = "Volume",
    plural = "volumes",
    shortname = "vol",
    printcolumn = r#"{"name": "Size", "type": "integer", "jsonPath": ".spec.size"}"#,
    printcolumn = r#"{"name": "Class", "type": "string", "jsonPath": ".spec.storageClass"}"#,
    printcolumn = r#"{"name": "Location", "type": "string", "jsonPath": ".spec.location"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".spec.csiStatus"}"#,
    printcolumn = r#"{"name": "Health", "type": "string", "jsonPath": ".spec.health"}"#,
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.nodeId"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Volume identifier
    pub id: String,

    /// Requested size in bytes
    #[serde(default)]
    pub size: u64,

    /// Requested storage class
    #[serde(default)]
    pub storage_class: StorageClass,

    /// Drive UUID, or LogicalVolumeGroup name for LVG classes
    #[serde(default)]
    pub location: String,

    /// Provisioning status
    #[serde(default, rename = "csiStatus")]
    #[schemars(with = "String")]
    pub csi_status: CsiStatus,

    /// Node that owns the volume
    #[serde(default)]
    pub node_id: String,

    /// Raw block or filesystem
    #[serde(default)]
    pub mode: VolumeMode,

    /// Filesystem type for filesystem mode
    #[serde(default, rename = "type")]
    pub fs_type: String,

    /// Health derived from the backing drive or volume group
    #[serde(default)]
    pub health: Health,
}

impl VolumeSpec {
    /// Whether the location names a LogicalVolumeGroup rather than a drive
    pub fn is_in_lvg(&self) -> bool {
        self.storage_class.is_lvg()
    }
}
