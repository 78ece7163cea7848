//! AvailableCapacity CRD
//!
//! Unreserved capacity at a location (drive UUID or LogicalVolumeGroup name).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::StorageClass;

/// AvailableCapacity offers free space at one location for new placements.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "baremetal.csi.io",
    version = "v1",
    kind = "AvailableCapacity",
    plural = "availablecapacities",
    shortname = "ac",
    printcolumn = r#"{"name": "Size", "type": "integer", "jsonPath": ".spec.size"}"#,
    printcolumn = r#"{"name": "Class", "type": "string", "jsonPath": ".spec.storageClass"}"#,
    printcolumn = r#"{"name": "Location", "type": "string", "jsonPath": ".spec.location"}"#,
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.nodeId"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCapacitySpec {
    pub node_id: String,
    #[serde(default)]
    pub storage_class: StorageClass,
    pub location: String,
    #[serde(default)]
    pub size: u64,
}

/// Record name used for the capacity at a location
pub fn capacity_name(location: &str) -> String {
    format!("ac-{}", location.to_lowercase())
}
