//! Custom Resource Definitions for the node controller
//!
//! This module contains all CRD types:
//! - Drive: a physical drive attached to a node
//! - Volume: a volume placed on a drive or inside a volume group
//! - LogicalVolumeGroup: an LVM volume group used as a storage pool
//! - AvailableCapacity: unreserved capacity at a location

pub mod available_capacity;
pub mod drive;
pub mod logical_volume_group;
pub mod types;
pub mod volume;

pub use available_capacity::*;
pub use drive::*;
pub use logical_volume_group::*;
pub use types::*;
pub use volume::*;
