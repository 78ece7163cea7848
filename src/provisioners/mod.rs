//! Provisioners
//!
//! A volume is realized either on a whole drive or as a logical volume inside
//! a LogicalVolumeGroup. The registry maps each [`ProvisionerKind`] to the
//! active implementation and can be swapped at runtime.

pub mod drive;
pub mod lvm;

pub use drive::DriveProvisioner;
pub use lvm::LvmProvisioner;

use crate::crd::VolumeSpec;
use crate::domain::ports::ProvisionerRef;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage mode of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionerKind {
    DriveBased,
    LvmBased,
}

impl ProvisionerKind {
    /// Kind selected by the volume's storage class
    pub fn for_volume(volume: &VolumeSpec) -> Self {
        if volume.storage_class.is_lvg() {
            ProvisionerKind::LvmBased
        } else {
            ProvisionerKind::DriveBased
        }
    }
}

impl std::fmt::Display for ProvisionerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionerKind::DriveBased => write!(f, "drive"),
            ProvisionerKind::LvmBased => write!(f, "lvm"),
        }
    }
}

pub type ProvisionerMap = HashMap<ProvisionerKind, ProvisionerRef>;

/// Active provisioners, replaced as a whole
#[derive(Clone, Default)]
pub struct ProvisionerRegistry {
    active: Arc<RwLock<Arc<ProvisionerMap>>>,
}

impl ProvisionerRegistry {
    pub fn new(provisioners: ProvisionerMap) -> Self {
        Self {
            active: Arc::new(RwLock::new(Arc::new(provisioners))),
        }
    }

    /// Swap in a new provisioner map; readers see either the old or the new map
    pub fn set(&self, provisioners: ProvisionerMap) {
        *self.active.write() = Arc::new(provisioners);
    }

    /// Map visible to one reconcile
    pub fn snapshot(&self) -> Arc<ProvisionerMap> {
        self.active.read().clone()
    }

    pub fn get(&self, kind: ProvisionerKind) -> Result<ProvisionerRef> {
        self.snapshot()
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::ProvisionerUnavailable {
                kind: kind.to_string(),
            })
    }

    pub fn for_volume(&self, volume: &VolumeSpec) -> Result<ProvisionerRef> {
        self.get(ProvisionerKind::for_volume(volume))
    }
}

impl std::fmt::Debug for ProvisionerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ProvisionerKind> = self.snapshot().keys().copied().collect();
        f.debug_struct("ProvisionerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
