//! LVM provisioner
//!
//! An LVG-based volume is a logical volume named after the volume id, carved
//! from the volume group recorded by the LogicalVolumeGroup at its location.

use crate::crd::{LogicalVolumeGroup, VolumeSpec};
use crate::domain::ports::{LvmOpsRef, Provisioner};
use crate::error::Result;
use crate::store::ResourceStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct LvmProvisioner<S> {
    store: Arc<S>,
    lvm: LvmOpsRef,
}

impl<S: ResourceStore> LvmProvisioner<S> {
    pub fn new(store: Arc<S>, lvm: LvmOpsRef) -> Self {
        Self { store, lvm }
    }

    async fn volume_group(&self, volume: &VolumeSpec) -> Result<String> {
        let lvg: LogicalVolumeGroup = self.store.read(&volume.location).await?;
        Ok(lvg.spec.name)
    }

    async fn lv_exists(&self, vg: &str, name: &str) -> Result<bool> {
        Ok(self
            .lvm
            .logical_volumes_in(vg)
            .await?
            .iter()
            .any(|lv| lv == name))
    }
}

#[async_trait]
impl<S: ResourceStore> Provisioner for LvmProvisioner<S> {
    async fn prepare_volume(&self, volume: &VolumeSpec) -> Result<()> {
        let vg = self.volume_group(volume).await?;
        if self.lv_exists(&vg, &volume.id).await? {
            debug!(volume = %volume.id, vg = %vg, "Logical volume already exists");
            return Ok(());
        }
        self.lvm.create_lv(&vg, &volume.id, volume.size).await
    }

    async fn release_volume(&self, volume: &VolumeSpec) -> Result<()> {
        let vg = self.volume_group(volume).await?;
        if !self.lv_exists(&vg, &volume.id).await? {
            debug!(volume = %volume.id, vg = %vg, "Logical volume already removed");
            return Ok(());
        }
        self.lvm.remove_lv(&vg, &volume.id).await
    }

    async fn get_volume_path(&self, volume: &VolumeSpec) -> Result<String> {
        let vg = self.volume_group(volume).await?;
        Ok(format!("/dev/{}/{}", vg, volume.id))
    }

    async fn expand(&self, path: &str, size: u64) -> Result<()> {
        self.lvm.expand_lv(path, size).await
    }
}
