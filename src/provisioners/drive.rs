//! Whole-drive provisioner
//!
//! A drive-based volume occupies the entire drive named by its location.
//! Preparing checks that the device is present; releasing wipes signatures so
//! the drive probes clean again.

use crate::crd::{Drive, DriveStatus, VolumeSpec};
use crate::domain::ports::{BlockDeviceListerRef, ExecutorRef, Provisioner};
use crate::error::{Error, Result};
use crate::hardware::probe::run_checked;
use crate::store::ResourceStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct DriveProvisioner<S> {
    store: Arc<S>,
    lister: BlockDeviceListerRef,
    executor: ExecutorRef,
}

impl<S: ResourceStore> DriveProvisioner<S> {
    pub fn new(store: Arc<S>, lister: BlockDeviceListerRef, executor: ExecutorRef) -> Self {
        Self {
            store,
            lister,
            executor,
        }
    }

    async fn drive_path(&self, volume: &VolumeSpec, operation: &str) -> Result<String> {
        let drive: Drive = self.store.read(&volume.location).await?;
        if drive.spec.status != DriveStatus::Online || drive.spec.path.is_empty() {
            return Err(Error::Provisioner {
                operation: operation.to_string(),
                volume: volume.id.clone(),
                reason: format!("drive {} is offline", drive.spec.uuid),
            });
        }
        Ok(drive.spec.path)
    }
}

#[async_trait]
impl<S: ResourceStore> Provisioner for DriveProvisioner<S> {
    async fn prepare_volume(&self, volume: &VolumeSpec) -> Result<()> {
        let path = self.drive_path(volume, "prepare").await?;
        let devices = self.lister.list_block_devices(&path).await?;
        if devices.is_empty() {
            return Err(Error::Provisioner {
                operation: "prepare".into(),
                volume: volume.id.clone(),
                reason: format!("device {} not found", path),
            });
        }
        info!(volume = %volume.id, path = %path, "Drive volume prepared");
        Ok(())
    }

    async fn release_volume(&self, volume: &VolumeSpec) -> Result<()> {
        let path = self.drive_path(volume, "release").await?;
        run_checked(self.executor.as_ref(), "wipefs", &["--all", &path]).await?;
        info!(volume = %volume.id, path = %path, "Drive volume released");
        Ok(())
    }

    async fn get_volume_path(&self, volume: &VolumeSpec) -> Result<String> {
        self.drive_path(volume, "get path").await
    }

    async fn expand(&self, path: &str, _size: u64) -> Result<()> {
        Err(Error::Provisioner {
            operation: "expand".into(),
            volume: path.to_string(),
            reason: "whole-drive volumes cannot be expanded".into(),
        })
    }
}
