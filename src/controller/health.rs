//! Health propagation
//!
//! Cascades a drive's health to the capacity offered on it and to the
//! Volumes and LogicalVolumeGroups placed on it. Every step is best-effort.

use super::volume_manager::VolumeManager;
use crate::crd::{AvailableCapacity, Drive, Health, LogicalVolumeGroup, Volume};
use crate::error::Result;
use crate::store::{name_of, ResourceStore};
use tracing::{error, info, instrument};

impl<S: ResourceStore> VolumeManager<S> {
    /// Propagate the drive's health and status to its dependents
    #[instrument(skip(self, drive), fields(drive = %drive.spec.uuid, health = %drive.spec.health))]
    pub async fn handle_drive_status_change(&self, drive: &Drive) {
        let uuid = &drive.spec.uuid;
        let health = drive.spec.health;

        if health != Health::Good {
            if let Err(e) = self.remove_capacity_at(uuid).await {
                error!(error = %e, "Failed to remove capacity of degraded drive");
            }
        }

        if let Err(e) = self.propagate_to_volumes(uuid, health).await {
            error!(error = %e, "Failed to propagate drive health to volumes");
        }

        if let Err(e) = self.propagate_to_lvgs(uuid, health).await {
            error!(error = %e, "Failed to propagate drive health to volume groups");
        }
    }

    async fn remove_capacity_at(&self, location: &str) -> Result<()> {
        let capacities: Vec<AvailableCapacity> = self.store.list().await?;
        for ac in capacities.iter().filter(|ac| ac.spec.location == location) {
            let name = name_of(ac)?;
            match self.store.delete::<AvailableCapacity>(&name).await {
                Ok(()) => info!(capacity = %name, "Capacity removed"),
                Err(e) if e.is_not_found() => {}
                Err(e) => error!(capacity = %name, error = %e, "Failed to remove capacity"),
            }
        }
        Ok(())
    }

    async fn propagate_to_volumes(&self, uuid: &str, health: Health) -> Result<()> {
        let volumes: Vec<Volume> = self.store.list().await?;
        for mut volume in volumes.into_iter().filter(|v| v.spec.location == uuid) {
            if volume.spec.health == health {
                continue;
            }
            volume.spec.health = health;
            match self.store.update(&volume).await {
                Ok(_) => info!(volume = %volume.spec.id, %health, "Volume health updated"),
                Err(e) => error!(volume = %volume.spec.id, error = %e, "Failed to update volume health"),
            }
        }
        Ok(())
    }

    async fn propagate_to_lvgs(&self, uuid: &str, health: Health) -> Result<()> {
        let lvgs: Vec<LogicalVolumeGroup> = self.store.list().await?;
        for mut lvg in lvgs.into_iter().filter(|l| l.spec.contains_drive(uuid)) {
            if lvg.spec.health == health {
                continue;
            }
            lvg.spec.health = health;
            let name = name_of(&lvg)?;
            match self.store.update(&lvg).await {
                Ok(_) => info!(lvg = %name, %health, "Volume group health updated"),
                Err(e) => error!(lvg = %name, error = %e, "Failed to update volume group health"),
            }
        }
        Ok(())
    }
}
