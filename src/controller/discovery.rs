//! Discover pass
//!
//! One pass takes an inventory snapshot, persists it as Drive records, emits
//! events, propagates health changes, probes drives for existing data,
//! adopts the system volume group and finally publishes the capacity of the
//! usable drives. Passes of one controller never overlap.

use super::volume_manager::VolumeManager;
use crate::crd::{capacity_name, AvailableCapacity, AvailableCapacitySpec, Drive, StorageClass};
use crate::error::{Error, Result};
use crate::store::ResourceStore;
use std::collections::HashSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

impl<S: ResourceStore> VolumeManager<S> {
    /// Run one Discover pass
    pub async fn discover(&self) -> Result<()> {
        let span = info_span!("discover", node = %self.config.node_id);
        let result = self.discover_pass().instrument(span).await;

        match &result {
            Ok(()) => self.metrics.record_discover("success"),
            Err(e) => {
                error!(error = %e, "Discover pass failed");
                self.metrics.record_discover("error");
            }
        }
        result
    }

    async fn discover_pass(&self) -> Result<()> {
        let _guard = self.discover_lock.lock().await;

        let inventory = self.inventory.list_drives(&self.config.node_id).await?;
        debug!(drives = inventory.len(), "Inventory received");

        let updates = self
            .update_drives_crs(&inventory)
            .await
            .map_err(|e| Error::in_step("update drive records", e))?;

        self.create_events_for_drive_updates(&updates).await;

        for updated in updates.updated.iter().filter(|u| u.health_or_status_changed()) {
            self.handle_drive_status_change(&updated.current_state).await;
        }

        self.discover_data_on_drives()
            .await
            .map_err(|e| Error::in_step("discover data on drives", e))?;

        // capacity sync still runs when the system LVG step fails
        let system_lvg = if self.config.discover_system_lvg {
            self.system_lvg_step()
                .await
                .map_err(|e| Error::in_step("discover system LVG", e))
        } else {
            Ok(())
        };

        self.sync_available_capacity().await?;
        system_lvg?;
        info!("Discover pass complete");
        Ok(())
    }

    async fn system_lvg_step(&self) -> Result<()> {
        let unknown = self.system_drives.read().is_empty();
        if unknown {
            self.rebuild_system_drives().await?;
        }
        self.discover_lvg_on_system_drive().await
    }

    /// Probe every drive of this node for pre-existing data and persist `isClean`
    pub async fn discover_data_on_drives(&self) -> Result<()> {
        let drives: Vec<Drive> = self.store.list().await?;

        for mut drive in drives
            .into_iter()
            .filter(|d| d.spec.node_id == self.config.node_id)
        {
            let is_clean = if drive.spec.path.is_empty() {
                false
            } else {
                match self
                    .data_discoverer
                    .discover_data(&drive.spec.path, &drive.spec.serial_number)
                    .await
                {
                    Ok(found) => {
                        if found.has_data {
                            debug!(drive = %drive.spec.uuid, "{}", found.message);
                        }
                        !found.has_data
                    }
                    Err(e) => {
                        warn!(drive = %drive.spec.uuid, error = %e, "Data probe failed, drive marked not clean");
                        false
                    }
                }
            };

            if drive.spec.is_clean == is_clean {
                continue;
            }
            drive.spec.is_clean = is_clean;
            match self.store.update(&drive).await {
                Ok(_) => info!(drive = %drive.spec.uuid, is_clean, "Drive cleanliness updated"),
                Err(e) => error!(drive = %drive.spec.uuid, error = %e, "Failed to update drive cleanliness"),
            }
        }
        Ok(())
    }

    async fn rebuild_system_drives(&self) -> Result<()> {
        let drives: Vec<Drive> = self.store.list().await?;
        let uuids: HashSet<String> = drives
            .into_iter()
            .filter(|d| d.spec.node_id == self.config.node_id && d.spec.is_system)
            .map(|d| d.spec.uuid)
            .collect();
        self.set_system_drives(uuids);
        Ok(())
    }

    /// Offer every usable, unused drive as AvailableCapacity and withdraw the rest
    pub async fn sync_available_capacity(&self) -> Result<()> {
        let drives: Vec<Drive> = self.store.list().await?;
        let capacities: Vec<AvailableCapacity> = self.store.list().await?;
        let offered: HashSet<&str> = capacities.iter().map(|ac| ac.spec.location.as_str()).collect();

        for drive in drives.iter().filter(|d| d.spec.node_id == self.config.node_id) {
            let uuid = drive.spec.uuid.as_str();
            let in_use = match self.is_drive_in_use(uuid).await {
                Ok(in_use) => in_use,
                Err(e) => {
                    warn!(drive = %uuid, error = %e, "Unable to determine drive usage");
                    continue;
                }
            };
            if in_use {
                continue;
            }

            let name = capacity_name(uuid);
            if drive.spec.is_usable() {
                if offered.contains(uuid) {
                    continue;
                }
                let ac = AvailableCapacity::new(
                    &name,
                    AvailableCapacitySpec {
                        node_id: self.config.node_id.clone(),
                        storage_class: StorageClass::for_drive(drive.spec.drive_type),
                        location: uuid.to_string(),
                        size: drive.spec.size,
                    },
                );
                match self.store.create(&ac).await {
                    Ok(_) => info!(capacity = %name, drive = %uuid, size = drive.spec.size, "Capacity created"),
                    Err(e) => error!(capacity = %name, error = %e, "Failed to create capacity"),
                }
            } else if offered.contains(uuid) {
                match self.store.delete::<AvailableCapacity>(&name).await {
                    Ok(()) => info!(capacity = %name, drive = %uuid, "Capacity withdrawn"),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => error!(capacity = %name, error = %e, "Failed to withdraw capacity"),
                }
            }
        }
        Ok(())
    }
}
