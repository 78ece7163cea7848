//! Drive synchronization
//!
//! Reconciles one inventory snapshot against the stored Drive records of this
//! node. Records are matched by serial number; a record whose drive vanished
//! from the inventory is kept and marked UNKNOWN/OFFLINE.
//!
//! The returned [`DriveUpdates`] reflects confirmed writes only: a drive
//! whose create or update failed is logged and left out of every bucket.

use super::volume_manager::VolumeManager;
use crate::crd::{Drive, DriveSpec, DriveStatus, Health};
use crate::domain::ports::DriveDescriptor;
use crate::error::Result;
use crate::store::ResourceStore;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// A drive record changed by a synchronization pass
#[derive(Debug, Clone)]
pub struct UpdatedDrive {
    pub previous_state: Drive,
    pub current_state: Drive,
}

impl UpdatedDrive {
    /// Whether health or presence changed, which dependents must follow
    pub fn health_or_status_changed(&self) -> bool {
        self.previous_state.spec.health != self.current_state.spec.health
            || self.previous_state.spec.status != self.current_state.spec.status
    }
}

/// Result of one synchronization pass
#[derive(Debug, Clone, Default)]
pub struct DriveUpdates {
    pub created: Vec<Drive>,
    pub updated: Vec<UpdatedDrive>,
    pub not_changed: Vec<Drive>,
}

impl DriveUpdates {
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.not_changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: ResourceStore> VolumeManager<S> {
    /// Persist an inventory snapshot as Drive records
    pub async fn update_drives_crs(&self, inventory: &[DriveDescriptor]) -> Result<DriveUpdates> {
        let node_id = &self.config.node_id;
        let stored: Vec<Drive> = self.store.list().await?;

        let mut by_serial: HashMap<String, Drive> = stored
            .into_iter()
            .filter(|d| &d.spec.node_id == node_id)
            .map(|d| (d.spec.serial_number.clone(), d))
            .collect();

        let mut updates = DriveUpdates::default();
        let mut seen: HashSet<String> = HashSet::new();

        for item in inventory {
            if item.serial_number.is_empty() {
                warn!(path = %item.path, "Drive without serial number, skipping");
                continue;
            }
            seen.insert(item.serial_number.clone());

            match by_serial.get(&item.serial_number) {
                None => {
                    if let Some(created) = self.create_drive(item).await {
                        updates.created.push(created);
                    }
                }
                Some(existing) => {
                    let mut current = existing.clone();
                    apply_inventory(&mut current.spec, item);

                    if !current.spec.inventory_differs(&existing.spec) {
                        updates.not_changed.push(existing.clone());
                        continue;
                    }

                    match self.store.update(&current).await {
                        Ok(current) => {
                            debug!(
                                drive = %current.spec.uuid,
                                serial = %item.serial_number,
                                "Drive record updated"
                            );
                            updates.updated.push(UpdatedDrive {
                                previous_state: existing.clone(),
                                current_state: current,
                            });
                        }
                        Err(e) => error!(
                            drive = %existing.spec.uuid,
                            error = %e,
                            "Failed to update drive record"
                        ),
                    }
                }
            }
        }

        by_serial.retain(|serial, _| !seen.contains(serial));
        let mut missing: Vec<Drive> = by_serial.into_values().collect();
        missing.sort_by(|a, b| a.spec.uuid.cmp(&b.spec.uuid));

        for existing in missing {
            if existing.spec.health == Health::Unknown && existing.spec.status == DriveStatus::Offline
            {
                updates.not_changed.push(existing);
                continue;
            }

            let mut current = existing.clone();
            current.spec.health = Health::Unknown;
            current.spec.status = DriveStatus::Offline;

            match self.store.update(&current).await {
                Ok(current) => {
                    warn!(
                        drive = %current.spec.uuid,
                        serial = %current.spec.serial_number,
                        "Drive missing from inventory, marked offline"
                    );
                    updates.updated.push(UpdatedDrive {
                        previous_state: existing,
                        current_state: current,
                    });
                }
                Err(e) => error!(
                    drive = %existing.spec.uuid,
                    error = %e,
                    "Failed to mark missing drive offline"
                ),
            }
        }

        info!(
            created = updates.created.len(),
            updated = updates.updated.len(),
            not_changed = updates.not_changed.len(),
            "Drive records synchronized"
        );
        self.metrics.record_drive_changes("created", updates.created.len());
        self.metrics.record_drive_changes("updated", updates.updated.len());
        self.metrics
            .record_drive_changes("not_changed", updates.not_changed.len());

        Ok(updates)
    }

    async fn create_drive(&self, item: &DriveDescriptor) -> Option<Drive> {
        let uuid = item
            .uuid
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let is_system = if item.is_system {
            true
        } else {
            match self.is_drive_system(&item.path).await {
                Ok(is_system) => is_system,
                Err(e) => {
                    warn!(path = %item.path, error = %e, "Unable to determine whether drive is a system drive");
                    false
                }
            }
        };

        let mut spec = DriveSpec {
            uuid: uuid.clone(),
            node_id: self.config.node_id.clone(),
            is_system,
            is_clean: false,
            ..Default::default()
        };
        apply_inventory(&mut spec, item);

        match self.store.create(&Drive::new(&uuid, spec)).await {
            Ok(created) => {
                info!(
                    drive = %uuid,
                    serial = %item.serial_number,
                    path = %item.path,
                    is_system,
                    "Drive record created"
                );
                if is_system {
                    self.system_drives.write().insert(uuid);
                }
                Some(created)
            }
            Err(e) => {
                error!(serial = %item.serial_number, error = %e, "Failed to create drive record");
                None
            }
        }
    }
}

fn apply_inventory(spec: &mut DriveSpec, item: &DriveDescriptor) {
    spec.serial_number = item.serial_number.clone();
    spec.size = item.size;
    spec.drive_type = item.drive_type;
    spec.path = item.path.clone();
    spec.status = item.status;
    spec.health = item.health;
}
