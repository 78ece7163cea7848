//! Volume Manager
//!
//! The node controller instance. It owns the process-local state (active
//! provisioners, system-drive set, discover serialization) and the handles
//! to every external collaborator; the reconcile, drive sync, health, data
//! discovery and system LVG logic are implemented on it in sibling modules.

use crate::crd::{CsiStatus, LogicalVolumeGroup, Volume, VolumeSpec};
use crate::domain::ports::{
    BlockDeviceListerRef, DataDiscovererRef, EventRecorderRef, InventorySourceRef, LvmOpsRef,
};
use crate::error::{Error, Result, DEFAULT_REQUEUE_FOR_VOLUME};
use crate::metrics::ControllerMetrics;
use crate::provisioners::{ProvisionerMap, ProvisionerRegistry};
use crate::store::ResourceStore;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Host root as seen from the controller container
pub const HOST_ROOT_PATH: &str = "/hostroot";

/// Kubelet root directory
pub const KUBELET_ROOT_PATH: &str = "/var/lib/kubelet";

// =============================================================================
// Configuration
// =============================================================================

/// Node controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Node this controller manages
    pub node_id: String,
    /// Namespace holding the resource records
    pub namespace: String,
    /// Reconcile the system drive's volume group into a LogicalVolumeGroup
    pub discover_system_lvg: bool,
    /// Period of the Discover pass
    pub discover_interval: Duration,
    /// Period of the full volume resync
    pub resync_interval: Duration,
    /// Requeue delay after conflicts and transient volume failures
    pub volume_requeue: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            namespace: "default".into(),
            discover_system_lvg: true,
            discover_interval: Duration::from_secs(30),
            resync_interval: Duration::from_secs(60),
            volume_requeue: DEFAULT_REQUEUE_FOR_VOLUME,
        }
    }
}

/// External collaborators of the node controller
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: InventorySourceRef,
    pub lister: BlockDeviceListerRef,
    pub data_discoverer: DataDiscovererRef,
    pub lvm: LvmOpsRef,
    pub recorder: EventRecorderRef,
    pub metrics: Arc<ControllerMetrics>,
}

// =============================================================================
// Volume Manager
// =============================================================================

pub struct VolumeManager<S: ResourceStore> {
    pub(crate) config: ControllerConfig,
    pub(crate) store: Arc<S>,
    pub(crate) provisioners: ProvisionerRegistry,
    pub(crate) inventory: InventorySourceRef,
    pub(crate) lister: BlockDeviceListerRef,
    pub(crate) data_discoverer: DataDiscovererRef,
    pub(crate) lvm: LvmOpsRef,
    pub(crate) recorder: EventRecorderRef,
    pub(crate) metrics: Arc<ControllerMetrics>,
    pub(crate) system_drives: RwLock<HashSet<String>>,
    pub(crate) discover_lock: tokio::sync::Mutex<()>,
}

impl<S: ResourceStore> VolumeManager<S> {
    pub fn new(
        config: ControllerConfig,
        store: Arc<S>,
        provisioners: ProvisionerRegistry,
        collaborators: Collaborators,
    ) -> Self {
        info!(node = %config.node_id, namespace = %config.namespace, "Volume manager created");
        Self {
            config,
            store,
            provisioners,
            inventory: collaborators.inventory,
            lister: collaborators.lister,
            data_discoverer: collaborators.data_discoverer,
            lvm: collaborators.lvm,
            recorder: collaborators.recorder,
            metrics: collaborators.metrics,
            system_drives: RwLock::new(HashSet::new()),
            discover_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<ControllerMetrics> {
        &self.metrics
    }

    /// Atomically replace the active provisioners
    pub fn set_provisioners(&self, provisioners: ProvisionerMap) {
        info!(count = provisioners.len(), "Provisioners replaced");
        self.provisioners.set(provisioners);
    }

    /// Replace the system-drive UUID set
    pub fn set_system_drives(&self, uuids: HashSet<String>) {
        debug!(count = uuids.len(), "System drives replaced");
        *self.system_drives.write() = uuids;
    }

    pub fn system_drives(&self) -> HashSet<String> {
        self.system_drives.read().clone()
    }

    /// Whether a volume belongs to this node
    pub fn is_owned_by_node(&self, volume: &VolumeSpec) -> bool {
        volume.node_id == self.config.node_id
    }

    /// Whether any LogicalVolumeGroup spans the drive
    pub async fn is_drive_in_lvg(&self, drive_uuid: &str) -> Result<bool> {
        let lvgs: Vec<LogicalVolumeGroup> = self.store.list().await?;
        Ok(lvgs.iter().any(|lvg| lvg.spec.contains_drive(drive_uuid)))
    }

    /// Whether a Volume is placed on the drive or an LVG spans it
    pub async fn is_drive_in_use(&self, drive_uuid: &str) -> Result<bool> {
        let volumes: Vec<Volume> = self.store.list().await?;
        if volumes.iter().any(|v| v.spec.location == drive_uuid) {
            return Ok(true);
        }
        self.is_drive_in_lvg(drive_uuid).await
    }

    /// Whether the drive, or a device on it, is mounted at the host or kubelet root
    pub async fn is_drive_system(&self, path: &str) -> Result<bool> {
        let devices = self.lister.list_block_devices(path).await?;
        Ok(devices.iter().any(|d| {
            d.is_mounted_at(HOST_ROOT_PATH) || d.is_mounted_at(KUBELET_ROOT_PATH)
        }))
    }

    /// Write a new status on the freshest copy of a volume.
    ///
    /// Fails with a conflict when the stored status no longer matches the
    /// status the caller acted on, so a handler never overwrites a transition
    /// made by a concurrent reconcile.
    pub(crate) async fn update_volume_status(
        &self,
        volume: &Volume,
        status: CsiStatus,
    ) -> Result<Volume> {
        let name = volume.metadata.name.clone().unwrap_or_default();
        let mut fresh: Volume = self.store.read(&name).await?;
        if fresh.spec.csi_status != volume.spec.csi_status {
            debug!(
                volume = %name,
                expected = %volume.spec.csi_status,
                found = %fresh.spec.csi_status,
                "Volume status moved underneath handler"
            );
            return Err(Error::conflict("Volume", name));
        }

        fresh.spec.csi_status = status.clone();
        let updated = self.store.update(&fresh).await?;
        info!(volume = %name, status = %status, "Volume status updated");
        self.metrics.record_transition(status.as_str());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{lvg, volume, TestBuilder, NODE_ID};
    use crate::crd::StorageClass;
    use crate::domain::ports::{BlockDevice, MockBlockDeviceLister};
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_is_owned_by_node() {
        let manager = TestBuilder::new().build();
        let mut spec = volume("pvc-1", "uuid-1", StorageClass::Hdd, CsiStatus::Creating).spec;
        assert!(manager.is_owned_by_node(&spec));

        spec.node_id = "another-node".into();
        assert!(!manager.is_owned_by_node(&spec));
        assert_eq!(manager.config().node_id, NODE_ID);
    }

    #[tokio::test]
    async fn test_is_drive_in_lvg() {
        let builder = TestBuilder::new();
        builder
            .seed(&lvg("lvg-1", "vg-1", &["uuid-1", "uuid-2"], CsiStatus::Created))
            .await;
        let manager = builder.build();

        assert!(manager.is_drive_in_lvg("uuid-2").await.unwrap());
        assert!(!manager.is_drive_in_lvg("uuid-3").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_drive_system() {
        let mut lister = MockBlockDeviceLister::new();
        lister.expect_list_block_devices().returning(|path| {
            let mount = if path == "/dev/sda" { HOST_ROOT_PATH } else { "" };
            Ok(vec![BlockDevice {
                name: path.to_string(),
                children: vec![BlockDevice {
                    name: format!("{}1", path),
                    mount_point: mount.to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }])
        });
        let manager = TestBuilder::new().lister(lister).build();

        assert!(manager.is_drive_system("/dev/sda").await.unwrap());
        assert!(!manager.is_drive_system("/dev/sdb").await.unwrap());
    }

    #[tokio::test]
    async fn test_status_write_rejects_moved_status() {
        let builder = TestBuilder::new();
        let stored = builder
            .seed(&volume("pvc-1", "uuid-1", StorageClass::Hdd, CsiStatus::Creating))
            .await;
        let manager = builder.build();

        let created = manager
            .update_volume_status(&stored, CsiStatus::Created)
            .await
            .unwrap();
        assert_eq!(created.spec.csi_status, CsiStatus::Created);

        // stale handler still believes the volume is Creating
        assert_matches!(
            manager.update_volume_status(&stored, CsiStatus::Failed).await,
            Err(Error::Conflict { .. })
        );
    }
}
