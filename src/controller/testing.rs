//! Shared fixtures for controller tests

use super::events::RecordingRecorder;
use super::volume_manager::{Collaborators, ControllerConfig, VolumeManager};
use crate::crd::{
    CsiStatus, Drive, DriveSpec, DriveStatus, DriveType, Health, LogicalVolumeGroup,
    LogicalVolumeGroupSpec, StorageClass, Volume, VolumeMode, VolumeSpec,
};
use crate::domain::ports::{
    DriveDescriptor, MockBlockDeviceLister, MockDataDiscoverer, MockInventorySource, MockLvmOps,
    MockProvisioner, ProvisionerRef,
};
use crate::metrics::ControllerMetrics;
use crate::provisioners::{ProvisionerKind, ProvisionerMap, ProvisionerRegistry};
use crate::store::{MemoryStore, ResourceStore, StoredResource};
use std::sync::Arc;

pub(crate) const NODE_ID: &str = "node-1";
pub(crate) const NAMESPACE: &str = "test-ns";

pub(crate) struct TestBuilder {
    pub store: Arc<MemoryStore>,
    pub recorder: Arc<RecordingRecorder>,
    inventory: MockInventorySource,
    lister: MockBlockDeviceLister,
    data: MockDataDiscoverer,
    lvm: MockLvmOps,
    provisioners: ProvisionerMap,
    discover_system_lvg: bool,
}

impl TestBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new(NAMESPACE)),
            recorder: Arc::new(RecordingRecorder::default()),
            inventory: MockInventorySource::new(),
            lister: MockBlockDeviceLister::new(),
            data: MockDataDiscoverer::new(),
            lvm: MockLvmOps::new(),
            provisioners: ProvisionerMap::new(),
            discover_system_lvg: false,
        }
    }

    pub fn inventory(mut self, inventory: MockInventorySource) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn lister(mut self, lister: MockBlockDeviceLister) -> Self {
        self.lister = lister;
        self
    }

    pub fn data(mut self, data: MockDataDiscoverer) -> Self {
        self.data = data;
        self
    }

    pub fn lvm(mut self, lvm: MockLvmOps) -> Self {
        self.lvm = lvm;
        self
    }

    pub fn provisioner(mut self, kind: ProvisionerKind, provisioner: MockProvisioner) -> Self {
        self.provisioners
            .insert(kind, Arc::new(provisioner) as ProvisionerRef);
        self
    }

    pub fn discover_system_lvg(mut self, enabled: bool) -> Self {
        self.discover_system_lvg = enabled;
        self
    }

    /// Store a record before the manager is built
    pub async fn seed<K: StoredResource>(&self, obj: &K) -> K {
        self.store.create(obj).await.unwrap()
    }

    pub fn build(self) -> VolumeManager<MemoryStore> {
        let config = ControllerConfig {
            node_id: NODE_ID.into(),
            namespace: NAMESPACE.into(),
            discover_system_lvg: self.discover_system_lvg,
            ..Default::default()
        };
        let collaborators = Collaborators {
            inventory: Arc::new(self.inventory),
            lister: Arc::new(self.lister),
            data_discoverer: Arc::new(self.data),
            lvm: Arc::new(self.lvm),
            recorder: self.recorder,
            metrics: Arc::new(ControllerMetrics::new().unwrap()),
        };
        VolumeManager::new(
            config,
            self.store,
            ProvisionerRegistry::new(self.provisioners),
            collaborators,
        )
    }
}

pub(crate) fn drive(uuid: &str, serial: &str, path: &str) -> Drive {
    Drive::new(
        uuid,
        DriveSpec {
            uuid: uuid.into(),
            serial_number: serial.into(),
            size: 1024 * 1024 * 1024 * 1024,
            drive_type: DriveType::Hdd,
            status: DriveStatus::Online,
            health: Health::Good,
            path: path.into(),
            node_id: NODE_ID.into(),
            ..Default::default()
        },
    )
}

pub(crate) fn descriptor(serial: &str, path: &str) -> DriveDescriptor {
    DriveDescriptor {
        uuid: None,
        serial_number: serial.into(),
        size: 1024 * 1024 * 1024 * 1024,
        drive_type: DriveType::Hdd,
        path: path.into(),
        status: DriveStatus::Online,
        health: Health::Good,
        is_system: false,
    }
}

pub(crate) fn volume(id: &str, location: &str, class: StorageClass, status: CsiStatus) -> Volume {
    Volume::new(
        id,
        VolumeSpec {
            id: id.into(),
            size: 1024 * 1024 * 1024,
            storage_class: class,
            location: location.into(),
            csi_status: status,
            node_id: NODE_ID.into(),
            mode: VolumeMode::Fs,
            fs_type: "xfs".into(),
            health: Health::Good,
        },
    )
}

pub(crate) fn lvg(name: &str, vg: &str, locations: &[&str], status: CsiStatus) -> LogicalVolumeGroup {
    LogicalVolumeGroup::new(
        name,
        LogicalVolumeGroupSpec {
            name: vg.into(),
            node: NODE_ID.into(),
            locations: locations.iter().map(|l| l.to_string()).collect(),
            size: 1024 * 1024 * 1024 * 1024,
            status,
            volume_refs: Vec::new(),
            health: Health::Good,
        },
    )
}

/// Provisioner whose operations always succeed
pub(crate) fn provisioner_success(path: &'static str) -> MockProvisioner {
    let mut provisioner = MockProvisioner::new();
    provisioner.expect_prepare_volume().returning(|_| Ok(()));
    provisioner.expect_release_volume().returning(|_| Ok(()));
    provisioner
        .expect_get_volume_path()
        .returning(move |_| Ok(path.to_string()));
    provisioner.expect_expand().returning(|_, _| Ok(()));
    provisioner
}

/// Provisioner whose operations always fail
pub(crate) fn provisioner_failure() -> MockProvisioner {
    use crate::error::Error;

    let failed = |op: &str| Error::CommandFailed {
        command: op.to_string(),
        reason: "exit status 1".into(),
    };
    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_prepare_volume()
        .returning(move |_| Err(failed("mkfs")));
    provisioner
        .expect_release_volume()
        .returning(move |_| Err(failed("wipefs")));
    provisioner
        .expect_get_volume_path()
        .returning(move |_| Err(failed("lsblk")));
    provisioner
        .expect_expand()
        .returning(move |_, _| Err(failed("lvextend")));
    provisioner
}
