//! System LVG discovery
//!
//! Adopts the volume group living on the node's system drive as a
//! LogicalVolumeGroup, with its existing logical volumes as volume refs, and
//! keeps the group's free space published as AvailableCapacity.

use super::volume_manager::VolumeManager;
use crate::crd::{
    capacity_name, AvailableCapacity, AvailableCapacitySpec, CsiStatus, Drive, LogicalVolumeGroup,
    LogicalVolumeGroupSpec, StorageClass,
};
use crate::error::{Error, Result};
use crate::store::ResourceStore;
use tracing::{debug, error, info};

impl<S: ResourceStore> VolumeManager<S> {
    /// Reconcile the volume group of every system drive
    pub async fn discover_lvg_on_system_drive(&self) -> Result<()> {
        let mut uuids: Vec<String> = self.system_drives().into_iter().collect();
        uuids.sort();

        let mut first_error = None;
        for uuid in uuids {
            if let Err(e) = self.discover_lvg_on_drive(&uuid).await {
                error!(drive = %uuid, error = %e, "System LVG discovery failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn discover_lvg_on_drive(&self, uuid: &str) -> Result<()> {
        let drive: Drive = self.store.read(uuid).await?;
        let lvgs: Vec<LogicalVolumeGroup> = self.store.list().await?;

        if let Some(existing) = lvgs.iter().find(|l| l.spec.contains_drive(uuid)) {
            debug!(drive = %uuid, vg = %existing.spec.name, "System LVG already discovered");
            let free = self.lvm.free_space(&existing.spec.name).await?;
            let name = existing.metadata.name.clone().unwrap_or_default();
            return self.upsert_lvg_capacity(&name, &drive, free).await;
        }

        let pvs = self.lvm.list_physical_volumes().await?;
        let Some(pv) = pvs.iter().find(|pv| is_pv_on_drive(pv, &drive.spec.path)) else {
            info!(drive = %uuid, path = %drive.spec.path, "System drive carries no LVM physical volume");
            return Ok(());
        };
        let vg = self.lvm.volume_group_of(pv).await?;

        let lvs = self.lvm.logical_volumes_in(&vg).await.map_err(|e| {
            Error::Lvm(format!(
                "unable to determine LVs in system VG {}: {}",
                vg, e
            ))
        })?;
        let free = self.lvm.free_space(&vg).await?;

        let name = uuid::Uuid::new_v4().to_string();
        let lvg = LogicalVolumeGroup::new(
            &name,
            LogicalVolumeGroupSpec {
                name: vg.clone(),
                node: self.config.node_id.clone(),
                locations: vec![uuid.to_string()],
                size: free,
                status: CsiStatus::Created,
                volume_refs: lvs,
                health: drive.spec.health,
            },
        );
        let lvg = self.store.create(&lvg).await?;
        info!(
            lvg = %name,
            drive = %uuid,
            vg = %vg,
            volume_refs = lvg.spec.volume_refs.len(),
            "System LVG discovered"
        );

        self.upsert_lvg_capacity(&name, &drive, free).await
    }

    async fn upsert_lvg_capacity(&self, lvg_name: &str, drive: &Drive, free: u64) -> Result<()> {
        let name = capacity_name(lvg_name);
        match self.store.read::<AvailableCapacity>(&name).await {
            Ok(mut ac) => {
                if ac.spec.size == free {
                    return Ok(());
                }
                ac.spec.size = free;
                self.store.update(&ac).await?;
                info!(capacity = %name, size = free, "System LVG capacity refreshed");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                let ac = AvailableCapacity::new(
                    &name,
                    AvailableCapacitySpec {
                        node_id: self.config.node_id.clone(),
                        storage_class: StorageClass::lvg_for_drive(drive.spec.drive_type),
                        location: lvg_name.to_string(),
                        size: free,
                    },
                );
                self.store.create(&ac).await?;
                info!(capacity = %name, size = free, "System LVG capacity created");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// True when `pv` is the drive at `path` itself or one of its partitions
///
/// Partitions are `path` followed by digits, or by `p` and digits when the
/// drive name already ends in a digit (`/dev/nvme0n1p2`).
fn is_pv_on_drive(pv: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let Some(suffix) = pv.strip_prefix(path) else {
        return false;
    };
    if suffix.is_empty() {
        return true;
    }
    let digits = if path.ends_with(|c: char| c.is_ascii_digit()) {
        match suffix.strip_prefix('p') {
            Some(rest) => rest,
            None => return false,
        }
    } else {
        suffix
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::is_pv_on_drive;
    use crate::controller::testing::{drive, TestBuilder};
    use crate::crd::{capacity_name, AvailableCapacity, CsiStatus, LogicalVolumeGroup, StorageClass};
    use crate::domain::ports::MockLvmOps;
    use crate::error::Error;
    use crate::store::ResourceStore;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn system_lvm(free: Arc<AtomicU64>) -> MockLvmOps {
        let mut lvm = MockLvmOps::new();
        lvm.expect_list_physical_volumes()
            .returning(|| Ok(vec!["/dev/sdb1".into(), "/dev/sda2".into()]));
        lvm.expect_volume_group_of()
            .withf(|pv| pv.to_string() == "/dev/sda2")
            .returning(|_| Ok("rootvg".into()));
        lvm.expect_logical_volumes_in()
            .returning(|_| Ok(vec!["root".into(), "swap".into()]));
        lvm.expect_free_space()
            .returning(move |_| Ok(free.load(Ordering::SeqCst)));
        lvm
    }

    #[tokio::test]
    async fn test_system_lvg_is_adopted() {
        let free = Arc::new(AtomicU64::new(100 * 1024));
        let builder = TestBuilder::new().lvm(system_lvm(free.clone()));
        let mut system = drive("uuid-sys", "sys1", "/dev/sda");
        system.spec.is_system = true;
        builder.seed(&system).await;
        let store = builder.store.clone();
        let manager = builder.build();
        manager.set_system_drives(HashSet::from(["uuid-sys".to_string()]));

        manager.discover_lvg_on_system_drive().await.unwrap();

        let lvgs: Vec<LogicalVolumeGroup> = store.list().await.unwrap();
        assert_eq!(lvgs.len(), 1);
        let lvg = &lvgs[0];
        let lvg_name = lvg.metadata.name.clone().unwrap();
        assert_eq!(lvg.spec.name, "rootvg");
        assert_eq!(lvg.spec.locations, vec!["uuid-sys"]);
        assert_eq!(lvg.spec.volume_refs, vec!["root", "swap"]);
        assert_eq!(lvg.spec.status, CsiStatus::Created);

        let ac: AvailableCapacity = store.read(&capacity_name(&lvg_name)).await.unwrap();
        assert_eq!(ac.spec.size, 100 * 1024);
        assert_eq!(ac.spec.location, lvg_name);
        assert_eq!(ac.spec.storage_class, StorageClass::HddLvg);

        // second run keeps the group and refreshes the capacity
        free.store(50 * 1024, Ordering::SeqCst);
        manager.discover_lvg_on_system_drive().await.unwrap();

        assert_eq!(store.count::<LogicalVolumeGroup>(), 1);
        let again: LogicalVolumeGroup = store.read(&lvg_name).await.unwrap();
        assert_eq!(again.spec, lvg.spec);

        let ac: AvailableCapacity = store.read(&capacity_name(&lvg_name)).await.unwrap();
        assert_eq!(ac.spec.size, 50 * 1024);
        assert_eq!(store.count::<AvailableCapacity>(), 1);
    }

    #[tokio::test]
    async fn test_lv_listing_failure_persists_nothing() {
        let mut lvm = MockLvmOps::new();
        lvm.expect_list_physical_volumes()
            .returning(|| Ok(vec!["/dev/sda2".into()]));
        lvm.expect_volume_group_of()
            .returning(|_| Ok("rootvg".into()));
        lvm.expect_logical_volumes_in()
            .returning(|_| Err(Error::Lvm("lvs exited with 5".into())));
        lvm.expect_free_space().never();

        let builder = TestBuilder::new().lvm(lvm);
        builder.seed(&drive("uuid-sys", "sys1", "/dev/sda")).await;
        let store = builder.store.clone();
        let manager = builder.build();
        manager.set_system_drives(HashSet::from(["uuid-sys".to_string()]));

        let err = manager.discover_lvg_on_system_drive().await.unwrap_err();
        assert_matches!(&err, Error::Lvm(msg) if msg.contains("unable to determine LVs in system VG rootvg"));
        assert_eq!(store.count::<LogicalVolumeGroup>(), 0);
        assert_eq!(store.count::<AvailableCapacity>(), 0);
    }

    #[tokio::test]
    async fn test_system_drive_without_pv_is_skipped() {
        let mut lvm = MockLvmOps::new();
        lvm.expect_list_physical_volumes()
            .returning(|| Ok(vec!["/dev/sdb1".into()]));
        lvm.expect_volume_group_of().never();

        let builder = TestBuilder::new().lvm(lvm);
        builder.seed(&drive("uuid-sys", "sys1", "/dev/sda")).await;
        let store = builder.store.clone();
        let manager = builder.build();
        manager.set_system_drives(HashSet::from(["uuid-sys".to_string()]));

        manager.discover_lvg_on_system_drive().await.unwrap();
        assert_eq!(store.count::<LogicalVolumeGroup>(), 0);
        assert_eq!(store.count::<AvailableCapacity>(), 0);
    }

    #[tokio::test]
    async fn test_pv_on_other_disk_with_shared_prefix_is_ignored() {
        let mut lvm = MockLvmOps::new();
        lvm.expect_list_physical_volumes()
            .returning(|| Ok(vec!["/dev/sdaa1".into()]));
        lvm.expect_volume_group_of().never();
        lvm.expect_logical_volumes_in().never();

        let builder = TestBuilder::new().lvm(lvm);
        builder.seed(&drive("uuid-sys", "sys1", "/dev/sda")).await;
        let store = builder.store.clone();
        let manager = builder.build();
        manager.set_system_drives(HashSet::from(["uuid-sys".to_string()]));

        manager.discover_lvg_on_system_drive().await.unwrap();
        assert_eq!(store.count::<LogicalVolumeGroup>(), 0);
    }

    #[test]
    fn test_pv_partition_matching() {
        assert!(is_pv_on_drive("/dev/sda", "/dev/sda"));
        assert!(is_pv_on_drive("/dev/sda2", "/dev/sda"));
        assert!(is_pv_on_drive("/dev/nvme0n1p3", "/dev/nvme0n1"));

        assert!(!is_pv_on_drive("/dev/sdaa1", "/dev/sda"));
        assert!(!is_pv_on_drive("/dev/nvme0n10p1", "/dev/nvme0n1"));
        assert!(!is_pv_on_drive("/dev/nvme0n1p", "/dev/nvme0n1"));
        assert!(!is_pv_on_drive("/dev/sda1", ""));
    }

    #[tokio::test]
    async fn test_no_system_drives_is_noop() {
        let manager = TestBuilder::new().build();
        manager.discover_lvg_on_system_drive().await.unwrap();
    }
}
