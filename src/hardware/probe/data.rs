//! Pre-existing data detection
//!
//! A drive has data when it carries a filesystem, a partition table,
//! partitions or an LVM physical volume.

use super::executor::render_args;
use crate::domain::ports::{
    BlockDeviceListerRef, DataDiscoverer, DiscoverResult, ExecutorRef, LvmOpsRef,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

// blkid exit status when the requested tags are not found
const BLKID_NOT_FOUND: i32 = 2;

/// Data discoverer combining lsblk, blkid and pvs
pub struct DataDiscover {
    lister: BlockDeviceListerRef,
    lvm: LvmOpsRef,
    executor: ExecutorRef,
}

impl DataDiscover {
    pub fn new(lister: BlockDeviceListerRef, lvm: LvmOpsRef, executor: ExecutorRef) -> Self {
        Self {
            lister,
            lvm,
            executor,
        }
    }

    async fn partition_table(&self, path: &str) -> Result<Option<String>> {
        let args: Vec<String> = ["-p", "-o", "value", "-s", "PTTYPE", path]
            .iter()
            .map(|a| a.to_string())
            .collect();
        let output = self.executor.run("blkid", &args).await?;

        match output.code {
            Some(0) => {
                let pttype = output.stdout.trim();
                Ok((!pttype.is_empty()).then(|| pttype.to_string()))
            }
            Some(BLKID_NOT_FOUND) => Ok(None),
            _ => Err(Error::CommandFailed {
                command: render_args("blkid", &args),
                reason: output.stderr.trim().to_string(),
            }),
        }
    }
}

#[async_trait]
impl DataDiscoverer for DataDiscover {
    async fn discover_data(&self, path: &str, serial: &str) -> Result<DiscoverResult> {
        let devices = self.lister.list_block_devices(path).await?;
        let device = devices.first().ok_or_else(|| Error::Probe {
            device: path.to_string(),
            reason: format!("device with serial {} not listed", serial),
        })?;

        if !device.fs_type.is_empty() {
            return Ok(DiscoverResult {
                has_data: true,
                message: format!("drive {} has filesystem {}", path, device.fs_type),
            });
        }

        if !device.children.is_empty() {
            return Ok(DiscoverResult {
                has_data: true,
                message: format!("drive {} has {} partitions", path, device.children.len()),
            });
        }

        if let Some(pttype) = self.partition_table(path).await? {
            return Ok(DiscoverResult {
                has_data: true,
                message: format!("drive {} has partition table {}", path, pttype),
            });
        }

        let pvs = self.lvm.list_physical_volumes().await?;
        if pvs.iter().any(|pv| pv == path) {
            return Ok(DiscoverResult {
                has_data: true,
                message: format!("drive {} is an LVM physical volume", path),
            });
        }

        debug!(path = %path, serial = %serial, "No data found on drive");
        Ok(DiscoverResult {
            has_data: false,
            message: format!("drive {} is clean", path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        BlockDevice, CommandOutput, MockBlockDeviceLister, MockExecutor, MockLvmOps,
    };
    use std::sync::Arc;

    fn lister(device: BlockDevice) -> Arc<MockBlockDeviceLister> {
        let mut lister = MockBlockDeviceLister::new();
        lister
            .expect_list_block_devices()
            .returning(move |_| Ok(vec![device.clone()]));
        Arc::new(lister)
    }

    fn blkid(code: i32, stdout: &'static str) -> Arc<MockExecutor> {
        let mut executor = MockExecutor::new();
        executor.expect_run().returning(move |_, _| {
            Ok(CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        });
        Arc::new(executor)
    }

    fn pvs(names: Vec<String>) -> Arc<MockLvmOps> {
        let mut lvm = MockLvmOps::new();
        lvm.expect_list_physical_volumes()
            .returning(move || Ok(names.clone()));
        Arc::new(lvm)
    }

    fn bare(path: &str) -> BlockDevice {
        BlockDevice {
            name: path.into(),
            device_type: "disk".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_clean_drive() {
        let discoverer = DataDiscover::new(
            lister(bare("/dev/sdb")),
            pvs(vec!["/dev/sda2".into()]),
            blkid(BLKID_NOT_FOUND, ""),
        );
        let result = discoverer.discover_data("/dev/sdb", "hdd2").await.unwrap();
        assert!(!result.has_data);
    }

    #[tokio::test]
    async fn test_partitions_mean_data() {
        let mut device = bare("/dev/sdb");
        device.children.push(bare("/dev/sdb1"));

        let discoverer = DataDiscover::new(lister(device), pvs(vec![]), blkid(0, ""));
        let result = discoverer.discover_data("/dev/sdb", "hdd2").await.unwrap();
        assert!(result.has_data);
        assert!(result.message.contains("partitions"));
    }

    #[tokio::test]
    async fn test_partition_table_means_data() {
        let discoverer = DataDiscover::new(lister(bare("/dev/sdb")), pvs(vec![]), blkid(0, "gpt\n"));
        let result = discoverer.discover_data("/dev/sdb", "hdd2").await.unwrap();
        assert!(result.has_data);
        assert!(result.message.contains("gpt"));
    }

    #[tokio::test]
    async fn test_physical_volume_means_data() {
        let discoverer = DataDiscover::new(
            lister(bare("/dev/sdb")),
            pvs(vec!["/dev/sdb".into()]),
            blkid(BLKID_NOT_FOUND, ""),
        );
        let result = discoverer.discover_data("/dev/sdb", "hdd2").await.unwrap();
        assert!(result.has_data);
    }

    #[tokio::test]
    async fn test_blkid_failure_is_an_error() {
        let discoverer = DataDiscover::new(lister(bare("/dev/sdb")), pvs(vec![]), blkid(4, ""));
        assert!(discoverer.discover_data("/dev/sdb", "hdd2").await.is_err());
    }
}
