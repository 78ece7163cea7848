//! LVM queries and logical volume operations via the LVM command line tools

use super::executor::run_checked;
use crate::domain::ports::{ExecutorRef, LvmOps};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::info;

/// LVM operations shelling out to pvs/vgs/lvs/lvcreate/lvremove/lvextend
pub struct LvmCli {
    executor: ExecutorRef,
}

impl LvmCli {
    pub fn new(executor: ExecutorRef) -> Self {
        Self { executor }
    }

    async fn report(&self, program: &str, args: &[&str]) -> Result<Vec<String>> {
        let stdout = run_checked(self.executor.as_ref(), program, args).await?;
        Ok(report_lines(&stdout))
    }
}

/// Non-empty trimmed lines of a `--noheadings` report
fn report_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bytes(vg: &str, value: &str) -> Result<u64> {
    let value = value.trim();
    // vgs may print a fractional part even with --units b
    let integral = value.split('.').next().unwrap_or(value);
    integral
        .parse()
        .map_err(|_| Error::Lvm(format!("unable to parse free space {:?} of VG {}", value, vg)))
}

#[async_trait]
impl LvmOps for LvmCli {
    async fn list_physical_volumes(&self) -> Result<Vec<String>> {
        self.report("pvs", &["--noheadings", "-o", "pv_name"]).await
    }

    async fn volume_group_of(&self, pv: &str) -> Result<String> {
        self.report("pvs", &["--noheadings", "-o", "vg_name", pv])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Lvm(format!("physical volume {} is not in a volume group", pv)))
    }

    async fn free_space(&self, vg: &str) -> Result<u64> {
        let lines = self
            .report("vgs", &["--noheadings", "--units", "b", "--nosuffix", "-o", "vg_free", vg])
            .await?;
        let value = lines
            .first()
            .ok_or_else(|| Error::Lvm(format!("no free space reported for VG {}", vg)))?;
        parse_bytes(vg, value)
    }

    async fn logical_volumes_in(&self, vg: &str) -> Result<Vec<String>> {
        self.report("lvs", &["--noheadings", "-o", "lv_name", vg]).await
    }

    async fn create_lv(&self, vg: &str, name: &str, size: u64) -> Result<()> {
        info!(vg = %vg, lv = %name, size, "Creating logical volume");
        let size = format!("{}b", size);
        run_checked(
            self.executor.as_ref(),
            "lvcreate",
            &["--yes", "--name", name, "--size", &size, vg],
        )
        .await
        .map(|_| ())
    }

    async fn remove_lv(&self, vg: &str, name: &str) -> Result<()> {
        info!(vg = %vg, lv = %name, "Removing logical volume");
        let target = format!("{}/{}", vg, name);
        run_checked(self.executor.as_ref(), "lvremove", &["--yes", &target])
            .await
            .map(|_| ())
    }

    async fn expand_lv(&self, path: &str, size: u64) -> Result<()> {
        info!(path = %path, size, "Expanding logical volume");
        let size = format!("{}b", size);
        run_checked(self.executor.as_ref(), "lvextend", &["--size", &size, path])
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{CommandOutput, MockExecutor};
    use std::sync::Arc;

    fn replying(stdout: &'static str) -> LvmCli {
        let mut executor = MockExecutor::new();
        executor.expect_run().returning(move |_, _| {
            Ok(CommandOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        });
        LvmCli::new(Arc::new(executor))
    }

    #[tokio::test]
    async fn test_list_physical_volumes() {
        let lvm = replying("  /dev/sda2\n  /dev/nvme0n1p3 \n\n");
        let pvs = lvm.list_physical_volumes().await.unwrap();
        assert_eq!(pvs, vec!["/dev/sda2", "/dev/nvme0n1p3"]);
    }

    #[tokio::test]
    async fn test_free_space_parses_bytes() {
        let lvm = replying("  21474836480\n");
        assert_eq!(lvm.free_space("root-vg").await.unwrap(), 21474836480);

        let lvm = replying("  1048576.00\n");
        assert_eq!(lvm.free_space("root-vg").await.unwrap(), 1048576);
    }

    #[tokio::test]
    async fn test_pv_without_vg() {
        let lvm = replying("   \n");
        assert!(lvm.volume_group_of("/dev/sdb").await.is_err());
    }

    #[tokio::test]
    async fn test_create_lv_arguments() {
        let mut executor = MockExecutor::new();
        executor
            .expect_run()
            .withf(|program, args| {
                let args: Vec<&str> = args.iter().map(|a| a.as_str()).collect();
                program.to_string() == "lvcreate"
                    && args == ["--yes", "--name", "pvc-1", "--size", "1073741824b", "lvg-vg"]
            })
            .times(1)
            .returning(|_, _| Ok(CommandOutput {
                code: Some(0),
                ..Default::default()
            }));

        let lvm = LvmCli::new(Arc::new(executor));
        lvm.create_lv("lvg-vg", "pvc-1", 1 << 30).await.unwrap();
    }
}
