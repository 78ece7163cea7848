//! Block device listing via `lsblk --json`

use super::executor::run_checked;
use crate::domain::ports::{BlockDevice, BlockDeviceLister, ExecutorRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;

const LSBLK: &str = "lsblk";
const LSBLK_COLUMNS: &str = "NAME,SIZE,TYPE,SERIAL,MOUNTPOINT,FSTYPE";

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<RawDevice>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    name: String,
    // number on util-linux >= 2.33, string before
    #[serde(default)]
    size: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    device_type: Option<String>,
    #[serde(default)]
    serial: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    fstype: Option<String>,
    #[serde(default)]
    children: Vec<RawDevice>,
}

impl RawDevice {
    fn into_device(self) -> Result<BlockDevice> {
        let size = match self.size {
            None | Some(serde_json::Value::Null) => 0,
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().map_err(|_| {
                Error::Probe {
                    device: self.name.clone(),
                    reason: format!("invalid size {:?}", s),
                }
            })?,
            Some(other) => {
                return Err(Error::Probe {
                    device: self.name,
                    reason: format!("unexpected size {}", other),
                })
            }
        };

        let children = self
            .children
            .into_iter()
            .map(RawDevice::into_device)
            .collect::<Result<Vec<_>>>()?;

        Ok(BlockDevice {
            name: self.name,
            size,
            device_type: self.device_type.unwrap_or_default(),
            serial: self.serial.unwrap_or_default().trim().to_string(),
            mount_point: self.mountpoint.unwrap_or_default(),
            fs_type: self.fstype.unwrap_or_default(),
            children,
        })
    }
}

/// Parse the JSON printed by `lsblk --json --bytes`
pub fn parse_lsblk(json: &str) -> Result<Vec<BlockDevice>> {
    let output: LsblkOutput = serde_json::from_str(json)?;
    output
        .blockdevices
        .into_iter()
        .map(RawDevice::into_device)
        .collect()
}

/// Block device lister shelling out to lsblk
pub struct Lsblk {
    executor: ExecutorRef,
}

impl Lsblk {
    pub fn new(executor: ExecutorRef) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BlockDeviceLister for Lsblk {
    async fn list_block_devices(&self, path: &str) -> Result<Vec<BlockDevice>> {
        let mut args = vec!["--paths", "--json", "--bytes", "--output", LSBLK_COLUMNS];
        if !path.is_empty() {
            args.push(path);
        }
        let stdout = run_checked(self.executor.as_ref(), LSBLK, &args).await?;
        parse_lsblk(&stdout)
    }
}
