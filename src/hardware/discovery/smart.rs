//! SMART health
//!
//! Derives a drive's health from `smartctl -H -A -j` output.

use crate::crd::Health;
use crate::domain::ports::ExecutorRef;
use tracing::{debug, warn};

// ATA attribute ids
const ATTR_REALLOCATED_SECTORS: u32 = 5;
const ATTR_PENDING_SECTORS: u32 = 197;

/// SMART health reader over smartctl
pub struct SmartHealth {
    executor: ExecutorRef,
}

impl SmartHealth {
    pub fn new(executor: ExecutorRef) -> Self {
        Self { executor }
    }

    /// Health of a device; Unknown when SMART data is unavailable
    pub async fn health(&self, device: &str) -> Health {
        let args = ["-H", "-A", "-j", device].map(String::from);
        match self.executor.run("smartctl", &args).await {
            // smartctl sets exit bits for warnings, the JSON is still valid
            Ok(output) => match serde_json::from_str::<serde_json::Value>(&output.stdout) {
                Ok(json) => health_from_report(&json),
                Err(e) => {
                    debug!(device = %device, error = %e, "smartctl output is not JSON");
                    Health::Unknown
                }
            },
            Err(e) => {
                warn!(device = %device, error = %e, "smartctl unavailable");
                Health::Unknown
            }
        }
    }
}

/// Map a smartctl JSON report onto drive health
pub fn health_from_report(json: &serde_json::Value) -> Health {
    let passed = match json["smart_status"]["passed"].as_bool() {
        Some(passed) => passed,
        None => return Health::Unknown,
    };
    if !passed {
        return Health::Bad;
    }

    let attrs = &json["ata_smart_attributes"]["table"];
    let worn_sectors = find_smart_attr(attrs, &[ATTR_REALLOCATED_SECTORS, ATTR_PENDING_SECTORS])
        .unwrap_or(0);

    let nvme_log = &json["nvme_smart_health_information_log"];
    let critical_warning = nvme_log["critical_warning"].as_u64().unwrap_or(0);
    let percentage_used = nvme_log["percentage_used"].as_u64().unwrap_or(0);

    if worn_sectors > 0 || critical_warning != 0 || percentage_used >= 100 {
        Health::Suspect
    } else {
        Health::Good
    }
}

// First non-zero raw value among the given attribute ids
fn find_smart_attr(attrs: &serde_json::Value, ids: &[u32]) -> Option<u64> {
    attrs
        .as_array()?
        .iter()
        .filter(|attr| {
            attr["id"]
                .as_u64()
                .map_or(false, |id| ids.contains(&(id as u32)))
        })
        .filter_map(|attr| attr["raw"]["value"].as_u64())
        .find(|v| *v > 0)
}
