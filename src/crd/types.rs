//! Shared value types used across the custom resources

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Drive Enums
// =============================================================================

/// Physical media type of a drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriveType {
    #[default]
    Hdd,
    Ssd,
    Nvme,
}

impl std::fmt::Display for DriveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveType::Hdd => write!(f, "HDD"),
            DriveType::Ssd => write!(f, "SSD"),
            DriveType::Nvme => write!(f, "NVME"),
        }
    }
}

/// Presence of a drive on the node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriveStatus {
    #[default]
    Online,
    Offline,
}

impl std::fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveStatus::Online => write!(f, "ONLINE"),
            DriveStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Health of a drive, reused for volumes and volume groups backed by it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    Good,
    Bad,
    #[default]
    Unknown,
    Suspect,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Health::Good => write!(f, "GOOD"),
            Health::Bad => write!(f, "BAD"),
            Health::Unknown => write!(f, "UNKNOWN"),
            Health::Suspect => write!(f, "SUSPECT"),
        }
    }
}

/// Lifecycle of a drive as seen by its consumers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriveUsage {
    #[default]
    InUse,
    Releasing,
    Released,
    Removing,
    Removed,
    Failed,
}

impl std::fmt::Display for DriveUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveUsage::InUse => write!(f, "IN_USE"),
            DriveUsage::Releasing => write!(f, "RELEASING"),
            DriveUsage::Released => write!(f, "RELEASED"),
            DriveUsage::Removing => write!(f, "REMOVING"),
            DriveUsage::Removed => write!(f, "REMOVED"),
            DriveUsage::Failed => write!(f, "FAILED"),
        }
    }
}

// =============================================================================
// Volume Enums
// =============================================================================

/// Storage class requested for a volume or offered by a capacity record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum StorageClass {
    #[default]
    #[serde(rename = "ANY")]
    Any,
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    Ssd,
    #[serde(rename = "NVME")]
    Nvme,
    #[serde(rename = "HDDLVG")]
    HddLvg,
    #[serde(rename = "SSDLVG")]
    SsdLvg,
    #[serde(rename = "NVMELVG")]
    NvmeLvg,
}

impl StorageClass {
    /// Whether volumes of this class are carved from a logical volume group
    pub fn is_lvg(&self) -> bool {
        matches!(
            self,
            StorageClass::HddLvg | StorageClass::SsdLvg | StorageClass::NvmeLvg
        )
    }

    /// Storage class offered by a whole drive of the given type
    pub fn for_drive(drive_type: DriveType) -> Self {
        match drive_type {
            DriveType::Hdd => StorageClass::Hdd,
            DriveType::Ssd => StorageClass::Ssd,
            DriveType::Nvme => StorageClass::Nvme,
        }
    }

    /// Storage class offered by a volume group on a drive of the given type
    pub fn lvg_for_drive(drive_type: DriveType) -> Self {
        match drive_type {
            DriveType::Hdd => StorageClass::HddLvg,
            DriveType::Ssd => StorageClass::SsdLvg,
            DriveType::Nvme => StorageClass::NvmeLvg,
        }
    }
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageClass::Any => write!(f, "ANY"),
            StorageClass::Hdd => write!(f, "HDD"),
            StorageClass::Ssd => write!(f, "SSD"),
            StorageClass::Nvme => write!(f, "NVME"),
            StorageClass::HddLvg => write!(f, "HDDLVG"),
            StorageClass::SsdLvg => write!(f, "SSDLVG"),
            StorageClass::NvmeLvg => write!(f, "NVMELVG"),
        }
    }
}

/// How a volume is exposed to the workload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum VolumeMode {
    #[serde(rename = "RAW")]
    Raw,
    #[serde(rename = "RAW_PART")]
    RawPart,
    #[default]
    #[serde(rename = "FS")]
    Fs,
}

/// Provisioning status of a volume or volume group.
///
/// Unrecognized values are kept verbatim in `Other` so that statuses written
/// by other components survive a read-modify-write cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CsiStatus {
    #[default]
    Creating,
    Created,
    Failed,
    Removing,
    Removed,
    Published,
    Expanding,
    Resized,
    Other(String),
}

impl CsiStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CsiStatus::Creating => "CREATING",
            CsiStatus::Created => "CREATED",
            CsiStatus::Failed => "FAILED",
            CsiStatus::Removing => "REMOVING",
            CsiStatus::Removed => "REMOVED",
            CsiStatus::Published => "PUBLISHED",
            CsiStatus::Expanding => "EXPANDING",
            CsiStatus::Resized => "RESIZED",
            CsiStatus::Other(s) => s,
        }
    }

    /// Terminal statuses allow the protective finalizer to be dropped
    pub fn is_terminal(&self) -> bool {
        matches!(self, CsiStatus::Removed | CsiStatus::Failed)
    }
}

impl From<String> for CsiStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "CREATING" => CsiStatus::Creating,
            "CREATED" => CsiStatus::Created,
            "FAILED" => CsiStatus::Failed,
            "REMOVING" => CsiStatus::Removing,
            "REMOVED" => CsiStatus::Removed,
            "PUBLISHED" => CsiStatus::Published,
            "EXPANDING" => CsiStatus::Expanding,
            "RESIZED" => CsiStatus::Resized,
            _ => CsiStatus::Other(s),
        }
    }
}

impl From<CsiStatus> for String {
    fn from(status: CsiStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for CsiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csi_status_keeps_unknown_values() {
        let status: CsiStatus = serde_json::from_str("\"PENDING_REPAIR\"").unwrap();
        assert_eq!(status, CsiStatus::Other("PENDING_REPAIR".into()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"PENDING_REPAIR\"");

        let empty: CsiStatus = serde_json::from_str("\"\"").unwrap();
        assert_eq!(empty, CsiStatus::Other(String::new()));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(CsiStatus::Removed.is_terminal());
        assert!(CsiStatus::Failed.is_terminal());
        assert!(!CsiStatus::Removing.is_terminal());
        assert!(!CsiStatus::Created.is_terminal());
    }

    #[test]
    fn test_storage_class_mapping() {
        assert!(StorageClass::HddLvg.is_lvg());
        assert!(!StorageClass::Ssd.is_lvg());
        assert_eq!(StorageClass::for_drive(DriveType::Nvme), StorageClass::Nvme);
        assert_eq!(StorageClass::lvg_for_drive(DriveType::Hdd), StorageClass::HddLvg);
        assert_eq!(
            serde_json::to_string(&StorageClass::SsdLvg).unwrap(),
            "\"SSDLVG\""
        );
    }

    #[test]
    fn test_drive_usage_wire_format() {
        assert_eq!(
            serde_json::to_string(&DriveUsage::InUse).unwrap(),
            "\"IN_USE\""
        );
        assert_eq!(format!("{}", DriveUsage::Released), "RELEASED");
    }
}
