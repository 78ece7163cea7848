//! Bare-metal Node Controller
//!
//! Node-local controller for bare-metal storage. It keeps Drive records in
//! step with the physical inventory, adopts the system volume group,
//! publishes free capacity and drives Volume records from requested to
//! ready, removed or failed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Volume Manager                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐   │
//! │  │   Volume     │  │   Discover   │  │   Health propagation     │   │
//! │  │  reconciler  │  │     pass     │  │   and drive events       │   │
//! │  └──────┬───────┘  └──────┬───────┘  └────────────┬─────────────┘   │
//! │         │                 │                       │                 │
//! │         └─────────────────┼───────────────────────┘                 │
//! │                           │                                         │
//! │              ┌────────────┴────────────┐                            │
//! │              │     Resource Store      │                            │
//! │              │  (kube API / in-memory) │                            │
//! │              └─────────────────────────┘                            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Provisioners (drive, LVM)  │  Probes (lsblk, blkid, LVM, smartctl) │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controller`]: volume manager, reconcile state machine and loops
//! - [`crd`]: Drive, Volume, LogicalVolumeGroup and AvailableCapacity
//! - [`domain`]: ports to the outside world
//! - [`hardware`]: sysfs inventory and host command probes
//! - [`provisioners`]: drive and LVM provisioners and their registry
//! - [`store`]: resource store implementations
//! - [`error`]: error types and handling

pub mod controller;
pub mod crd;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod metrics;
pub mod provisioners;
pub mod store;

// Re-export commonly used types
pub use controller::{
    Collaborators, ControllerConfig, DriveUpdates, ReconcileOutcome, Runner, UpdatedDrive,
    VolumeManager,
};

pub use crd::{
    AvailableCapacity, AvailableCapacitySpec, CsiStatus, Drive, DriveSpec, DriveStatus, DriveType,
    DriveUsage, Health, LogicalVolumeGroup, LogicalVolumeGroupSpec, StorageClass, Volume,
    VolumeMode, VolumeSpec,
};

pub use domain::ports::{
    BlockDevice, DataDiscoverer, DiscoverResult, DriveDescriptor, EventReason, EventRecorder,
    EventType, Executor, InventorySource, LvmOps, Provisioner,
};

pub use error::{Error, ErrorAction, Result};

pub use metrics::ControllerMetrics;

pub use provisioners::{
    DriveProvisioner, LvmProvisioner, ProvisionerKind, ProvisionerMap, ProvisionerRegistry,
};

pub use store::{KubeStore, MemoryStore, ResourceStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
