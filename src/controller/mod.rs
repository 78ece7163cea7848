//! Node controller
//!
//! The volume manager and the control logic implemented on it:
//!
//! - [`reconcile`]: per-volume state machine
//! - [`drive_sync`]: inventory to Drive record synchronization
//! - [`health`]: drive health propagation
//! - [`discovery`]: the Discover pass, data discovery and capacity sync
//! - [`system_lvg`]: adoption of the system volume group
//! - [`events`]: drive events
//! - [`runner`]: watch, resync and discover loops

pub mod discovery;
pub mod drive_sync;
pub mod events;
pub mod health;
pub mod reconcile;
pub mod runner;
pub mod system_lvg;
pub mod volume_manager;

#[cfg(test)]
pub(crate) mod testing;

pub use drive_sync::{DriveUpdates, UpdatedDrive};
pub use events::{health_event, status_event, KubeEventRecorder, LogRecorder};
pub use reconcile::{requeue_for, ReconcileOutcome, MAX_CONFLICT_RETRIES};
pub use runner::{run_volume_controller, wait_for_shutdown, ResyncSummary, Runner, SHUTDOWN_GRACE};
pub use volume_manager::{
    Collaborators, ControllerConfig, VolumeManager, HOST_ROOT_PATH, KUBELET_ROOT_PATH,
};
