//! Volume reconciliation
//!
//! Drives a Volume through its status state machine:
//!
//! ```text
//! CREATING ──prepare──► CREATED        (drive or LVG location)
//!     └─────fail──────► FAILED
//! REMOVING ──release──► REMOVED        (deletion finalizes REMOVED/FAILED)
//!     └─────fail──────► FAILED
//! EXPANDING ──expand──► RESIZED
//!     └─────fail──────► FAILED
//! ```
//!
//! Every status write re-reads the record first. A write that loses a race
//! surfaces as a conflict, and the whole handler is re-run on the fresh
//! record, so concurrent reconciles of one volume converge.

use super::volume_manager::VolumeManager;
use crate::crd::{
    CsiStatus, Drive, DriveUsage, LogicalVolumeGroup, Volume, VOLUME_FINALIZER,
};
use crate::error::{Error, ErrorAction, Result, DEFAULT_REQUEUE_FOR_VOLUME};
use crate::provisioners::ProvisionerKind;
use crate::store::ResourceStore;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Handler re-runs allowed after optimistic-concurrency conflicts
pub const MAX_CONFLICT_RETRIES: usize = 3;

/// Result of one reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the record changes
    Done,
    /// Reconcile again after the delay
    RequeueAfter(Duration),
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Done => "done",
            ReconcileOutcome::RequeueAfter(_) => "requeue",
        }
    }
}

impl<S: ResourceStore> VolumeManager<S> {
    /// Reconcile the Volume record with the given name
    pub async fn reconcile(&self, name: &str) -> Result<ReconcileOutcome> {
        let span = info_span!("reconcile", volume = %name, node = %self.config.node_id);
        let result = self.reconcile_volume(name).instrument(span).await;

        match &result {
            Ok(outcome) => self.metrics.record_reconcile(outcome.label()),
            Err(_) => self.metrics.record_reconcile("error"),
        }
        result
    }

    async fn reconcile_volume(&self, name: &str) -> Result<ReconcileOutcome> {
        let mut volume: Volume = match self.store.read(name).await {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => {
                debug!("Volume no longer exists");
                return Ok(ReconcileOutcome::Done);
            }
            Err(e) => return Err(e),
        };

        for attempt in 0..MAX_CONFLICT_RETRIES {
            match self.reconcile_once(&volume).await {
                Err(e) if e.is_conflict() => {
                    debug!(attempt, "Volume changed concurrently, re-running handler");
                    // a volume deleted in the meantime is reported to the scheduler
                    volume = self.store.read(name).await?;
                }
                other => return other,
            }
        }

        warn!(retries = MAX_CONFLICT_RETRIES, "Volume still conflicting, requeueing");
        Ok(ReconcileOutcome::RequeueAfter(self.config.volume_requeue))
    }

    async fn reconcile_once(&self, volume: &Volume) -> Result<ReconcileOutcome> {
        if !self.is_owned_by_node(&volume.spec) {
            debug!(owner = %volume.spec.node_id, "Volume belongs to another node");
            return Ok(ReconcileOutcome::Done);
        }

        if volume.metadata.deletion_timestamp.is_some() {
            if volume.spec.csi_status.is_terminal() {
                self.remove_finalizer(volume).await?;
                return Ok(ReconcileOutcome::Done);
            }
            return self.dispatch(volume).await;
        }

        if !has_finalizer(volume) {
            let volume = self.add_finalizer(volume).await?;
            return self.dispatch(&volume).await;
        }

        self.dispatch(volume).await
    }

    async fn dispatch(&self, volume: &Volume) -> Result<ReconcileOutcome> {
        match &volume.spec.csi_status {
            CsiStatus::Creating if volume.spec.is_in_lvg() => {
                self.handle_creating_volume_in_lvg(volume).await
            }
            CsiStatus::Creating => self.prepare_volume(volume).await,
            CsiStatus::Removing => self.handle_removing_status(volume).await,
            CsiStatus::Expanding => self.handle_expanding_status(volume).await,
            status => {
                debug!(status = %status, "Nothing to do for status");
                Ok(ReconcileOutcome::Done)
            }
        }
    }

    async fn add_finalizer(&self, volume: &Volume) -> Result<Volume> {
        let mut updated = volume.clone();
        updated
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(VOLUME_FINALIZER.to_string());
        let updated = self.store.update(&updated).await?;
        debug!("Finalizer added");
        Ok(updated)
    }

    async fn remove_finalizer(&self, volume: &Volume) -> Result<()> {
        if !has_finalizer(volume) {
            return Ok(());
        }
        let mut updated = volume.clone();
        if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != VOLUME_FINALIZER);
        }
        self.store.update(&updated).await?;
        info!(status = %volume.spec.csi_status, "Finalizer removed from deleted volume");
        Ok(())
    }

    // =========================================================================
    // Creating
    // =========================================================================

    /// Provision a CREATING volume and record CREATED or FAILED
    pub(crate) async fn prepare_volume(&self, volume: &Volume) -> Result<ReconcileOutcome> {
        let kind = ProvisionerKind::for_volume(&volume.spec);
        let prepared = match self.provisioners.get(kind) {
            Ok(provisioner) => provisioner.prepare_volume(&volume.spec).await,
            Err(e) => Err(e),
        };

        let status = match prepared {
            Ok(()) => CsiStatus::Created,
            Err(e) => {
                error!(provisioner = %kind, error = %e, "Failed to prepare volume");
                CsiStatus::Failed
            }
        };

        self.record_status(volume, status).await
    }

    /// Create a volume inside a LogicalVolumeGroup once the group is ready
    pub(crate) async fn handle_creating_volume_in_lvg(
        &self,
        volume: &Volume,
    ) -> Result<ReconcileOutcome> {
        let lvg_name = &volume.spec.location;
        let mut lvg: LogicalVolumeGroup = match self.store.read(lvg_name).await {
            Ok(lvg) => lvg,
            Err(e) => {
                warn!(lvg = %lvg_name, error = %e, "Unable to read LogicalVolumeGroup");
                return Err(e);
            }
        };

        match &lvg.spec.status {
            CsiStatus::Created => {}
            CsiStatus::Failed => {
                warn!(lvg = %lvg_name, "LogicalVolumeGroup failed, failing volume");
                return self.record_status(volume, CsiStatus::Failed).await;
            }
            status => {
                debug!(lvg = %lvg_name, status = %status, "LogicalVolumeGroup not ready yet");
                return Ok(ReconcileOutcome::RequeueAfter(self.config.volume_requeue));
            }
        }

        if lvg.spec.add_volume_ref(&volume.spec.id) {
            self.store.update(&lvg).await.map_err(|e| {
                warn!(lvg = %lvg_name, error = %e, "Unable to add volume to LogicalVolumeGroup");
                e
            })?;
            debug!(lvg = %lvg_name, "Volume added to VolumeRefs");
        }

        self.prepare_volume(volume).await
    }

    // =========================================================================
    // Removing
    // =========================================================================

    /// Release a REMOVING volume and record REMOVED or FAILED
    pub(crate) async fn handle_removing_status(&self, volume: &Volume) -> Result<ReconcileOutcome> {
        let kind = ProvisionerKind::for_volume(&volume.spec);
        let released = match self.provisioners.get(kind) {
            Ok(provisioner) => provisioner.release_volume(&volume.spec).await,
            Err(e) => Err(e),
        };

        match released {
            Ok(()) => {
                let outcome = self.record_status(volume, CsiStatus::Removed).await?;
                match kind {
                    ProvisionerKind::DriveBased => {
                        self.set_drive_usage(volume, |usage| {
                            (*usage == DriveUsage::Releasing).then_some(DriveUsage::Released)
                        })
                        .await
                    }
                    ProvisionerKind::LvmBased => self.remove_from_lvg(volume).await,
                }
                Ok(outcome)
            }
            Err(e) => {
                error!(provisioner = %kind, error = %e, "Failed to release volume");
                let outcome = self.record_status(volume, CsiStatus::Failed).await?;
                if kind == ProvisionerKind::DriveBased {
                    self.set_drive_usage(volume, |_| Some(DriveUsage::Failed))
                        .await;
                }
                Ok(outcome)
            }
        }
    }

    // Best effort: the volume status is already durable
    async fn set_drive_usage(
        &self,
        volume: &Volume,
        next: impl Fn(&DriveUsage) -> Option<DriveUsage>,
    ) {
        let mut drive: Drive = match self.store.read(&volume.spec.location).await {
            Ok(drive) => drive,
            Err(e) => {
                warn!(drive = %volume.spec.location, error = %e, "Unable to read drive");
                return;
            }
        };

        let Some(usage) = next(&drive.spec.usage) else {
            return;
        };
        drive.spec.usage = usage.clone();
        match self.store.update(&drive).await {
            Ok(_) => info!(drive = %volume.spec.location, usage = %usage, "Drive usage updated"),
            Err(e) => warn!(drive = %volume.spec.location, error = %e, "Unable to update drive usage"),
        }
    }

    async fn remove_from_lvg(&self, volume: &Volume) {
        let lvg_name = &volume.spec.location;
        let mut lvg: LogicalVolumeGroup = match self.store.read(lvg_name).await {
            Ok(lvg) => lvg,
            Err(e) => {
                warn!(lvg = %lvg_name, error = %e, "Unable to read LogicalVolumeGroup");
                return;
            }
        };

        if lvg.spec.remove_volume_ref(&volume.spec.id) {
            if let Err(e) = self.store.update(&lvg).await {
                warn!(lvg = %lvg_name, error = %e, "Unable to remove volume from VolumeRefs");
            }
        }
    }

    // =========================================================================
    // Expanding
    // =========================================================================

    /// Expand an EXPANDING volume and record RESIZED or FAILED
    pub(crate) async fn handle_expanding_status(&self, volume: &Volume) -> Result<ReconcileOutcome> {
        let expanded = match self.provisioners.for_volume(&volume.spec) {
            Ok(provisioner) => match provisioner.get_volume_path(&volume.spec).await {
                Ok(path) => provisioner.expand(&path, volume.spec.size).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let status = match expanded {
            Ok(()) => CsiStatus::Resized,
            Err(e) => {
                error!(size = volume.spec.size, error = %e, "Failed to expand volume");
                CsiStatus::Failed
            }
        };

        self.record_status(volume, status).await
    }

    // A recorded status ends the reconcile; a write that cannot be made is
    // returned so the caller retries or requeues.
    async fn record_status(&self, volume: &Volume, status: CsiStatus) -> Result<ReconcileOutcome> {
        self.update_volume_status(volume, status)
            .await
            .map(|_| ReconcileOutcome::Done)
            .map_err(|e| {
                if !e.is_conflict() {
                    error!(error = %e, "Unable to record volume status");
                }
                e
            })
    }
}

fn has_finalizer(volume: &Volume) -> bool {
    volume
        .metadata
        .finalizers
        .as_ref()
        .map_or(false, |f| f.iter().any(|n| n == VOLUME_FINALIZER))
}

/// Map a reconcile error onto the scheduler's requeue decision
pub fn requeue_for(err: &Error) -> Option<Duration> {
    match err.action() {
        ErrorAction::RequeueAfter(delay) => Some(delay),
        ErrorAction::RequeueWithBackoff => Some(DEFAULT_REQUEUE_FOR_VOLUME),
        ErrorAction::NoRequeue => None,
    }
}
