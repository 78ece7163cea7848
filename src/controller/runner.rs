//! Controller runtime
//!
//! Drives the volume manager: a watch-based volume controller in cluster
//! mode, a periodic volume resync in standalone mode, and the periodic
//! Discover pass in both. Every loop stops when the shutdown token fires.

use super::reconcile::{requeue_for, ReconcileOutcome};
use super::volume_manager::VolumeManager;
use crate::crd::Volume;
use crate::error::{Error, Result};
use crate::store::ResourceStore;
use futures::StreamExt;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::Api;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts of one volume resync sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    pub reconciled: usize,
    pub requeued: usize,
    pub failed: usize,
}

pub struct Runner<S: ResourceStore> {
    manager: Arc<VolumeManager<S>>,
    shutdown: CancellationToken,
}

impl<S: ResourceStore> Runner<S> {
    pub fn new(manager: Arc<VolumeManager<S>>, shutdown: CancellationToken) -> Self {
        Self { manager, shutdown }
    }

    pub fn manager(&self) -> &Arc<VolumeManager<S>> {
        &self.manager
    }

    /// Run Discover immediately and then every `discover_interval`
    pub async fn run_discover_loop(&self) {
        let period = self.manager.config().discover_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Discover loop started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // errors are logged and counted by the pass itself
                    let _ = self.manager.discover().await;
                }
            }
        }
        info!("Discover loop stopped");
    }

    /// Reconcile every volume of this node every `resync_interval`
    pub async fn run_resync_loop(&self) {
        let period = self.manager.config().resync_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Volume resync loop started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.resync_once().await {
                        Ok(summary) => debug!(?summary, "Volume resync complete"),
                        Err(e) => error!(error = %e, "Volume resync failed"),
                    }
                }
            }
        }
        info!("Volume resync loop stopped");
    }

    /// Reconcile each volume of this node once
    pub async fn resync_once(&self) -> Result<ResyncSummary> {
        let volumes: Vec<Volume> = self.manager.store().list().await?;
        let mut summary = ResyncSummary::default();

        for volume in volumes
            .iter()
            .filter(|v| self.manager.is_owned_by_node(&v.spec))
        {
            if self.shutdown.is_cancelled() {
                break;
            }
            let Some(name) = volume.metadata.name.as_deref() else {
                continue;
            };
            match self.manager.reconcile(name).await {
                Ok(ReconcileOutcome::Done) => summary.reconciled += 1,
                Ok(ReconcileOutcome::RequeueAfter(_)) => summary.requeued += 1,
                Err(e) => {
                    warn!(volume = %name, error = %e, "Volume reconcile failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

// =============================================================================
// Watch-based volume controller
// =============================================================================

async fn reconcile_volume<S: ResourceStore>(
    volume: Arc<Volume>,
    manager: Arc<VolumeManager<S>>,
) -> std::result::Result<Action, Error> {
    let name = volume
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::Internal("volume event without a name".into()))?;

    if !manager.is_owned_by_node(&volume.spec) {
        return Ok(Action::await_change());
    }

    match manager.reconcile(&name).await? {
        ReconcileOutcome::Done => Ok(Action::await_change()),
        ReconcileOutcome::RequeueAfter(delay) => Ok(Action::requeue(delay)),
    }
}

fn error_policy<S: ResourceStore>(
    volume: Arc<Volume>,
    err: &Error,
    _manager: Arc<VolumeManager<S>>,
) -> Action {
    warn!(
        volume = volume.metadata.name.as_deref().unwrap_or_default(),
        error = %err,
        "Volume reconcile error"
    );
    match requeue_for(err) {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}

/// Watch Volume records and reconcile them until shutdown
pub async fn run_volume_controller<S: ResourceStore>(
    manager: Arc<VolumeManager<S>>,
    api: Api<Volume>,
    shutdown: CancellationToken,
) {
    info!(node = %manager.config().node_id, "Volume controller started");

    let trigger = shutdown.clone();
    Controller::new(api, watcher::Config::default())
        .graceful_shutdown_on(async move { trigger.cancelled().await })
        .run(reconcile_volume, error_policy, manager)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(volume = %obj.name, "Volume reconciled"),
                Err(e) => debug!(error = %e, "Volume controller event failed"),
            }
        })
        .await;

    info!("Volume controller stopped");
}

/// Resolve on Ctrl-C, or immediately if the token is already cancelled
pub async fn wait_for_shutdown(shutdown: CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Unable to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    }
}

/// Small grace period for in-flight passes after shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
