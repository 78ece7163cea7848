//! Drive events
//!
//! Maps drive health and presence to user-facing events and emits them for
//! the outcome of a drive synchronization pass.

use super::drive_sync::DriveUpdates;
use super::volume_manager::VolumeManager;
use crate::crd::{Drive, DriveStatus, Health};
use crate::domain::ports::{EventReason, EventRecorder, EventType};
use crate::error::Result;
use crate::store::ResourceStore;
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType as KubeEventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::{error, info, warn};

pub fn health_event(health: Health) -> (EventType, EventReason) {
    match health {
        Health::Good => (EventType::Normal, EventReason::DriveHealthGood),
        Health::Bad => (EventType::Error, EventReason::DriveHealthBad),
        Health::Unknown => (EventType::Warning, EventReason::DriveHealthUnknown),
        Health::Suspect => (EventType::Warning, EventReason::DriveHealthSuspect),
    }
}

pub fn status_event(status: DriveStatus) -> (EventType, EventReason) {
    match status {
        DriveStatus::Online => (EventType::Normal, EventReason::DriveStatusOnline),
        DriveStatus::Offline => (EventType::Error, EventReason::DriveStatusOffline),
    }
}

fn describe(drive: &Drive) -> String {
    format!(
        "serial {} path {} health {} status {}",
        drive.spec.serial_number, drive.spec.path, drive.spec.health, drive.spec.status
    )
}

impl<S: ResourceStore> VolumeManager<S> {
    /// Emit events for every created or changed drive
    pub async fn create_events_for_drive_updates(&self, updates: &DriveUpdates) {
        for drive in &updates.created {
            let message = format!("New drive discovered: {}", describe(drive));
            self.emit(drive, EventType::Normal, EventReason::DriveDiscovered, &message)
                .await;

            let (event_type, reason) = health_event(drive.spec.health);
            self.emit(drive, event_type, reason, &describe(drive)).await;

            let (event_type, reason) = status_event(drive.spec.status);
            self.emit(drive, event_type, reason, &describe(drive)).await;
        }

        for updated in &updates.updated {
            let previous = &updated.previous_state;
            let current = &updated.current_state;

            if previous.spec.health != current.spec.health {
                let (event_type, reason) = health_event(current.spec.health);
                let message = format!(
                    "Drive health changed from {} to {}: {}",
                    previous.spec.health,
                    current.spec.health,
                    describe(current)
                );
                self.emit(current, event_type, reason, &message).await;
            }

            if previous.spec.status != current.spec.status {
                let (event_type, reason) = status_event(current.spec.status);
                let message = format!(
                    "Drive status changed from {} to {}: {}",
                    previous.spec.status,
                    current.spec.status,
                    describe(current)
                );
                self.emit(current, event_type, reason, &message).await;
            }
        }
    }

    async fn emit(&self, drive: &Drive, event_type: EventType, reason: EventReason, message: &str) {
        if let Err(e) = self.recorder.record(drive, event_type, reason, message).await {
            warn!(drive = %drive.spec.uuid, reason = %reason, error = %e, "Failed to record event");
        }
    }
}

// =============================================================================
// Recorders
// =============================================================================

/// Writes events to the controller log
#[derive(Debug, Default, Clone)]
pub struct LogRecorder;

#[async_trait]
impl EventRecorder for LogRecorder {
    async fn record(
        &self,
        drive: &Drive,
        event_type: EventType,
        reason: EventReason,
        message: &str,
    ) -> Result<()> {
        match event_type {
            EventType::Normal => info!(drive = %drive.spec.uuid, reason = %reason, "{}", message),
            EventType::Warning => warn!(drive = %drive.spec.uuid, reason = %reason, "{}", message),
            EventType::Error => error!(drive = %drive.spec.uuid, reason = %reason, "{}", message),
        }
        Ok(())
    }
}

/// Publishes events to the cluster, attached to the Drive record
#[derive(Clone)]
pub struct KubeEventRecorder {
    client: Client,
    reporter: Reporter,
}

impl KubeEventRecorder {
    pub fn new(client: Client, node_id: &str) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: crate::NAME.to_string(),
                instance: Some(node_id.to_string()),
            },
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(
        &self,
        drive: &Drive,
        event_type: EventType,
        reason: EventReason,
        message: &str,
    ) -> Result<()> {
        // the cluster only knows Normal and Warning
        let type_ = match event_type {
            EventType::Normal => KubeEventType::Normal,
            EventType::Warning | EventType::Error => KubeEventType::Warning,
        };
        let recorder = Recorder::new(
            self.client.clone(),
            self.reporter.clone(),
            drive.object_ref(&()),
        );
        recorder
            .publish(Event {
                type_,
                reason: reason.as_str().to_string(),
                note: Some(message.to_string()),
                action: "DriveSync".to_string(),
                secondary: None,
            })
            .await?;
        Ok(())
    }
}

/// Keeps emitted events in memory for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingRecorder {
    events: parking_lot::Mutex<Vec<(String, EventType, EventReason)>>,
}

#[cfg(test)]
impl RecordingRecorder {
    pub fn events(&self) -> Vec<(String, EventType, EventReason)> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl EventRecorder for RecordingRecorder {
    async fn record(
        &self,
        drive: &Drive,
        event_type: EventType,
        reason: EventReason,
        _message: &str,
    ) -> Result<()> {
        self.events
            .lock()
            .push((drive.spec.uuid.clone(), event_type, reason));
        Ok(())
    }
}
