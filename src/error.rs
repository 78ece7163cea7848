//! Error types for the node controller
//!
//! Provides structured error types for all controller components including
//! the resource store, drive inventory, OS probes, provisioners and the
//! discovery pass.

use std::time::Duration;
use thiserror::Error;

/// Delay before a volume is reconciled again after a transient failure
pub const DEFAULT_REQUEUE_FOR_VOLUME: Duration = Duration::from_secs(5);

/// Unified error type for the controller
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Resource Store Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    #[error("Resource version conflict: {kind}/{name}")]
    Conflict { kind: String, name: String },

    #[error("Store error: {0}")]
    Store(String),

    // =========================================================================
    // Drive Inventory Errors
    // =========================================================================
    #[error("{0}")]
    DriveManager(String),

    #[error("Hardware discovery failed: {0}")]
    HardwareDiscovery(String),

    // =========================================================================
    // Probe / LVM Errors
    // =========================================================================
    #[error("Command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Probe failed for {device}: {reason}")]
    Probe { device: String, reason: String },

    #[error("LVM error: {0}")]
    Lvm(String),

    // =========================================================================
    // Provisioner Errors
    // =========================================================================
    #[error("No provisioner registered for {kind}")]
    ProvisionerUnavailable { kind: String },

    #[error("Provisioner operation failed: {operation} for volume {volume}: {reason}")]
    Provisioner {
        operation: String,
        volume: String,
        reason: String,
    },

    // =========================================================================
    // Discovery Errors
    // =========================================================================
    #[error("failed to {step}: {source}")]
    DiscoveryStep {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Build a not-found error for a resource kind
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::ResourceNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Build a version-conflict error for a resource kind
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Wrap an error with the discovery step that produced it
    pub fn in_step(step: &'static str, source: Error) -> Self {
        Error::DiscoveryStep {
            step,
            source: Box::new(source),
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Record races and vanished records - short fixed retry
            Error::ResourceNotFound { .. } | Error::Conflict { .. } => {
                ErrorAction::RequeueAfter(DEFAULT_REQUEUE_FOR_VOLUME)
            }

            // Transient errors - retry with backoff
            Error::Kube(_)
            | Error::Store(_)
            | Error::DriveManager(_)
            | Error::CommandFailed { .. } => ErrorAction::RequeueWithBackoff,

            // Configuration errors - don't retry automatically
            Error::Configuration(_) | Error::ProvisionerUnavailable { .. } => {
                ErrorAction::NoRequeue
            }

            Error::DiscoveryStep { source, .. } => source.action(),

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if the target resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ResourceNotFound { .. } => true,
            Error::DiscoveryStep { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

/// Result type alias for the controller
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::not_found("Volume", "pvc-1");
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(DEFAULT_REQUEUE_FOR_VOLUME)
        );

        let err = Error::conflict("Drive", "uuid-1");
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(DEFAULT_REQUEUE_FOR_VOLUME)
        );

        let err = Error::Configuration("bad config".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::Store("etcd timeout".into());
        assert!(transient.is_retryable());

        let missing = Error::ProvisionerUnavailable {
            kind: "lvm".into(),
        };
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_discovery_step_message() {
        let err = Error::in_step("update drive records", Error::Store("list failed".into()));
        assert_eq!(
            err.to_string(),
            "failed to update drive records: Store error: list failed"
        );
        assert!(!err.is_not_found());
        assert!(err.is_retryable());
    }
}
