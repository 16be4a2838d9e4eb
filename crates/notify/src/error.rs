//! Error types for the notification layer.
//!
//! Most failures here are handled internally: callback and presentation
//! failures are logged and swallowed, orphaned deliveries go to the pending
//! store. Only contract violations and storage failures on an explicit
//! caller request reach the caller.

use lookbook_domain::{DomainError, ResourceId};
use thiserror::Error;

use crate::infrastructure::ports::StorageError;

/// Errors returned by `NotificationHub` operations.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Another operation is already running for this resource.
    ///
    /// Not a user-facing failure; at most a "still working" indicator.
    #[error("Operation already in progress for resource {0}")]
    DuplicateOperationRejected(ResourceId),

    /// Pending-result storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An identifier or argument violated the call contract.
    #[error("Invalid argument: {0}")]
    Domain(#[from] DomainError),
}

impl NotifyError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateOperationRejected(_))
    }
}

/// A subscriber callback failed during delivery.
///
/// Isolated per callback: logged, counted in the delivery report, and never
/// stops delivery to the remaining subscribers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackExecutionError {
    #[error("callback returned an error: {0}")]
    Returned(String),
    #[error("callback panicked: {0}")]
    Panicked(String),
}
