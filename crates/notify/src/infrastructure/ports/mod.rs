//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Durable storage of unclaimed results (in-memory or JSON file)
//! - Presentation primitives (toast, badge) owned by the UI shell
//! - Clock (for testing expiry and stale-flag sweeps)

mod error;
mod presentation;
mod storage;
mod testing;

// =============================================================================
// Storage Ports
// =============================================================================
pub use storage::KeyValueStore;

// =============================================================================
// Presentation Ports
// =============================================================================
pub use presentation::{BadgePresenter, ToastPresenter};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use presentation::{MockBadgePresenter, MockToastPresenter};

#[cfg(test)]
pub use storage::MockKeyValueStore;

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{PresentationError, StorageError};
