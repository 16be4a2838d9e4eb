//! In-memory state for the notification layer.
//!
//! - `ListenerRegistry` - request-keyed result subscriptions
//! - `PendingResultStore` - results that arrived with nobody listening
//! - `GenerationStateTracker` - one in-flight operation per resource
//! - `PageActivityTracker` - which screens the user is looking at

pub mod generation_state;
pub mod listener_registry;
pub mod page_activity;
pub mod pending_results;

// Re-export store types
pub use generation_state::GenerationStateTracker;
pub use listener_registry::{DeliveryReport, ListenerRegistry, ResultCallback, SubscriptionHandle};
pub use page_activity::PageActivityTracker;
pub use pending_results::{PendingPolicy, PendingResultStore, PENDING_KEY_PREFIX};
