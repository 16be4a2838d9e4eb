//! Lookbook Notify library.
//!
//! Delivers the results of long-running background operations to whichever
//! screen is interested in them, even when the screen that started the
//! operation has since been torn down.
//!
//! ## Structure
//!
//! - `stores/` - Listener registry, pending results, generation and activity state
//! - `feedback` - Activity-gated toast and badge dispatch
//! - `infrastructure/` - Ports, storage adapters, configuration, maintenance worker
//! - `app` - `NotificationHub` composition

pub mod app;
pub mod error;
pub mod feedback;
pub mod infrastructure;
pub mod stores;


pub use app::{HubPorts, MaintenanceReport, NotificationHub};
pub use error::{CallbackExecutionError, NotifyError};
