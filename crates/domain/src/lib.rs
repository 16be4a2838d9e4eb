//! Lookbook domain vocabulary.
//!
//! Types shared by the notification core and its callers: validated
//! identifiers, operation requests and outcomes, pending results and
//! feedback events.

pub mod error;
pub mod feedback;
pub mod ids;
pub mod operation;

pub use error::DomainError;
pub use feedback::{FeedbackEvent, FeedbackKind};
pub use ids::{ComponentId, RequestId, ResourceId, ScreenId, SubscriptionId};
pub use operation::{OperationOutcome, PendingResult, Request};
