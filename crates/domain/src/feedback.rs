//! User-visible feedback events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ResourceId, ScreenId};

/// What stage of an operation a feedback event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Progress,
    Success,
    Failure,
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackKind::Progress => write!(f, "progress"),
            FeedbackKind::Success => write!(f, "success"),
            FeedbackKind::Failure => write!(f, "failure"),
        }
    }
}

/// A progress or completion notice for the screen that started an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub resource_id: ResourceId,
    pub screen_id: ScreenId,
    pub kind: FeedbackKind,
    pub message: String,
}

impl FeedbackEvent {
    pub fn new(
        resource_id: ResourceId,
        screen_id: ScreenId,
        kind: FeedbackKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource_id,
            screen_id,
            kind,
            message: message.into(),
        }
    }

    pub fn progress(resource_id: ResourceId, screen_id: ScreenId, message: impl Into<String>) -> Self {
        Self::new(resource_id, screen_id, FeedbackKind::Progress, message)
    }

    pub fn success(resource_id: ResourceId, screen_id: ScreenId, message: impl Into<String>) -> Self {
        Self::new(resource_id, screen_id, FeedbackKind::Success, message)
    }

    pub fn failure(resource_id: ResourceId, screen_id: ScreenId, message: impl Into<String>) -> Self {
        Self::new(resource_id, screen_id, FeedbackKind::Failure, message)
    }
}
