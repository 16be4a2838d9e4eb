//! Presentation primitives owned by the UI shell.
//!
//! Both are fire-and-forget: the dispatcher logs a returned error and moves
//! on, so implementations should not retry or block.

use lookbook_domain::{FeedbackKind, ScreenId};

use super::error::PresentationError;

#[cfg_attr(test, mockall::automock)]
pub trait ToastPresenter: Send + Sync {
    fn show_toast(
        &self,
        screen_id: &ScreenId,
        kind: FeedbackKind,
        message: &str,
    ) -> Result<(), PresentationError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait BadgePresenter: Send + Sync {
    /// Set the unseen-item badge for a screen. `count == 0` hides it.
    fn set_badge(&self, screen_id: &ScreenId, count: u32) -> Result<(), PresentationError>;
}
