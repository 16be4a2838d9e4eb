//! Activity-gated toast and badge feedback.
//!
//! Every event resolves to exactly one of:
//! - a toast, when the user is looking at the screen,
//! - a badge increment, when they are not ("needs attention when you return"),
//! - nothing, when the screen has been explicitly muted.
//!
//! Presenter failures are logged and swallowed here; they never reach the
//! operation that produced the event.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use lookbook_domain::{FeedbackEvent, ScreenId};

use crate::infrastructure::ports::{BadgePresenter, ToastPresenter};
use crate::stores::page_activity::PageActivityTracker;

/// How a feedback event was surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackResolution {
    Toast,
    /// Badge bumped to `count` unseen items for the screen.
    Badge { count: u32 },
    Muted,
}

pub struct FeedbackDispatcher {
    activity: Arc<PageActivityTracker>,
    toast: Arc<dyn ToastPresenter>,
    badge: Arc<dyn BadgePresenter>,
    muted: DashSet<ScreenId>,
    /// screen -> unseen count
    badges: DashMap<ScreenId, u32>,
}

impl FeedbackDispatcher {
    pub fn new(
        activity: Arc<PageActivityTracker>,
        toast: Arc<dyn ToastPresenter>,
        badge: Arc<dyn BadgePresenter>,
    ) -> Self {
        Self {
            activity,
            toast,
            badge,
            muted: DashSet::new(),
            badges: DashMap::new(),
        }
    }

    pub fn on_event(&self, event: &FeedbackEvent) -> FeedbackResolution {
        let screen_id = &event.screen_id;

        if self.muted.contains(screen_id) {
            tracing::debug!(
                screen_id = %screen_id,
                resource_id = %event.resource_id,
                kind = %event.kind,
                "Feedback suppressed, screen muted"
            );
            return FeedbackResolution::Muted;
        }

        if self.activity.is_active(screen_id) {
            if let Err(e) = self.toast.show_toast(screen_id, event.kind, &event.message) {
                tracing::warn!(screen_id = %screen_id, error = %e, "Toast presentation failed");
            }
            return FeedbackResolution::Toast;
        }

        let count = {
            let mut entry = self.badges.entry(screen_id.clone()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        if let Err(e) = self.badge.set_badge(screen_id, count) {
            tracing::warn!(screen_id = %screen_id, count, error = %e, "Badge presentation failed");
        }
        tracing::debug!(
            screen_id = %screen_id,
            resource_id = %event.resource_id,
            kind = %event.kind,
            count,
            "Screen inactive, badge incremented"
        );
        FeedbackResolution::Badge { count }
    }

    /// Suppress all feedback for a screen until `unmute`.
    pub fn mute(&self, screen_id: &ScreenId) {
        self.muted.insert(screen_id.clone());
    }

    pub fn unmute(&self, screen_id: &ScreenId) {
        self.muted.remove(screen_id);
    }

    pub fn is_muted(&self, screen_id: &ScreenId) -> bool {
        self.muted.contains(screen_id)
    }

    pub fn badge_count(&self, screen_id: &ScreenId) -> u32 {
        self.badges.get(screen_id).map(|count| *count).unwrap_or(0)
    }

    /// Reset the unseen count for a screen, hiding its badge.
    pub fn clear_badge(&self, screen_id: &ScreenId) {
        if self.badges.remove(screen_id).is_none() {
            return;
        }
        if let Err(e) = self.badge.set_badge(screen_id, 0) {
            tracing::warn!(screen_id = %screen_id, error = %e, "Badge clear failed");
        }
    }

    /// Drop all per-screen state for a screen that has been closed.
    ///
    /// Unlike `clear_badge`, no presenter call is made; the screen is gone.
    pub fn forget(&self, screen_id: &ScreenId) {
        let had_badge = self.badges.remove(screen_id).is_some();
        let was_muted = self.muted.remove(screen_id).is_some();
        if had_badge || was_muted {
            tracing::debug!(screen_id = %screen_id, "Feedback state forgotten");
        }
    }

    /// Number of screens holding a badge count or a mute.
    pub fn tracked_screens(&self) -> usize {
        self.badges.len() + self.muted.iter().filter(|s| !self.badges.contains_key(s.key())).count()
    }

    /// Clear every badge and mute.
    pub fn reset(&self) {
        let screens: Vec<ScreenId> = self.badges.iter().map(|e| e.key().clone()).collect();
        for screen_id in &screens {
            self.clear_badge(screen_id);
        }
        self.muted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockBadgePresenter, MockToastPresenter, PresentationError};
    use lookbook_domain::{FeedbackKind, ResourceId};

    fn screen(id: &str) -> ScreenId {
        ScreenId::new(id).unwrap()
    }

    fn event(screen_id: &str, kind: FeedbackKind) -> FeedbackEvent {
        FeedbackEvent::new(
            ResourceId::new("template-1").unwrap(),
            screen(screen_id),
            kind,
            "Your look is ready",
        )
    }

    #[test]
    fn active_screen_gets_toast_not_badge() {
        let activity = Arc::new(PageActivityTracker::new());
        activity.set_active(&screen("lookbook"), true);

        let mut toast = MockToastPresenter::new();
        toast
            .expect_show_toast()
            .withf(|screen_id, kind, message| {
                screen_id.as_str() == "lookbook"
                    && *kind == FeedbackKind::Success
                    && message == "Your look is ready"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut badge = MockBadgePresenter::new();
        badge.expect_set_badge().never();

        let dispatcher = FeedbackDispatcher::new(activity, Arc::new(toast), Arc::new(badge));
        assert_eq!(
            dispatcher.on_event(&event("lookbook", FeedbackKind::Success)),
            FeedbackResolution::Toast
        );
        assert_eq!(dispatcher.badge_count(&screen("lookbook")), 0);
    }

    #[test]
    fn inactive_screen_gets_badge_not_toast() {
        let activity = Arc::new(PageActivityTracker::new());

        let mut toast = MockToastPresenter::new();
        toast.expect_show_toast().never();
        let mut badge = MockBadgePresenter::new();
        badge
            .expect_set_badge()
            .withf(|screen_id, _| screen_id.as_str() == "lookbook")
            .times(2)
            .returning(|_, _| Ok(()));

        let dispatcher = FeedbackDispatcher::new(activity, Arc::new(toast), Arc::new(badge));
        assert_eq!(
            dispatcher.on_event(&event("lookbook", FeedbackKind::Progress)),
            FeedbackResolution::Badge { count: 1 }
        );
        assert_eq!(
            dispatcher.on_event(&event("lookbook", FeedbackKind::Failure)),
            FeedbackResolution::Badge { count: 2 }
        );
    }

    #[test]
    fn muted_screen_gets_nothing() {
        let activity = Arc::new(PageActivityTracker::new());
        activity.set_active(&screen("chat"), true);

        let mut toast = MockToastPresenter::new();
        toast.expect_show_toast().never();
        let mut badge = MockBadgePresenter::new();
        badge.expect_set_badge().never();

        let dispatcher = FeedbackDispatcher::new(activity, Arc::new(toast), Arc::new(badge));
        dispatcher.mute(&screen("chat"));
        dispatcher.mute(&screen("lookbook"));

        assert_eq!(
            dispatcher.on_event(&event("chat", FeedbackKind::Success)),
            FeedbackResolution::Muted
        );
        assert_eq!(
            dispatcher.on_event(&event("lookbook", FeedbackKind::Success)),
            FeedbackResolution::Muted
        );
        assert!(dispatcher.is_muted(&screen("chat")));
    }

    #[test]
    fn presenter_failures_are_swallowed() {
        let activity = Arc::new(PageActivityTracker::new());
        activity.set_active(&screen("active"), true);

        let mut toast = MockToastPresenter::new();
        toast
            .expect_show_toast()
            .returning(|_, _, _| Err(PresentationError::Unavailable("no window".into())));
        let mut badge = MockBadgePresenter::new();
        badge
            .expect_set_badge()
            .returning(|_, _| Err(PresentationError::Failed("dock gone".into())));

        let dispatcher = FeedbackDispatcher::new(activity, Arc::new(toast), Arc::new(badge));
        assert_eq!(
            dispatcher.on_event(&event("active", FeedbackKind::Success)),
            FeedbackResolution::Toast
        );
        assert_eq!(
            dispatcher.on_event(&event("inactive", FeedbackKind::Success)),
            FeedbackResolution::Badge { count: 1 }
        );
    }

    #[test]
    fn forget_drops_badge_and_mute_without_presenting() {
        let activity = Arc::new(PageActivityTracker::new());
        let mut toast = MockToastPresenter::new();
        toast.expect_show_toast().never();
        let mut badge = MockBadgePresenter::new();
        badge
            .expect_set_badge()
            .withf(|_, count| *count == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = FeedbackDispatcher::new(activity, Arc::new(toast), Arc::new(badge));
        dispatcher.on_event(&event("lookbook", FeedbackKind::Success));
        dispatcher.mute(&screen("chat"));
        assert_eq!(dispatcher.tracked_screens(), 2);

        dispatcher.forget(&screen("lookbook"));
        dispatcher.forget(&screen("chat"));

        assert_eq!(dispatcher.tracked_screens(), 0);
        assert_eq!(dispatcher.badge_count(&screen("lookbook")), 0);
        assert!(!dispatcher.is_muted(&screen("chat")));
    }

    #[test]
    fn clear_badge_resets_count_and_hides_badge() {
        let activity = Arc::new(PageActivityTracker::new());
        let mut toast = MockToastPresenter::new();
        toast.expect_show_toast().never();
        let mut badge = MockBadgePresenter::new();
        badge
            .expect_set_badge()
            .withf(|_, count| *count == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        badge
            .expect_set_badge()
            .withf(|_, count| *count == 0)
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = FeedbackDispatcher::new(activity, Arc::new(toast), Arc::new(badge));
        dispatcher.on_event(&event("lookbook", FeedbackKind::Success));
        dispatcher.clear_badge(&screen("lookbook"));
        dispatcher.clear_badge(&screen("lookbook"));

        assert_eq!(dispatcher.badge_count(&screen("lookbook")), 0);
    }
}
