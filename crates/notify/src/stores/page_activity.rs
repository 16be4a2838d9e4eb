//! Screen activity tracking.
//!
//! A screen counts as active only while the app is in the foreground and the
//! screen itself is focused. Unknown screens are inactive.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use lookbook_domain::ScreenId;

/// Tracks which screens the user is currently looking at.
pub struct PageActivityTracker {
    /// screen -> focused
    screens: DashMap<ScreenId, bool>,
    app_foreground: AtomicBool,
}

impl PageActivityTracker {
    /// App starts in the foreground with no focused screens.
    pub fn new() -> Self {
        Self {
            screens: DashMap::new(),
            app_foreground: AtomicBool::new(true),
        }
    }

    /// Record a focus/blur transition. Last write wins.
    pub fn set_active(&self, screen_id: &ScreenId, active: bool) {
        self.screens.insert(screen_id.clone(), active);
        tracing::debug!(screen_id = %screen_id, active, "Screen activity changed");
    }

    pub fn is_active(&self, screen_id: &ScreenId) -> bool {
        self.is_app_foreground()
            && self
                .screens
                .get(screen_id)
                .map(|focused| *focused)
                .unwrap_or(false)
    }

    /// Forget a screen on teardown.
    pub fn clear(&self, screen_id: &ScreenId) {
        if self.screens.remove(screen_id).is_some() {
            tracing::debug!(screen_id = %screen_id, "Screen activity cleared");
        }
    }

    /// Record an app foreground/background transition.
    ///
    /// Per-screen focus is kept, so a screen focused before backgrounding is
    /// active again once the app returns.
    pub fn set_app_foreground(&self, foreground: bool) {
        let previous = self.app_foreground.swap(foreground, Ordering::SeqCst);
        if previous != foreground {
            tracing::debug!(foreground, "App foreground state changed");
        }
    }

    pub fn is_app_foreground(&self) -> bool {
        self.app_foreground.load(Ordering::SeqCst)
    }

    /// Screens currently active, in no particular order.
    pub fn active_screens(&self) -> Vec<ScreenId> {
        if !self.is_app_foreground() {
            return Vec::new();
        }
        self.screens
            .iter()
            .filter(|entry| *entry.value())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of tracked screens, focused or not.
    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Forget every screen and return to the foreground.
    pub fn reset(&self) {
        self.screens.clear();
        self.app_foreground.store(true, Ordering::SeqCst);
    }
}

impl Default for PageActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}
