//! Application state and composition.
//!
//! `NotificationHub` owns one instance of each store and is the only surface
//! UI components talk to. Share it by `Arc`.

use std::sync::Arc;

use lookbook_domain::{
    ComponentId, FeedbackEvent, OperationOutcome, Request, RequestId, ResourceId, ScreenId,
};

use crate::error::NotifyError;
use crate::feedback::{FeedbackDispatcher, FeedbackResolution};
use crate::infrastructure::config::NotifyConfig;
use crate::infrastructure::kv_store::open_storage;
use crate::infrastructure::ports::{BadgePresenter, ClockPort, KeyValueStore, ToastPresenter};
use crate::stores::{
    DeliveryReport, GenerationStateTracker, ListenerRegistry, PageActivityTracker, PendingPolicy,
    PendingResultStore, SubscriptionHandle,
};

/// External collaborators injected into the hub.
pub struct HubPorts {
    pub clock: Arc<dyn ClockPort>,
    pub storage: Arc<dyn KeyValueStore>,
    pub toast: Arc<dyn ToastPresenter>,
    pub badge: Arc<dyn BadgePresenter>,
}

/// Outcome of one maintenance sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired_pending: usize,
    pub released_generations: Vec<ResourceId>,
}

/// Main notification state.
pub struct NotificationHub {
    registry: Arc<ListenerRegistry>,
    pending: Arc<PendingResultStore>,
    generation: Arc<GenerationStateTracker>,
    activity: Arc<PageActivityTracker>,
    feedback: Arc<FeedbackDispatcher>,
    config: NotifyConfig,
}

impl NotificationHub {
    pub fn new(config: NotifyConfig, ports: HubPorts) -> Self {
        let pending = Arc::new(PendingResultStore::new(
            ports.storage,
            ports.clock.clone(),
            PendingPolicy::new(config.pending_ttl, config.pending_max_entries),
        ));
        let registry = Arc::new(ListenerRegistry::new(pending.clone(), config.delivery_window));
        let generation = Arc::new(GenerationStateTracker::new(ports.clock));
        let activity = Arc::new(PageActivityTracker::new());
        let feedback = Arc::new(FeedbackDispatcher::new(
            activity.clone(),
            ports.toast,
            ports.badge,
        ));

        Self {
            registry,
            pending,
            generation,
            activity,
            feedback,
            config,
        }
    }

    /// Build the hub and reload any pending results left in storage.
    pub async fn init(config: NotifyConfig, ports: HubPorts) -> Result<Self, NotifyError> {
        let hub = Self::new(config, ports);
        let restored = hub.pending.restore().await?;
        tracing::info!(
            restored,
            backend = ?hub.config.storage_backend,
            "Notification hub initialized"
        );
        Ok(hub)
    }

    /// Open the configured storage backend, then `init`.
    pub async fn from_config(
        config: NotifyConfig,
        clock: Arc<dyn ClockPort>,
        toast: Arc<dyn ToastPresenter>,
        badge: Arc<dyn BadgePresenter>,
    ) -> Result<Self, NotifyError> {
        let storage = open_storage(&config).await?;
        Self::init(
            config,
            HubPorts {
                clock,
                storage,
                toast,
                badge,
            },
        )
        .await
    }

    // =========================================================================
    // Result subscriptions
    // =========================================================================

    /// Subscribe `owner` to the outcome of `request_id`.
    ///
    /// The callback runs at most once. Keep the handle to unsubscribe early;
    /// dropping it leaves the subscription in place until the owner unmounts.
    pub fn register_for_result<F>(
        &self,
        request_id: RequestId,
        owner: ComponentId,
        callback: F,
    ) -> SubscriptionHandle
    where
        F: FnOnce(OperationOutcome) -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.registry.register(request_id, owner, callback);
        SubscriptionHandle::new(id, &self.registry)
    }

    /// Called by the transport once per completion.
    ///
    /// Does not touch the generation flag; see `resolve_operation`.
    pub async fn deliver(&self, request_id: &RequestId, outcome: OperationOutcome) -> DeliveryReport {
        self.registry.delivered(request_id, outcome).await
    }

    pub async fn has_pending_result(&self, request_id: &RequestId) -> Result<bool, NotifyError> {
        Ok(self.pending.contains(request_id).await?)
    }

    /// Take the stored outcome for `request_id`. A second claim returns `None`.
    pub async fn claim_pending_result(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<OperationOutcome>, NotifyError> {
        Ok(self.registry.claim_pending(request_id).await?)
    }

    /// Drop every subscription held by a component being torn down.
    pub fn unmount_component(&self, owner: &ComponentId) -> usize {
        self.registry.unregister_owner(owner)
    }

    // =========================================================================
    // Generation state
    // =========================================================================

    /// Returns `false` if an operation is already running for the resource.
    pub fn start_operation(&self, resource_id: &ResourceId) -> bool {
        self.generation.try_start(resource_id)
    }

    /// `start_operation` for a full request, as an error on conflict.
    pub fn begin_operation(&self, request: &Request) -> Result<(), NotifyError> {
        if self.generation.try_start(&request.resource_id) {
            tracing::debug!(
                request_id = %request.request_id,
                resource_id = %request.resource_id,
                "Operation started"
            );
            Ok(())
        } else {
            Err(NotifyError::DuplicateOperationRejected(
                request.resource_id.clone(),
            ))
        }
    }

    pub fn finish_operation(&self, resource_id: &ResourceId) {
        self.generation.finish(resource_id);
    }

    pub fn is_operation_in_progress(&self, resource_id: &ResourceId) -> bool {
        self.generation.is_in_progress(resource_id)
    }

    /// Deliver the outcome and release the resource.
    pub async fn resolve_operation(
        &self,
        request: &Request,
        outcome: OperationOutcome,
    ) -> DeliveryReport {
        let report = self.registry.delivered(&request.request_id, outcome).await;
        self.generation.finish(&request.resource_id);
        report
    }

    // =========================================================================
    // Screen activity and feedback
    // =========================================================================

    /// The user is looking at `screen_id`; its badge is cleared.
    pub fn mark_screen_active(&self, screen_id: &ScreenId) {
        self.activity.set_active(screen_id, true);
        if self.activity.is_active(screen_id) {
            self.feedback.clear_badge(screen_id);
        }
    }

    pub fn mark_screen_inactive(&self, screen_id: &ScreenId) {
        self.activity.set_active(screen_id, false);
    }

    pub fn is_screen_active(&self, screen_id: &ScreenId) -> bool {
        self.activity.is_active(screen_id)
    }

    /// Forget a screen that has been closed for good.
    pub fn close_screen(&self, screen_id: &ScreenId) {
        self.activity.clear(screen_id);
        self.feedback.forget(screen_id);
    }

    /// Returning to the foreground clears badges on the focused screens.
    pub fn set_app_foreground(&self, foreground: bool) {
        self.activity.set_app_foreground(foreground);
        if foreground {
            for screen_id in self.activity.active_screens() {
                self.feedback.clear_badge(&screen_id);
            }
        }
    }

    pub fn publish_feedback(&self, event: &FeedbackEvent) -> FeedbackResolution {
        self.feedback.on_event(event)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drop expired pending results and release stale generation flags.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let expired_pending = match self.pending.purge_expired().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to purge expired pending results");
                0
            }
        };
        let max_age = chrono::Duration::from_std(self.config.generation_stale_after)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let released_generations = self.generation.clear_stale(max_age);

        MaintenanceReport {
            expired_pending,
            released_generations,
        }
    }

    /// Clear all state, e.g. on logout or session switch.
    ///
    /// In-memory state is always cleared; a storage failure while dropping
    /// pending results is returned after that.
    pub async fn reset(&self) -> Result<(), NotifyError> {
        let flags = self.generation.reset_all();
        let subscriptions = self.registry.clear();
        self.activity.reset();
        self.feedback.reset();

        let pending = self.pending.clear().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to clear pending results during reset");
            e
        })?;
        tracing::info!(flags, subscriptions, pending, "Notification hub reset");
        Ok(())
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    pub fn pending(&self) -> &Arc<PendingResultStore> {
        &self.pending
    }

    pub fn generation(&self) -> &Arc<GenerationStateTracker> {
        &self.generation
    }

    pub fn activity(&self) -> &Arc<PageActivityTracker> {
        &self.activity
    }

    pub fn feedback(&self) -> &Arc<FeedbackDispatcher> {
        &self.feedback
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::ports::{MockKeyValueStore, StorageError};
    use chrono::Utc;
    use lookbook_domain::FeedbackKind;
    use serde_json::json;

    fn hub() -> (NotificationHub, Arc<RecordingPresenter>) {
        let presenter = Arc::new(RecordingPresenter::default());
        (hub_with(Arc::new(SystemClock::new()), presenter.clone()), presenter)
    }

    fn request(request_id: &str, resource_id: &str) -> Request {
        Request::new(
            RequestId::new(request_id).unwrap(),
            ResourceId::new(resource_id).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn begin_operation_rejects_busy_resource() {
        let (hub, _) = hub();
        let first = request("op-1", "template-1");
        let second = request("op-2", "template-1");

        hub.begin_operation(&first).unwrap();
        let err = hub.begin_operation(&second).unwrap_err();
        assert!(err.is_duplicate());

        hub.finish_operation(&first.resource_id);
        hub.begin_operation(&second).unwrap();
    }

    #[tokio::test]
    async fn resolve_operation_delivers_and_releases() {
        let (hub, _) = hub();
        let req = request("op-1", "template-1");
        hub.begin_operation(&req).unwrap();

        let report = hub
            .resolve_operation(&req, OperationOutcome::failure("model timeout"))
            .await;

        assert_eq!(report, DeliveryReport::Unclaimed { duplicate: false, stored: true });
        assert!(!hub.is_operation_in_progress(&req.resource_id));
        let claimed = hub.claim_pending_result(&req.request_id).await.unwrap();
        assert_eq!(claimed, Some(OperationOutcome::failure("model timeout")));
    }

    #[tokio::test]
    async fn unmount_component_removes_its_subscriptions() {
        let (hub, _) = hub();
        let owner = ComponentId::new("generator-panel").unwrap();
        hub.register_for_result(RequestId::new("op-1").unwrap(), owner.clone(), |_| Ok(()));
        hub.register_for_result(RequestId::new("op-2").unwrap(), owner.clone(), |_| Ok(()));

        assert_eq!(hub.unmount_component(&owner), 2);
        assert_eq!(hub.registry().subscription_count(), 0);
    }

    #[test]
    fn returning_to_screen_clears_its_badge() {
        let (hub, presenter) = hub();
        let screen = ScreenId::new("lookbook").unwrap();
        let event = FeedbackEvent::success(
            ResourceId::new("template-1").unwrap(),
            screen.clone(),
            "Your look is ready",
        );

        hub.mark_screen_inactive(&screen);
        assert_eq!(hub.publish_feedback(&event), FeedbackResolution::Badge { count: 1 });

        hub.mark_screen_active(&screen);
        assert_eq!(hub.feedback().badge_count(&screen), 0);
        assert_eq!(presenter.badges(), vec![(screen.clone(), 1), (screen, 0)]);
    }

    #[test]
    fn backgrounded_app_badges_focused_screen() {
        let (hub, presenter) = hub();
        let screen = ScreenId::new("lookbook").unwrap();
        let event = FeedbackEvent::new(
            ResourceId::new("template-1").unwrap(),
            screen.clone(),
            FeedbackKind::Success,
            "Your look is ready",
        );

        hub.mark_screen_active(&screen);
        hub.set_app_foreground(false);
        assert_eq!(hub.publish_feedback(&event), FeedbackResolution::Badge { count: 1 });
        assert!(presenter.toasts().is_empty());

        hub.set_app_foreground(true);
        assert_eq!(hub.feedback().badge_count(&screen), 0);
        assert_eq!(hub.publish_feedback(&event), FeedbackResolution::Toast);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (hub, _) = hub();
        let resource = ResourceId::new("template-1").unwrap();
        let screen = ScreenId::new("lookbook").unwrap();

        hub.start_operation(&resource);
        hub.register_for_result(
            RequestId::new("op-1").unwrap(),
            ComponentId::new("panel").unwrap(),
            |_| Ok(()),
        );
        hub.deliver(&RequestId::new("op-2").unwrap(), OperationOutcome::success(json!({})))
            .await;
        hub.mark_screen_active(&screen);
        hub.feedback().mute(&screen);

        hub.reset().await.unwrap();

        assert!(!hub.is_operation_in_progress(&resource));
        assert_eq!(hub.registry().subscription_count(), 0);
        assert!(!hub
            .has_pending_result(&RequestId::new("op-2").unwrap())
            .await
            .unwrap());
        assert!(!hub.is_screen_active(&screen));
        assert!(!hub.feedback().is_muted(&screen));
    }

    #[test]
    fn close_screen_forgets_feedback_state() {
        let (hub, presenter) = hub();
        let screen = ScreenId::new("lookbook").unwrap();
        let event = FeedbackEvent::success(
            ResourceId::new("template-1").unwrap(),
            screen.clone(),
            "Your look is ready",
        );

        hub.mark_screen_inactive(&screen);
        hub.publish_feedback(&event);
        hub.feedback().mute(&ScreenId::new("chat").unwrap());
        hub.close_screen(&screen);
        hub.close_screen(&ScreenId::new("chat").unwrap());

        assert!(hub.activity().is_empty());
        assert_eq!(hub.feedback().tracked_screens(), 0);
        assert_eq!(presenter.badges(), vec![(screen, 1)]);
    }

    #[tokio::test]
    async fn reset_clears_memory_state_when_storage_fails() {
        let mut storage = MockKeyValueStore::new();
        storage
            .expect_keys()
            .returning(|_| Err(StorageError::io("keys", "disk unavailable")));
        let presenter = Arc::new(RecordingPresenter::default());
        let hub = NotificationHub::new(
            NotifyConfig::default(),
            HubPorts {
                clock: Arc::new(SystemClock::new()),
                storage: Arc::new(storage),
                toast: presenter.clone(),
                badge: presenter,
            },
        );
        let resource = ResourceId::new("template-1").unwrap();
        let screen = ScreenId::new("lookbook").unwrap();

        hub.start_operation(&resource);
        hub.mark_screen_active(&screen);
        hub.feedback().mute(&screen);

        assert!(matches!(hub.reset().await, Err(NotifyError::Storage(_))));
        assert!(!hub.is_operation_in_progress(&resource));
        assert!(!hub.is_screen_active(&screen));
        assert!(!hub.feedback().is_muted(&screen));
    }

    #[tokio::test]
    async fn from_config_restores_file_backed_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = NotifyConfig {
            storage_backend: crate::infrastructure::config::StorageBackend::File,
            storage_path: Some(dir.path().join("pending.json")),
            ..NotifyConfig::default()
        };
        let presenter = Arc::new(RecordingPresenter::default());
        let request_id = RequestId::new("op-1").unwrap();

        {
            let hub = NotificationHub::from_config(
                config.clone(),
                Arc::new(SystemClock::new()),
                presenter.clone(),
                presenter.clone(),
            )
            .await
            .unwrap();
            hub.deliver(&request_id, OperationOutcome::success(json!({"url": "a.png"})))
                .await;
        }

        let hub = NotificationHub::from_config(
            config,
            Arc::new(SystemClock::new()),
            presenter.clone(),
            presenter,
        )
        .await
        .unwrap();
        assert!(hub.has_pending_result(&request_id).await.unwrap());
        assert_eq!(
            hub.claim_pending_result(&request_id).await.unwrap(),
            Some(OperationOutcome::success(json!({"url": "a.png"})))
        );
    }
}
