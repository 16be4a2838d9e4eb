//! Lookbook Notify - demo runner.
//!
//! Walks through the cross-screen delivery flow against the real stores with
//! logging presenters standing in for the UI shell.

use std::sync::Arc;
use std::time::Duration;

use lookbook_domain::{
    ComponentId, FeedbackEvent, FeedbackKind, OperationOutcome, Request, RequestId, ResourceId,
    ScreenId,
};
use lookbook_notify::infrastructure::clock::SystemClock;
use lookbook_notify::infrastructure::config::NotifyConfig;
use lookbook_notify::infrastructure::maintenance::spawn_maintenance;
use lookbook_notify::infrastructure::ports::{
    BadgePresenter, ClockPort, PresentationError, ToastPresenter,
};
use lookbook_notify::NotificationHub;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Presenter that writes toasts and badges to the log.
struct LogPresenter;

impl ToastPresenter for LogPresenter {
    fn show_toast(
        &self,
        screen_id: &ScreenId,
        kind: FeedbackKind,
        message: &str,
    ) -> Result<(), PresentationError> {
        tracing::info!(screen_id = %screen_id, kind = %kind, "Toast: {}", message);
        Ok(())
    }
}

impl BadgePresenter for LogPresenter {
    fn set_badge(&self, screen_id: &ScreenId, count: u32) -> Result<(), PresentationError> {
        tracing::info!(screen_id = %screen_id, count, "Badge updated");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lookbook_notify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lookbook Notify demo");

    let config = NotifyConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let presenter = Arc::new(LogPresenter);
    let hub = Arc::new(
        NotificationHub::from_config(config.clone(), clock.clone(), presenter.clone(), presenter)
            .await?,
    );

    let cancel_token = CancellationToken::new();
    let maintenance = spawn_maintenance(hub.clone(), config.maintenance_interval, cancel_token.clone());

    let lookbook = ScreenId::new("lookbook")?;
    let generator = ScreenId::new("generator")?;
    let panel = ComponentId::new("generator-panel")?;
    let request = Request::new(RequestId::new("op-demo-1")?, ResourceId::new("template-1")?, clock.now());

    // The generator screen starts an operation and subscribes to its result.
    hub.mark_screen_active(&generator);
    hub.begin_operation(&request)?;
    hub.register_for_result(request.request_id.clone(), panel.clone(), |outcome| {
        tracing::info!(?outcome, "Generator panel received result");
        Ok(())
    });

    if let Err(e) = hub.begin_operation(&request) {
        tracing::info!(error = %e, "Second tap ignored");
    }

    // The user navigates away before the operation completes.
    let removed = hub.unmount_component(&panel);
    hub.mark_screen_inactive(&generator);
    tracing::info!(removed, "Generator panel unmounted");

    let transport_hub = hub.clone();
    let transport_request = request.clone();
    let transport = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let outcome = OperationOutcome::success(serde_json::json!({
            "image_url": "https://cdn.lookbook.invalid/looks/template-1.png"
        }));
        let report = transport_hub.resolve_operation(&transport_request, outcome).await;
        tracing::info!(?report, "Transport delivered result");
    });
    transport.await?;

    // Feedback while the user is elsewhere becomes a badge.
    hub.mark_screen_inactive(&lookbook);
    hub.publish_feedback(&FeedbackEvent::success(
        request.resource_id.clone(),
        lookbook.clone(),
        "Your look is ready",
    ));

    // A fresh panel on the lookbook screen picks the result up.
    hub.mark_screen_active(&lookbook);
    match hub.claim_pending_result(&request.request_id).await? {
        Some(outcome) => tracing::info!(?outcome, "Lookbook claimed pending result"),
        None => tracing::warn!("No pending result to claim"),
    }
    let second = hub.claim_pending_result(&request.request_id).await?;
    tracing::info!(claimed_again = second.is_some(), "Second claim");

    // While the user is looking, feedback is a toast.
    hub.publish_feedback(&FeedbackEvent::new(
        request.resource_id.clone(),
        lookbook,
        FeedbackKind::Progress,
        "Regenerating accessories",
    ));

    cancel_token.cancel();
    maintenance.await?;

    tracing::info!("Demo complete");
    Ok(())
}
