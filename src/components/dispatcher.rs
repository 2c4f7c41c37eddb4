// Turns delivery decisions into presentable notification requests
// Items from one polling cycle are coalesced into a single request so a busy
// weekend cannot flood the notification center

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;

use super::category::CategoryRegistry;
use super::permission::PermissionNegotiator;
use super::{
    BridgeError, BridgeResult, DeliveryRequest, MonitorSubject, NotificationCategory, PendingItem,
    PendingKind, PresentationReceipt,
};

/// Seam onto the platform notification presentation system.
///
/// A [`DeliveryRequest`] maps 1:1 onto a presentable notification; the receipt
/// carries the platform's own identifier for it.
pub trait NotificationPresenter: Send + Sync {
    fn present(
        &self,
        request: DeliveryRequest,
    ) -> Pin<Box<dyn Future<Output = BridgeResult<PresentationReceipt>> + Send + '_>>;

    /// Install the active category set, replacing any earlier registration
    fn replace_categories(
        &self,
        categories: Vec<NotificationCategory>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Hands fully resolved requests to the presenter, fire-and-forget from the
/// monitors' perspective. Delivery failures are logged and never retried; a
/// missed notification's content is already stale by the time a retry could
/// land.
pub struct NotificationDispatcher {
    presenter: Arc<dyn NotificationPresenter>,
    registry: Arc<CategoryRegistry>,
    negotiator: Arc<PermissionNegotiator>,
    always_present_in_foreground: bool,
}

impl NotificationDispatcher {
    pub fn new(
        presenter: Arc<dyn NotificationPresenter>,
        registry: Arc<CategoryRegistry>,
        negotiator: Arc<PermissionNegotiator>,
    ) -> Self {
        Self {
            presenter,
            registry,
            negotiator,
            always_present_in_foreground: true,
        }
    }

    pub fn with_foreground_presentation(mut self, always_present: bool) -> Self {
        self.always_present_in_foreground = always_present;
        self
    }

    /// Presentation-policy hook: whether a notification arriving while the
    /// application is foregrounded is still shown as a banner
    pub fn always_present_in_foreground(&self) -> bool {
        self.always_present_in_foreground
    }

    /// Coalesce all same-kind items of one polling cycle into a single
    /// request whose badge carries the item count. `None` when there is
    /// nothing to deliver.
    pub fn coalesce(
        kind: PendingKind,
        subject: &MonitorSubject,
        items: &[PendingItem],
    ) -> Option<DeliveryRequest> {
        if items.is_empty() {
            return None;
        }

        let count = items.len();
        let (title, body) = match kind {
            PendingKind::Invitation => {
                if count == 1 {
                    (
                        "Neue Schiedsrichter-Einladung".to_string(),
                        format!(
                            "Du wurdest zum/r {} als Schiedsrichter eingeladen",
                            items[0].title
                        ),
                    )
                } else {
                    (
                        "Neue Schiedsrichter-Einladungen".to_string(),
                        format!("Du hast {count} neue Turniereinladungen"),
                    )
                }
            }
            PendingKind::Notification => {
                if count == 1 {
                    (
                        items[0].title.clone(),
                        items[0].body.clone().unwrap_or_default(),
                    )
                } else {
                    (
                        "Neue Benachrichtigungen".to_string(),
                        format!("Du hast {count} neue Benachrichtigungen"),
                    )
                }
            }
        };

        let request = DeliveryRequest::new(title, body, kind.category_id())
            .with_badge(count as u32)
            .with_time_sensitive(items.iter().any(|item| item.time_sensitive))
            .with_payload(json!({
                "type": kind.category_id(),
                "subject": subject,
                "items": items,
            }));

        Some(request)
    }

    /// Deliver everything one polling cycle surfaced, as one coalesced request
    pub async fn dispatch_pending(
        &self,
        kind: PendingKind,
        subject: &MonitorSubject,
        items: Vec<PendingItem>,
    ) {
        let Some(request) = Self::coalesce(kind, subject, &items) else {
            return;
        };
        self.deliver(request).await;
    }

    /// Present a single resolved request.
    ///
    /// Skips silently (with a logged notice) while permission is not granted,
    /// and refuses requests naming a category the registry does not hold.
    pub async fn deliver(&self, request: DeliveryRequest) {
        let permission = self.negotiator.current();
        if !permission.is_authorized() {
            tracing::info!(
                category = %request.category,
                state = ?permission,
                "notification suppressed, permission not granted"
            );
            return;
        }

        if !self.registry.contains(&request.category) {
            let error = BridgeError::UnknownCategory(request.category.clone());
            tracing::error!(error = %error, "refusing delivery request");
            return;
        }

        let request_id = request.id;
        let category = request.category.clone();
        match self.presenter.present(request).await {
            Ok(receipt) => {
                tracing::debug!(
                    request_id = %request_id,
                    native_id = %receipt.native_id,
                    "notification delivered"
                );
            }
            Err(error) => {
                tracing::warn!(
                    request_id = %request_id,
                    category = %category,
                    error = %error,
                    "notification delivery failed, not retrying"
                );
            }
        }
    }
}
