// Routes a user's interaction with a delivered notification back to the host
// application. The user is never told an action succeeded unless the host
// acknowledged that it was recorded

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::category::{CategoryRegistry, CUSTOM_NOTIFICATION_CATEGORY};
use super::dispatcher::NotificationDispatcher;
use super::{DeliveryRequest, MonitorSubject};

/// Default bound on the host acknowledgement call
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Confirmations trail the acted-on banner slightly so they do not race it
pub const CONFIRMATION_DELAY: Duration = Duration::from_secs(1);

/// The decision a notification action expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Declined,
    /// The user defers; the invitation stays open
    Pending,
}

impl Decision {
    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            "accept" => Some(Self::Accepted),
            "decline" => Some(Self::Declined),
            "later" => Some(Self::Pending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Pending => "pending",
        }
    }

    /// Title and body of the confirmation shown once the host records the
    /// decision
    pub fn confirmation_copy(&self) -> (&'static str, &'static str) {
        match self {
            Self::Accepted => ("Zusage gesendet", "Sie haben die Einladung angenommen"),
            Self::Declined => ("Absage gesendet", "Sie haben die Einladung abgelehnt"),
            Self::Pending => ("Später entscheiden", "Sie können später antworten"),
        }
    }
}

/// Structured result of a user's interaction with a delivered notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub decision: Decision,
    /// Identity of the item the delivery carried (the tournament id)
    pub item_id: String,
    /// Subject that was active when the notification was delivered
    pub subject: MonitorSubject,
}

/// Seam onto the host application's acknowledgement interface
pub trait ResponseSink: Send + Sync {
    /// Returns whether the host recorded the outcome
    fn acknowledge(
        &self,
        outcome: ResponseOutcome,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// What became of a raw platform interaction
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedInteraction {
    Outcome {
        outcome: ResponseOutcome,
        /// Whether the host positively acknowledged it (and a confirmation
        /// was therefore issued)
        acknowledged: bool,
    },
    /// Unknown action id or malformed payload; never an error
    Ignored,
}

/// Fields the router needs out of a delivery payload echoed back as user_info
struct InteractionPayload {
    category: String,
    item_id: String,
    subject: MonitorSubject,
}

impl InteractionPayload {
    fn parse(user_info: &serde_json::Value) -> Option<Self> {
        let object = user_info.as_object()?;
        let category = object.get("type")?.as_str()?.to_string();
        let subject =
            serde_json::from_value(object.get("subject")?.clone()).ok()?;
        let item_id = object
            .get("items")?
            .as_array()?
            .first()?
            .get("id")?
            .as_str()?
            .to_string();
        Some(Self {
            category,
            item_id,
            subject,
        })
    }
}

/// Maps raw platform action callbacks to [`ResponseOutcome`]s and forwards
/// them to the host application.
pub struct ResponseRouter {
    registry: Arc<CategoryRegistry>,
    sink: Arc<dyn ResponseSink>,
    dispatcher: Arc<NotificationDispatcher>,
    ack_timeout: Duration,
}

impl ResponseRouter {
    pub fn new(
        registry: Arc<CategoryRegistry>,
        sink: Arc<dyn ResponseSink>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            registry,
            sink,
            dispatcher,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Handle the platform's raw `(action_id, user_info)` callback.
    ///
    /// Unknown action ids and malformed payloads yield
    /// [`RoutedInteraction::Ignored`] so the platform callback can still be
    /// completed normally. For decision actions the outcome is forwarded to
    /// the host with a bounded wait; only a positive acknowledgement produces
    /// a confirmation notification.
    pub async fn handle_interaction(
        &self,
        action_id: &str,
        user_info: &serde_json::Value,
    ) -> RoutedInteraction {
        let Some((category, _action)) = self.registry.resolve_action(action_id) else {
            tracing::debug!(action_id = %action_id, "ignoring undeclared notification action");
            return RoutedInteraction::Ignored;
        };

        let Some(payload) = InteractionPayload::parse(user_info) else {
            tracing::debug!(action_id = %action_id, "ignoring interaction with malformed payload");
            return RoutedInteraction::Ignored;
        };

        if payload.category != category.identifier {
            tracing::debug!(
                action_id = %action_id,
                payload_category = %payload.category,
                "ignoring interaction whose payload does not match the action's category"
            );
            return RoutedInteraction::Ignored;
        }

        let Some(decision) = Decision::from_action_id(action_id) else {
            tracing::debug!(action_id = %action_id, "action carries no decision, ignoring");
            return RoutedInteraction::Ignored;
        };

        let outcome = ResponseOutcome {
            decision,
            item_id: payload.item_id,
            subject: payload.subject,
        };

        let acknowledged = match tokio::time::timeout(
            self.ack_timeout,
            self.sink.acknowledge(outcome.clone()),
        )
        .await
        {
            Ok(recorded) => recorded,
            Err(_) => {
                tracing::warn!(
                    item_id = %outcome.item_id,
                    "host acknowledgement timed out, skipping confirmation"
                );
                false
            }
        };

        if acknowledged {
            self.confirm(&outcome).await;
        } else {
            tracing::info!(
                item_id = %outcome.item_id,
                decision = %outcome.decision.as_str(),
                "host did not record the decision, no confirmation shown"
            );
        }

        RoutedInteraction::Outcome {
            outcome,
            acknowledged,
        }
    }

    /// Show a locally generated confirmation summarizing the recorded decision
    async fn confirm(&self, outcome: &ResponseOutcome) {
        let (title, body) = outcome.decision.confirmation_copy();
        let request = DeliveryRequest::new(title, body, CUSTOM_NOTIFICATION_CATEGORY)
            .with_present_after(CONFIRMATION_DELAY)
            .with_payload(json!({
                "type": "confirmation",
                "decision": outcome.decision.as_str(),
                "item_id": outcome.item_id,
            }));
        self.dispatcher.deliver(request).await;
    }
}
