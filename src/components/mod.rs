// Core data model for the background monitoring bridge
// Shapes mirror the host platform's notification wire format (title/body/badge/
// category/userInfo) so the presenter seam maps 1:1 onto a native request

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod category;
pub mod dispatcher;
pub mod monitor;
pub mod permission;
pub mod response;
pub mod scheduler;

pub use category::{
    ActionOptions, CategoryAction, CategoryOptions, CategoryRegistry, NotificationCategory,
    CUSTOM_NOTIFICATION_CATEGORY, REFEREE_INVITATION_CATEGORY,
};
pub use dispatcher::{NotificationDispatcher, NotificationPresenter};
pub use monitor::{Monitor, MonitorProfile, MonitorState, PendingSource};
pub use permission::{NotificationSettings, PermissionNegotiator, PermissionState, PermissionTier};
pub use response::{Decision, ResponseOutcome, ResponseRouter, ResponseSink, RoutedInteraction};
pub use scheduler::{BackgroundExecution, SchedulerAdapter, WakeupHandler, WakeupTask};

/// Globally unique identifier for one delivery request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The entity a monitor watches on behalf of the host application.
///
/// Immutable while the monitor runs; absent once it is stopped. The subject is
/// echoed inside every delivery payload so user responses can be attributed to
/// the identity that was active at delivery time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorSubject {
    /// A referee identity whose tournament invitations are being watched
    Referee { id: String },
    /// A signed-in user whose generic notification inbox is being watched
    User { email: String },
}

impl MonitorSubject {
    pub fn referee(id: impl Into<String>) -> Self {
        Self::Referee { id: id.into() }
    }

    pub fn user(email: impl Into<String>) -> Self {
        Self::User { email: email.into() }
    }

    /// The bare identity string, without the subject kind
    pub fn key(&self) -> &str {
        match self {
            Self::Referee { id } => id,
            Self::User { email } => email,
        }
    }
}

impl std::fmt::Display for MonitorSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Referee { id } => write!(f, "referee:{id}"),
            Self::User { email } => write!(f, "user:{email}"),
        }
    }
}

/// Kind of event a poll can surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// A referee invitation awaiting a decision
    Invitation,
    /// A generic application notification
    Notification,
}

impl PendingKind {
    /// Category every delivery of this kind is filed under
    pub fn category_id(&self) -> &'static str {
        match self {
            Self::Invitation => REFEREE_INVITATION_CATEGORY,
            Self::Notification => CUSTOM_NOTIFICATION_CATEGORY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::Notification => "notification",
        }
    }
}

/// One undelivered event discovered by a poll.
///
/// Produced by the host application's query result and consumed once by the
/// dispatcher. The core never persists items; duplicate avoidance is the host
/// application's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    pub kind: PendingKind,
    /// Stable identity (the tournament id for invitations)
    pub id: String,
    /// Human-readable name or headline
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub time_sensitive: bool,
    /// Target mailbox for generic notifications
    #[serde(default)]
    pub target_email: Option<String>,
}

impl PendingItem {
    pub fn invitation(tournament_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: PendingKind::Invitation,
            id: tournament_id.into(),
            title: name.into(),
            body: None,
            time_sensitive: false,
            target_email: None,
        }
    }

    pub fn notification(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        target_email: impl Into<String>,
    ) -> Self {
        Self {
            kind: PendingKind::Notification,
            id: id.into(),
            title: title.into(),
            body: Some(body.into()),
            time_sensitive: false,
            target_email: Some(target_email.into()),
        }
    }

    pub fn with_time_sensitive(mut self, time_sensitive: bool) -> Self {
        self.time_sensitive = time_sensitive;
        self
    }
}

/// A fully resolved, ready-to-present notification.
///
/// Created by a monitor (through the dispatcher) and consumed exactly once by
/// the platform presenter. `payload` is opaque to the presentation system and
/// comes back verbatim as the `user_info` of a later interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: RequestId,
    pub title: String,
    pub body: String,
    /// Must name a category currently held by the [`CategoryRegistry`]
    pub category: String,
    pub badge: u32,
    pub time_sensitive: bool,
    pub sound: bool,
    /// Optional presentation delay (confirmations are shown slightly late so
    /// they do not race the banner being acted on)
    #[serde(default)]
    pub present_after: Option<Duration>,
    pub payload: serde_json::Value,
}

impl DeliveryRequest {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            title: title.into(),
            body: body.into(),
            category: category.into(),
            badge: 0,
            time_sensitive: false,
            sound: true,
            present_after: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = badge;
        self
    }

    pub fn with_time_sensitive(mut self, time_sensitive: bool) -> Self {
        self.time_sensitive = time_sensitive;
        self
    }

    pub fn with_sound(mut self, sound: bool) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_present_after(mut self, delay: Duration) -> Self {
        self.present_after = Some(delay);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Receipt returned by the presenter once the platform accepted a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationReceipt {
    /// Identifier the platform assigned to the presented notification
    pub native_id: String,
    pub delivered_at: chrono::DateTime<chrono::Utc>,
}

impl PresentationReceipt {
    pub fn new(native_id: impl Into<String>) -> Self {
        Self {
            native_id: native_id.into(),
            delivered_at: chrono::Utc::now(),
        }
    }
}

/// Failures crossing a platform or host seam.
///
/// None of these are fatal to the monitoring loop: callers log them and carry
/// on with the next cycle. Expected steady states (denied permission, an empty
/// query result) are plain values, not errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("presentation failed for category {category}: {message}")]
    Presentation { category: String, message: String },

    #[error("background submission rejected for {task_id}: {message}")]
    SchedulingRejected { task_id: String, message: String },

    #[error("pending query failed: {0}")]
    Query(String),

    #[error("delivery request references unregistered category {0}")]
    UnknownCategory(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
