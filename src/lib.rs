//! Background invitation monitoring and notification bridge for the Matchday
//! tournament apps.
//!
//! The bridge sits between the host mobile application and the platform: it
//! periodically polls the host for pending events (referee invitations,
//! generic notifications), negotiates the platform's notification permission
//! tiers, coalesces what a poll surfaced into presentable notifications, and
//! routes the user's responses back to application logic.
//!
//! Every platform and host seam is an injected trait object; the crate holds
//! no globals and persists nothing across process restarts (a fresh
//! [`MonitorBridge::start`] call is required after relaunch). The central
//! design property is that no partial failure (rejected scheduling, query
//! timeout, delivery error, malformed interaction) ever terminates the
//! monitoring loop.

pub mod backends;
pub mod components;

use std::sync::Arc;
use std::time::Duration;

use components::dispatcher::NotificationDispatcher;
use components::monitor::{Monitor, MonitorProfile};
use components::permission::PermissionNegotiator;
use components::response::ResponseRouter;
use components::scheduler::SchedulerAdapter;

pub use backends::{MemoryExecution, MemoryPresenter, MemorySink, MemorySource, StaticSettings};
pub use components::{
    BackgroundExecution, BridgeError, BridgeResult, CategoryRegistry, Decision, DeliveryRequest,
    MonitorState, MonitorSubject, NotificationCategory, NotificationPresenter,
    NotificationSettings, PendingItem, PendingKind, PendingSource, PermissionState,
    PermissionTier, PresentationReceipt, RequestId, ResponseOutcome, ResponseSink,
    RoutedInteraction,
};

/// The host application's control surface over the whole subsystem.
///
/// Owns one [`Monitor`] per domain (referee invitations, the generic
/// notification inbox) plus the components they share. Construct it through
/// [`MonitorBridge::builder`], then call [`activate`](Self::activate) once at
/// process start to install the category set and wake-up handlers.
pub struct MonitorBridge {
    negotiator: Arc<PermissionNegotiator>,
    registry: Arc<CategoryRegistry>,
    scheduler: Arc<SchedulerAdapter>,
    dispatcher: Arc<NotificationDispatcher>,
    router: ResponseRouter,
    invitations: Arc<Monitor>,
    notifications: Arc<Monitor>,
    categories: Vec<NotificationCategory>,
}

impl MonitorBridge {
    pub fn builder() -> MonitorBridgeBuilder {
        MonitorBridgeBuilder::new()
    }

    /// Install the category set and wake-up handlers. Call once at process
    /// start, before the first `start`.
    pub async fn activate(&self) {
        self.registry.register(self.categories.clone()).await;
        self.invitations.activate();
        self.notifications.activate();
    }

    /// Start background monitoring for a subject, routed by subject kind:
    /// referees feed the invitation monitor, users the inbox monitor.
    pub fn start(&self, subject: MonitorSubject) {
        self.monitor_for_subject(&subject).start(subject);
    }

    /// Stop all monitoring. Safe to call at any time.
    pub fn stop(&self) {
        self.invitations.stop();
        self.notifications.stop();
    }

    /// Negotiate notification permission for a tier (idempotent, never errors)
    pub async fn ensure_permission(&self, tier: PermissionTier) -> PermissionState {
        self.negotiator.ensure_permission(tier).await
    }

    /// Last negotiated permission state, without touching the platform
    pub fn permission_state(&self) -> PermissionState {
        self.negotiator.current()
    }

    /// Application-initiated (non-polled) delivery, e.g. a notification the
    /// host composed itself. Items are coalesced exactly like a poll result.
    ///
    /// The payload subject is the active monitor subject when one is set,
    /// otherwise the first item's target email.
    pub async fn deliver(&self, kind: PendingKind, items: Vec<PendingItem>) {
        let subject = self.monitor_for_kind(kind).subject().or_else(|| {
            items
                .iter()
                .find_map(|item| item.target_email.clone())
                .map(MonitorSubject::user)
        });

        let Some(subject) = subject else {
            tracing::warn!(
                kind = kind.name(),
                "application-initiated delivery without active subject or target email, skipping"
            );
            return;
        };

        self.dispatcher.dispatch_pending(kind, &subject, items).await;
    }

    /// The platform's raw interaction callback, reframed as one call
    pub async fn handle_interaction(
        &self,
        action_id: &str,
        user_info: &serde_json::Value,
    ) -> RoutedInteraction {
        self.router.handle_interaction(action_id, user_info).await
    }

    /// Presentation-policy hook consulted by the platform's will-present path
    pub fn always_present_in_foreground(&self) -> bool {
        self.dispatcher.always_present_in_foreground()
    }

    /// The application moved to the background; opportunistically re-schedule
    /// the active monitors' wake-ups.
    pub fn note_background_transition(&self) {
        self.invitations.note_background_transition();
        self.notifications.note_background_transition();
    }

    /// The monitor responsible for a pending-item kind
    pub fn monitor_for_kind(&self, kind: PendingKind) -> &Arc<Monitor> {
        match kind {
            PendingKind::Invitation => &self.invitations,
            PendingKind::Notification => &self.notifications,
        }
    }

    /// The scheduler adapter, e.g. for granting wake-ups from a test harness
    pub fn scheduler(&self) -> &Arc<SchedulerAdapter> {
        &self.scheduler
    }

    fn monitor_for_subject(&self, subject: &MonitorSubject) -> &Arc<Monitor> {
        match subject {
            MonitorSubject::Referee { .. } => &self.invitations,
            MonitorSubject::User { .. } => &self.notifications,
        }
    }
}

/// Fluent construction of a [`MonitorBridge`].
///
/// Every seam left unset falls back to the corresponding in-process backend
/// from [`backends::memory`], so a default build is immediately usable in
/// tests and demos.
pub struct MonitorBridgeBuilder {
    settings: Option<Arc<dyn NotificationSettings>>,
    presenter: Option<Arc<dyn NotificationPresenter>>,
    execution: Option<Arc<dyn BackgroundExecution>>,
    source: Option<Arc<dyn PendingSource>>,
    sink: Option<Arc<dyn ResponseSink>>,
    categories: Option<Vec<NotificationCategory>>,
    invitation_profile: MonitorProfile,
    notification_profile: MonitorProfile,
    execution_budget: Option<Duration>,
    ack_timeout: Option<Duration>,
    always_present_in_foreground: bool,
}

impl MonitorBridgeBuilder {
    pub fn new() -> Self {
        Self {
            settings: None,
            presenter: None,
            execution: None,
            source: None,
            sink: None,
            categories: None,
            invitation_profile: MonitorProfile::invitations(),
            notification_profile: MonitorProfile::notifications(),
            execution_budget: None,
            ack_timeout: None,
            always_present_in_foreground: true,
        }
    }

    pub fn with_settings(mut self, settings: Arc<dyn NotificationSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_execution(mut self, execution: Arc<dyn BackgroundExecution>) -> Self {
        self.execution = Some(execution);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn PendingSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResponseSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the default category set installed by `activate`
    pub fn with_categories(mut self, categories: Vec<NotificationCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_invitation_profile(mut self, profile: MonitorProfile) -> Self {
        self.invitation_profile = profile;
        self
    }

    pub fn with_notification_profile(mut self, profile: MonitorProfile) -> Self {
        self.notification_profile = profile;
        self
    }

    pub fn with_execution_budget(mut self, budget: Duration) -> Self {
        self.execution_budget = Some(budget);
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    pub fn with_foreground_presentation(mut self, always_present: bool) -> Self {
        self.always_present_in_foreground = always_present;
        self
    }

    pub fn build(self) -> MonitorBridge {
        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(StaticSettings::granting(true)));
        let presenter = self
            .presenter
            .unwrap_or_else(|| Arc::new(MemoryPresenter::new()));
        let execution = self
            .execution
            .unwrap_or_else(|| Arc::new(MemoryExecution::new()));
        let source = self.source.unwrap_or_else(|| Arc::new(MemorySource::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(MemorySink::accepting()));

        let negotiator = Arc::new(PermissionNegotiator::new(settings));
        let registry = Arc::new(CategoryRegistry::new(presenter.clone()));

        let mut scheduler = SchedulerAdapter::new(execution);
        if let Some(budget) = self.execution_budget {
            scheduler = scheduler.with_execution_budget(budget);
        }
        let scheduler = Arc::new(scheduler);

        let dispatcher = Arc::new(
            NotificationDispatcher::new(presenter, registry.clone(), negotiator.clone())
                .with_foreground_presentation(self.always_present_in_foreground),
        );

        let mut router = ResponseRouter::new(registry.clone(), sink, dispatcher.clone());
        if let Some(timeout) = self.ack_timeout {
            router = router.with_ack_timeout(timeout);
        }

        let invitations = Arc::new(Monitor::new(
            self.invitation_profile,
            scheduler.clone(),
            negotiator.clone(),
            dispatcher.clone(),
            source.clone(),
        ));
        let notifications = Arc::new(Monitor::new(
            self.notification_profile,
            scheduler.clone(),
            negotiator.clone(),
            dispatcher.clone(),
            source,
        ));

        MonitorBridge {
            negotiator,
            registry,
            scheduler,
            dispatcher,
            router,
            invitations,
            notifications,
            categories: self
                .categories
                .unwrap_or_else(CategoryRegistry::default_set),
        }
    }
}

impl Default for MonitorBridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
