// Poll-and-deliver state machine, one instance per monitored domain
// The invitation and inbox monitors are the same machine configured by a
// MonitorProfile; all transitions for one instance are serialized behind its
// state lock and no failure in a cycle may stall the loop

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::dispatcher::NotificationDispatcher;
use super::permission::{PermissionNegotiator, PermissionTier};
use super::scheduler::{SchedulerAdapter, WakeupTask};
use super::{BridgeResult, MonitorSubject, PendingItem, PendingKind};

/// Default polling cadence; the shortest interval the platform's
/// background-refresh budget reliably honors.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default bound on the host application's pending query within one wake-up
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Seam onto the host application's query interface.
///
/// Invoked roughly every poll interval for as long as the monitor runs; an
/// empty list is a valid, common response.
pub trait PendingSource: Send + Sync {
    fn query_pending(
        &self,
        subject: MonitorSubject,
    ) -> Pin<Box<dyn Future<Output = BridgeResult<Vec<PendingItem>>> + Send + '_>>;
}

/// Static configuration of one monitored domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorProfile {
    /// Task identifier registered with the background execution facility
    pub task_id: String,
    pub kind: PendingKind,
    pub tier: PermissionTier,
    pub poll_interval: Duration,
    pub query_timeout: Duration,
}

impl MonitorProfile {
    /// Referee-invitation monitoring (time-sensitive tier)
    pub fn invitations() -> Self {
        Self {
            task_id: "com.matchday.referee-check".to_string(),
            kind: PendingKind::Invitation,
            tier: PermissionTier::TimeSensitive,
            poll_interval: DEFAULT_POLL_INTERVAL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Generic notification-inbox monitoring (standard tier)
    pub fn notifications() -> Self {
        Self {
            task_id: "com.matchday.inbox-check".to_string(),
            kind: PendingKind::Notification,
            tier: PermissionTier::Standard,
            poll_interval: DEFAULT_POLL_INTERVAL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

/// Lifecycle states of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// No subject, no scheduled wake-up
    Stopped,
    /// Permission negotiation and initial scheduling in flight
    Starting,
    /// Subject set, exactly one wake-up scheduled
    Running,
    /// Wake-up received, query in flight
    Polling,
}

impl MonitorState {
    pub fn can_transition_to(&self, target: MonitorState) -> bool {
        use MonitorState::*;

        matches!(
            (self, target),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Polling)
                | (Running, Stopped)
                | (Polling, Running)
                | (Polling, Stopped)
        )
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, MonitorState::Stopped)
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MonitorState::Stopped => "stopped",
            MonitorState::Starting => "starting",
            MonitorState::Running => "running",
            MonitorState::Polling => "polling",
        };
        f.write_str(name)
    }
}

struct MonitorInner {
    state: MonitorState,
    subject: Option<MonitorSubject>,
    /// Bumped on every start/stop; a poll in flight compares its snapshot
    /// against this before acting on query results
    generation: u64,
}

impl MonitorInner {
    fn transition(&mut self, task_id: &str, target: MonitorState) {
        if self.state.can_transition_to(target) {
            tracing::debug!(task_id = %task_id, from = %self.state, to = %target, "monitor transition");
            self.state = target;
        } else {
            tracing::error!(task_id = %task_id, from = %self.state, to = %target, "invalid monitor transition ignored");
        }
    }
}

/// The recurring poll-and-deliver state machine for one subject kind.
///
/// All collaborators are injected at construction; the monitor holds no
/// global state and survives any partial failure of a cycle.
pub struct Monitor {
    profile: MonitorProfile,
    scheduler: Arc<SchedulerAdapter>,
    negotiator: Arc<PermissionNegotiator>,
    dispatcher: Arc<NotificationDispatcher>,
    source: Arc<dyn PendingSource>,
    inner: Mutex<MonitorInner>,
}

impl Monitor {
    pub fn new(
        profile: MonitorProfile,
        scheduler: Arc<SchedulerAdapter>,
        negotiator: Arc<PermissionNegotiator>,
        dispatcher: Arc<NotificationDispatcher>,
        source: Arc<dyn PendingSource>,
    ) -> Self {
        Self {
            profile,
            scheduler,
            negotiator,
            dispatcher,
            source,
            inner: Mutex::new(MonitorInner {
                state: MonitorState::Stopped,
                subject: None,
                generation: 0,
            }),
        }
    }

    pub fn profile(&self) -> &MonitorProfile {
        &self.profile
    }

    pub fn state(&self) -> MonitorState {
        self.inner.lock().state
    }

    pub fn subject(&self) -> Option<MonitorSubject> {
        self.inner.lock().subject.clone()
    }

    /// Register this monitor as the wake-up handler for its task id.
    /// Call once after construction, before the first [`start`](Self::start).
    pub fn activate(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.scheduler.on_wakeup(
            self.profile.task_id.clone(),
            Arc::new(move |task: WakeupTask| {
                let weak = weak.clone();
                Box::pin(async move {
                    match weak.upgrade() {
                        Some(monitor) => monitor.handle_wakeup(task).await,
                        None => task.complete(false),
                    }
                })
            }),
        );
    }

    /// Begin monitoring for a subject.
    ///
    /// Permission negotiation is fired in the background and its outcome is
    /// not awaited: a monitor with denied permission still polls, it just
    /// cannot deliver. The monitor is `Running` as soon as the initial
    /// scheduling call returns. Starting while already running replaces the
    /// subject.
    pub fn start(&self, subject: MonitorSubject) {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_active() {
                tracing::info!(task_id = %self.profile.task_id, subject = %subject, "restarting monitor with new subject");
                inner.transition(&self.profile.task_id, MonitorState::Stopped);
            }
            inner.transition(&self.profile.task_id, MonitorState::Starting);
            inner.subject = Some(subject.clone());
            inner.generation += 1;
        }

        let negotiator = self.negotiator.clone();
        let tier = self.profile.tier;
        tokio::spawn(async move {
            negotiator.ensure_permission(tier).await;
        });

        self.scheduler
            .schedule_wakeup(&self.profile.task_id, self.profile.poll_interval);

        self.inner
            .lock()
            .transition(&self.profile.task_id, MonitorState::Running);
        tracing::info!(task_id = %self.profile.task_id, subject = %subject, "background monitoring started");
    }

    /// Stop monitoring. Safe to call in any state, including mid-poll; a poll
    /// already in flight completes normally but its result is discarded.
    pub fn stop(&self) {
        {
            let mut inner = self.inner.lock();
            if !inner.state.is_active() {
                return;
            }
            inner.transition(&self.profile.task_id, MonitorState::Stopped);
            inner.subject = None;
            inner.generation += 1;
        }

        self.scheduler.cancel_wakeup(&self.profile.task_id);
        tracing::info!(task_id = %self.profile.task_id, "background monitoring stopped");
    }

    /// The original trigger besides the scheduled wake-up: the application
    /// moving to the background. Opportunistically re-schedules; a no-op
    /// while stopped.
    pub fn note_background_transition(&self) {
        if self.inner.lock().state.is_active() {
            self.scheduler
                .schedule_wakeup(&self.profile.task_id, self.profile.poll_interval);
        }
    }

    /// Drive one polling cycle for a granted wake-up.
    ///
    /// Completion is always reported: `false` when the subject is already
    /// gone, `true` otherwise, regardless of delivery outcome, so the
    /// platform never penalizes future scheduling for a delivery failure.
    pub async fn handle_wakeup(&self, task: WakeupTask) {
        let (subject, generation) = {
            let mut inner = self.inner.lock();
            let Some(subject) = inner.subject.clone() else {
                drop(inner);
                tracing::debug!(task_id = %self.profile.task_id, "wake-up without active subject");
                task.complete(false);
                return;
            };
            inner.transition(&self.profile.task_id, MonitorState::Polling);
            (subject, inner.generation)
        };

        // Next cycle first, so a crash later in this one cannot silence the
        // monitor until the next app-background transition.
        self.scheduler
            .schedule_wakeup(&self.profile.task_id, self.profile.poll_interval);

        let query = self.source.query_pending(subject.clone());
        let items = match tokio::time::timeout(self.profile.query_timeout, query).await {
            Ok(Ok(items)) => items,
            Ok(Err(error)) => {
                tracing::warn!(task_id = %self.profile.task_id, error = %error, "pending query failed, treating cycle as empty");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(task_id = %self.profile.task_id, "pending query timed out, treating cycle as empty");
                Vec::new()
            }
        };

        if self.is_stale(generation) {
            tracing::debug!(task_id = %self.profile.task_id, "monitor stopped mid-poll, discarding query result");
            // The reschedule above may have raced the stop's cancellation;
            // a stopped monitor must not keep a wake-up outstanding.
            if self.subject().is_none() {
                self.scheduler.cancel_wakeup(&self.profile.task_id);
            }
            task.complete(true);
            return;
        }

        if items.is_empty() {
            tracing::debug!(task_id = %self.profile.task_id, "no pending items this cycle");
        } else {
            tracing::info!(task_id = %self.profile.task_id, count = items.len(), "pending items discovered");
            self.dispatcher
                .dispatch_pending(self.profile.kind, &subject, items)
                .await;
        }

        {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                inner.transition(&self.profile.task_id, MonitorState::Running);
            }
        }

        task.complete(true);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.inner.lock().generation != generation
    }
}
