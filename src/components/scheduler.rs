// Adapter over the platform's deferred-execution facility
// Guarantees at most one outstanding wake-up per task id (cancel before
// submit) and that every granted wake-up reports completion before the
// platform's execution budget runs out

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::BridgeResult;

/// Execution budget a granted wake-up gets before the platform may terminate
/// the process; the adapter force-completes with `success = false` at this
/// deadline if the handler has not reported by then.
pub const DEFAULT_EXECUTION_BUDGET: Duration = Duration::from_secs(25);

/// Seam onto the platform background execution facility.
///
/// `submit` may be rejected (quota exhausted, background refresh disabled);
/// rejection is recoverable and must never be treated as fatal.
pub trait BackgroundExecution: Send + Sync {
    fn submit(&self, task_id: &str, not_before: Duration) -> BridgeResult<()>;

    /// Best-effort; no error when nothing is pending
    fn cancel(&self, task_id: &str);
}

/// Handler invoked when the platform grants a wake-up for a task id
pub type WakeupHandler =
    Arc<dyn Fn(WakeupTask) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Take-once completion slot shared between the wake-up handler and the
/// expiration timer; whichever side reports first wins.
struct CompletionSlot {
    sender: Mutex<Option<oneshot::Sender<bool>>>,
}

impl CompletionSlot {
    fn new(sender: oneshot::Sender<bool>) -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        })
    }

    /// Returns whether this call was the one that completed the task
    fn finish(&self, success: bool) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                let _ = sender.send(success);
                true
            }
            None => false,
        }
    }
}

/// One granted background execution opportunity.
///
/// The handler must call [`complete`](WakeupTask::complete) before the
/// execution budget expires; otherwise the expiration path reports
/// `success = false` on its behalf so the execution slot is not leaked.
pub struct WakeupTask {
    task_id: String,
    completion: Arc<CompletionSlot>,
}

impl WakeupTask {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Report completion to the platform. First report wins; a late call
    /// after expiration is a no-op.
    pub fn complete(self, success: bool) {
        if !self.completion.finish(success) {
            tracing::debug!(task_id = %self.task_id, "wake-up already completed by expiration");
        }
    }
}

/// Wraps the platform facility with the scheduling discipline the monitors
/// rely on: one outstanding wake-up per task id, silent (logged) rejection,
/// and a hard completion deadline per granted wake-up.
pub struct SchedulerAdapter {
    facility: Arc<dyn BackgroundExecution>,
    handlers: DashMap<String, WakeupHandler>,
    execution_budget: Duration,
}

impl SchedulerAdapter {
    pub fn new(facility: Arc<dyn BackgroundExecution>) -> Self {
        Self {
            facility,
            handlers: DashMap::new(),
            execution_budget: DEFAULT_EXECUTION_BUDGET,
        }
    }

    pub fn with_execution_budget(mut self, budget: Duration) -> Self {
        self.execution_budget = budget;
        self
    }

    /// Request exactly one future wake-up no earlier than `not_before` from
    /// now. A platform rejection is logged and swallowed; the next
    /// app-background transition is the recovery path.
    pub fn schedule_wakeup(&self, task_id: &str, not_before: Duration) {
        self.facility.cancel(task_id);
        match self.facility.submit(task_id, not_before) {
            Ok(()) => {
                tracing::debug!(task_id = %task_id, not_before_secs = not_before.as_secs(), "background wake-up scheduled");
            }
            Err(error) => {
                tracing::warn!(task_id = %task_id, error = %error, "background wake-up rejected, relying on the next app-background transition");
            }
        }
    }

    pub fn cancel_wakeup(&self, task_id: &str) {
        self.facility.cancel(task_id);
    }

    /// Register the single handler for a task id; a later registration
    /// replaces an earlier one.
    pub fn on_wakeup(&self, task_id: impl Into<String>, handler: WakeupHandler) {
        self.handlers.insert(task_id.into(), handler);
    }

    /// Entry point for the platform (or a test harness) granting a wake-up.
    ///
    /// Runs the registered handler and resolves to the reported completion,
    /// or `success = false` once the execution budget expires, whichever
    /// comes first. `None` when no handler is registered for the task id.
    pub async fn grant_wakeup(&self, task_id: &str) -> Option<bool> {
        let handler = self.handlers.get(task_id).map(|entry| entry.value().clone())?;

        let (sender, receiver) = oneshot::channel();
        let completion = CompletionSlot::new(sender);
        let task = WakeupTask {
            task_id: task_id.to_string(),
            completion: completion.clone(),
        };

        let budget = self.execution_budget;
        let expired_task_id = task_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            if completion.finish(false) {
                tracing::warn!(task_id = %expired_task_id, "wake-up expired before completion, reporting failure");
            }
        });

        // The handler runs on its own task so a hung query cannot block the
        // completion report past the deadline.
        tokio::spawn(handler(task));

        receiver.await.ok()
    }
}
