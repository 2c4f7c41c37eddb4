// In-process backends implementing every platform and host seam
// Reference implementations for embedders and the harness behind the tests:
// each one records what crossed the seam so behavior can be asserted

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::components::{
    BackgroundExecution, BridgeError, BridgeResult, DeliveryRequest, MonitorSubject,
    NotificationCategory, NotificationPresenter, NotificationSettings, PendingItem,
    PendingSource, PermissionState, PresentationReceipt, ResponseOutcome, ResponseSink,
};

/// Presenter that records every request instead of showing a banner
#[derive(Default)]
pub struct MemoryPresenter {
    delivered: Mutex<Vec<DeliveryRequest>>,
    categories: Mutex<Vec<NotificationCategory>>,
    failing: AtomicBool,
}

impl MemoryPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `present` call fail, simulating a platform error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<DeliveryRequest> {
        self.delivered.lock().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }

    pub fn last_delivered(&self) -> Option<DeliveryRequest> {
        self.delivered.lock().last().cloned()
    }

    /// Category set from the most recent registration
    pub fn registered_categories(&self) -> Vec<NotificationCategory> {
        self.categories.lock().clone()
    }
}

impl NotificationPresenter for MemoryPresenter {
    fn present(
        &self,
        request: DeliveryRequest,
    ) -> Pin<Box<dyn Future<Output = BridgeResult<PresentationReceipt>> + Send + '_>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BridgeError::Presentation {
                    category: request.category.clone(),
                    message: "presenter unavailable".to_string(),
                });
            }
            let receipt = PresentationReceipt::new(request.id.to_string());
            self.delivered.lock().push(request);
            Ok(receipt)
        })
    }

    fn replace_categories(
        &self,
        categories: Vec<NotificationCategory>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            *self.categories.lock() = categories;
        })
    }
}

/// Background execution facility keeping submissions in a map, so at most one
/// outstanding request per task id is observable from the outside
#[derive(Default)]
pub struct MemoryExecution {
    pending: Mutex<HashMap<String, Duration>>,
    /// Chronological seam log (`submit:<id>` / `cancel:<id>`) for assertions
    events: Mutex<Vec<String>>,
    rejecting: AtomicBool,
    submissions: AtomicUsize,
}

impl MemoryExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `submit` call fail, simulating an exhausted
    /// background-refresh budget
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn pending_for(&self, task_id: &str) -> Option<Duration> {
        self.pending.lock().get(task_id).copied()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl BackgroundExecution for MemoryExecution {
    fn submit(&self, task_id: &str, not_before: Duration) -> BridgeResult<()> {
        self.events.lock().push(format!("submit:{task_id}"));
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(BridgeError::SchedulingRejected {
                task_id: task_id.to_string(),
                message: "background refresh budget exhausted".to_string(),
            });
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().insert(task_id.to_string(), not_before);
        Ok(())
    }

    fn cancel(&self, task_id: &str) {
        self.events.lock().push(format!("cancel:{task_id}"));
        self.pending.lock().remove(task_id);
    }
}

/// Settings store with a scripted platform answer
pub struct StaticSettings {
    authorization: RwLock<PermissionState>,
    grant_on_request: bool,
    time_sensitive_supported: bool,
    requests: AtomicUsize,
}

impl StaticSettings {
    /// A platform that will grant authorization when prompted
    pub fn granting(time_sensitive_supported: bool) -> Self {
        Self {
            authorization: RwLock::new(PermissionState::Undetermined),
            grant_on_request: true,
            time_sensitive_supported,
            requests: AtomicUsize::new(0),
        }
    }

    /// A platform whose user refuses the prompt
    pub fn denying() -> Self {
        Self {
            authorization: RwLock::new(PermissionState::Undetermined),
            grant_on_request: false,
            time_sensitive_supported: true,
            requests: AtomicUsize::new(0),
        }
    }

    /// A platform with authorization already recorded
    pub fn authorized(state: PermissionState) -> Self {
        Self {
            authorization: RwLock::new(state),
            grant_on_request: false,
            time_sensitive_supported: true,
            requests: AtomicUsize::new(0),
        }
    }

    /// How many times the user was prompted
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl NotificationSettings for StaticSettings {
    fn read_authorization(&self) -> Pin<Box<dyn Future<Output = PermissionState> + Send + '_>> {
        Box::pin(async move { *self.authorization.read() })
    }

    fn request_authorization(
        &self,
        time_sensitive: bool,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let granted = self.grant_on_request;
            let state = if !granted {
                PermissionState::Denied
            } else if time_sensitive && self.time_sensitive_supported {
                PermissionState::AuthorizedTimeSensitive
            } else {
                PermissionState::AuthorizedStandard
            };
            *self.authorization.write() = state;
            granted
        })
    }

    fn supports_time_sensitive(&self) -> bool {
        self.time_sensitive_supported
    }
}

/// Host query source handing out a scripted batch of pending items.
///
/// Items are drained on query, matching the host contract that an item is
/// surfaced once and duplicate avoidance happens upstream.
#[derive(Default)]
pub struct MemorySource {
    items: Mutex<Vec<PendingItem>>,
    queries: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, items: Vec<PendingItem>) {
        *self.items.lock() = items;
    }

    /// Delay every query by `delay`, e.g. past the monitor's query timeout
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl PendingSource for MemorySource {
    fn query_pending(
        &self,
        _subject: MonitorSubject,
    ) -> Pin<Box<dyn Future<Output = BridgeResult<Vec<PendingItem>>> + Send + '_>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(BridgeError::Query("backend unreachable".to_string()));
            }
            Ok(std::mem::take(&mut *self.items.lock()))
        })
    }
}

/// Host acknowledgement sink with a scripted answer
pub struct MemorySink {
    accept: bool,
    delay: Mutex<Option<Duration>>,
    acknowledged: Mutex<Vec<ResponseOutcome>>,
}

impl MemorySink {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            delay: Mutex::new(None),
            acknowledged: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            delay: Mutex::new(None),
            acknowledged: Mutex::new(Vec::new()),
        }
    }

    /// Delay every acknowledgement, e.g. past the router's timeout
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn acknowledged(&self) -> Vec<ResponseOutcome> {
        self.acknowledged.lock().clone()
    }
}

impl ResponseSink for MemorySink {
    fn acknowledge(
        &self,
        outcome: ResponseOutcome,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.acknowledged.lock().push(outcome);
            self.accept
        })
    }
}
