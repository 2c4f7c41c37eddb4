//! Tests for components/monitor.rs

use std::sync::Arc;
use std::time::Duration;

use matchday_notify::backends::{MemoryExecution, MemoryPresenter, MemorySource, StaticSettings};
use matchday_notify::components::monitor::{Monitor, MonitorProfile};
use matchday_notify::components::scheduler::SchedulerAdapter;
use matchday_notify::components::{
    CategoryRegistry, MonitorState, MonitorSubject, NotificationDispatcher, PendingItem,
    PermissionNegotiator,
};

struct Harness {
    execution: Arc<MemoryExecution>,
    presenter: Arc<MemoryPresenter>,
    source: Arc<MemorySource>,
    scheduler: Arc<SchedulerAdapter>,
    monitor: Arc<Monitor>,
}

async fn harness(profile: MonitorProfile) -> Harness {
    let execution = Arc::new(MemoryExecution::new());
    let presenter = Arc::new(MemoryPresenter::new());
    let source = Arc::new(MemorySource::new());

    let registry = Arc::new(CategoryRegistry::new(presenter.clone()));
    registry.register(CategoryRegistry::default_set()).await;

    let negotiator = Arc::new(PermissionNegotiator::new(Arc::new(StaticSettings::granting(
        true,
    ))));
    let scheduler = Arc::new(
        SchedulerAdapter::new(execution.clone()).with_execution_budget(Duration::from_secs(5)),
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(
        presenter.clone(),
        registry,
        negotiator.clone(),
    ));

    let monitor = Arc::new(Monitor::new(
        profile,
        scheduler.clone(),
        negotiator,
        dispatcher,
        source.clone(),
    ));
    monitor.activate();

    Harness {
        execution,
        presenter,
        source,
        scheduler,
        monitor,
    }
}

fn task_id(harness: &Harness) -> String {
    harness.monitor.profile().task_id.clone()
}

#[tokio::test]
async fn test_start_schedules_and_enters_running() {
    let harness = harness(MonitorProfile::invitations()).await;
    assert_eq!(harness.monitor.state(), MonitorState::Stopped);

    harness.monitor.start(MonitorSubject::referee("ref-42"));

    assert_eq!(harness.monitor.state(), MonitorState::Running);
    assert_eq!(
        harness.monitor.subject(),
        Some(MonitorSubject::referee("ref-42"))
    );
    assert_eq!(harness.execution.pending_count(), 1);
    assert_eq!(
        harness.execution.pending_for(&task_id(&harness)),
        Some(Duration::from_secs(15 * 60))
    );
}

#[tokio::test]
async fn test_start_runs_even_when_scheduling_is_rejected() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.execution.set_rejecting(true);

    harness.monitor.start(MonitorSubject::referee("ref-42"));

    // Rejection is logged, not fatal; the monitor still considers itself
    // running and recovers on the next app-background transition.
    assert_eq!(harness.monitor.state(), MonitorState::Running);
}

#[tokio::test]
async fn test_stop_clears_subject_and_cancels_wakeup() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    assert_eq!(harness.execution.pending_count(), 1);

    harness.monitor.stop();

    assert_eq!(harness.monitor.state(), MonitorState::Stopped);
    assert_eq!(harness.monitor.subject(), None);
    assert_eq!(harness.execution.pending_count(), 0);
}

#[tokio::test]
async fn test_stop_is_safe_in_any_state() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.stop();
    harness.monitor.stop();
    assert_eq!(harness.monitor.state(), MonitorState::Stopped);
}

#[tokio::test]
async fn test_restart_replaces_subject_with_single_wakeup() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-1"));
    harness.monitor.start(MonitorSubject::referee("ref-2"));

    assert_eq!(
        harness.monitor.subject(),
        Some(MonitorSubject::referee("ref-2"))
    );
    assert_eq!(harness.execution.pending_count(), 1);
}

#[tokio::test]
async fn test_wakeup_after_stop_fails_without_querying() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.monitor.stop();

    let success = harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    assert_eq!(success, Some(false));
    assert_eq!(harness.source.query_count(), 0);
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_empty_cycle_succeeds_without_delivery() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));

    let success = harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    assert_eq!(success, Some(true));
    assert_eq!(harness.source.query_count(), 1);
    assert_eq!(harness.presenter.delivered_count(), 0);
    assert_eq!(harness.monitor.state(), MonitorState::Running);
}

#[tokio::test]
async fn test_cycle_reschedules_before_querying() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));

    harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    // One wake-up outstanding again after the cycle.
    assert_eq!(harness.execution.pending_count(), 1);
    assert_eq!(harness.execution.submission_count(), 2);
}

#[tokio::test]
async fn test_cycle_delivers_coalesced_items() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.source.stage(vec![
        PendingItem::invitation("t1", "Spring Open"),
        PendingItem::invitation("t2", "Fall Cup"),
    ]);

    let success = harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    assert_eq!(success, Some(true));
    assert_eq!(harness.presenter.delivered_count(), 1);
    let delivered = harness.presenter.last_delivered().expect("one delivery");
    assert_eq!(delivered.badge, 2);
}

#[tokio::test]
async fn test_cycle_succeeds_despite_delivery_failure() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.presenter.set_failing(true);
    harness
        .source
        .stage(vec![PendingItem::invitation("t1", "Spring Open")]);

    let success = harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    // Delivery failure must not make the platform penalize future scheduling.
    assert_eq!(success, Some(true));
}

#[tokio::test]
async fn test_query_failure_is_an_empty_cycle() {
    let harness = harness(MonitorProfile::invitations()).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.source.set_failing(true);

    let success = harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    assert_eq!(success, Some(true));
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_query_timeout_is_an_empty_cycle() {
    let profile = MonitorProfile::invitations().with_query_timeout(Duration::from_millis(30));
    let harness = harness(profile).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.source.set_delay(Duration::from_millis(200));
    harness
        .source
        .stage(vec![PendingItem::invitation("t1", "Spring Open")]);

    let success = harness.scheduler.grant_wakeup(&task_id(&harness)).await;

    assert_eq!(success, Some(true));
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_stop_mid_poll_discards_query_result() {
    let profile = MonitorProfile::invitations().with_query_timeout(Duration::from_millis(500));
    let harness = harness(profile).await;
    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.source.set_delay(Duration::from_millis(80));
    harness
        .source
        .stage(vec![PendingItem::invitation("t1", "Spring Open")]);

    let task_id = task_id(&harness);
    let grant = {
        let scheduler = harness.scheduler.clone();
        tokio::spawn(async move { scheduler.grant_wakeup(&task_id).await })
    };

    // Let the poll get in flight, then stop the monitor underneath it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.monitor.stop();

    let success = grant.await.expect("grant task does not panic");
    assert_eq!(success, Some(true));
    // The poll completed normally but its result was discarded.
    assert_eq!(harness.source.query_count(), 1);
    assert_eq!(harness.presenter.delivered_count(), 0);
    assert_eq!(harness.monitor.state(), MonitorState::Stopped);
    // Stopped monitors keep no wake-up outstanding, even after the race.
    assert_eq!(harness.execution.pending_count(), 0);
}

#[tokio::test]
async fn test_background_transition_reschedules_only_while_active() {
    let harness = harness(MonitorProfile::invitations()).await;

    harness.monitor.note_background_transition();
    assert_eq!(harness.execution.pending_count(), 0);

    harness.monitor.start(MonitorSubject::referee("ref-42"));
    harness.monitor.note_background_transition();
    assert_eq!(harness.execution.pending_count(), 1);
}

#[tokio::test]
async fn test_monitor_state_transition_table() {
    use MonitorState::*;

    assert!(Stopped.can_transition_to(Starting));
    assert!(Starting.can_transition_to(Running));
    assert!(Running.can_transition_to(Polling));
    assert!(Polling.can_transition_to(Running));
    assert!(Polling.can_transition_to(Stopped));

    assert!(!Stopped.can_transition_to(Polling));
    assert!(!Stopped.can_transition_to(Running));
    assert!(!Running.can_transition_to(Starting));
}
