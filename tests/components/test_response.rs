//! Tests for components/response.rs

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use matchday_notify::backends::{MemoryPresenter, MemorySink, StaticSettings};
use matchday_notify::components::response::ResponseRouter;
use matchday_notify::components::{
    CategoryRegistry, Decision, MonitorSubject, NotificationDispatcher, PermissionNegotiator,
    PermissionState, PermissionTier, RoutedInteraction, CUSTOM_NOTIFICATION_CATEGORY,
    REFEREE_INVITATION_CATEGORY,
};

struct Harness {
    presenter: Arc<MemoryPresenter>,
    sink: Arc<MemorySink>,
    router: ResponseRouter,
}

async fn harness(sink: MemorySink) -> Harness {
    let presenter = Arc::new(MemoryPresenter::new());
    let registry = Arc::new(CategoryRegistry::new(presenter.clone()));
    registry.register(CategoryRegistry::default_set()).await;

    let negotiator = Arc::new(PermissionNegotiator::new(Arc::new(
        StaticSettings::authorized(PermissionState::AuthorizedStandard),
    )));
    negotiator.ensure_permission(PermissionTier::Standard).await;

    let dispatcher = Arc::new(NotificationDispatcher::new(
        presenter.clone(),
        registry.clone(),
        negotiator,
    ));
    let sink = Arc::new(sink);
    let router = ResponseRouter::new(registry, sink.clone(), dispatcher)
        .with_ack_timeout(Duration::from_millis(100));

    Harness {
        presenter,
        sink,
        router,
    }
}

fn invitation_user_info() -> serde_json::Value {
    json!({
        "type": REFEREE_INVITATION_CATEGORY,
        "subject": { "type": "referee", "id": "ref-42" },
        "items": [
            { "kind": "invitation", "id": "t1", "title": "Spring Open" }
        ]
    })
}

#[tokio::test]
async fn test_accept_routes_outcome_and_confirms() {
    let harness = harness(MemorySink::accepting()).await;

    let routed = harness
        .router
        .handle_interaction("accept", &invitation_user_info())
        .await;

    match routed {
        RoutedInteraction::Outcome {
            outcome,
            acknowledged,
        } => {
            assert!(acknowledged);
            assert_eq!(outcome.decision, Decision::Accepted);
            assert_eq!(outcome.item_id, "t1");
            assert_eq!(outcome.subject, MonitorSubject::referee("ref-42"));
        }
        RoutedInteraction::Ignored => panic!("expected a routed outcome"),
    }

    // Exactly one confirmation whose copy matches the decision.
    assert_eq!(harness.presenter.delivered_count(), 1);
    let confirmation = harness.presenter.last_delivered().expect("confirmation");
    assert_eq!(confirmation.title, "Zusage gesendet");
    assert_eq!(confirmation.body, "Sie haben die Einladung angenommen");
    assert_eq!(confirmation.category, CUSTOM_NOTIFICATION_CATEGORY);
    assert_eq!(confirmation.present_after, Some(Duration::from_secs(1)));

    let acks = harness.sink.acknowledged();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].decision, Decision::Accepted);
}

#[tokio::test]
async fn test_decline_and_later_confirmation_copy() {
    let harness = harness(MemorySink::accepting()).await;

    harness
        .router
        .handle_interaction("decline", &invitation_user_info())
        .await;
    let declined = harness.presenter.last_delivered().expect("confirmation");
    assert_eq!(declined.title, "Absage gesendet");
    assert_eq!(declined.body, "Sie haben die Einladung abgelehnt");

    harness
        .router
        .handle_interaction("later", &invitation_user_info())
        .await;
    let deferred = harness.presenter.last_delivered().expect("confirmation");
    assert_eq!(deferred.title, "Später entscheiden");
    assert_eq!(deferred.body, "Sie können später antworten");

    assert_eq!(harness.presenter.delivered_count(), 2);
}

#[tokio::test]
async fn test_negative_acknowledgement_produces_no_confirmation() {
    let harness = harness(MemorySink::rejecting()).await;

    let routed = harness
        .router
        .handle_interaction("accept", &invitation_user_info())
        .await;

    match routed {
        RoutedInteraction::Outcome { acknowledged, .. } => assert!(!acknowledged),
        RoutedInteraction::Ignored => panic!("expected a routed outcome"),
    }
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_timed_out_acknowledgement_produces_no_confirmation() {
    let sink = MemorySink::accepting();
    sink.set_delay(Duration::from_millis(300));
    let harness = harness(sink).await;

    let routed = harness
        .router
        .handle_interaction("accept", &invitation_user_info())
        .await;

    match routed {
        RoutedInteraction::Outcome { acknowledged, .. } => assert!(!acknowledged),
        RoutedInteraction::Ignored => panic!("expected a routed outcome"),
    }
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_undeclared_action_is_ignored() {
    let harness = harness(MemorySink::accepting()).await;

    let routed = harness
        .router
        .handle_interaction("snooze", &invitation_user_info())
        .await;

    assert_eq!(routed, RoutedInteraction::Ignored);
    assert!(harness.sink.acknowledged().is_empty());
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_malformed_payloads_are_ignored() {
    let harness = harness(MemorySink::accepting()).await;

    let missing_items = json!({
        "type": REFEREE_INVITATION_CATEGORY,
        "subject": { "type": "referee", "id": "ref-42" }
    });
    let missing_item_id = json!({
        "type": REFEREE_INVITATION_CATEGORY,
        "subject": { "type": "referee", "id": "ref-42" },
        "items": [ { "title": "Spring Open" } ]
    });
    let not_an_object = json!("referee_invitation");

    for user_info in [missing_items, missing_item_id, not_an_object] {
        let routed = harness.router.handle_interaction("accept", &user_info).await;
        assert_eq!(routed, RoutedInteraction::Ignored);
    }

    assert!(harness.sink.acknowledged().is_empty());
    assert_eq!(harness.presenter.delivered_count(), 0);
}

#[tokio::test]
async fn test_payload_category_must_match_action_category() {
    let harness = harness(MemorySink::accepting()).await;

    // Payload claims to be a generic notification but carries an invitation
    // action: routed nowhere.
    let mismatched = json!({
        "type": CUSTOM_NOTIFICATION_CATEGORY,
        "subject": { "type": "referee", "id": "ref-42" },
        "items": [ { "kind": "invitation", "id": "t1", "title": "Spring Open" } ]
    });

    let routed = harness.router.handle_interaction("accept", &mismatched).await;
    assert_eq!(routed, RoutedInteraction::Ignored);
}

#[test]
fn test_decision_mapping() {
    assert_eq!(Decision::from_action_id("accept"), Some(Decision::Accepted));
    assert_eq!(Decision::from_action_id("decline"), Some(Decision::Declined));
    assert_eq!(Decision::from_action_id("later"), Some(Decision::Pending));
    assert_eq!(Decision::from_action_id("dismiss"), None);

    assert_eq!(Decision::Pending.as_str(), "pending");
}
