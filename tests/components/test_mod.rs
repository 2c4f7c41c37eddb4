//! Tests for the shared data model in components/mod.rs

use matchday_notify::components::{
    DeliveryRequest, MonitorSubject, PendingItem, PendingKind, RequestId,
    CUSTOM_NOTIFICATION_CATEGORY, REFEREE_INVITATION_CATEGORY,
};

#[test]
fn test_request_id_round_trip() {
    let id = RequestId::generate();
    let parsed: RequestId = id.to_string().parse().expect("display form parses back");
    assert_eq!(id, parsed);
}

#[test]
fn test_subject_serde_shape() {
    let subject = MonitorSubject::referee("ref-42");
    let value = serde_json::to_value(&subject).expect("subject serializes");
    assert_eq!(value["type"], "referee");
    assert_eq!(value["id"], "ref-42");

    let back: MonitorSubject = serde_json::from_value(value).expect("subject deserializes");
    assert_eq!(back, subject);
    assert_eq!(back.key(), "ref-42");
}

#[test]
fn test_subject_display() {
    assert_eq!(MonitorSubject::referee("ref-42").to_string(), "referee:ref-42");
    assert_eq!(
        MonitorSubject::user("anna@example.org").to_string(),
        "user:anna@example.org"
    );
}

#[test]
fn test_pending_kind_categories() {
    assert_eq!(
        PendingKind::Invitation.category_id(),
        REFEREE_INVITATION_CATEGORY
    );
    assert_eq!(
        PendingKind::Notification.category_id(),
        CUSTOM_NOTIFICATION_CATEGORY
    );
}

#[test]
fn test_pending_item_constructors() {
    let invitation = PendingItem::invitation("t1", "Spring Open").with_time_sensitive(true);
    assert_eq!(invitation.kind, PendingKind::Invitation);
    assert_eq!(invitation.id, "t1");
    assert_eq!(invitation.title, "Spring Open");
    assert!(invitation.time_sensitive);
    assert!(invitation.target_email.is_none());

    let notification =
        PendingItem::notification("n1", "Spielplan", "Der Spielplan ist online", "anna@example.org");
    assert_eq!(notification.kind, PendingKind::Notification);
    assert_eq!(notification.target_email.as_deref(), Some("anna@example.org"));
}

#[test]
fn test_delivery_request_builder_defaults() {
    let request = DeliveryRequest::new("Titel", "Text", REFEREE_INVITATION_CATEGORY);
    assert_eq!(request.badge, 0);
    assert!(request.sound);
    assert!(!request.time_sensitive);
    assert!(request.present_after.is_none());

    let request = request
        .with_badge(3)
        .with_time_sensitive(true)
        .with_sound(false);
    assert_eq!(request.badge, 3);
    assert!(request.time_sensitive);
    assert!(!request.sound);
}
