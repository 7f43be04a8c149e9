//! MongoStore Tests
//!
//! Runs the units of work against a single-node replica set in Docker:
//! - Unique uid index under concurrent submission
//! - Single student derivation under concurrent shortlisting
//! - Payment capture over a concurrently edited student
//!
//! Run with `cargo test -p wf-platform --test mongo_store_tests -- --ignored`.

use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Database};
use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use wf_common::{NotificationKind, OutboxItem};
use wf_platform::config::PricingConfig;
use wf_platform::domain::{
    ApplicantDetails, Application, Student, StudentPaymentStatus, StudentStatus,
};
use wf_platform::error::PlatformError;
use wf_platform::repository::{
    CaptureOutcome, MongoStore, PaymentRepository, StudentRepository, UnitOfWork,
};
use wf_platform::service::signature::payment_signature;
use wf_platform::service::{AuthContext, LocalGateway, PaymentService, VerifyPayment};

const GATEWAY_SECRET: &str = "test-gateway-secret";

struct TestDb {
    _node: ContainerAsync<Mongo>,
    db: Database,
    store: Arc<MongoStore>,
}

impl TestDb {
    async fn start() -> Self {
        let node = Mongo::repl_set().start().await.expect("mongo container");
        let port = node.get_host_port_ipv4(27017).await.expect("mongo port");
        let client = Client::with_uri_str(format!("mongodb://127.0.0.1:{}/?directConnection=true", port))
            .await
            .unwrap();
        let db = client.database("wyffle_test");
        let store = MongoStore::new(client, &db);
        store.ensure_indexes().await.unwrap();

        Self {
            _node: node,
            db,
            store: Arc::new(store),
        }
    }

    async fn count(&self, collection: &str) -> u64 {
        self.db
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .unwrap()
    }
}

fn application(uid: &str) -> Application {
    Application::new(
        uid,
        ApplicantDetails {
            full_name: "Asha Rao".to_string(),
            email: "a@x.com".to_string(),
            phone_no: "9999999999".to_string(),
            college: "IIT Madras".to_string(),
            degree: "B.Tech".to_string(),
            year_of_graduation: 2026,
            ..Default::default()
        },
    )
}

fn event(kind: NotificationKind, aggregate_id: &str) -> OutboxItem {
    OutboxItem::new(kind, aggregate_id, "a@x.com", json!({}))
}

fn student_ctx(uid: &str) -> AuthContext {
    AuthContext {
        uid: uid.to_string(),
        email: None,
        is_admin: false,
    }
}

async fn shortlisted(test: &TestDb, uid: &str) -> Application {
    let app = application(uid);
    test.store
        .submit_application(&app, &event(NotificationKind::ApplicationSubmitted, &app.id))
        .await
        .unwrap();
    let now = Utc::now();
    test.store
        .shortlist_application(
            &app.id,
            &Student::from_application(&app, now),
            &event(NotificationKind::ApplicationShortlisted, &app.id),
            now,
        )
        .await
        .unwrap();
    app
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_concurrent_submissions_store_one_application() {
    let test = TestDb::start().await;
    let first = application("u1");
    let second = application("u1");
    let first_event = event(NotificationKind::ApplicationSubmitted, &first.id);
    let second_event = event(NotificationKind::ApplicationSubmitted, &second.id);

    let (a, b) = tokio::join!(
        test.store.submit_application(&first, &first_event),
        test.store.submit_application(&second, &second_event),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(PlatformError::Duplicate { .. }))));
    assert_eq!(test.count("applications").await, 1);
    assert_eq!(test.count("outbox").await, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_concurrent_shortlisting_derives_one_student() {
    let test = TestDb::start().await;
    let app = application("u1");
    test.store
        .submit_application(&app, &event(NotificationKind::ApplicationSubmitted, &app.id))
        .await
        .unwrap();

    let now = Utc::now();
    let student = Student::from_application(&app, now);
    let shortlist_event = event(NotificationKind::ApplicationShortlisted, &app.id);
    let (a, b) = tokio::join!(
        test.store.shortlist_application(&app.id, &student, &shortlist_event, now),
        test.store.shortlist_application(&app.id, &student, &shortlist_event, now),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.transitioned ^ b.transitioned);
    assert!(a.student_created ^ b.student_created);
    assert_eq!(test.count("students").await, 1);
    // submitted + one shortlisted notification
    assert_eq!(test.count("outbox").await, 2);

    let stored = StudentRepository::find_by_uid(test.store.as_ref(), "u1")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.progress_steps.application_submitted);
    assert!(stored.progress_steps.resume_shortlisted);
    assert!(!stored.progress_steps.interview_completed);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rejected_application_cannot_be_shortlisted() {
    let test = TestDb::start().await;
    let app = application("u1");
    test.store
        .submit_application(&app, &event(NotificationKind::ApplicationSubmitted, &app.id))
        .await
        .unwrap();
    let now = Utc::now();
    assert!(test
        .store
        .reject_application(&app.id, &event(NotificationKind::ApplicationRejected, &app.id), now)
        .await
        .unwrap());

    let err = test
        .store
        .shortlist_application(
            &app.id,
            &Student::from_application(&app, now),
            &event(NotificationKind::ApplicationShortlisted, &app.id),
            now,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::InvalidTransition { .. }));
    assert_eq!(test.count("students").await, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_capture_keeps_concurrent_student_edits() {
    let test = TestDb::start().await;
    shortlisted(&test, "u1").await;

    let payments = PaymentService::new(
        test.store.clone(),
        test.store.clone(),
        test.store.clone(),
        Arc::new(LocalGateway::new(GATEWAY_SECRET)),
        PricingConfig::default(),
    );
    let order = payments.create_order(&student_ctx("u1"), None).await.unwrap();
    let mut payment = PaymentRepository::find_by_order_id(test.store.as_ref(), &order.order_id)
        .await
        .unwrap()
        .unwrap();

    // An administrator edits the record between the read and the capture
    let mut edited = StudentRepository::find_by_uid(test.store.as_ref(), "u1")
        .await
        .unwrap()
        .unwrap();
    edited.progress_percentage = 80;
    edited.profile.batch_name = Some("Batch 7".to_string());
    StudentRepository::update(test.store.as_ref(), &edited).await.unwrap();

    let now = Utc::now();
    payment.mark_paid("pay_1", now);
    let captured = event(NotificationKind::PaymentCaptured, &payment.order_id);
    let first = test.store.capture_payment(&payment, "u1", &captured, now).await.unwrap();
    let again = test.store.capture_payment(&payment, "u1", &captured, now).await.unwrap();
    assert_eq!(first, CaptureOutcome::Captured);
    assert_eq!(again, CaptureOutcome::AlreadyCaptured);

    let student = StudentRepository::find_by_uid(test.store.as_ref(), "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.payment_status, StudentPaymentStatus::Paid);
    assert_eq!(student.status, StudentStatus::Active);
    assert_eq!(student.progress_percentage, 80);
    assert_eq!(student.profile.batch_name.as_deref(), Some("Batch 7"));
    assert!(student.progress_steps.payment_process);
    assert!(student.enrollment_date.is_some());

    let outbox_for_order = test
        .db
        .collection::<Document>("outbox")
        .count_documents(doc! { "aggregateId": payment.order_id.as_str() })
        .await
        .unwrap();
    assert_eq!(outbox_for_order, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_verify_through_service_activates_student() {
    let test = TestDb::start().await;
    shortlisted(&test, "u1").await;

    let payments = PaymentService::new(
        test.store.clone(),
        test.store.clone(),
        test.store.clone(),
        Arc::new(LocalGateway::new(GATEWAY_SECRET)),
        PricingConfig::default(),
    );
    let order = payments.create_order(&student_ctx("u1"), None).await.unwrap();
    let callback = VerifyPayment {
        razorpay_order_id: order.order_id.clone(),
        razorpay_payment_id: "pay_1".to_string(),
        razorpay_signature: payment_signature(GATEWAY_SECRET, &order.order_id, "pay_1"),
    };

    payments.verify(&student_ctx("u1"), &callback).await.unwrap();
    // Redelivered callback
    payments.verify(&student_ctx("u1"), &callback).await.unwrap();

    let student = StudentRepository::find_by_uid(test.store.as_ref(), "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.payment_status, StudentPaymentStatus::Paid);
    assert_eq!(student.status, StudentStatus::Active);
    assert!(student.progress_percentage >= 60);
}
