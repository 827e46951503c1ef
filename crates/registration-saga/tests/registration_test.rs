//! End-to-end registration tests against in-memory stores.

mod common;

use common::{acme_form, obj, Harness, WEST_HOST};
use record_store::{Filter, Operation, RecordStore, StoreError};
use registration_saga::model::{master, tenant, OWNER_ROLE};
use registration_saga::{RegistrationError, RegistrationForm, RegistrationPolicy, Step};
use serde_json::json;

#[tokio::test]
async fn test_register_creates_linked_records() {
    let h = Harness::new().await;

    let info = h.registrar.register(&acme_form()).await.unwrap();

    assert_eq!(info.name, "Jane Doe");
    assert_eq!(info.email, "jane@acme.test");
    assert_eq!(info.client_name, "Acme HOA");
    assert!(info.welcome_email_sent);

    let client = h.tenant.get(tenant::CLIENT, &info.client_id).await.unwrap();
    assert_eq!(client.str_field("city"), Some("Springfield"));
    assert_eq!(client.str_field("state"), Some("IL"));

    let user = h
        .tenant
        .find_first(tenant::USERS, &Filter::eq("email", "jane@acme.test"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.str_field("client_id"), Some(info.client_id.as_str()));
    assert_eq!(client.str_field("manager"), Some(user.id.as_str()));

    let division = h
        .tenant
        .find_first(tenant::DIVISIONS, &Filter::eq("client_id", &info.client_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(division.str_field("name"), Some("Downtown"));

    let personnel = h
        .tenant
        .find_first(tenant::PERSONNEL, &Filter::eq("user", &user.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(personnel.str_field("client"), Some(info.client_id.as_str()));
    assert_eq!(personnel.str_field("role"), Some(OWNER_ROLE));

    let entry = h
        .master
        .find_first(master::CLIENTS, &Filter::eq("client_id", &info.client_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.str_field("name"), Some("Acme HOA"));
    assert_eq!(entry.str_field("host"), Some(WEST_HOST));
    assert_eq!(entry.str_field("mail_server"), Some("mail-west"));
    assert_eq!(entry.str_field("region"), Some("West"));
    assert_eq!(entry.str_field("owner_email"), Some("jane@acme.test"));

    assert_eq!(h.written_records().await, 5);
    assert_eq!(h.starter_members().await, vec![info.client_id.clone()]);

    let sent = h.notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@acme.test");
    assert_eq!(sent[0].client_host, WEST_HOST);
}

#[tokio::test]
async fn test_existing_name_is_conflict_without_writes() {
    let h = Harness::new().await;
    h.tenant
        .seed(tenant::CLIENT, "existing", obj(json!({"name": "Acme HOA"})))
        .await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    assert!(matches!(err, RegistrationError::Conflict(ref m) if m == "name exists"));
    assert_eq!(h.written_records().await, 1);
    assert!(h.starter_members().await.is_empty());
}

#[tokio::test]
async fn test_existing_email_is_conflict_without_writes() {
    let h = Harness::new().await;
    h.tenant
        .seed(tenant::USERS, "u0", obj(json!({"email": "jane@acme.test"})))
        .await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    assert!(matches!(err, RegistrationError::Conflict(ref m) if m == "email exists"));
    assert_eq!(h.tenant.record_count(tenant::CLIENT).await, 0);
}

#[tokio::test]
async fn test_password_mismatch_checked_after_uniqueness() {
    let h = Harness::new().await;
    let form = RegistrationForm {
        password_confirm: "Different1!".into(),
        ..acme_form()
    };

    let err = h.registrar.register(&form).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Validation(ref m) if m == "password mismatch"));

    h.tenant
        .seed(tenant::CLIENT, "existing", obj(json!({"name": "Acme HOA"})))
        .await;
    let err = h.registrar.register(&form).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Conflict(_)));
}

#[tokio::test]
async fn test_unknown_region() {
    let h = Harness::new().await;
    let form = RegistrationForm {
        region_host: "https://east-1.example".into(),
        ..acme_form()
    };

    let err = h.registrar.register(&form).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Validation(ref m) if m == "no region"));
}

#[tokio::test]
async fn test_rejected_terms_fail_identically_twice() {
    let h = Harness::new().await;
    let form = RegistrationForm {
        terms_accepted: false,
        ..acme_form()
    };

    for _ in 0..2 {
        let err = h.registrar.register(&form).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Validation(ref m) if m == "terms not accepted"));
    }
    assert_eq!(h.written_records().await, 0);
    assert!(h.notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_lookup_failure_is_store_read() {
    let h = Harness::new().await;
    h.tenant.fail_next(Operation::Find, tenant::CLIENT).await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    assert!(matches!(err, RegistrationError::StoreRead(_)));
    assert!(err.rollback().is_none());
    assert_eq!(h.written_records().await, 0);
}

#[tokio::test]
async fn test_every_write_failure_rolls_back_completely() {
    let cases = [
        (Step::CreateClient, Operation::Create, tenant::CLIENT, false),
        (Step::CreateDirectoryEntry, Operation::Create, master::CLIENTS, true),
        (Step::CreateDivision, Operation::Create, tenant::DIVISIONS, false),
        (Step::CreateUser, Operation::Create, tenant::USERS, false),
        (Step::PatchDirectoryEntry, Operation::Update, master::CLIENTS, true),
        (Step::PatchClientManager, Operation::Update, tenant::CLIENT, false),
        (Step::CreatePersonnel, Operation::Create, tenant::PERSONNEL, false),
    ];

    for (expected_step, op, collection, on_master) in cases {
        let h = Harness::new().await;
        if on_master {
            h.master.fail_next(op, collection).await;
        } else {
            h.tenant.fail_next(op, collection).await;
        }

        let err = h.registrar.register(&acme_form()).await.unwrap_err();

        match &err {
            RegistrationError::StoreWrite { step, rollback, .. } => {
                assert_eq!(*step, expected_step);
                assert!(rollback.is_clean(), "{:?}", rollback);
                assert!(rollback.uncompensated.is_empty());
            }
            other => panic!("{:?}: unexpected error {:?}", expected_step, other),
        }
        assert_eq!(h.written_records().await, 0, "{:?} left records", expected_step);
        assert!(h.starter_members().await.is_empty());
        assert!(h.notifier.sent.lock().await.is_empty());
    }
}

/// Assert a plan-join failure undid every record write.
async fn assert_plan_failure_rolled_back(h: &Harness, err: &RegistrationError) {
    match err {
        RegistrationError::StoreWrite { step, rollback, .. } => {
            assert_eq!(*step, Step::JoinStarterPlan);
            assert!(rollback.is_clean(), "{:?}", rollback);
            assert_eq!(
                rollback.compensated,
                vec![
                    Step::CreatePersonnel,
                    Step::CreateUser,
                    Step::CreateDivision,
                    Step::CreateDirectoryEntry,
                    Step::CreateClient
                ]
            );
            assert!(rollback.uncompensated.is_empty());
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(h.written_records().await, 0);
    assert!(h.notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_missing_starter_plan_rolls_back() {
    let h = Harness::new().await;
    h.master.delete(master::PLANS, "starter").await.unwrap();

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::StoreWrite {
            source: StoreError::NotFound { .. },
            ..
        }
    ));
    assert_plan_failure_rolled_back(&h, &err).await;
}

#[tokio::test]
async fn test_plan_update_error_rolls_back() {
    let h = Harness::new().await;
    h.master.fail_next(Operation::Update, master::PLANS).await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::StoreWrite {
            source: StoreError::Unavailable(_),
            ..
        }
    ));
    assert_plan_failure_rolled_back(&h, &err).await;
    assert!(h.starter_members().await.is_empty());
}

#[tokio::test]
async fn test_plan_retries_exhausted_rolls_back() {
    let h = Harness::with_contended_plan(RegistrationPolicy {
        plan_update_retries: 1,
        ..RegistrationPolicy::default()
    })
    .await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::StoreWrite {
            source: StoreError::VersionConflict { .. },
            ..
        }
    ));
    assert_plan_failure_rolled_back(&h, &err).await;
    assert!(h.starter_members().await.is_empty());
}

#[tokio::test]
async fn test_user_failure_removes_division_entry_and_client() {
    let h = Harness::new().await;
    h.tenant.fail_next(Operation::Create, tenant::USERS).await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    let rollback = err.rollback().unwrap();
    assert_eq!(
        rollback.compensated,
        vec![
            Step::CreateDivision,
            Step::CreateDirectoryEntry,
            Step::CreateClient
        ]
    );
    assert!(err.user_message().contains("No changes were saved"));
    assert_eq!(h.written_records().await, 0);
    assert!(h.starter_members().await.is_empty());
}

#[tokio::test]
async fn test_failed_compensation_is_reported() {
    let h = Harness::new().await;
    h.tenant.fail_next(Operation::Create, tenant::PERSONNEL).await;
    h.tenant.fail_next(Operation::Delete, tenant::DIVISIONS).await;

    let err = h.registrar.register(&acme_form()).await.unwrap_err();

    let rollback = err.rollback().unwrap();
    assert!(!rollback.is_clean());
    assert_eq!(rollback.failed.len(), 1);
    assert_eq!(rollback.failed[0].step, Step::CreateDivision);
    assert_eq!(
        rollback.compensated,
        vec![
            Step::CreateUser,
            Step::CreateDirectoryEntry,
            Step::CreateClient
        ]
    );

    // Only the division is orphaned.
    assert_eq!(h.tenant.record_count(tenant::DIVISIONS).await, 1);
    assert_eq!(h.written_records().await, 1);
    assert!(err.user_message().contains("contact support"));
}

#[tokio::test]
async fn test_retry_after_failure_succeeds() {
    let h = Harness::new().await;
    h.tenant.fail_next(Operation::Create, tenant::DIVISIONS).await;

    assert!(h.registrar.register(&acme_form()).await.is_err());
    let info = h.registrar.register(&acme_form()).await.unwrap();

    assert_eq!(h.written_records().await, 5);
    assert_eq!(h.starter_members().await, vec![info.client_id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_all_join_plan() {
    let h = Harness::new().await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let registrar = h.registrar.clone();
        let form = RegistrationForm {
            company_name: format!("Tenant {} HOA", i),
            email: format!("owner{}@tenant.test", i),
            ..acme_form()
        };
        handles.push(tokio::spawn(async move { registrar.register(&form).await }));
    }

    let mut expected = Vec::new();
    for handle in handles {
        expected.push(handle.await.unwrap().unwrap().client_id);
    }

    let mut members = h.starter_members().await;
    members.sort();
    expected.sort();
    assert_eq!(members, expected);
}

#[tokio::test]
async fn test_concurrent_duplicate_email_leaves_one_tenant() {
    let h = Harness::new().await;
    let second = RegistrationForm {
        company_name: "Birch HOA".into(),
        ..acme_form()
    };

    let first = acme_form();
    let (a, b) = tokio::join!(h.registrar.register(&first), h.registrar.register(&second));

    let failures: Vec<RegistrationError> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        RegistrationError::Conflict(_) | RegistrationError::StoreWrite { .. }
    ));

    assert_eq!(h.tenant.record_count(tenant::CLIENT).await, 1);
    assert_eq!(h.tenant.record_count(tenant::USERS).await, 1);
    assert_eq!(h.master.record_count(master::CLIENTS).await, 1);
}
