mod helpers;

use chrono::{Duration, Utc};
use docshield_core::models::{AccessOutcome, AccessType, ClientInfo};
use docshield_core::{AppError, ErrorMetadata};
use docshield_db::{AccessLogRepository, DocumentRepository};
use docshield_services::{verify_grant, AccessCredential};
use helpers::fixtures::{javascript_pdf, three_page_pdf};
use helpers::{harness, harness_with_access_log, pdf_upload, FailingAccessLog, GRANT_SECRET, MFA_CODE};
use std::sync::Arc;
use uuid::Uuid;

fn client() -> ClientInfo {
    ClientInfo {
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("docshield-tests".to_string()),
    }
}

#[tokio::test]
async fn test_invalid_mfa_code_is_denied_and_logged_once() {
    let h = harness();
    let owner = Uuid::new_v4();
    let mut request = pdf_upload(owner);
    request.requires_mfa = true;
    let document = h.service.upload(request, three_page_pdf()).await.unwrap();

    let result = h
        .service
        .read(document.id, owner, &AccessCredential::mfa("000000"), &client())
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));
    assert_eq!(err.client_message(), "Invalid credential");

    let log = h.access_log.list_for_document(document.id).await.unwrap();
    assert_eq!(log.len(), 1);
    let entry = &log[0];
    assert_eq!(entry.access_type, AccessType::Download);
    assert_eq!(entry.outcome, AccessOutcome::Denied);
    assert!(entry.secondary_verification_required);
    assert!(!entry.mfa_verified);
    assert_eq!(entry.client, client());
    assert!(entry.denial_reason.as_deref().unwrap().contains("mfa"));
}

#[tokio::test]
async fn test_valid_mfa_code_issues_scoped_grant() {
    let h = harness();
    let owner = Uuid::new_v4();
    let mut request = pdf_upload(owner);
    request.requires_mfa = true;
    let data = three_page_pdf();
    let document = h.service.upload(request, data.clone()).await.unwrap();

    let content = h
        .service
        .read(document.id, owner, &AccessCredential::mfa(MFA_CODE), &client())
        .await
        .unwrap();
    assert_eq!(content.bytes, data);
    assert!(content.grant.expires_at > Utc::now() + Duration::minutes(59));

    let claims = verify_grant(GRANT_SECRET, &content.grant.token, document.id).unwrap();
    assert_eq!(claims.sub, owner.to_string());
    assert_eq!(claims.scope, "download");
    assert!(verify_grant(GRANT_SECRET, &content.grant.token, Uuid::new_v4()).is_err());

    let log = h.access_log.list_for_document(document.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].is_granted());
    assert!(log[0].mfa_verified);
    assert_eq!(log[0].id, content.grant.log_entry_id);

    let stored = h.documents.get(document.id).await.unwrap().unwrap();
    assert_eq!(stored.access_count, 1);
    assert!(stored.last_accessed_at.is_some());
}

#[tokio::test]
async fn test_password_policy() {
    let h = harness();
    let owner = Uuid::new_v4();
    let mut request = pdf_upload(owner);
    request.access_password = Some("open sesame".to_string());
    let document = h.service.upload(request, three_page_pdf()).await.unwrap();
    let gate = h.service.access_gate();

    for credential in [
        AccessCredential::none(),
        AccessCredential::password("open sesame!"),
        AccessCredential::mfa(MFA_CODE),
    ] {
        let err = gate
            .evaluate(document.id, owner, &credential, AccessType::View, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(ref m) if m == "Invalid credential"));
    }

    let grant = gate
        .evaluate(
            document.id,
            owner,
            &AccessCredential::password("open sesame"),
            AccessType::View,
            &client(),
        )
        .await
        .unwrap();
    assert_eq!(grant.access_type, AccessType::View);

    let log = gate.access_log(document.id).await.unwrap();
    assert_eq!(log.len(), 4);
    assert!(log[3].password_verified);
    assert!(!log[3].mfa_verified);
}

#[tokio::test]
async fn test_no_secondary_verification_grants_owner_only() {
    let h = harness();
    let owner = Uuid::new_v4();
    let document = h
        .service
        .upload(pdf_upload(owner), three_page_pdf())
        .await
        .unwrap();
    let gate = h.service.access_gate();

    let grant = gate
        .evaluate(document.id, owner, &AccessCredential::none(), AccessType::View, &client())
        .await
        .unwrap();
    assert!(gate.verify_grant(&grant.token, document.id).is_ok());

    let stranger = gate
        .evaluate(
            document.id,
            Uuid::new_v4(),
            &AccessCredential::none(),
            AccessType::View,
            &client(),
        )
        .await;
    assert!(matches!(stranger, Err(AppError::AccessDenied(ref m)) if m == "Access denied"));

    let log = gate.access_log(document.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert!(!log[0].secondary_verification_required);
    assert_eq!(log[1].outcome, AccessOutcome::Denied);
}

#[tokio::test]
async fn test_unsafe_missing_and_expired_documents_are_denied() {
    let h = harness();
    let owner = Uuid::new_v4();
    let gate = h.service.access_gate();

    let unsafe_doc = h
        .service
        .upload(pdf_upload(owner), javascript_pdf())
        .await
        .unwrap();
    let missing = Uuid::new_v4();

    let mut expiring = pdf_upload(owner);
    expiring.expires_at = Some(Utc::now() + Duration::hours(1));
    let mut expired_doc = h.service.upload(expiring, three_page_pdf()).await.unwrap();
    expired_doc.policy.expires_at = Some(Utc::now() - Duration::seconds(1));
    h.documents.update(&expired_doc).await.unwrap();

    for id in [unsafe_doc.id, missing, expired_doc.id] {
        let result = gate
            .evaluate(id, owner, &AccessCredential::none(), AccessType::Download, &client())
            .await;
        assert!(matches!(result, Err(AppError::AccessDenied(_))));
        assert_eq!(gate.access_log(id).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_access_log_failure_fails_the_call() {
    let h = harness_with_access_log(Arc::new(FailingAccessLog));
    let owner = Uuid::new_v4();
    let document = h
        .service
        .upload(pdf_upload(owner), three_page_pdf())
        .await
        .unwrap();

    let result = h
        .service
        .access_gate()
        .evaluate(document.id, owner, &AccessCredential::none(), AccessType::View, &client())
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    let read = h
        .service
        .read(document.id, owner, &AccessCredential::none(), &client())
        .await;
    assert!(read.is_err());
}
