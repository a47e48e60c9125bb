mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_json, TestApp};
use onboarding::auth::password::verify_password;
use onboarding::status::ConsultationStatus;
use onboarding::store::ConsultationStore;
use onboarding::tokens::{TokenError, TokenIssuer};
use serde_json::json;

const CREDENTIAL: &str = "correct horse battery";

#[tokio::test]
async fn invitation_can_be_inspected_before_registering() -> Result<()> {
    let app = TestApp::new()?;
    let (_, token) = app.approved("Dana Prospect", "dana@example.com").await?;

    let response = app
        .post_json("/api/registration/inspect", &json!({ "token": token }), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await?;
    assert_eq!(body["email"], "dana@example.com");
    assert_eq!(body["name"], "Dana Prospect");
    assert!(body["expires_at"].is_string());

    // Inspecting does not consume the token.
    let response = app
        .post_json(
            "/api/registration",
            &json!({ "token": token, "password": CREDENTIAL }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn tokens_are_not_accepted_in_the_url() -> Result<()> {
    let app = TestApp::new()?;
    let (id, token) = app.approved("Dana", "dana@example.com").await?;

    let response = app.get(&format!("/api/registration/{token}"), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let record = app.store.get(id).await?;
    assert!(!record.token_used);
    Ok(())
}

#[tokio::test]
async fn registration_creates_one_client_account() -> Result<()> {
    let app = TestApp::new()?;
    let (id, token) = app.approved("Dana Prospect", "dana@example.com").await?;

    let response = app
        .post_json(
            "/api/registration",
            &json!({ "token": token, "password": CREDENTIAL }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response.into_body()).await?;
    assert_eq!(body["email"], "dana@example.com");
    assert_eq!(body["role"], "client");
    assert!(body.get("credential_hash").is_none());

    let record = app.store.get(id).await?;
    assert_eq!(record.status, ConsultationStatus::Registered);
    assert!(record.token_used);
    assert_eq!(
        record.registered_user_id.map(|uuid| uuid.to_string()),
        body["id"].as_str().map(str::to_owned)
    );
    assert!(app.events.names().await.contains(&"client.registered"));

    let accounts = app.store.accounts().await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].source_consultation_id, Some(id));
    assert_ne!(accounts[0].credential_hash, CREDENTIAL);
    assert!(verify_password(CREDENTIAL, &accounts[0].credential_hash)?);
    Ok(())
}

#[tokio::test]
async fn consumed_token_is_rejected_with_uniform_message() -> Result<()> {
    let app = TestApp::new()?;
    let (_, token) = app.approved("Dana", "dana@example.com").await?;
    let payload = json!({ "token": token, "password": CREDENTIAL });

    let response = app.post_json("/api/registration", &payload, None).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.post_json("/api/registration", &payload, None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await?;
    assert_eq!(body["error"], TokenError::PUBLIC_MESSAGE);

    let response = app
        .post_json("/api/registration/inspect", &json!({ "token": token }), None)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.store.account_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn foreign_and_forged_tokens_are_rejected() -> Result<()> {
    let app = TestApp::new()?;
    let (id, token) = app.approved("Dana", "dana@example.com").await?;
    let issuer = TokenIssuer::new(app.jwt.clone());

    let reset = issuer.issue_password_reset(id, "dana@example.com", Duration::hours(1))?;
    let expired = issuer.issue_at(
        id,
        "dana@example.com",
        Duration::hours(1),
        Utc::now() - Duration::hours(3),
    )?;
    let mut tampered = token.clone();
    tampered.push('x');

    for candidate in [
        reset.token,
        app.admin_token()?,
        expired.token,
        tampered,
        "garbage".to_string(),
    ] {
        let response = app
            .post_json(
                "/api/registration",
                &json!({ "token": candidate, "password": CREDENTIAL }),
                None,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response.into_body()).await?;
        assert_eq!(body["error"], TokenError::PUBLIC_MESSAGE);
    }

    assert_eq!(app.store.account_count().await, 0);
    let record = app.store.get(id).await?;
    assert_eq!(record.status, ConsultationStatus::Approved);
    assert!(!record.token_used);
    Ok(())
}

#[tokio::test]
async fn weak_credential_keeps_the_invitation_open() -> Result<()> {
    let app = TestApp::new()?;
    let (id, token) = app.approved("Dana", "dana@example.com").await?;

    let response = app
        .post_json(
            "/api/registration",
            &json!({ "token": token, "password": "short" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let record = app.store.get(id).await?;
    assert!(!record.token_used);

    let response = app
        .post_json(
            "/api/registration",
            &json!({ "token": token, "password": CREDENTIAL }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn lifecycle_runs_through_completion() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.admin_token()?;
    let (id, token) = app.approved("Dana", "dana@example.com").await?;

    // Scheduling requires a registered client.
    let response = app
        .post_json(&format!("/api/consultations/{id}/schedule"), &json!({}), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .post_json(
            "/api/registration",
            &json!({ "token": token, "password": CREDENTIAL }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json(&format!("/api/consultations/{id}/schedule"), &json!({}), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await?;
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["pipeline_status"], "client");

    let response = app
        .post_json(&format!("/api/consultations/{id}/complete"), &json!({}), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await?;
    assert_eq!(body["status"], "completed");
    Ok(())
}

#[tokio::test]
async fn registration_during_outage_is_retryable() -> Result<()> {
    let app = TestApp::new()?;
    let (_, token) = app.approved("Dana", "dana@example.com").await?;
    let payload = json!({ "token": token, "password": CREDENTIAL });

    app.store.set_unavailable(true);
    let response = app.post_json("/api/registration", &payload, None).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    app.store.set_unavailable(false);
    let response = app.post_json("/api/registration", &payload, None).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.store.account_count().await, 1);
    Ok(())
}
