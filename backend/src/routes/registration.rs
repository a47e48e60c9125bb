use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Account;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CompleteRegistrationRequest {
    pub token: String,
    pub password: String,
}

/// The token travels in the body so it never lands in request-line logs.
#[derive(Deserialize)]
pub struct InspectTokenRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct InvitationView {
    pub email: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct RegisteredAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for RegisteredAccount {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            role: account.role,
            created_at: account.created_at,
        }
    }
}

pub async fn inspect_token(
    State(state): State<AppState>,
    Json(payload): Json<InspectTokenRequest>,
) -> AppResult<Json<InvitationView>> {
    let validated = state.coordinator.inspect_token(&payload.token).await?;
    Ok(Json(InvitationView {
        email: validated.claim.email,
        name: validated.consultation.name,
        expires_at: validated.consultation.token_expires_at,
    }))
}

pub async fn complete_registration(
    State(state): State<AppState>,
    Json(payload): Json<CompleteRegistrationRequest>,
) -> AppResult<(StatusCode, Json<RegisteredAccount>)> {
    let account = state
        .coordinator
        .complete_registration(&payload.token, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}
