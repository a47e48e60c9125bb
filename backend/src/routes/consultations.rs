use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::lifecycle::MAX_INVITATION_TTL_HOURS;
use crate::models::{ConsultationRequest, NewConsultation};
use crate::state::AppState;
use crate::status::ConsultationStatus;

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DecisionRequest {
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ReissueRequest {
    #[serde(default)]
    pub ttl_hours: Option<i64>,
}

pub async fn submit_consultation(
    State(state): State<AppState>,
    Json(payload): Json<NewConsultation>,
) -> AppResult<(StatusCode, Json<ConsultationRequest>)> {
    let record = state.coordinator.submit(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_consultations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ConsultationRequest>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ConsultationStatus>)
        .transpose()
        .map_err(|err| AppError::bad_request(err.to_string()))?;
    Ok(Json(state.coordinator.list(status).await?))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConsultationRequest>> {
    Ok(Json(state.coordinator.get(id).await?))
}

pub async fn begin_review(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConsultationRequest>> {
    tracing::info!(admin = %admin.subject, consultation_id = %id, "review requested");
    Ok(Json(state.coordinator.begin_review(id).await?))
}

pub async fn approve(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> AppResult<Json<ConsultationRequest>> {
    let Json(payload) = payload.unwrap_or_default();
    tracing::info!(admin = %admin.subject, consultation_id = %id, "approval requested");
    Ok(Json(
        state
            .coordinator
            .approve(id, normalize_notes(payload.admin_notes))
            .await?,
    ))
}

pub async fn reject(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> AppResult<Json<ConsultationRequest>> {
    let Json(payload) = payload.unwrap_or_default();
    tracing::info!(admin = %admin.subject, consultation_id = %id, "rejection requested");
    Ok(Json(
        state
            .coordinator
            .reject(id, normalize_notes(payload.admin_notes))
            .await?,
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> AppResult<Json<ConsultationRequest>> {
    let Json(payload) = payload.unwrap_or_default();
    tracing::info!(admin = %admin.subject, consultation_id = %id, "cancellation requested");
    Ok(Json(
        state
            .coordinator
            .cancel(id, normalize_notes(payload.admin_notes))
            .await?,
    ))
}

pub async fn reissue_invitation(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReissueRequest>>,
) -> AppResult<Json<ConsultationRequest>> {
    let Json(payload) = payload.unwrap_or_default();
    let ttl = payload.ttl_hours.map(ttl_from_hours).transpose()?;
    tracing::info!(admin = %admin.subject, consultation_id = %id, "invitation reissue requested");
    Ok(Json(state.coordinator.reissue_invitation(id, ttl).await?))
}

pub async fn schedule(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConsultationRequest>> {
    tracing::info!(admin = %admin.subject, consultation_id = %id, "scheduling requested");
    Ok(Json(state.coordinator.schedule(id).await?))
}

pub async fn mark_completed(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConsultationRequest>> {
    tracing::info!(admin = %admin.subject, consultation_id = %id, "completion requested");
    Ok(Json(state.coordinator.mark_completed(id).await?))
}

fn ttl_from_hours(hours: i64) -> AppResult<Duration> {
    if !(1..=MAX_INVITATION_TTL_HOURS).contains(&hours) {
        return Err(AppError::bad_request(format!(
            "ttl_hours must be between 1 and {MAX_INVITATION_TTL_HOURS}"
        )));
    }
    Duration::try_hours(hours).ok_or_else(|| AppError::bad_request("ttl_hours is out of range"))
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{normalize_notes, ttl_from_hours};
    use axum::http::StatusCode;

    #[test]
    fn blank_notes_count_as_absent() {
        assert_eq!(normalize_notes(Some("   ".into())), None);
        assert_eq!(normalize_notes(None), None);
        assert_eq!(normalize_notes(Some(" fit ".into())), Some("fit".into()));
    }

    #[test]
    fn ttl_hours_are_bounded() {
        assert_eq!(ttl_from_hours(48).unwrap(), chrono::Duration::hours(48));
        for hours in [0, -1, 721, 1_000_000_000, 2_000_000_000_000, i64::MAX] {
            let err = ttl_from_hours(hours).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{hours}");
        }
    }
}
